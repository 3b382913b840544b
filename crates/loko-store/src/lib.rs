//! Loko Store — filesystem projection of the project tree
//!
//! Frontmatter+Markdown entity files, D2 diagram sources, TOML
//! configuration, template engine and the machine-readable encoders.

pub mod config;
pub mod d2;
pub mod encoders;
pub mod frontmatter;
pub mod repository;
pub mod templates;

pub use config::{load_config, ConfigEnv};
pub use d2::D2SyntaxParser;
pub use encoders::{JsonEncoder, TomlEncoder, ToonEncoder};
pub use repository::FsProjectRepository;
pub use templates::{TeraTemplateEngine, TemplateSearchPaths};
