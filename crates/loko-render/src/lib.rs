//! Loko Render — build-pipeline adapters
//!
//! Drivers for the external `d2` and `weasyprint` binaries plus the HTML
//! site and Markdown document builders.

pub mod d2cli;
pub mod html;
pub mod markdown;
pub mod pdf;

pub use d2cli::D2Cli;
pub use html::HtmlSiteBuilder;
pub use markdown::MarkdownDocsBuilder;
pub use pdf::PdfCli;
