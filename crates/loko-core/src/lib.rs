//! Loko Core — C4 domain model, architecture graph, ports and use cases

pub mod component;
pub mod config;
pub mod container;
pub mod diagram;
pub mod drift;
pub mod error;
pub mod graph;
pub mod ident;
pub mod ports;
pub mod project;
pub mod relationship;
pub mod report;
pub mod system;
pub mod usecase;

pub use component::Component;
pub use config::{Alias, ApiConfig, BuildConfig, D2Config, OutputsConfig, PathsConfig, ProjectConfig, ServerConfig};
pub use container::Container;
pub use diagram::{Diagram, DiagramFormat};
pub use drift::{DriftIssue, DriftKind};
pub use error::{GraphError, ScaffoldError, ValidationError, ValidationErrors};
pub use graph::{ArchitectureGraph, GraphEdge, GraphNode, NodeKind};
pub use ports::{
    D2Document, D2Parser, DiagramRenderer, FileWatcher, MarkdownBuilder, NullReporter,
    OutputEncoder, PdfRenderer, Progress, ProgressReporter, ProjectRepository, SiteBuilder,
    TemplateEngine, TemplateRegistry, WatchEvent, WatchEventKind,
};
pub use project::Project;
pub use relationship::{generate_relationship_id, D2Relationship, Direction, RelationType, Relationship};
pub use report::{ArchitectureReport, CoupledNode, DependencyReport, Issue, Severity};
pub use system::System;
