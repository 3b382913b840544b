//! Application use cases: thin orchestration over entities and ports

pub mod build_docs;
pub mod build_graph;
pub mod drift;
pub mod relationships;
pub mod scaffold;
pub mod search;
pub mod validate;
pub mod watch;

pub use build_docs::{BuildDocs, BuildRequest, BuildSummary, OutputFormat};
pub use build_graph::BuildArchitectureGraph;
pub use drift::DetectDrift;
pub use relationships::{
    AnalyzeCoupling, DependencyQuery, FindRelationships, QueryRelatedComponents, RelationshipFilter,
    RelationshipMatch,
};
pub use scaffold::{select_content_template, ScaffoldEntity, ScaffoldRequest, ScaffoldResult};
pub use search::{SearchElements, SearchMatch, SearchQuery, SearchResult};
pub use validate::ValidateArchitecture;
pub use watch::WatchLoop;
