//! The registered tools: schema declarations and thin handlers
//!
//! Every handler is glue around exactly one use case; domain logic lives in
//! loko-core.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use loko_core::usecase::{
    AnalyzeCoupling, BuildArchitectureGraph, BuildDocs, BuildRequest, DependencyQuery, DetectDrift,
    FindRelationships, OutputFormat, QueryRelatedComponents, RelationshipFilter, ScaffoldEntity,
    ScaffoldRequest, SearchElements, SearchQuery, ValidateArchitecture,
};
use loko_core::{
    ArchitectureGraph, D2Parser, NodeKind, NullReporter, OutputEncoder, Project,
    ProjectRepository, System, TemplateEngine,
};
use loko_render::{D2Cli, HtmlSiteBuilder, MarkdownDocsBuilder, PdfCli};
use loko_store::{
    config::ConfigEnv, D2SyntaxParser, FsProjectRepository, JsonEncoder, TemplateSearchPaths,
    TeraTemplateEngine, ToonEncoder,
};

fn schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}

async fn load_model(root: &Path) -> Result<(Project, Vec<System>, ArchitectureGraph)> {
    let repo = FsProjectRepository::new();
    let project = repo.load_project(root).await?;
    let systems = repo.list_systems(root).await?;
    let persisted = repo.load_relationships(root).await?;
    let graph = BuildArchitectureGraph::new(Arc::new(D2SyntaxParser::new()))
        .execute(&systems, &persisted, &NullReporter)
        .await?;
    Ok((project, systems, graph))
}

fn scaffolder(root: &Path) -> Result<ScaffoldEntity> {
    let env = ConfigEnv::from_process();
    let paths = TemplateSearchPaths::for_project(root, &env);
    let engine: Arc<dyn TemplateEngine> = Arc::new(TeraTemplateEngine::with_search_paths(&paths)?);
    Ok(ScaffoldEntity::new(Arc::new(FsProjectRepository::new())).with_engine(engine))
}

// ── Parameter schemas ───────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryArchitectureParams {
    /// Output format: "json" (default) or "toon" (token-efficient).
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateEntityParams {
    /// Display name; the ID derives from it.
    pub name: String,
    /// Parent path: empty for systems, "system" for containers,
    /// "system/container" for components.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
    /// Explicit content template, overriding technology-based selection.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateDiagramParams {
    /// Qualified ID of the element that owns the diagram.
    pub element: String,
    /// New D2 source.
    pub source: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateEntityParams {
    /// Qualified ID of the element to update.
    pub element: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BuildDocsParams {
    /// Formats to build; the project config applies when omitted.
    #[serde(default)]
    pub formats: Option<Vec<String>>,
    #[serde(default)]
    pub clean: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidateParams {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub check_drift: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ValidateDiagramParams {
    /// D2 source to check.
    pub source: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ElementParams {
    /// Qualified ID, e.g. "payment/api/auth-handler".
    pub element: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RelatedParams {
    pub element: String,
    /// Optional second element for a path search.
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Glob pattern matched against short IDs and names.
    pub query: String,
    /// Filter: "system", "container" or "component".
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    /// Result cap (default 20, max 100).
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindRelationshipsParams {
    /// Glob on the qualified source ID; at least one pattern is required.
    #[serde(default)]
    pub source_pattern: Option<String>,
    #[serde(default)]
    pub target_pattern: Option<String>,
    /// Exact relationship type label.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

// ── Registry ────────────────────────────────────────────

/// Tool declarations for `tools/list`.
pub fn list() -> Vec<Value> {
    let declare = |name: &str, description: &str, input_schema: Value| {
        json!({ "name": name, "description": description, "inputSchema": input_schema })
    };
    vec![
        declare("query_project", "Project metadata and element counts", schema::<EmptyParams>()),
        declare(
            "query_architecture",
            "Full architecture graph as JSON or TOON",
            schema::<QueryArchitectureParams>(),
        ),
        declare("create_system", "Scaffold a new system (C4 L1)", schema::<CreateEntityParams>()),
        declare(
            "create_container",
            "Scaffold a container under a system (C4 L2)",
            schema::<CreateEntityParams>(),
        ),
        declare(
            "create_component",
            "Scaffold a component under a container (C4 L3)",
            schema::<CreateEntityParams>(),
        ),
        declare("update_diagram", "Replace an element's D2 diagram source", schema::<UpdateDiagramParams>()),
        declare("update_system", "Update system metadata", schema::<UpdateEntityParams>()),
        declare("update_container", "Update container metadata", schema::<UpdateEntityParams>()),
        declare("update_component", "Update component metadata", schema::<UpdateEntityParams>()),
        declare("build_docs", "Run the documentation build pipeline", schema::<BuildDocsParams>()),
        declare("validate", "Validate the architecture", schema::<ValidateParams>()),
        declare("validate_diagram", "Syntax-check a D2 source", schema::<ValidateDiagramParams>()),
        declare("query_dependencies", "Direct dependencies and dependents", schema::<ElementParams>()),
        declare(
            "query_related_components",
            "Neighbourhood and optional path between elements",
            schema::<RelatedParams>(),
        ),
        declare("analyze_coupling", "Coupling and centrality report", schema::<EmptyParams>()),
        declare("search_elements", "Glob search over elements", schema::<SearchParams>()),
        declare("find_relationships", "Filter relationships by glob and type", schema::<FindRelationshipsParams>()),
    ]
}

/// Dispatch one tool call.
pub async fn call(root: &Path, name: &str, args: Value) -> Result<Value> {
    match name {
        "query_project" => query_project(root).await,
        "query_architecture" => query_architecture(root, parse(args)?).await,
        "create_system" => create_entity(root, NodeKind::System, parse(args)?).await,
        "create_container" => create_entity(root, NodeKind::Container, parse(args)?).await,
        "create_component" => create_entity(root, NodeKind::Component, parse(args)?).await,
        "update_diagram" => update_diagram(root, parse(args)?).await,
        "update_system" => update_entity(root, NodeKind::System, parse(args)?).await,
        "update_container" => update_entity(root, NodeKind::Container, parse(args)?).await,
        "update_component" => update_entity(root, NodeKind::Component, parse(args)?).await,
        "build_docs" => build_docs(root, parse(args)?).await,
        "validate" => validate(root, parse(args)?).await,
        "validate_diagram" => validate_diagram(parse(args)?),
        "query_dependencies" => query_dependencies(root, parse(args)?).await,
        "query_related_components" => query_related(root, parse(args)?).await,
        "analyze_coupling" => analyze_coupling(root).await,
        "search_elements" => search_elements(root, parse(args)?).await,
        "find_relationships" => find_relationships(root, parse(args)?).await,
        other => bail!("unknown tool: {other}"),
    }
}

fn parse<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).context("invalid tool arguments")
}

// ── Handlers ────────────────────────────────────────────

async fn query_project(root: &Path) -> Result<Value> {
    let (project, systems, graph) = load_model(root).await?;
    Ok(json!({
        "name": project.name,
        "description": project.description,
        "version": project.version,
        "systems": systems.len(),
        "elements": graph.node_count(),
        "relationships": graph.edge_count(),
    }))
}

async fn query_architecture(root: &Path, params: QueryArchitectureParams) -> Result<Value> {
    let (project, _, graph) = load_model(root).await?;
    match params.format.as_deref() {
        Some("toon") => Ok(json!({ "format": "toon", "body": ToonEncoder.encode(&project, &graph)? })),
        None | Some("json") => {
            let body: Value = serde_json::from_str(&JsonEncoder.encode(&project, &graph)?)?;
            Ok(body)
        }
        Some(other) => bail!("unknown format: {other}"),
    }
}

async fn create_entity(root: &Path, kind: NodeKind, params: CreateEntityParams) -> Result<Value> {
    let parent: Vec<String> = params
        .parent
        .as_deref()
        .map(|p| p.split('/').map(|s| s.to_string()).collect())
        .unwrap_or_default();
    let request = ScaffoldRequest {
        root: root.to_path_buf(),
        kind,
        name: params.name,
        description: params.description.unwrap_or_default(),
        technology: params.technology.unwrap_or_default(),
        parent,
        template: None,
        content_template: params.template,
        preview: false,
    };
    let result = scaffolder(root)?.execute(&request).await?;
    Ok(json!({
        "id": result.id,
        "files": result.files.iter().map(|f| f.display().to_string()).collect::<Vec<_>>(),
        "diagram": result.diagram.map(|d| d.display().to_string()),
    }))
}

async fn update_diagram(root: &Path, params: UpdateDiagramParams) -> Result<Value> {
    // Syntax-check before touching the file.
    D2SyntaxParser::new().parse(&params.source)?;
    let repo = FsProjectRepository::new();
    let project = repo.load_project(root).await?;
    let short = params.element.rsplit('/').next().unwrap_or(&params.element);
    let mut path = project.source_dir();
    for segment in params.element.split('/') {
        path = path.join(segment);
    }
    let path = path.join(format!("{short}.d2"));
    repo.write_diagram(&path, &params.source).await?;
    Ok(json!({ "element": params.element, "path": path.display().to_string() }))
}

async fn update_entity(root: &Path, kind: NodeKind, params: UpdateEntityParams) -> Result<Value> {
    let repo = FsProjectRepository::new();
    let mut systems = repo.list_systems(root).await?;
    let segments: Vec<&str> = params.element.split('/').collect();
    let written = match (kind, segments.as_slice()) {
        (NodeKind::System, [system_id]) => {
            let system = systems
                .iter_mut()
                .find(|s| s.id == *system_id)
                .ok_or_else(|| anyhow!("system not found: {system_id}"))?;
            if let Some(d) = params.description { system.description = d; }
            if let Some(t) = params.tags { system.tags = t; }
            repo.save_system(root, system).await?
        }
        (NodeKind::Container, [system_id, container_id]) => {
            let system = systems
                .iter_mut()
                .find(|s| s.id == *system_id)
                .ok_or_else(|| anyhow!("system not found: {system_id}"))?;
            let container = system
                .containers
                .get_mut(*container_id)
                .ok_or_else(|| anyhow!("container not found: {}", params.element))?;
            if let Some(d) = params.description { container.description = d; }
            if let Some(t) = params.technology { container.technology = t; }
            if let Some(t) = params.tags { container.tags = t; }
            repo.save_container(root, system_id, container).await?
        }
        (NodeKind::Component, [system_id, container_id, component_id]) => {
            let system = systems
                .iter_mut()
                .find(|s| s.id == *system_id)
                .ok_or_else(|| anyhow!("system not found: {system_id}"))?;
            let container = system
                .containers
                .get_mut(*container_id)
                .ok_or_else(|| anyhow!("container not found: {system_id}/{container_id}"))?;
            let component = container
                .components
                .get_mut(*component_id)
                .ok_or_else(|| anyhow!("component not found: {}", params.element))?;
            if let Some(d) = params.description { component.description = d; }
            if let Some(t) = params.technology { component.technology = t; }
            if let Some(t) = params.tags { component.tags = t; }
            repo.save_component(root, system_id, container_id, component).await?
        }
        _ => bail!("element path does not match a {kind}: {}", params.element),
    };
    Ok(json!({
        "element": params.element,
        "files": written.iter().map(|f| f.display().to_string()).collect::<Vec<_>>(),
    }))
}

async fn build_docs(root: &Path, params: BuildDocsParams) -> Result<Value> {
    let (project, systems, graph) = load_model(root).await?;
    let mut request = BuildRequest::from_config(&project);
    if let Some(formats) = &params.formats {
        request.formats = formats
            .iter()
            .map(|f| f.parse::<OutputFormat>())
            .collect::<Result<Vec<_>>>()?;
        request.explicit_formats = true;
    }
    request.clean = params.clean;
    let docs = BuildDocs::new(
        Arc::new(D2Cli::new(&project.config.d2)),
        Arc::new(HtmlSiteBuilder::new()),
        Arc::new(MarkdownDocsBuilder::new()),
        Arc::new(PdfCli::new()),
        Arc::new(ToonEncoder),
    );
    let summary = docs
        .execute(&project, &systems, &graph, &request, &NullReporter, &CancellationToken::new())
        .await?;
    Ok(json!({
        "rendered": summary.rendered,
        "skipped": summary.skipped,
        "failed": summary.failed,
        "files": summary.files.len(),
        "warnings": summary.warnings,
    }))
}

async fn validate(root: &Path, params: ValidateParams) -> Result<Value> {
    let (_, systems, graph) = load_model(root).await?;
    let report = ValidateArchitecture::new().execute(&systems, &graph, params.strict);
    let drift = if params.check_drift {
        DetectDrift::new(Arc::new(D2SyntaxParser::new())).execute(&systems, &graph)?
    } else {
        Vec::new()
    };
    Ok(json!({
        "valid": report.is_valid(),
        "errors": report.error_count(),
        "warnings": report.warning_count(),
        "issues": report.issues,
        "drift": drift,
    }))
}

fn validate_diagram(params: ValidateDiagramParams) -> Result<Value> {
    match D2SyntaxParser::new().parse(&params.source) {
        Ok(doc) => Ok(json!({
            "valid": true,
            "relationships": doc.relationships.len(),
            "tooltips": doc.tooltips.len(),
        })),
        Err(err) => Ok(json!({ "valid": false, "error": err.to_string() })),
    }
}

async fn query_dependencies(root: &Path, params: ElementParams) -> Result<Value> {
    let (_, _, graph) = load_model(root).await?;
    let result = DependencyQuery::new().execute(&graph, &params.element)?;
    Ok(serde_json::to_value(result)?)
}

async fn query_related(root: &Path, params: RelatedParams) -> Result<Value> {
    let (_, _, graph) = load_model(root).await?;
    let result =
        QueryRelatedComponents::new().execute(&graph, &params.element, params.to.as_deref())?;
    Ok(serde_json::to_value(result)?)
}

async fn analyze_coupling(root: &Path) -> Result<Value> {
    let (_, _, graph) = load_model(root).await?;
    Ok(serde_json::to_value(AnalyzeCoupling::new().execute(&graph))?)
}

async fn search_elements(root: &Path, params: SearchParams) -> Result<Value> {
    let (_, _, graph) = load_model(root).await?;
    let query = SearchQuery {
        pattern: params.query,
        kind: params.kind.as_deref().map(|k| k.parse()).transpose().map_err(|_| anyhow!("type must be system, container or component"))?,
        technology: params.technology,
        tag: params.tag,
        limit: params.limit,
    };
    Ok(serde_json::to_value(SearchElements::new().execute(&graph, &query))?)
}

async fn find_relationships(root: &Path, params: FindRelationshipsParams) -> Result<Value> {
    let (_, _, graph) = load_model(root).await?;
    let filter = RelationshipFilter {
        source_pattern: params.source_pattern,
        target_pattern: params.target_pattern,
        kind: params.kind,
        limit: params.limit,
    };
    Ok(serde_json::to_value(FindRelationships::new().execute(&graph, &filter)?)?)
}
