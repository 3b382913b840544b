//! End-to-end scenarios over real tempdir projects
//!
//! These drive the same use cases the CLI wires together, with the real
//! filesystem repository and D2 parser; external renderer binaries are
//! never invoked.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use loko_core::usecase::{
    BuildArchitectureGraph, DetectDrift, ScaffoldEntity, ScaffoldRequest, SearchElements,
    SearchQuery, ValidateArchitecture, WatchLoop,
};
use loko_core::{
    ArchitectureGraph, DriftKind, NodeKind, NullReporter, Progress, ProgressReporter, Project,
    ProjectRepository, Severity, System, TemplateEngine,
};
use loko_store::{D2SyntaxParser, FsProjectRepository, TeraTemplateEngine};
use loko_watcher::NotifyWatcher;

fn scaffolder() -> ScaffoldEntity {
    let engine: Arc<dyn TemplateEngine> = Arc::new(TeraTemplateEngine::builtin().unwrap());
    ScaffoldEntity::new(Arc::new(FsProjectRepository::new())).with_engine(engine)
}

async fn init_project(root: &Path, name: &str) {
    let project = Project::new(name, "", root).unwrap();
    FsProjectRepository::new().save_project(&project).await.unwrap();
}

async fn scaffold(root: &Path, kind: NodeKind, name: &str, parent: &[&str], technology: &str) {
    let request = ScaffoldRequest {
        root: root.to_path_buf(),
        kind,
        name: name.to_string(),
        description: String::new(),
        technology: technology.to_string(),
        parent: parent.iter().map(|s| s.to_string()).collect(),
        template: None,
        content_template: None,
        preview: false,
    };
    scaffolder().execute(&request).await.unwrap();
}

async fn load_graph(root: &Path) -> (Vec<System>, ArchitectureGraph) {
    let repo = FsProjectRepository::new();
    let systems = repo.list_systems(root).await.unwrap();
    let persisted = repo.load_relationships(root).await.unwrap();
    let graph = BuildArchitectureGraph::new(Arc::new(D2SyntaxParser::new()))
        .execute(&systems, &persisted, &NullReporter)
        .await
        .unwrap();
    (systems, graph)
}

/// Scenario: init, scaffold a three-level tree, validate clean.
#[tokio::test]
async fn scaffold_then_validate() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path(), "demo").await;

    scaffold(tmp.path(), NodeKind::System, "Payment", &[], "").await;
    scaffold(tmp.path(), NodeKind::Container, "API", &["payment"], "Go").await;
    scaffold(tmp.path(), NodeKind::Component, "AuthHandler", &["payment", "api"], "Go HTTP").await;

    let src = tmp.path().join("./src");
    assert!(src.join("payment/payment.d2").exists());
    assert!(src.join("payment/api/api.d2").exists());
    assert!(src.join("payment/api/authhandler/authhandler.d2").exists());

    let (systems, graph) = load_graph(tmp.path()).await;
    let report = ValidateArchitecture::new().execute(&systems, &graph, false);
    assert_eq!(report.systems, 1);
    assert_eq!(report.containers, 1);
    assert_eq!(report.components, 1);
    assert!(report.is_valid());
    assert_eq!(report.error_count(), 0);
    assert_eq!(report.warning_count(), 0);
}

/// Scenario: frontmatter `uses` plus a D2 `calls` arrow union-merge into
/// two distinct edges.
#[tokio::test]
async fn union_merge_of_relationship_sources() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path(), "demo").await;
    scaffold(tmp.path(), NodeKind::System, "Sys", &[], "").await;
    scaffold(tmp.path(), NodeKind::Container, "Cont", &["sys"], "").await;
    scaffold(tmp.path(), NodeKind::Component, "B", &["sys", "cont"], "").await;

    let a_dir = tmp.path().join("./src/sys/cont/a");
    std::fs::create_dir_all(&a_dir).unwrap();
    std::fs::write(
        a_dir.join("component.md"),
        "---\nid: a\nname: A\ndescription: Component A\nrelationships:\n  uses: [sys/cont/b]\n---\n\n# A\n",
    )
    .unwrap();
    std::fs::write(a_dir.join("a.d2"), "a -> b: \"calls\"\n").unwrap();

    let (_, graph) = load_graph(tmp.path()).await;
    let kinds: Vec<&str> =
        graph.outgoing_edges("sys/cont/a").iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&"uses"));
    assert!(kinds.contains(&"calls"));
}

/// Scenario: identical triples from frontmatter and D2 collapse to one edge.
#[tokio::test]
async fn duplicate_triples_deduplicate() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path(), "demo").await;
    scaffold(tmp.path(), NodeKind::System, "Sys", &[], "").await;
    scaffold(tmp.path(), NodeKind::Container, "Cont", &["sys"], "").await;
    scaffold(tmp.path(), NodeKind::Component, "B", &["sys", "cont"], "").await;

    let a_dir = tmp.path().join("./src/sys/cont/a");
    std::fs::create_dir_all(&a_dir).unwrap();
    std::fs::write(
        a_dir.join("component.md"),
        "---\nid: a\nname: A\nrelationships:\n  uses: [sys/cont/b]\n---\n",
    )
    .unwrap();
    std::fs::write(a_dir.join("a.d2"), "a -> b: \"uses\"\n").unwrap();

    let (_, graph) = load_graph(tmp.path()).await;
    let edges = graph.outgoing_edges("sys/cont/a");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].kind, "uses");
    assert_eq!(edges[0].target, "sys/cont/b");
}

/// Scenario: 30 matching components, limit 10, total still reported.
#[tokio::test]
async fn search_respects_limit_and_reports_total() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path(), "demo").await;
    scaffold(tmp.path(), NodeKind::System, "Shop", &[], "").await;
    scaffold(tmp.path(), NodeKind::Container, "Web", &["shop"], "").await;
    for i in 0..30 {
        scaffold(tmp.path(), NodeKind::Component, &format!("payment-{i:02}"), &["shop", "web"], "")
            .await;
    }

    let (_, graph) = load_graph(tmp.path()).await;
    let mut query = SearchQuery::pattern("payment-*");
    query.limit = Some(10);
    let result = SearchElements::new().execute(&graph, &query);
    assert_eq!(result.matches.len(), 10);
    assert_eq!(result.total_matched, 30);
}

/// Scenario: tooltip drift plus an arrow to a missing target.
#[tokio::test]
async fn drift_detection_reports_both_kinds() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path(), "demo").await;
    scaffold(tmp.path(), NodeKind::System, "Sys", &[], "").await;
    scaffold(tmp.path(), NodeKind::Container, "Cont", &["sys"], "").await;

    let x_dir = tmp.path().join("./src/sys/cont/x");
    std::fs::create_dir_all(&x_dir).unwrap();
    std::fs::write(
        x_dir.join("component.md"),
        "---\nid: x\nname: X\ndescription: Handles auth\n---\n",
    )
    .unwrap();
    std::fs::write(x_dir.join("x.d2"), "x: {\n  tooltip: \"Auth handler\"\n}\nx -> y\n").unwrap();

    let (systems, graph) = load_graph(tmp.path()).await;
    let issues =
        DetectDrift::new(Arc::new(D2SyntaxParser::new())).execute(&systems, &graph).unwrap();

    let mismatch: Vec<_> =
        issues.iter().filter(|i| i.kind == DriftKind::DescriptionMismatch).collect();
    let missing: Vec<_> = issues.iter().filter(|i| i.kind == DriftKind::MissingComponent).collect();
    assert_eq!(mismatch.len(), 1);
    assert_eq!(mismatch[0].severity, Severity::Warning);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, Severity::Error);
}

/// Recording reporter shared with the watch scenario.
#[derive(Default)]
struct Recorder(std::sync::Mutex<Vec<Progress>>);

impl ProgressReporter for Recorder {
    fn report(&self, event: Progress) {
        self.0.lock().unwrap().push(event);
    }
}

/// Scenario: touching one file triggers exactly one debounced rebuild.
#[tokio::test]
async fn watch_coalesces_into_one_rebuild() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path(), "demo").await;
    scaffold(tmp.path(), NodeKind::System, "Sys", &[], "").await;

    let reporter = Recorder::default();
    let cancel = tokio_util::sync::CancellationToken::new();
    let rebuilds = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let toucher_path = tmp.path().join("./src/sys/system.md");
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let text = std::fs::read_to_string(&toucher_path).unwrap();
        std::fs::write(&toucher_path, text).unwrap();
    });
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        stopper.cancel();
    });

    let counter = Arc::clone(&rebuilds);
    WatchLoop::new(NotifyWatcher::new())
        .with_debounce(Duration::from_millis(200))
        .run(tmp.path(), &reporter, &cancel, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();

    assert_eq!(rebuilds.load(std::sync::atomic::Ordering::SeqCst), 1);
    let events = reporter.0.lock().unwrap();
    assert!(events.iter().any(|e| matches!(e, Progress::Info(m) if m.contains("system.md"))));
    assert!(events.iter().any(|e| matches!(e, Progress::Success(m) if m.contains("rebuild"))));
}

/// Boundary: an empty project lists nothing, validates clean.
#[tokio::test]
async fn empty_project_boundaries() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path(), "demo").await;

    let (systems, graph) = load_graph(tmp.path()).await;
    assert!(systems.is_empty());
    assert_eq!(graph.node_count(), 0);
    let report = ValidateArchitecture::new().execute(&systems, &graph, false);
    assert!(report.is_valid());
}

/// Saved systems reload with identical normative fields.
#[tokio::test]
async fn save_load_round_trip() {
    let tmp = TempDir::new().unwrap();
    init_project(tmp.path(), "demo").await;
    scaffold(tmp.path(), NodeKind::System, "Notification Service", &[], "").await;
    scaffold(tmp.path(), NodeKind::Container, "Api Layer", &["notification-service"], "Go").await;
    scaffold(
        tmp.path(),
        NodeKind::Component,
        "Email Queue",
        &["notification-service", "api-layer"],
        "Amazon SQS",
    )
    .await;

    let repo = FsProjectRepository::new();
    let first = repo.list_systems(tmp.path()).await.unwrap();
    let second = repo.list_systems(tmp.path()).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].containers.len(), second[0].containers.len());

    let container = first[0].container("api-layer").unwrap();
    let component = container.component("email-queue").unwrap();
    assert_eq!(component.name, "Email Queue");
    assert_eq!(component.technology, "Amazon SQS");
}
