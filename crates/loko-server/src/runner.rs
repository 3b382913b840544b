//! Build execution behind the API
//!
//! POST /api/v1/build registers a build, spawns it in the background and
//! returns the ID; progress events land in the per-build status record.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use loko_core::usecase::{BuildArchitectureGraph, BuildDocs, BuildRequest};
use loko_core::{ArchitectureGraph, Progress, ProgressReporter, Project, System};
use loko_render::{D2Cli, HtmlSiteBuilder, MarkdownDocsBuilder, PdfCli};
use loko_store::{D2SyntaxParser, FsProjectRepository, ToonEncoder};

use loko_core::ProjectRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Queued,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildStatus {
    pub id: String,
    pub phase: BuildPhase,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub messages: Vec<String>,
}

impl BuildStatus {
    fn new(id: String) -> Self {
        BuildStatus {
            id,
            phase: BuildPhase::Queued,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            messages: Vec::new(),
        }
    }
}

static BUILD_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn next_build_id() -> String {
    let n = BUILD_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("build-{}-{}", Utc::now().timestamp_millis(), n)
}

/// Progress sink appending to the build's status record.
struct StatusReporter {
    builds: Arc<DashMap<String, BuildStatus>>,
    id: String,
}

impl ProgressReporter for StatusReporter {
    fn report(&self, event: Progress) {
        let message = match event {
            Progress::Step { step, current, total, message } => {
                format!("[{step} {current}/{total}] {message}")
            }
            Progress::Info(m) => m,
            Progress::Success(m) => format!("ok: {m}"),
            Progress::Error(m) => format!("error: {m}"),
        };
        if let Some(mut status) = self.builds.get_mut(&self.id) {
            status.messages.push(message);
        }
    }
}

/// Load the project tree and derive its architecture graph.
pub async fn load_model(
    root: &Path,
    reporter: &dyn ProgressReporter,
) -> Result<(Project, Vec<System>, ArchitectureGraph)> {
    let repo = FsProjectRepository::new();
    let project = repo.load_project(root).await?;
    let systems = repo.list_systems(root).await?;
    let persisted = repo.load_relationships(root).await?;
    let graph = BuildArchitectureGraph::new(Arc::new(D2SyntaxParser::new()))
        .execute(&systems, &persisted, reporter)
        .await?;
    Ok((project, systems, graph))
}

/// Register a build and run it in a background task.
pub fn spawn_build(
    builds: Arc<DashMap<String, BuildStatus>>,
    root: std::path::PathBuf,
    cancel: CancellationToken,
) -> String {
    let id = next_build_id();
    builds.insert(id.clone(), BuildStatus::new(id.clone()));

    let task_id = id.clone();
    tokio::spawn(async move {
        if let Some(mut status) = builds.get_mut(&task_id) {
            status.phase = BuildPhase::Running;
        }
        let reporter = StatusReporter { builds: Arc::clone(&builds), id: task_id.clone() };
        let result = run_build(&root, &reporter, &cancel).await;
        if let Some(mut status) = builds.get_mut(&task_id) {
            status.finished_at = Some(Utc::now());
            match result {
                Ok(()) => status.phase = BuildPhase::Succeeded,
                Err(err) => {
                    status.phase = BuildPhase::Failed;
                    status.error = Some(err.to_string());
                }
            }
        }
    });
    id
}

async fn run_build(
    root: &Path,
    reporter: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<()> {
    let (project, systems, graph) = load_model(root, reporter).await?;
    let request = BuildRequest::from_config(&project);
    let docs = BuildDocs::new(
        Arc::new(D2Cli::new(&project.config.d2)),
        Arc::new(HtmlSiteBuilder::new()),
        Arc::new(MarkdownDocsBuilder::new()),
        Arc::new(PdfCli::new()),
        Arc::new(ToonEncoder),
    );
    docs.execute(&project, &systems, &graph, &request, reporter, cancel).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_ids_are_unique() {
        let a = next_build_id();
        let b = next_build_id();
        assert_ne!(a, b);
        assert!(a.starts_with("build-"));
    }

    #[test]
    fn status_reporter_appends_messages() {
        let builds = Arc::new(DashMap::new());
        builds.insert("b1".to_string(), BuildStatus::new("b1".to_string()));
        let reporter = StatusReporter { builds: Arc::clone(&builds), id: "b1".to_string() };
        reporter.info("loading");
        reporter.step("diagrams", 1, 2, "shop.d2");
        reporter.success("done");
        let status = builds.get("b1").unwrap();
        assert_eq!(status.messages.len(), 3);
        assert!(status.messages[1].contains("1/2"));
    }
}
