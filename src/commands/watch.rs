//! `loko watch`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use loko_core::usecase::{BuildDocs, BuildRequest, WatchLoop};
use loko_render::{D2Cli, HtmlSiteBuilder, MarkdownDocsBuilder, PdfCli};
use loko_store::ToonEncoder;
use loko_watcher::NotifyWatcher;

use super::{load_model, shutdown_token, TerminalReporter};

pub async fn run(root: &Path, output: Option<PathBuf>, debounce_ms: u64) -> Result<i32> {
    let reporter = TerminalReporter;
    let cancel = shutdown_token();
    let root = root.to_path_buf();
    let output = output.map(|o| root.join(o));

    // One full build up front so the site exists before the first change.
    rebuild(&root, output.clone(), &reporter, &cancel).await?;

    let watch = WatchLoop::new(NotifyWatcher::new())
        .with_debounce(Duration::from_millis(debounce_ms));
    let rebuild_root = root.clone();
    let rebuild_cancel = cancel.clone();
    watch
        .run(&root, &reporter, &cancel, move || {
            let root = rebuild_root.clone();
            let output = output.clone();
            let cancel = rebuild_cancel.clone();
            async move { rebuild(&root, output, &TerminalReporter, &cancel).await }
        })
        .await?;
    Ok(0)
}

async fn rebuild(
    root: &Path,
    output: Option<PathBuf>,
    reporter: &TerminalReporter,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<()> {
    let (project, systems, graph) = load_model(root, reporter).await?;
    let mut request = BuildRequest::from_config(&project);
    if let Some(output) = output {
        request.output = output;
    }
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
