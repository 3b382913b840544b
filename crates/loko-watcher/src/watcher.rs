//! Filesystem watcher implementation

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error};

use loko_core::{FileWatcher, WatchEvent, WatchEventKind};

/// Watches a project source tree and yields events for the files loko
/// reads: entity Markdown, D2 sources, and TOML configuration.
pub struct NotifyWatcher {
    watcher: Option<RecommendedWatcher>,
    event_tx: mpsc::UnboundedSender<WatchEvent>,
    event_rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl NotifyWatcher {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        NotifyWatcher { watcher: None, event_tx, event_rx }
    }

    fn handle_notify_event(event: notify::Event, event_tx: &mpsc::UnboundedSender<WatchEvent>) {
        let kind = match event.kind {
            notify::EventKind::Create(_) => WatchEventKind::Created,
            notify::EventKind::Modify(_) => WatchEventKind::Modified,
            notify::EventKind::Remove(_) => WatchEventKind::Removed,
            _ => return,
        };
        for path in event.paths {
            if !is_relevant(&path) {
                continue;
            }
            debug!(path = %path.display(), ?kind, "watch event");
            let _ = event_tx.send(WatchEvent { path, kind });
        }
    }
}

impl Default for NotifyWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileWatcher for NotifyWatcher {
    async fn watch(&mut self, root: &Path) -> Result<()> {
        let event_tx = self.event_tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => Self::handle_notify_event(event, &event_tx),
                Err(err) => error!(error = %err, "filesystem watch error"),
            })
            .context("creating filesystem watcher")?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watching {}", root.display()))?;
        self.watcher = Some(watcher);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<WatchEvent> {
        self.event_rx.recv().await
    }
}

/// Only the file types loko reads trigger rebuilds; build output and
/// version-control internals are ignored.
fn is_relevant(path: &Path) -> bool {
    for component in path.components() {
        if let Some(name) = component.as_os_str().to_str() {
            if name == "dist" || name == ".git" || name == ".loko" || name == "node_modules" {
                return false;
            }
        }
    }
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("d2") | Some("toml")
    )
}
