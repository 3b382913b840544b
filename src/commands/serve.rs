//! `loko serve`

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use loko_core::usecase::WatchLoop;
use loko_core::ProjectRepository;
use loko_server::site::{serve_site, ReloadHub};
use loko_store::FsProjectRepository;
use loko_watcher::NotifyWatcher;

use super::{shutdown_token, TerminalReporter};

pub async fn run(root: &Path, address: &str, port: Option<u16>) -> Result<i32> {
    let project = FsProjectRepository::new().load_project(root).await?;
    let port = port.unwrap_or(project.config.server.serve_port);
    let addr: SocketAddr =
        format!("{address}:{port}").parse().with_context(|| format!("invalid address {address}:{port}"))?;
    let dist = project.output_dir();
    if !dist.join("index.html").exists() {
        tracing::warn!(dist = %dist.display(), "no built site found; run `loko build` first");
    }

    let cancel = shutdown_token();
    let hub = ReloadHub::new();

    // With hot reload on, a background watch loop rebuilds and pings
    // connected browsers after every completed cycle.
    if project.config.server.hot_reload {
        let watch_root = root.to_path_buf();
        let watch_cancel = cancel.clone();
        let watch_hub = hub.clone();
        tokio::spawn(async move {
            let inner_cancel = watch_cancel.clone();
            let result = WatchLoop::new(NotifyWatcher::new())
                .with_debounce(Duration::from_millis(500))
                .run(&watch_root.clone(), &TerminalReporter, &watch_cancel, move || {
                    let root = watch_root.clone();
                    let hub = watch_hub.clone();
                    let cancel = inner_cancel.clone();
                    async move {
                        super::build::run(
                            &root,
                            super::build::BuildArgs {
                                clean: false,
                                output: None,
                                format: None,
                                d2_theme: None,
                                d2_layout: None,
                            },
                        )
                        .await?;
                        if !cancel.is_cancelled() {
                            hub.notify();
                        }
                        Ok(())
                    }
                })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "watch loop failed");
            }
        });
    }

    serve_site(dist, addr, hub, cancel).await?;
    Ok(0)
}
