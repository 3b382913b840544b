//! Loko Server — HTTP API and static site serving
//!
//! The API reloads project state from disk per request; the filesystem is
//! authoritative and there is no long-lived in-memory graph.

pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod runner;
pub mod site;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use loko_core::ProjectConfig;

use runner::BuildStatus;

/// Shared state of the API server.
pub struct ApiState {
    pub root: PathBuf,
    pub config: ProjectConfig,
    /// Build registry keyed by build ID, shared with background build tasks.
    pub builds: Arc<DashMap<String, BuildStatus>>,
}

impl ApiState {
    pub fn new(root: PathBuf, config: ProjectConfig) -> Self {
        ApiState { root, config, builds: Arc::new(DashMap::new()) }
    }
}

/// The loko HTTP API server.
pub struct ApiServer {
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(root: PathBuf, config: ProjectConfig) -> Self {
        ApiServer { state: Arc::new(ApiState::new(root, config)) }
    }

    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    /// Bind and serve until cancellation.
    pub async fn run(self, addr: SocketAddr, cancel: CancellationToken) -> Result<()> {
        let router = router::create_router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        tracing::info!(%addr, "API server listening");
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("API server failed")
    }
}
