//! `loko api`

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};

use loko_core::ProjectRepository;
use loko_server::ApiServer;
use loko_store::FsProjectRepository;

use super::shutdown_token;

pub async fn run(root: &Path, port: Option<u16>, api_key: Option<String>) -> Result<i32> {
    let project = FsProjectRepository::new().load_project(root).await?;
    let mut config = project.config.clone();
    if let Some(key) = api_key {
        config.api.key = Some(key);
    }
    let port = port.unwrap_or(config.server.api_port);
    let addr: SocketAddr =
        format!("127.0.0.1:{port}").parse().with_context(|| format!("invalid port {port}"))?;

    println!("API listening on http://{addr} (docs at /api/docs)");
    ApiServer::new(root.to_path_buf(), config)
        .run(addr, shutdown_token())
        .await?;
    Ok(0)
}
