//! `loko mcp`
//!
//! No banner on stdout: the protocol stream must stay clean.

use std::path::Path;

use anyhow::Result;

use loko_mcp::McpServer;

use super::shutdown_token;

pub async fn run(root: &Path) -> Result<i32> {
    McpServer::new(root.to_path_buf()).run(shutdown_token()).await?;
    Ok(0)
}
