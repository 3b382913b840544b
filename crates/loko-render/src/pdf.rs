//! Driver for the external `weasyprint` PDF renderer

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use loko_core::PdfRenderer;

/// Renders the built HTML site to PDF through WeasyPrint.
#[derive(Debug, Clone)]
pub struct PdfCli {
    binary: String,
}

impl Default for PdfCli {
    fn default() -> Self {
        PdfCli { binary: "weasyprint".to_string() }
    }
}

impl PdfCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl PdfRenderer for PdfCli {
    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn render(&self, site_dir: &Path, output: &Path, cancel: &CancellationToken) -> Result<()> {
        let index = site_dir.join("index.html");
        if !tokio::fs::try_exists(&index).await.unwrap_or(false) {
            bail!("no index.html under {}; build the HTML site first", site_dir.display());
        }

        let mut child = Command::new(&self.binary)
            .arg(&index)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", self.binary))?;
        let mut stderr = child.stderr.take();

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                bail!("pdf render cancelled");
            }
            status = child.wait() => status?,
        };
        if !status.success() {
            let mut detail = String::new();
            if let Some(stderr) = stderr.as_mut() {
                let _ = stderr.read_to_string(&mut detail).await;
            }
            bail!("weasyprint exited with {}: {}", status, detail.trim());
        }
        Ok(())
    }

    fn install_instructions(&self) -> String {
        "WeasyPrint was not found on PATH. Install it with `pipx install weasyprint` \
         (or your package manager) and re-run, or drop `pdf` from the requested formats."
            .to_string()
    }
}
