//! Driver for the external `d2` renderer binary

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use loko_core::{D2Config, DiagramFormat, DiagramRenderer};

/// Known d2 theme names mapped to the numeric IDs the CLI expects.
const THEMES: &[(&str, u32)] = &[
    ("neutral-default", 0),
    ("neutral-grey", 1),
    ("flagship-terrastruct", 3),
    ("cool-classics", 4),
    ("mixed-berry-blue", 5),
    ("grape-soda", 6),
    ("aubergine", 7),
    ("colorblind-clear", 8),
    ("vanilla-nitro-cola", 100),
    ("orange-creamsicle", 101),
    ("shirley-temple", 102),
    ("earth-tones", 103),
    ("everglade-green", 104),
    ("buttered-toast", 105),
    ("terminal", 300),
    ("terminal-grayscale", 301),
    ("origami", 302),
];

/// Resolve a theme name (or literal numeric ID) to a d2 theme ID.
pub fn theme_id(theme: &str) -> u32 {
    if let Some((_, id)) = THEMES.iter().find(|(name, _)| *name == theme) {
        return *id;
    }
    if let Ok(id) = theme.parse::<u32>() {
        return id;
    }
    tracing::warn!(theme, "unknown d2 theme, falling back to neutral-default");
    0
}

/// Renders diagrams by spawning the `d2` binary.
#[derive(Debug, Clone)]
pub struct D2Cli {
    binary: String,
    theme: String,
    layout: String,
}

impl D2Cli {
    pub fn new(config: &D2Config) -> Self {
        D2Cli {
            binary: "d2".to_string(),
            theme: config.theme.clone(),
            layout: config.layout.clone(),
        }
    }

    /// Override the binary path (tests, packaging).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl DiagramRenderer for D2Cli {
    async fn render(
        &self,
        source: &str,
        output: &Path,
        _format: DiagramFormat,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // d2 reads from a file; stage the source in the temp dir.
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "diagram".to_string());
        let src_path = std::env::temp_dir().join(format!("loko-{}-{}.d2", std::process::id(), stem));
        tokio::fs::write(&src_path, source)
            .await
            .with_context(|| format!("staging {}", src_path.display()))?;

        let mut child = Command::new(&self.binary)
            .arg(format!("--theme={}", theme_id(&self.theme)))
            .arg(format!("--layout={}", self.layout))
            .arg(&src_path)
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
                let _ = tokio::fs::remove_file(&src_path).await;
                bail!("diagram render cancelled");
            }
            status = child.wait() => status?,
        };
        let _ = tokio::fs::remove_file(&src_path).await;

        if !status.success() {
            let mut detail = String::new();
            if let Some(stderr) = stderr.as_mut() {
                let _ = stderr.read_to_string(&mut detail).await;
            }
            bail!("d2 exited with {}: {}", status, detail.trim());
        }
        Ok(())
    }

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
}
