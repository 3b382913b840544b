//! Diagram source files and their render cache state

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Output format for rendered diagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    #[default]
    Svg,
    Png,
}

impl DiagramFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DiagramFormat::Svg => "svg",
            DiagramFormat::Png => "png",
        }
    }
}

/// A D2 diagram source with its render cache fields.
///
/// The content hash is the cache-invalidation key: an unchanged hash means
/// the last render is still up to date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    /// Derived from the source filename without extension.
    pub id: String,
    pub source_path: PathBuf,
    pub source: String,
    pub output_path: Option<PathBuf>,
    pub format: DiagramFormat,
    /// SHA-256 of the source text at the last successful render.
    pub content_hash: String,
    pub rendered_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Diagram {
    /// Create a diagram from its source file path and text.
    pub fn new(source_path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        let source_path = source_path.into();
        let id = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Diagram {
            id,
            source_path,
            source: source.into(),
            output_path: None,
            format: DiagramFormat::default(),
            content_hash: String::new(),
            rendered_at: None,
            error: None,
        }
    }

    /// SHA-256 hex digest of diagram source text.
    pub fn hash_source(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Hash of the current source text.
    pub fn current_hash(&self) -> String {
        Self::hash_source(&self.source)
    }

    /// Replace the source text, invalidating all render cache fields.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.content_hash.clear();
        self.output_path = None;
        self.rendered_at = None;
        self.error = None;
    }

    /// Rendered iff an output path is recorded and no error is pending.
    pub fn is_rendered(&self) -> bool {
        self.output_path.is_some() && self.error.is_none()
    }

    /// Whether a render is required for the given current source hash.
    pub fn needs_render(&self, current_hash: &str) -> bool {
        self.content_hash != current_hash || !self.is_rendered()
    }

    /// Record a successful render.
    pub fn mark_rendered(&mut self, output_path: impl Into<PathBuf>) {
        self.content_hash = self.current_hash();
        self.output_path = Some(output_path.into());
        self.rendered_at = Some(Utc::now());
        self.error = None;
    }

    /// Record a failed render; the diagram is no longer considered rendered.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.rendered_at = None;
    }

    /// Conventional output file name relative to an output directory.
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.id, self.format.extension())
    }

    /// Conventional output path under `dir`.
    pub fn output_path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.output_file_name())
    }
}
