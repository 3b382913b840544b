//! The documentation build pipeline
//!
//! Stage order matters: diagrams render first (hash-cached, bounded
//! parallelism), then the site/markdown builders that reference them, then
//! PDF, then the machine-readable TOON export.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::diagram::{Diagram, DiagramFormat};
use crate::graph::ArchitectureGraph;
use crate::ports::{
    DiagramRenderer, MarkdownBuilder, OutputEncoder, PdfRenderer, ProgressReporter, SiteBuilder,
};
use crate::project::Project;
use crate::system::System;

/// Manifest of source hashes from the previous build, keyed by the
/// output-relative diagram path.
const CACHE_MANIFEST: &str = ".loko-cache.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Markdown,
    Pdf,
    Toon,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(OutputFormat::Html),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "pdf" => Ok(OutputFormat::Pdf),
            "toon" => Ok(OutputFormat::Toon),
            other => Err(anyhow!("unknown output format: {other}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Html => write!(f, "html"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Pdf => write!(f, "pdf"),
            OutputFormat::Toon => write!(f, "toon"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub output: PathBuf,
    pub formats: Vec<OutputFormat>,
    /// True when the format set came from an explicit `--format` flag; a
    /// missing PDF renderer is then fatal instead of a warning.
    pub explicit_formats: bool,
    pub clean: bool,
}

impl BuildRequest {
    /// Format set from the `[outputs]` config section.
    pub fn from_config(project: &Project) -> Self {
        let mut formats = Vec::new();
        if project.config.outputs.html {
            formats.push(OutputFormat::Html);
        }
        if project.config.outputs.markdown {
            formats.push(OutputFormat::Markdown);
        }
        if project.config.outputs.pdf {
            formats.push(OutputFormat::Pdf);
        }
        BuildRequest {
            output: project.output_dir(),
            formats,
            explicit_formats: false,
            clean: false,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct BuildSummary {
    pub rendered: usize,
    pub skipped: usize,
    pub failed: usize,
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

struct DiagramJob {
    /// Output path relative to the output directory.
    rel_path: PathBuf,
    source: String,
    hash: String,
}

pub struct BuildDocs {
    renderer: Arc<dyn DiagramRenderer>,
    site: Arc<dyn SiteBuilder>,
    markdown: Arc<dyn MarkdownBuilder>,
    pdf: Arc<dyn PdfRenderer>,
    toon: Arc<dyn OutputEncoder>,
}

impl BuildDocs {
    pub fn new(
        renderer: Arc<dyn DiagramRenderer>,
        site: Arc<dyn SiteBuilder>,
        markdown: Arc<dyn MarkdownBuilder>,
        pdf: Arc<dyn PdfRenderer>,
        toon: Arc<dyn OutputEncoder>,
    ) -> Self {
        BuildDocs { renderer, site, markdown, pdf, toon }
    }

    pub async fn execute(
        &self,
        project: &Project,
        systems: &[System],
        graph: &ArchitectureGraph,
        request: &BuildRequest,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<BuildSummary> {
        let mut summary = BuildSummary::default();

        if request.clean && tokio::fs::try_exists(&request.output).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&request.output)
                .await
                .with_context(|| format!("cleaning {}", request.output.display()))?;
        }
        tokio::fs::create_dir_all(&request.output)
            .await
            .with_context(|| format!("creating {}", request.output.display()))?;

        if systems.is_empty() {
            reporter.info("project has no systems yet; nothing to build");
            reporter.success("build finished (empty project)");
            return Ok(summary);
        }

        self.render_diagrams(project, systems, request, reporter, cancel, &mut summary).await?;

        // PDF renders the assembled site, so it implies the HTML stage.
        if request.formats.contains(&OutputFormat::Html) || request.formats.contains(&OutputFormat::Pdf)
        {
            reporter.info("building HTML site");
            let pages = self.site.build(project, systems, graph, &request.output, reporter).await?;
            summary.files.extend(pages);
        }

        if request.formats.contains(&OutputFormat::Markdown) {
            reporter.info("building Markdown documents");
            let docs = self.markdown.build(project, systems, graph, &request.output, reporter).await?;
            summary.files.extend(docs);
        }

        if request.formats.contains(&OutputFormat::Pdf) {
            self.render_pdf(project, request, reporter, cancel, &mut summary).await?;
        }

        if request.formats.contains(&OutputFormat::Toon) {
            let encoded = self.toon.encode(project, graph)?;
            let path = request.output.join(format!("architecture.{}", self.toon.extension()));
            tokio::fs::write(&path, encoded).await?;
            summary.files.push(path);
        }

        reporter.success(&format!(
            "build finished: {} diagrams rendered, {} cached, {} failed",
            summary.rendered, summary.skipped, summary.failed
        ));
        Ok(summary)
    }

    async fn render_diagrams(
        &self,
        project: &Project,
        systems: &[System],
        request: &BuildRequest,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
        summary: &mut BuildSummary,
    ) -> Result<()> {
        let jobs = collect_jobs(systems);
        let total = jobs.len();
        if total == 0 {
            return Ok(());
        }

        let cache_enabled = project.config.d2.cache;
        let mut manifest = if cache_enabled {
            load_manifest(&request.output).await
        } else {
            HashMap::new()
        };

        let workers = if project.config.build.parallel {
            project.config.build.max_workers.max(1)
        } else {
            1
        };
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set: JoinSet<(PathBuf, String, Result<bool>)> = JoinSet::new();

        for job in jobs {
            let out_path = request.output.join(&job.rel_path);
            let cached = manifest.get(&manifest_key(&job.rel_path)) == Some(&job.hash)
                && tokio::fs::try_exists(&out_path).await.unwrap_or(false);
            if cached {
                summary.skipped += 1;
                continue;
            }

            let renderer = Arc::clone(&self.renderer);
            let permit = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            set.spawn(async move {
                let _permit = permit.acquire_owned().await;
                if cancel.is_cancelled() {
                    return (job.rel_path, job.hash, Ok(false));
                }
                if let Some(parent) = out_path.parent() {
                    if let Err(err) = tokio::fs::create_dir_all(parent).await {
                        return (job.rel_path, job.hash, Err(err.into()));
                    }
                }
                let result = renderer
                    .render(&job.source, &out_path, DiagramFormat::Svg, &cancel)
                    .await
                    .map(|_| true);
                (job.rel_path, job.hash, result)
            });
        }

        let mut done = summary.skipped;
        while let Some(joined) = set.join_next().await {
            let Ok((rel_path, hash, result)) = joined else { continue };
            done += 1;
            match result {
                Ok(true) => {
                    summary.rendered += 1;
                    summary.files.push(request.output.join(&rel_path));
                    manifest.insert(manifest_key(&rel_path), hash);
                    reporter.step("diagrams", done, total, &rel_path.display().to_string());
                }
                Ok(false) => {
                    // Cancelled before the render started.
                }
                Err(err) => {
                    summary.failed += 1;
                    let warning = format!("diagram {} failed to render: {err}", rel_path.display());
                    tracing::warn!("{warning}");
                    reporter.error(&warning);
                    summary.warnings.push(warning);
                }
            }
        }

        if cache_enabled {
            save_manifest(&request.output, &manifest).await;
        }
        Ok(())
    }

    async fn render_pdf(
        &self,
        project: &Project,
        request: &BuildRequest,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
        summary: &mut BuildSummary,
    ) -> Result<()> {
        if !self.pdf.is_available().await {
            let instructions = self.pdf.install_instructions();
            if request.explicit_formats {
                return Err(anyhow!("PDF renderer is not available. {instructions}"));
            }
            let warning = format!("PDF output skipped: renderer not available. {instructions}");
            reporter.info(&warning);
            summary.warnings.push(warning);
            return Ok(());
        }
        let output = request.output.join(format!("{}.pdf", crate::ident::normalize_name(&project.name)));
        reporter.info("rendering PDF");
        self.pdf.render(&request.output, &output, cancel).await?;
        summary.files.push(output);
        Ok(())
    }
}

fn collect_jobs(systems: &[System]) -> Vec<DiagramJob> {
    let mut jobs = Vec::new();
    let mut push = |system_id: &str, diagram: &Diagram| {
        jobs.push(DiagramJob {
            rel_path: PathBuf::from("diagrams").join(system_id).join(diagram.output_file_name()),
            source: diagram.source.clone(),
            hash: diagram.current_hash(),
        });
    };
    for system in systems {
        if let Some(d) = &system.diagram {
            push(&system.id, d);
        }
        for container in system.containers.values() {
            if let Some(d) = &container.diagram {
                push(&system.id, d);
            }
            for component in container.components.values() {
                if let Some(d) = &component.diagram {
                    push(&system.id, d);
                }
            }
        }
    }
    jobs
}

fn manifest_key(rel_path: &Path) -> String {
    rel_path.to_string_lossy().replace('\\', "/")
}

async fn load_manifest(output: &Path) -> HashMap<String, String> {
    let path = output.join(CACHE_MANIFEST);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => HashMap::new(),
    }
}

async fn save_manifest(output: &Path, manifest: &HashMap<String, String>) {
    let path = output.join(CACHE_MANIFEST);
    if let Ok(text) = serde_json::to_string_pretty(manifest) {
        if let Err(err) = tokio::fs::write(&path, text).await {
            tracing::warn!(error = %err, "could not persist the diagram cache manifest");
        }
    }
}
