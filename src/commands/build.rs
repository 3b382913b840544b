//! `loko build`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use loko_core::usecase::{BuildDocs, BuildRequest, OutputFormat};
use loko_render::{D2Cli, HtmlSiteBuilder, MarkdownDocsBuilder, PdfCli};
use loko_store::ToonEncoder;

use super::{load_model, shutdown_token, TerminalReporter};

pub struct BuildArgs {
    pub clean: bool,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub d2_theme: Option<String>,
    pub d2_layout: Option<String>,
}

pub async fn run(root: &Path, args: BuildArgs) -> Result<i32> {
    let reporter = TerminalReporter;
    let (mut project, systems, graph) = load_model(root, &reporter).await?;

    // CLI flags sit on top of the layered configuration.
    if let Some(theme) = args.d2_theme {
        project.config.d2.theme = theme;
    }
    if let Some(layout) = args.d2_layout {
        project.config.d2.layout = layout;
    }

    let mut request = BuildRequest::from_config(&project);
    request.clean = args.clean;
    if let Some(output) = args.output {
        request.output = root.join(output);
    }
    if let Some(formats) = args.format {
        request.formats = formats
            .split(',')
            .map(|f| f.parse::<OutputFormat>())
            .collect::<Result<Vec<_>>>()?;
        request.explicit_formats = true;
    }

    let docs = BuildDocs::new(
        Arc::new(D2Cli::new(&project.config.d2)),
        Arc::new(HtmlSiteBuilder::new()),
        Arc::new(MarkdownDocsBuilder::new()),
        Arc::new(PdfCli::new()),
        Arc::new(ToonEncoder),
    );
    let summary = docs
        .execute(&project, &systems, &graph, &request, &reporter, &shutdown_token())
        .await?;

    if summary.failed > 0 {
        tracing::warn!(failed = summary.failed, "some diagrams failed to render");
    }
    Ok(0)
}
