//! `loko export {html|markdown|pdf}`

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::ExportFormat;

use super::build::{self, BuildArgs};

pub async fn run(root: &Path, format: ExportFormat, output: Option<PathBuf>) -> Result<i32> {
    let format = match format {
        ExportFormat::Html => "html",
        ExportFormat::Markdown => "markdown",
        ExportFormat::Pdf => "pdf",
    };
    build::run(
        root,
        BuildArgs {
            clean: false,
            output,
            format: Some(format.to_string()),
            d2_theme: None,
            d2_layout: None,
        },
    )
    .await
}
