//! `loko new {system|container|component} <name>`

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use loko_core::usecase::{ScaffoldEntity, ScaffoldRequest};
use loko_core::{NodeKind, TemplateEngine};
use loko_store::{config::ConfigEnv, FsProjectRepository, TemplateSearchPaths, TeraTemplateEngine};

use crate::EntityKind;

pub struct NewArgs {
    pub kind: EntityKind,
    pub name: String,
    pub parent: Option<String>,
    pub description: Option<String>,
    pub technology: Option<String>,
    pub template: Option<String>,
    pub preview: bool,
}

pub async fn run(root: &Path, args: NewArgs) -> Result<i32> {
    let kind = match args.kind {
        EntityKind::System => NodeKind::System,
        EntityKind::Container => NodeKind::Container,
        EntityKind::Component => NodeKind::Component,
    };
    let parent: Vec<String> = args
        .parent
        .as_deref()
        .map(|p| p.split('/').map(|s| s.to_string()).collect())
        .unwrap_or_default();

    let env = ConfigEnv::from_process();
    let paths = TemplateSearchPaths::for_project(root, &env);
    let engine: Arc<dyn TemplateEngine> = Arc::new(TeraTemplateEngine::with_search_paths(&paths)?);
    let scaffold =
        ScaffoldEntity::new(Arc::new(FsProjectRepository::new())).with_engine(engine);

    let request = ScaffoldRequest {
        root: root.to_path_buf(),
        kind,
        name: args.name,
        description: args.description.unwrap_or_default(),
        technology: args.technology.unwrap_or_default(),
        parent,
        template: None,
        content_template: args.template,
        preview: args.preview,
    };
    let result = scaffold.execute(&request).await?;

    if let Some(preview) = result.preview {
        println!("{preview}");
        return Ok(0);
    }
    println!("{} created {} {}", "✓".green(), kind, result.id.bold());
    for file in &result.files {
        println!("  {}", file.display());
    }
    if let Some(diagram) = &result.diagram {
        println!("  {} (diagram)", diagram.display());
    }
    Ok(0)
}
