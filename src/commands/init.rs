//! `loko init <name>`

use std::path::Path;

use anyhow::{bail, Result};
use colored::Colorize;

use loko_core::{Project, ProjectRepository};
use loko_store::FsProjectRepository;

pub async fn run(root: &Path, name: &str) -> Result<i32> {
    let config_path = root.join("loko.toml");
    if config_path.exists() {
        bail!("{} already exists; refusing to overwrite an existing project", config_path.display());
    }

    let project = Project::new(name, "", root)?;
    let files = FsProjectRepository::new().save_project(&project).await?;

    println!("{} initialized project {}", "✓".green(), name.bold());
    for file in files {
        println!("  {}", file.display());
    }
    println!("\nNext: {}", "loko new system <name>".bold());
    Ok(0)
}
