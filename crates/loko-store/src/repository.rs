//! Filesystem implementation of the `ProjectRepository` port
//!
//! One directory per entity, named by ID. Writes create or overwrite the
//! files loko owns (`*.md` metadata, missing default diagrams) and never
//! delete anything the user may have edited.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loko_core::{
    generate_relationship_id, Component, Container, Diagram, Project, ProjectRepository,
    Relationship, System,
};

use crate::config::{self, ConfigEnv};
use crate::frontmatter::{
    self, ComponentFrontmatter, ContainerFrontmatter, SystemFrontmatter,
};

const SYSTEM_FILE: &str = "system.md";
const CONTAINER_FILE: &str = "container.md";
const COMPONENT_FILE: &str = "component.md";
const RELATIONSHIPS_FILE: &str = "relationships.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RelationshipsFile {
    #[serde(default)]
    relationships: Vec<Relationship>,
}

/// Filesystem-backed repository.
#[derive(Debug, Clone, Default)]
pub struct FsProjectRepository {
    env: ConfigEnv,
}

impl FsProjectRepository {
    pub fn new() -> Self {
        FsProjectRepository { env: ConfigEnv::from_process() }
    }

    /// Use a fixed environment snapshot (tests).
    pub fn with_env(env: ConfigEnv) -> Self {
        FsProjectRepository { env }
    }

    fn source_dir(&self, root: &Path, project: &Project) -> PathBuf {
        root.join(&project.config.paths.source)
    }

    async fn load_container_dir(&self, dir: &Path) -> Result<Option<Container>> {
        let file = dir.join(CONTAINER_FILE);
        if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
            return Ok(None);
        }
        let text = tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        let (front, body) = frontmatter::parse::<ContainerFrontmatter>(&text)
            .with_context(|| format!("parsing {}", file.display()))?;
        let mut container = front.into_entity(body);
        container.path = dir.to_path_buf();
        container.diagram = self.load_diagram(dir, &container.id).await?;

        for sub in sorted_subdirs(dir).await? {
            if let Some(component) = self.load_component_dir(&sub).await? {
                container.add_component(component);
            }
        }
        Ok(Some(container))
    }

    async fn load_component_dir(&self, dir: &Path) -> Result<Option<Component>> {
        let file = dir.join(COMPONENT_FILE);
        if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
            return Ok(None);
        }
        let text = tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;
        let (front, body) = frontmatter::parse::<ComponentFrontmatter>(&text)
            .with_context(|| format!("parsing {}", file.display()))?;
        let mut component = front.into_entity(body);
        component.path = dir.to_path_buf();
        component.diagram = self.load_diagram(dir, &component.id).await?;
        Ok(Some(component))
    }

    async fn load_diagram(&self, dir: &Path, id: &str) -> Result<Option<Diagram>> {
        let path = dir.join(format!("{id}.d2"));
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let source = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(Diagram::new(path, source)))
    }

    /// Write an entity Markdown file, and the default diagram if absent.
    async fn write_entity_files<T: Serialize>(
        &self,
        dir: &Path,
        file_name: &str,
        front: &T,
        body: &str,
        diagram: Option<&Diagram>,
    ) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        let mut written = Vec::new();

        let md_path = dir.join(file_name);
        let text = frontmatter::render(front, body)?;
        tokio::fs::write(&md_path, text)
            .await
            .with_context(|| format!("writing {}", md_path.display()))?;
        written.push(md_path);

        if let Some(diagram) = diagram {
            let d2_path = dir.join(format!("{}.d2", diagram.id));
            if !tokio::fs::try_exists(&d2_path).await.unwrap_or(false) {
                tokio::fs::write(&d2_path, &diagram.source)
                    .await
                    .with_context(|| format!("writing {}", d2_path.display()))?;
                written.push(d2_path);
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl ProjectRepository for FsProjectRepository {
    async fn load_project(&self, root: &Path) -> Result<Project> {
        let config = config::load_config(root, &self.env)?;
        let name = if config.project.name.is_empty() {
            root.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "project".to_string())
        } else {
            config.project.name.clone()
        };
        let config_path = root.join(config::PROJECT_FILE);
        Ok(Project {
            name,
            description: config.project.description.clone(),
            version: config.project.version.clone(),
            systems: Default::default(),
            config,
            root: root.to_path_buf(),
            created_at: file_time(&config_path, true).await,
            updated_at: file_time(&config_path, false).await,
        })
    }

    async fn list_systems(&self, root: &Path) -> Result<Vec<System>> {
        let project = self.load_project(root).await?;
        let source = self.source_dir(root, &project);
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut systems = Vec::new();
        for dir in sorted_subdirs(&source).await? {
            let file = dir.join(SYSTEM_FILE);
            if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
                continue;
            }
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let (front, body) = frontmatter::parse::<SystemFrontmatter>(&text)
                .with_context(|| format!("parsing {}", file.display()))?;
            let mut system = front.into_entity(body);
            system.path = dir.clone();
            system.diagram = self.load_diagram(&dir, &system.id).await?;

            for sub in sorted_subdirs(&dir).await? {
                if let Some(container) = self.load_container_dir(&sub).await? {
                    system.add_container(container);
                }
            }
            systems.push(system);
        }
        Ok(systems)
    }

    async fn load_relationships(&self, root: &Path) -> Result<Vec<Relationship>> {
        let path = root.join(RELATIONSHIPS_FILE);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let file: RelationshipsFile =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        let mut relationships = file.relationships;
        for rel in &mut relationships {
            if rel.id.is_empty() {
                rel.id = generate_relationship_id(&rel.source, &rel.target, &rel.label);
            }
        }
        Ok(relationships)
    }

    async fn save_project(&self, project: &Project) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&project.root)
            .await
            .with_context(|| format!("creating {}", project.root.display()))?;
        let mut config = project.config.clone();
        config.project.name = project.name.clone();
        config.project.description = project.description.clone();
        config.project.version = project.version.clone();

        let config_path = config::save_config(&project.root, &config)?;
        let source = project.root.join(&config.paths.source);
        tokio::fs::create_dir_all(&source)
            .await
            .with_context(|| format!("creating {}", source.display()))?;
        Ok(vec![config_path])
    }

    async fn save_system(&self, root: &Path, system: &System) -> Result<Vec<PathBuf>> {
        let project = self.load_project(root).await?;
        let dir = self.source_dir(root, &project).join(&system.id);
        let mut written = self
            .write_entity_files(
                &dir,
                SYSTEM_FILE,
                &SystemFrontmatter::from_entity(system),
                &system.body,
                system.diagram.as_ref(),
            )
            .await?;
        for container in system.containers.values() {
            written.extend(self.save_container(root, &system.id, container).await?);
        }
        Ok(written)
    }

    async fn save_container(
        &self,
        root: &Path,
        system_id: &str,
        container: &Container,
    ) -> Result<Vec<PathBuf>> {
        let project = self.load_project(root).await?;
        let dir = self.source_dir(root, &project).join(system_id).join(&container.id);
        let mut written = self
            .write_entity_files(
                &dir,
                CONTAINER_FILE,
                &ContainerFrontmatter::from_entity(container),
                &container.body,
                container.diagram.as_ref(),
            )
            .await?;
        for component in container.components.values() {
            written.extend(
                self.save_component(root, system_id, &container.id, component).await?,
            );
        }
        Ok(written)
    }

    async fn save_component(
        &self,
        root: &Path,
        system_id: &str,
        container_id: &str,
        component: &Component,
    ) -> Result<Vec<PathBuf>> {
        let project = self.load_project(root).await?;
        let dir = self
            .source_dir(root, &project)
            .join(system_id)
            .join(container_id)
            .join(&component.id);
        self.write_entity_files(
            &dir,
            COMPONENT_FILE,
            &ComponentFrontmatter::from_entity(component),
            &component.body,
            component.diagram.as_ref(),
        )
        .await
    }

    async fn write_diagram(&self, path: &Path, source: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(path, source)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }
}

/// Immediate subdirectories, sorted by name for deterministic loads.
async fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("listing {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(true);
        if path.is_dir() && !hidden {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

async fn file_time(path: &Path, created: bool) -> DateTime<Utc> {
    let meta = tokio::fs::metadata(path).await.ok();
    let time = meta.and_then(|m| if created { m.created().ok() } else { m.modified().ok() });
    time.map(DateTime::<Utc>::from).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loko_core::ProjectConfig;
    use tempfile::TempDir;

    fn test_repo() -> FsProjectRepository {
        FsProjectRepository::with_env(
            ConfigEnv::default().with_var("CONFIG_HOME", "/nonexistent/loko-tests"),
        )
    }

    async fn init_project(root: &Path, name: &str) {
        let mut project = Project::new(name, "", root).unwrap();
        project.config = ProjectConfig::default();
        test_repo().save_project(&project).await.unwrap();
    }

    fn sample_system() -> System {
        let mut component = Component::new("Auth Handler", "Validates tokens").unwrap();
        component.technology = "Go HTTP".to_string();
        component.add_relationship("payment/api/billing", "uses").unwrap();
        component.body = "# Auth Handler\n\nDocs.\n".to_string();

        let billing = Component::new("Billing", "Creates invoices").unwrap();

        let mut container = Container::new("API", "Public edge").unwrap();
        container.technology = "Go".to_string();
        container.add_component(component);
        container.add_component(billing);

        let mut system = System::new("Payment", "Billing domain").unwrap();
        system.tags = vec!["core".to_string()];
        system.language = Some("Go".to_string());
        system.diagram = Some(Diagram::new("payment.d2", "payment: Payment\n"));
        system.add_container(container);
        system
    }

    #[tokio::test]
    async fn empty_project_lists_no_systems() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "demo").await;
        let systems = test_repo().list_systems(tmp.path()).await.unwrap();
        assert!(systems.is_empty());
    }

    #[tokio::test]
    async fn save_then_list_round_trips_normative_fields() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "demo").await;
        let repo = test_repo();
        let system = sample_system();
        repo.save_system(tmp.path(), &system).await.unwrap();

        let systems = repo.list_systems(tmp.path()).await.unwrap();
        assert_eq!(systems.len(), 1);
        let loaded = &systems[0];
        assert_eq!(loaded.id, system.id);
        assert_eq!(loaded.name, system.name);
        assert_eq!(loaded.description, system.description);
        assert_eq!(loaded.tags, system.tags);
        assert_eq!(loaded.language, system.language);
        assert_eq!(loaded.containers.len(), 1);

        let container = loaded.container("api").unwrap();
        assert_eq!(container.technology, "Go");
        assert_eq!(container.parent_id, "payment");
        assert_eq!(container.components.len(), 2);

        let component = container.component("auth-handler").unwrap();
        assert_eq!(component.technology, "Go HTTP");
        assert_eq!(
            component.relationships.get("payment/api/billing").map(|s| s.as_str()),
            Some("uses")
        );
        assert!(component.body.contains("Docs."));
    }

    #[tokio::test]
    async fn expected_tree_layout_on_disk() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "demo").await;
        test_repo().save_system(tmp.path(), &sample_system()).await.unwrap();

        let src = tmp.path().join("./src");
        assert!(src.join("payment/system.md").exists());
        assert!(src.join("payment/payment.d2").exists());
        assert!(src.join("payment/api/container.md").exists());
        assert!(src.join("payment/api/auth-handler/component.md").exists());
    }

    #[tokio::test]
    async fn user_edited_diagram_is_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "demo").await;
        let repo = test_repo();
        let system = sample_system();
        repo.save_system(tmp.path(), &system).await.unwrap();

        let d2 = tmp.path().join("./src/payment/payment.d2");
        tokio::fs::write(&d2, "payment: Hand Edited\n").await.unwrap();
        repo.save_system(tmp.path(), &system).await.unwrap();
        let text = tokio::fs::read_to_string(&d2).await.unwrap();
        assert_eq!(text, "payment: Hand Edited\n");
    }

    #[tokio::test]
    async fn relationships_file_loads_with_derived_ids() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "demo").await;
        tokio::fs::write(
            tmp.path().join("relationships.toml"),
            r#"
[[relationships]]
source = "a/b/c"
target = "a/b/d"
label = "uses"
type = "async"
"#,
        )
        .await
        .unwrap();

        let rels = test_repo().load_relationships(tmp.path()).await.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].id.len(), 8);
        assert_eq!(rels[0].id, generate_relationship_id("a/b/c", "a/b/d", "uses"));
    }

    #[tokio::test]
    async fn missing_relationships_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "demo").await;
        let rels = test_repo().load_relationships(tmp.path()).await.unwrap();
        assert!(rels.is_empty());
    }

    #[tokio::test]
    async fn project_metadata_comes_from_config() {
        let tmp = TempDir::new().unwrap();
        init_project(tmp.path(), "Demo Docs").await;
        let project = test_repo().load_project(tmp.path()).await.unwrap();
        assert_eq!(project.name, "Demo Docs");
        assert!(project.systems.is_empty());
        assert_eq!(project.config.paths.source, "./src");
    }
}
