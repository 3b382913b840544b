//! Scaffolding new systems, containers and components

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::component::Component;
use crate::container::Container;
use crate::diagram::Diagram;
use crate::error::ScaffoldError;
use crate::graph::NodeKind;
use crate::ports::{ProjectRepository, TemplateEngine};
use crate::system::System;

/// One row of the content template selection table.
pub struct TemplatePattern {
    pub name: &'static str,
    pub priority: u8,
    pub patterns: &'static [&'static str],
}

/// Ordered, priority-ranked substring patterns for choosing a component
/// content template from its free-form technology string. Extend by adding
/// rows, not by changing the selection code.
pub const CONTENT_TEMPLATE_PATTERNS: &[TemplatePattern] = &[
    TemplatePattern {
        name: "compute",
        priority: 70,
        patterns: &["lambda", "function", "serverless", "fargate", "ecs task", "ec2", "container", "docker"],
    },
    TemplatePattern {
        name: "datastore",
        priority: 65,
        patterns: &["dynamodb", "database", "db", "sql", "nosql", "table", "rds", "aurora"],
    },
    TemplatePattern {
        name: "messaging",
        priority: 60,
        patterns: &["sqs", "sns", "queue", "pubsub", "kafka", "rabbitmq"],
    },
    TemplatePattern {
        name: "api",
        priority: 55,
        patterns: &["api gateway", "rest", "graphql", "endpoint"],
    },
    TemplatePattern {
        name: "event",
        priority: 50,
        patterns: &["eventbridge", "event", "trigger", "schedule", "step functions"],
    },
    TemplatePattern {
        name: "storage",
        priority: 45,
        patterns: &["s3", "bucket", "storage", "file", "efs"],
    },
];

/// Case-insensitive substring selection; the highest-priority match wins and
/// ties break by insertion order. Falls back to `generic`.
pub fn select_content_template(technology: &str) -> &'static str {
    let lower = technology.to_lowercase();
    let mut best: Option<&TemplatePattern> = None;
    for row in CONTENT_TEMPLATE_PATTERNS {
        if row.patterns.iter().any(|p| lower.contains(p)) {
            match best {
                Some(current) if current.priority >= row.priority => {}
                _ => best = Some(row),
            }
        }
    }
    best.map(|row| row.name).unwrap_or("generic")
}

#[derive(Debug, Clone)]
pub struct ScaffoldRequest {
    pub root: PathBuf,
    pub kind: NodeKind,
    pub name: String,
    pub description: String,
    pub technology: String,
    /// Empty for a system, `[system]` for a container, `[system, container]`
    /// for a component.
    pub parent: Vec<String>,
    /// Scaffold template name; the project default applies when unset.
    pub template: Option<String>,
    /// Explicit content template, overriding selection entirely.
    pub content_template: Option<String>,
    /// Render without persisting.
    pub preview: bool,
}

#[derive(Debug, Clone)]
pub struct ScaffoldResult {
    pub id: String,
    pub files: Vec<PathBuf>,
    pub diagram: Option<PathBuf>,
    /// Rendered file contents when `preview` was requested.
    pub preview: Option<String>,
}

pub struct ScaffoldEntity {
    repo: Arc<dyn ProjectRepository>,
    engine: Option<Arc<dyn TemplateEngine>>,
}

impl ScaffoldEntity {
    pub fn new(repo: Arc<dyn ProjectRepository>) -> Self {
        ScaffoldEntity { repo, engine: None }
    }

    pub fn with_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub async fn execute(&self, req: &ScaffoldRequest) -> Result<ScaffoldResult, ScaffoldError> {
        match req.kind {
            NodeKind::System => self.scaffold_system(req).await,
            NodeKind::Container => self.scaffold_container(req).await,
            NodeKind::Component => self.scaffold_component(req).await,
        }
    }

    async fn scaffold_system(&self, req: &ScaffoldRequest) -> Result<ScaffoldResult, ScaffoldError> {
        if !req.parent.is_empty() {
            return Err(ScaffoldError::InvalidParent { expected: "no parent for a system".to_string() });
        }
        let project = self.repo.load_project(&req.root).await?;
        let systems = self.repo.list_systems(&req.root).await?;

        let mut system = System::new(req.name.clone(), req.description.clone())?;
        if systems.iter().any(|s| s.id == system.id) {
            return Err(ScaffoldError::Duplicate {
                kind: "system".to_string(),
                id: system.id,
                parent: project.name,
            });
        }

        let context = json!({
            "id": system.id,
            "name": system.name,
            "description": system.description,
            "technology": req.technology,
        });
        system.body = self.render("system.md", &context, || builtin_system_body(&system));
        let d2_source = self.render("system.d2", &context, || builtin_entity_diagram(&system.id, &system.name));
        let d2_path = project.source_dir().join(&system.id).join(format!("{}.d2", system.id));
        system.diagram = Some(Diagram::new(&d2_path, d2_source));
        system.path = project.source_dir().join(&system.id);

        if req.preview {
            return Ok(preview_result(&system.id, &system.body, &system.diagram));
        }
        let files = self.repo.save_system(&req.root, &system).await?;
        Ok(ScaffoldResult { id: system.id, files, diagram: Some(d2_path), preview: None })
    }

    async fn scaffold_container(&self, req: &ScaffoldRequest) -> Result<ScaffoldResult, ScaffoldError> {
        let [system_id] = req.parent.as_slice() else {
            return Err(ScaffoldError::InvalidParent { expected: "[system-id]".to_string() });
        };
        let project = self.repo.load_project(&req.root).await?;
        let systems = self.repo.list_systems(&req.root).await?;
        let system = systems
            .iter()
            .find(|s| s.id == *system_id)
            .ok_or_else(|| ScaffoldError::ParentNotFound(system_id.clone()))?;

        let mut container =
            Container::new(req.name.clone(), req.description.clone())?.with_technology(&req.technology);
        if system.containers.contains_key(&container.id) {
            return Err(ScaffoldError::Duplicate {
                kind: "container".to_string(),
                id: container.id,
                parent: system.id.clone(),
            });
        }
        container.parent_id = system.id.clone();

        let context = json!({
            "id": container.id,
            "name": container.name,
            "description": container.description,
            "technology": container.technology,
            "system": system.id,
        });
        container.body = self.render("container.md", &context, || builtin_container_body(&container));
        let d2_source =
            self.render("container.d2", &context, || builtin_entity_diagram(&container.id, &container.name));
        let dir = project.source_dir().join(&system.id).join(&container.id);
        let d2_path = dir.join(format!("{}.d2", container.id));
        container.diagram = Some(Diagram::new(&d2_path, d2_source));
        container.path = dir;

        if req.preview {
            return Ok(preview_result(&container.id, &container.body, &container.diagram));
        }
        let files = self.repo.save_container(&req.root, &system.id, &container).await?;

        // The new container must appear in the system context diagram.
        let mut parent = system.clone();
        parent.add_container(container.clone());
        let parent_d2 = project.source_dir().join(&system.id).join(format!("{}.d2", system.id));
        self.repo
            .write_diagram(&parent_d2, &system_diagram_source(&parent))
            .await?;

        Ok(ScaffoldResult { id: container.id, files, diagram: Some(d2_path), preview: None })
    }

    async fn scaffold_component(&self, req: &ScaffoldRequest) -> Result<ScaffoldResult, ScaffoldError> {
        let [system_id, container_id] = req.parent.as_slice() else {
            return Err(ScaffoldError::InvalidParent { expected: "[system-id, container-id]".to_string() });
        };
        let project = self.repo.load_project(&req.root).await?;
        let systems = self.repo.list_systems(&req.root).await?;
        let system = systems
            .iter()
            .find(|s| s.id == *system_id)
            .ok_or_else(|| ScaffoldError::ParentNotFound(system_id.clone()))?;
        let container = system
            .containers
            .get(container_id)
            .ok_or_else(|| ScaffoldError::ParentNotFound(format!("{system_id}/{container_id}")))?;

        let mut component =
            Component::new(req.name.clone(), req.description.clone())?.with_technology(&req.technology);
        if container.components.contains_key(&component.id) {
            return Err(ScaffoldError::Duplicate {
                kind: "component".to_string(),
                id: component.id,
                parent: format!("{system_id}/{container_id}"),
            });
        }

        let content = req
            .content_template
            .clone()
            .unwrap_or_else(|| select_content_template(&component.technology).to_string());
        let context = json!({
            "id": component.id,
            "name": component.name,
            "description": component.description,
            "technology": component.technology,
            "system": system.id,
            "container": container.id,
            "content_template": content,
        });
        component.body = self.render(
            &format!("component-{content}.md"),
            &context,
            || builtin_component_body(&component),
        );
        let d2_source =
            self.render("component.d2", &context, || builtin_entity_diagram(&component.id, &component.name));
        let dir = project
            .source_dir()
            .join(&system.id)
            .join(&container.id)
            .join(&component.id);
        let d2_path = dir.join(format!("{}.d2", component.id));
        component.diagram = Some(Diagram::new(&d2_path, d2_source));
        component.path = dir;

        if req.preview {
            return Ok(preview_result(&component.id, &component.body, &component.diagram));
        }
        let files = self
            .repo
            .save_component(&req.root, &system.id, &container.id, &component)
            .await?;

        // The new component must appear in the containing container diagram.
        let mut parent = container.clone();
        parent.add_component(component.clone());
        let parent_d2 = project
            .source_dir()
            .join(&system.id)
            .join(&container.id)
            .join(format!("{}.d2", container.id));
        self.repo
            .write_diagram(&parent_d2, &container_diagram_source(&parent))
            .await?;

        Ok(ScaffoldResult { id: component.id, files, diagram: Some(d2_path), preview: None })
    }

    /// Render through the attached engine when it knows the template,
    /// otherwise fall back to the built-in skeleton.
    fn render(
        &self,
        template: &str,
        context: &serde_json::Value,
        fallback: impl FnOnce() -> String,
    ) -> String {
        if let Some(engine) = &self.engine {
            if engine.has_template(template) {
                match engine.render(template, context) {
                    Ok(rendered) => return rendered,
                    Err(err) => {
                        tracing::warn!(template, error = %err, "template render failed, using builtin");
                    }
                }
            }
        }
        fallback()
    }
}

fn preview_result(id: &str, body: &str, diagram: &Option<Diagram>) -> ScaffoldResult {
    let mut preview = body.to_string();
    if let Some(diagram) = diagram {
        preview.push_str("\n---\n");
        preview.push_str(&diagram.source);
    }
    ScaffoldResult { id: id.to_string(), files: Vec::new(), diagram: None, preview: Some(preview) }
}

fn builtin_system_body(system: &System) -> String {
    format!(
        "# {name}\n\n{description}\n\n## Responsibilities\n\n- TBD\n\n## Containers\n\n## Notes\n",
        name = system.name,
        description = system.description,
    )
}

fn builtin_container_body(container: &Container) -> String {
    format!(
        "# {name}\n\n{description}\n\n## Components\n\n## Notes\n",
        name = container.name,
        description = container.description,
    )
}

fn builtin_component_body(component: &Component) -> String {
    format!(
        "# {name}\n\n{description}\n\n## Interface\n\n## Notes\n",
        name = component.name,
        description = component.description,
    )
}

/// Minimal single-node diagram for a freshly scaffolded entity.
fn builtin_entity_diagram(id: &str, name: &str) -> String {
    format!("{id}: {{\n  label: \"{name}\"\n}}\n")
}

/// Regenerated system context diagram listing every container.
pub fn system_diagram_source(system: &System) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}: {{\n  label: \"{}\"\n", system.id, system.name));
    for container in system.containers.values() {
        out.push_str(&format!("  {}: \"{}\"\n", container.id, container.name));
    }
    out.push_str("}\n");
    out
}

/// Regenerated container diagram listing every component.
pub fn container_diagram_source(container: &Container) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}: {{\n  label: \"{}\"\n", container.id, container.name));
    for component in container.components.values() {
        out.push_str(&format!("  {}: \"{}\"\n", component.id, component.name));
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_documented_patterns() {
        assert_eq!(select_content_template("AWS Lambda"), "compute");
        assert_eq!(select_content_template("Docker container"), "compute");
        assert_eq!(select_content_template("DynamoDB table"), "datastore");
        assert_eq!(select_content_template("PostgreSQL database"), "datastore");
        assert_eq!(select_content_template("Amazon SQS"), "messaging");
        assert_eq!(select_content_template("REST endpoint"), "api");
        assert_eq!(select_content_template("EventBridge schedule"), "event");
        assert_eq!(select_content_template("S3 bucket"), "storage");
        assert_eq!(select_content_template("Go HTTP"), "generic");
        assert_eq!(select_content_template(""), "generic");
    }

    #[test]
    fn selector_is_case_insensitive() {
        assert_eq!(select_content_template("dynamodb TABLE"), "datastore");
        assert_eq!(select_content_template("KAFKA"), "messaging");
    }

    #[test]
    fn higher_priority_wins_on_multiple_matches() {
        // "lambda" (compute) and "db" (datastore) both match; compute ranks higher.
        assert_eq!(select_content_template("lambda writing to db"), "compute");
        // "event" and "queue" both match; messaging outranks event.
        assert_eq!(select_content_template("queue event consumer"), "messaging");
    }

    #[test]
    fn regenerated_container_diagram_lists_components() {
        let mut container = Container::new("API", "").unwrap();
        container.add_component(Component::new("Auth Handler", "").unwrap());
        container.add_component(Component::new("Billing", "").unwrap());
        let source = container_diagram_source(&container);
        assert!(source.contains("auth-handler"));
        assert!(source.contains("billing"));
        assert!(source.starts_with("api:"));
    }
}
