//! YAML frontmatter parsing and serialization for entity Markdown files
//!
//! Frontmatter is the authoritative metadata; the Markdown body below it is
//! carried verbatim and never interpreted.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use loko_core::{Component, Container, System};

/// Split a Markdown file into its YAML frontmatter and body.
pub fn split(text: &str) -> Result<(&str, &str)> {
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
        .context("file does not start with a frontmatter block")?;
    let Some(end) = rest.find("\n---") else {
        bail!("frontmatter block is not terminated");
    };
    let yaml = &rest[..end + 1];
    // Leading blank lines after the closing fence are separator, not body.
    let body = rest[end + 4..].trim_start_matches(|c| c == '\n' || c == '\r');
    Ok((yaml, body))
}

/// Assemble a Markdown file from frontmatter YAML and body.
pub fn join(yaml: &str, body: &str) -> String {
    let mut out = String::with_capacity(yaml.len() + body.len() + 16);
    out.push_str("---\n");
    out.push_str(yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n\n");
    out.push_str(body);
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemFrontmatter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responsibilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_users: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_systems: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

impl SystemFrontmatter {
    pub fn from_entity(system: &System) -> Self {
        SystemFrontmatter {
            id: system.id.clone(),
            name: system.name.clone(),
            description: system.description.clone(),
            tags: system.tags.clone(),
            responsibilities: system.responsibilities.clone(),
            dependencies: system.dependencies.clone(),
            language: system.language.clone(),
            framework: system.framework.clone(),
            database: system.database.clone(),
            key_users: system.key_users.clone(),
            external_systems: system.external_systems.clone(),
            external: system.external,
        }
    }

    pub fn into_entity(self, body: String) -> System {
        System {
            id: self.id,
            name: self.name,
            description: self.description,
            tags: self.tags,
            responsibilities: self.responsibilities,
            dependencies: self.dependencies,
            language: self.language,
            framework: self.framework,
            database: self.database,
            key_users: self.key_users,
            external_systems: self.external_systems,
            external: self.external,
            body,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerFrontmatter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technology: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ContainerFrontmatter {
    pub fn from_entity(container: &Container) -> Self {
        ContainerFrontmatter {
            id: container.id.clone(),
            name: container.name.clone(),
            description: container.description.clone(),
            technology: container.technology.clone(),
            tags: container.tags.clone(),
        }
    }

    pub fn into_entity(self, body: String) -> Container {
        Container {
            id: self.id,
            name: self.name,
            description: self.description,
            technology: self.technology,
            tags: self.tags,
            body,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentFrontmatter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technology: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// On disk: relationship kind -> list of target qualified IDs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub code_annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl ComponentFrontmatter {
    pub fn from_entity(component: &Component) -> Self {
        // Invert target -> kind into kind -> [targets].
        let mut relationships: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (target, kind) in &component.relationships {
            relationships.entry(kind.clone()).or_default().push(target.clone());
        }
        ComponentFrontmatter {
            id: component.id.clone(),
            name: component.name.clone(),
            description: component.description.clone(),
            technology: component.technology.clone(),
            tags: component.tags.clone(),
            relationships,
            code_annotations: component.code_annotations.clone(),
            dependencies: component.dependencies.clone(),
        }
    }

    pub fn into_entity(self, body: String) -> Component {
        let mut relationships = BTreeMap::new();
        for (kind, targets) in self.relationships {
            for target in targets {
                relationships.insert(target, kind.clone());
            }
        }
        Component {
            id: self.id,
            name: self.name,
            description: self.description,
            technology: self.technology,
            tags: self.tags,
            relationships,
            code_annotations: self.code_annotations,
            dependencies: self.dependencies,
            body,
            ..Default::default()
        }
    }
}

/// Parse a full entity Markdown file into typed frontmatter plus body.
pub fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<(T, String)> {
    let (yaml, body) = split(text)?;
    let front = serde_yaml::from_str(yaml).context("invalid frontmatter")?;
    Ok((front, body.to_string()))
}

/// Serialize typed frontmatter plus body back into file text.
pub fn render<T: Serialize>(front: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(front)?;
    Ok(join(&yaml, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPONENT_FILE: &str = r#"---
id: email-queue
name: Email Queue
description: Buffers outbound notifications
technology: Amazon SQS
tags: [messaging]
relationships:
  triggered_by: [notification-service/api-layer/notification-api]
  publishes_to: [notification-service/data-store/delivery-status-table]
---

# Email Queue

Free-form documentation that is **never parsed**.
"#;

    #[test]
    fn split_separates_yaml_and_body() {
        let (yaml, body) = split(COMPONENT_FILE).unwrap();
        assert!(yaml.contains("id: email-queue"));
        assert!(body.starts_with("# Email Queue"));
    }

    #[test]
    fn split_rejects_missing_frontmatter() {
        assert!(split("# Just markdown\n").is_err());
        assert!(split("---\nid: x\n").is_err());
    }

    #[test]
    fn component_relationships_invert_on_load() {
        let (front, body) = parse::<ComponentFrontmatter>(COMPONENT_FILE).unwrap();
        let component = front.into_entity(body);
        assert_eq!(component.id, "email-queue");
        assert_eq!(
            component
                .relationships
                .get("notification-service/api-layer/notification-api")
                .map(|s| s.as_str()),
            Some("triggered_by")
        );
        assert_eq!(component.relationships.len(), 2);
        assert!(component.body.contains("never parsed"));
    }

    #[test]
    fn component_round_trips_through_frontmatter() {
        let (front, body) = parse::<ComponentFrontmatter>(COMPONENT_FILE).unwrap();
        let component = front.into_entity(body);

        let rendered = render(&ComponentFrontmatter::from_entity(&component), &component.body).unwrap();
        let (front2, body2) = parse::<ComponentFrontmatter>(&rendered).unwrap();
        let reloaded = front2.into_entity(body2);

        assert_eq!(component.id, reloaded.id);
        assert_eq!(component.name, reloaded.name);
        assert_eq!(component.description, reloaded.description);
        assert_eq!(component.technology, reloaded.technology);
        assert_eq!(component.tags, reloaded.tags);
        assert_eq!(component.relationships, reloaded.relationships);
        assert_eq!(component.body, reloaded.body);
    }

    #[test]
    fn system_frontmatter_round_trip() {
        let mut system = System::new("Notification Service", "Sends emails").unwrap();
        system.tags = vec!["core".to_string()];
        system.language = Some("Go".to_string());
        system.body = "# Notes\n".to_string();

        let rendered = render(&SystemFrontmatter::from_entity(&system), &system.body).unwrap();
        let (front, body) = parse::<SystemFrontmatter>(&rendered).unwrap();
        let reloaded = front.into_entity(body);
        assert_eq!(reloaded.id, system.id);
        assert_eq!(reloaded.name, system.name);
        assert_eq!(reloaded.language, system.language);
        assert_eq!(reloaded.body, system.body);
    }

    #[test]
    fn empty_collections_are_omitted_when_rendering() {
        let container = Container::new("API", "Edge").unwrap();
        let rendered = render(&ContainerFrontmatter::from_entity(&container), "").unwrap();
        assert!(!rendered.contains("tags:"));
        assert!(rendered.contains("id: api"));
    }
}
