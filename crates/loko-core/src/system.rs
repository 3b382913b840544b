//! C4 level 1: software systems

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::diagram::Diagram;
use crate::error::{ValidationError, ValidationErrors};
use crate::ident;

/// A software system (C4 level 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct System {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub responsibilities: Vec<String>,
    pub dependencies: Vec<String>,
    pub language: Option<String>,
    pub framework: Option<String>,
    pub database: Option<String>,
    pub key_users: Vec<String>,
    pub external_systems: Vec<String>,
    pub containers: BTreeMap<String, Container>,
    pub diagram: Option<Diagram>,
    pub diagram_output: Option<PathBuf>,
    pub path: PathBuf,
    /// True for systems outside the project boundary.
    pub external: bool,
    /// Free-form Markdown documentation body; never parsed.
    #[serde(default)]
    pub body: String,
}

impl System {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self, ValidationErrors> {
        let name = name.into();
        ident::validate_name(&name).map_err(|e| e.for_entity("system"))?;
        Ok(System {
            id: ident::normalize_name(&name),
            name,
            description: description.into(),
            ..Default::default()
        })
    }

    /// Insert a container, stamping its parent ID with this system's ID.
    pub fn add_container(&mut self, mut container: Container) {
        container.parent_id = self.id.clone();
        self.containers.insert(container.id.clone(), container);
    }

    pub fn container(&self, id: &str) -> Option<&Container> {
        self.containers.get(id)
    }

    pub fn container_mut(&mut self, id: &str) -> Option<&mut Container> {
        self.containers.get_mut(id)
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Err(e) = ident::validate_name(&self.name) {
            errors.push(e.for_entity("system"));
        }
        if let Err(e) = ident::validate_id(&self.id) {
            errors.push(e.for_entity("system"));
        }
        if self.id != ident::normalize_name(&self.name) {
            errors.push(ValidationError::new(
                "system",
                "id",
                &self.id,
                "id does not match the normalized name",
            ));
        }
        for container in self.containers.values() {
            if container.parent_id != self.id {
                errors.push(ValidationError::new(
                    "container",
                    "parent_id",
                    &container.parent_id,
                    "container parent does not match its system",
                ));
            }
            errors.extend(container.validate());
        }
        errors
    }
}
