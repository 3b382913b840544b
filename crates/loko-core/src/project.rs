//! The project root entity

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProjectConfig;
use crate::error::{ValidationError, ValidationErrors};
use crate::ident;
use crate::system::System;

/// A loko project: configuration plus the set of loaded systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub description: String,
    pub version: String,
    pub systems: BTreeMap<String, System>,
    pub config: ProjectConfig,
    pub root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Result<Self, ValidationErrors> {
        let name = name.into();
        ident::validate_name(&name).map_err(|e| e.for_entity("project"))?;
        let now = Utc::now();
        Ok(Project {
            name,
            description: description.into(),
            version: "0.1.0".to_string(),
            systems: BTreeMap::new(),
            config: ProjectConfig::default(),
            root: root.into(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn add_system(&mut self, system: System) {
        self.systems.insert(system.id.clone(), system);
        self.updated_at = Utc::now();
    }

    pub fn system(&self, id: &str) -> Option<&System> {
        self.systems.get(id)
    }

    /// Source directory resolved against the project root.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.source)
    }

    /// Output directory resolved against the project root.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.output)
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Err(e) = ident::validate_name(&self.name) {
            errors.push(e.for_entity("project"));
        }
        for (id, system) in &self.systems {
            if *id != system.id {
                errors.push(ValidationError::new(
                    "project",
                    "systems",
                    id,
                    "system map key does not match system id",
                ));
            }
            errors.extend(system.validate());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_resolve_against_root() {
        let project = Project::new("demo", "", "/tmp/demo").unwrap();
        assert_eq!(project.source_dir(), PathBuf::from("/tmp/demo/./src"));
        assert_eq!(project.output_dir(), PathBuf::from("/tmp/demo/./dist"));
    }

    #[test]
    fn add_system_keys_by_id() {
        let mut project = Project::new("demo", "", ".").unwrap();
        project.add_system(System::new("Payment Service", "").unwrap());
        assert!(project.system("payment-service").is_some());
        assert!(project.validate().is_empty());
    }

    #[test]
    fn mismatched_map_key_is_invalid() {
        let mut project = Project::new("demo", "", ".").unwrap();
        let system = System::new("Payment", "").unwrap();
        project.systems.insert("wrong-key".to_string(), system);
        assert!(!project.validate().is_empty());
    }
}
