//! C4 level 3: components

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::diagram::Diagram;
use crate::error::{ValidationError, ValidationErrors};
use crate::ident;

/// A component inside a container (C4 level 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub description: String,
    pub technology: String,
    pub tags: Vec<String>,
    /// Target qualified ID -> relationship type label ("uses", "triggered_by", ...).
    pub relationships: BTreeMap<String, String>,
    /// Code path -> description.
    pub code_annotations: BTreeMap<String, String>,
    /// External package dependencies.
    pub dependencies: Vec<String>,
    pub diagram: Option<Diagram>,
    pub diagram_output: Option<PathBuf>,
    pub path: PathBuf,
    /// Free-form Markdown documentation body; never parsed.
    #[serde(default)]
    pub body: String,
}

impl Component {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self, ValidationErrors> {
        let name = name.into();
        ident::validate_name(&name).map_err(|e| e.for_entity("component"))?;
        Ok(Component {
            id: ident::normalize_name(&name),
            name,
            description: description.into(),
            ..Default::default()
        })
    }

    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = technology.into();
        self
    }

    /// Declare a relationship to another element by qualified ID.
    pub fn add_relationship(
        &mut self,
        target: impl Into<String>,
        kind: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let target = target.into();
        ident::validate_path(&target).map_err(|e| e.for_entity("component"))?;
        let kind = kind.into();
        let kind = if kind.is_empty() { "uses".to_string() } else { kind };
        self.relationships.insert(target, kind);
        Ok(())
    }

    pub fn annotate_code(&mut self, code_path: impl Into<String>, description: impl Into<String>) {
        self.code_annotations.insert(code_path.into(), description.into());
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Err(e) = ident::validate_name(&self.name) {
            errors.push(e.for_entity("component"));
        }
        if let Err(e) = ident::validate_id(&self.id) {
            errors.push(e.for_entity("component"));
        }
        if self.id != ident::normalize_name(&self.name) {
            errors.push(ValidationError::new(
                "component",
                "id",
                &self.id,
                "id does not match the normalized name",
            ));
        }
        for target in self.relationships.keys() {
            if let Err(e) = ident::validate_path(target) {
                errors.push(e.for_entity("component"));
            }
        }
        errors
    }
}
