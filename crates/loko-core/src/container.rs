//! C4 level 2: containers

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::diagram::Diagram;
use crate::error::{ValidationError, ValidationErrors};
use crate::ident;

/// A deployable/runnable container inside a system (C4 level 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub description: String,
    pub technology: String,
    pub tags: Vec<String>,
    pub components: BTreeMap<String, Component>,
    pub diagram: Option<Diagram>,
    pub diagram_output: Option<PathBuf>,
    pub path: PathBuf,
    /// Owning system ID, stamped by `System::add_container`.
    pub parent_id: String,
    /// Free-form Markdown documentation body; never parsed.
    #[serde(default)]
    pub body: String,
}

impl Container {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self, ValidationErrors> {
        let name = name.into();
        ident::validate_name(&name).map_err(|e| e.for_entity("container"))?;
        Ok(Container {
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

    pub fn add_component(&mut self, component: Component) {
        self.components.insert(component.id.clone(), component);
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.get(id)
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Err(e) = ident::validate_name(&self.name) {
            errors.push(e.for_entity("container"));
        }
        if let Err(e) = ident::validate_id(&self.id) {
            errors.push(e.for_entity("container"));
        }
        if self.id != ident::normalize_name(&self.name) {
            errors.push(ValidationError::new(
                "container",
                "id",
                &self.id,
                "id does not match the normalized name",
            ));
        }
        for component in self.components.values() {
            errors.extend(component.validate());
        }
        errors
    }
}
