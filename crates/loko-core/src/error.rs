//! Typed error kinds for entities and the graph

use thiserror::Error;

use crate::ident::truncate_value;

/// A single validation failure on an entity field.
#[derive(Debug, Error)]
#[error("{entity}.{field}: {message} (value: {value:?})")]
pub struct ValidationError {
    /// Entity kind, e.g. "system" or "component".
    pub entity: String,
    pub field: String,
    /// Offending value, truncated for display.
    pub value: String,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ValidationError {
    pub fn new(entity: &str, field: &str, value: &str, message: &str) -> Self {
        ValidationError {
            entity: entity.to_string(),
            field: field.to_string(),
            value: truncate_value(value),
            message: message.to_string(),
            cause: None,
        }
    }

    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Re-attribute the error to a specific entity kind.
    pub fn for_entity(mut self, entity: &str) -> Self {
        self.entity = entity.to_string();
        self
    }
}

/// Accumulates validation errors across an entity tree.
#[derive(Debug, Default)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors(Vec::new())
    }

    pub fn push(&mut self, err: ValidationError) {
        self.0.push(err);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Ok when no errors were collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        ValidationErrors(vec![err])
    }
}

/// Errors raised by architecture graph mutations and integrity checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("duplicate node: {0}")]
    DuplicateNode(String),
    #[error("edge endpoint does not exist: {0}")]
    MissingEndpoint(String),
    #[error("node {child} references missing parent {parent}")]
    MissingParent { child: String, parent: String },
    #[error("node {child} has parent {parent} of the wrong level")]
    WrongParentLevel { child: String, parent: String },
}

/// Errors raised while scaffolding a new entity.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("parent not found: {0}")]
    ParentNotFound(String),
    #[error("{kind} {id:?} already exists under {parent:?}")]
    Duplicate { kind: String, id: String, parent: String },
    #[error("invalid parent path: expected {expected}")]
    InvalidParent { expected: String },
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("template error: {0}")]
    Template(String),
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_collects_and_formats() {
        let mut errs = ValidationErrors::new();
        assert!(errs.is_empty());
        errs.push(ValidationError::new("system", "name", "", "name must not be empty"));
        errs.push(ValidationError::new("container", "id", "X", "bad id"));
        assert_eq!(errs.len(), 2);
        let text = errs.to_string();
        assert!(text.contains("system.name"));
        assert!(text.contains("container.id"));
        assert!(errs.into_result().is_err());
    }

    #[test]
    fn empty_accumulator_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
