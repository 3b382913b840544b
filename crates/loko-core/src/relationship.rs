//! Persisted relationships and D2-derived relationships

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ValidationError, ValidationErrors};
use crate::ident;

/// Interaction style of a persisted relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    #[default]
    Sync,
    Async,
    Event,
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationType::Sync => write!(f, "sync"),
            RelationType::Async => write!(f, "async"),
            RelationType::Event => write!(f, "event"),
        }
    }
}

impl std::str::FromStr for RelationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(RelationType::Sync),
            "async" => Ok(RelationType::Async),
            "event" => Ok(RelationType::Event),
            other => Err(ValidationError::new(
                "relationship",
                "type",
                other,
                "type must be one of sync, async, event",
            )),
        }
    }
}

/// Direction of a persisted relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Bidirectional,
}

/// Deterministic relationship ID: first 8 hex chars of the SHA-256 digest
/// of `"source|target|label"`.
pub fn generate_relationship_id(source: &str, target: &str, label: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", source, target, label).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

/// A relationship persisted in `relationships.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Derived from the triple when omitted on disk.
    #[serde(default)]
    pub id: String,
    /// Qualified ID of the source element.
    pub source: String,
    /// Qualified ID of the target element.
    pub target: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub rel_type: RelationType,
    #[serde(default)]
    pub technology: String,
    #[serde(default)]
    pub direction: Direction,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
        rel_type: RelationType,
    ) -> Result<Self, ValidationErrors> {
        let source = source.into();
        let target = target.into();
        let label = label.into();

        let mut errors = ValidationErrors::new();
        if source.is_empty() {
            errors.push(ValidationError::new("relationship", "source", &source, "source must not be empty"));
        } else if let Err(e) = ident::validate_path(&source) {
            errors.push(e.for_entity("relationship"));
        }
        if target.is_empty() {
            errors.push(ValidationError::new("relationship", "target", &target, "target must not be empty"));
        } else if let Err(e) = ident::validate_path(&target) {
            errors.push(e.for_entity("relationship"));
        }
        if label.is_empty() {
            errors.push(ValidationError::new("relationship", "label", &label, "label must not be empty"));
        }
        if !source.is_empty() && source == target {
            errors.push(ValidationError::new(
                "relationship",
                "target",
                &target,
                "relationship must not reference itself",
            ));
        }
        errors.into_result()?;

        Ok(Relationship {
            id: generate_relationship_id(&source, &target, &label),
            source,
            target,
            label,
            rel_type,
            technology: String::new(),
            direction: Direction::Forward,
        })
    }

    pub fn with_technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = technology.into();
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// A relationship derived from a D2 arrow; label may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct D2Relationship {
    pub source: String,
    pub target: String,
    pub label: String,
}

impl D2Relationship {
    pub fn new(source: impl Into<String>, target: impl Into<String>, label: impl Into<String>) -> Self {
        D2Relationship { source: source.into(), target: target.into(), label: label.into() }
    }

    /// Stable dedup key.
    pub fn key(&self) -> String {
        format!("{}->{}:{}", self.source, self.target, self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic_8_hex() {
        let a = generate_relationship_id("s/c/a", "s/c/b", "uses");
        let b = generate_relationship_id("s/c/a", "s/c/b", "uses");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let c = generate_relationship_id("s/c/a", "s/c/b", "calls");
        assert_ne!(a, c);
    }

    #[test]
    fn identical_triples_collapse_to_one_id() {
        let r1 = Relationship::new("a/b/c", "a/b/d", "uses", RelationType::Sync).unwrap();
        let r2 = Relationship::new("a/b/c", "a/b/d", "uses", RelationType::Async).unwrap();
        assert_eq!(r1.id, r2.id);
    }

    #[test]
    fn self_reference_forbidden() {
        let err = Relationship::new("a/b/c", "a/b/c", "uses", RelationType::Sync);
        assert!(err.is_err());
    }

    #[test]
    fn empty_fields_forbidden() {
        assert!(Relationship::new("", "a/b", "uses", RelationType::Sync).is_err());
        assert!(Relationship::new("a/b", "", "uses", RelationType::Sync).is_err());
        assert!(Relationship::new("a/b", "a/c", "", RelationType::Sync).is_err());
    }

    #[test]
    fn d2_relationship_key() {
        let rel = D2Relationship::new("a", "b", "calls");
        assert_eq!(rel.key(), "a->b:calls");
        let unlabeled = D2Relationship::new("a", "b", "");
        assert_eq!(unlabeled.key(), "a->b:");
    }

    #[test]
    fn relation_type_parsing() {
        assert_eq!("sync".parse::<RelationType>().unwrap(), RelationType::Sync);
        assert_eq!("event".parse::<RelationType>().unwrap(), RelationType::Event);
        assert!("rpc".parse::<RelationType>().is_err());
    }
}
