//! Drift between diagram source and frontmatter metadata

use serde::{Deserialize, Serialize};

use crate::report::Severity;

/// What kind of divergence was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    DescriptionMismatch,
    MissingComponent,
    OrphanedRelationship,
}

impl DriftKind {
    /// Description mismatches are warnings; the reference kinds are errors.
    pub fn severity(&self) -> Severity {
        match self {
            DriftKind::DescriptionMismatch => Severity::Warning,
            DriftKind::MissingComponent | DriftKind::OrphanedRelationship => Severity::Error,
        }
    }
}

/// A single drift finding for a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftIssue {
    /// Qualified ID of the affected component.
    pub component: String,
    pub kind: DriftKind,
    pub severity: Severity,
    pub message: String,
    pub context: String,
}

impl DriftIssue {
    pub fn new(
        component: impl Into<String>,
        kind: DriftKind,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        DriftIssue {
            component: component.into(),
            kind,
            severity: kind.severity(),
            message: message.into(),
            context: context.into(),
        }
    }
}
