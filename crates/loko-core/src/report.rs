//! Validation and analysis report types

use serde::{Deserialize, Serialize};

/// Severity of a report issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single architecture validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    /// Stable machine-readable code, e.g. "unresolved_reference".
    pub code: String,
    pub title: String,
    pub description: String,
    /// Qualified IDs of the affected elements.
    pub affected: Vec<String>,
    pub suggestion: String,
}

impl Issue {
    pub fn new(severity: Severity, code: &str, title: impl Into<String>) -> Self {
        Issue {
            severity,
            code: code.to_string(),
            title: title.into(),
            description: String::new(),
            affected: Vec::new(),
            suggestion: String::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn affecting(mut self, id: impl Into<String>) -> Self {
        self.affected.push(id.into());
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }
}

/// Outcome of the architecture validation use case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchitectureReport {
    pub issues: Vec<Issue>,
    pub systems: usize,
    pub containers: usize,
    pub components: usize,
}

impl ArchitectureReport {
    /// Valid iff no error-severity issues remain.
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Warning).count()
    }

    /// Promote all warnings to errors (strict mode).
    pub fn promote_warnings(&mut self) {
        for issue in &mut self.issues {
            if issue.severity == Severity::Warning {
                issue.severity = Severity::Error;
            }
        }
    }
}

/// A node listed with its degree in the coupling report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoupledNode {
    pub id: String,
    pub degree: usize,
}

/// Outcome of the coupling analysis use case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyReport {
    pub systems: usize,
    pub containers: usize,
    pub components: usize,
    pub edges: usize,
    /// Nodes with no edges at all.
    pub isolated: Vec<String>,
    /// Nodes with outgoing degree above the coupling threshold.
    pub highly_coupled: Vec<CoupledNode>,
    /// Nodes with incoming degree above the coupling threshold.
    pub central: Vec<CoupledNode>,
}
