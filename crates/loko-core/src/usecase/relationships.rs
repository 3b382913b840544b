//! Relationship queries and coupling analysis

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::graph::{ArchitectureGraph, NodeKind};
use crate::ident;
use crate::report::{CoupledNode, DependencyReport};
use crate::usecase::search::{DEFAULT_LIMIT, MAX_LIMIT};

/// Outgoing degree (or incoming, for centrality) above which a node is
/// reported as coupled.
const COUPLING_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipFilter {
    /// Glob matched against the qualified source ID.
    pub source_pattern: Option<String>,
    /// Glob matched against the qualified target ID.
    pub target_pattern: Option<String>,
    /// Exact relationship type label.
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMatch {
    pub source: String,
    pub target: String,
    pub kind: String,
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipResult {
    pub matches: Vec<RelationshipMatch>,
    pub total_matched: usize,
}

pub struct FindRelationships;

impl FindRelationships {
    pub fn new() -> Self {
        FindRelationships
    }

    pub fn execute(&self, graph: &ArchitectureGraph, filter: &RelationshipFilter) -> Result<RelationshipResult> {
        if filter.source_pattern.is_none() && filter.target_pattern.is_none() {
            bail!("at least one of source or target pattern is required");
        }
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let mut matches = Vec::new();
        let mut total = 0usize;
        for source in graph.sorted_node_ids() {
            for edge in graph.outgoing_edges(&source) {
                if let Some(pattern) = &filter.source_pattern {
                    if !ident::glob_match(pattern, &edge.source) {
                        continue;
                    }
                }
                if let Some(pattern) = &filter.target_pattern {
                    if !ident::glob_match(pattern, &edge.target) {
                        continue;
                    }
                }
                if let Some(kind) = &filter.kind {
                    if &edge.kind != kind {
                        continue;
                    }
                }
                total += 1;
                if matches.len() < limit {
                    matches.push(RelationshipMatch {
                        source: edge.source.clone(),
                        target: edge.target.clone(),
                        kind: edge.kind.clone(),
                        bidirectional: edge.bidirectional,
                    });
                }
            }
        }
        Ok(RelationshipResult { matches, total_matched: total })
    }
}

impl Default for FindRelationships {
    fn default() -> Self {
        Self::new()
    }
}

/// Direct dependencies and dependents of one element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyResult {
    pub id: String,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

pub struct DependencyQuery;

impl DependencyQuery {
    pub fn new() -> Self {
        DependencyQuery
    }

    pub fn execute(&self, graph: &ArchitectureGraph, id: &str) -> Result<DependencyResult> {
        if !graph.contains(id) {
            bail!("element not found: {id}");
        }
        let mut dependencies: Vec<String> =
            graph.dependencies_of(id).into_iter().map(|n| n.id.clone()).collect();
        let mut dependents: Vec<String> =
            graph.dependents_of(id).into_iter().map(|n| n.id.clone()).collect();
        dependencies.sort();
        dependencies.dedup();
        dependents.sort();
        dependents.dedup();
        Ok(DependencyResult { id: id.to_string(), dependencies, dependents })
    }
}

impl Default for DependencyQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Neighbourhood plus the shortest path to an optional other element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedResult {
    pub id: String,
    pub related: Vec<String>,
    /// Present when a `to` element was given and reachable.
    pub path: Vec<String>,
}

pub struct QueryRelatedComponents;

impl QueryRelatedComponents {
    pub fn new() -> Self {
        QueryRelatedComponents
    }

    pub fn execute(&self, graph: &ArchitectureGraph, id: &str, to: Option<&str>) -> Result<RelatedResult> {
        if !graph.contains(id) {
            bail!("element not found: {id}");
        }
        let mut related: Vec<String> = graph
            .dependencies_of(id)
            .into_iter()
            .chain(graph.dependents_of(id))
            .map(|n| n.id.clone())
            .collect();
        related.sort();
        related.dedup();

        let path = match to {
            Some(target) => {
                if !graph.contains(target) {
                    bail!("element not found: {target}");
                }
                graph.path_between(id, target)
            }
            None => Vec::new(),
        };
        Ok(RelatedResult { id: id.to_string(), related, path })
    }
}

impl Default for QueryRelatedComponents {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AnalyzeCoupling;

impl AnalyzeCoupling {
    pub fn new() -> Self {
        AnalyzeCoupling
    }

    pub fn execute(&self, graph: &ArchitectureGraph) -> DependencyReport {
        let mut report = DependencyReport {
            systems: graph.nodes_by_kind(NodeKind::System).len(),
            containers: graph.nodes_by_kind(NodeKind::Container).len(),
            components: graph.nodes_by_kind(NodeKind::Component).len(),
            edges: graph.edge_count(),
            ..Default::default()
        };

        for id in graph.sorted_node_ids() {
            let out_degree = graph.outgoing_edges(&id).len();
            let in_degree = graph.incoming_edges(&id).len();
            if out_degree == 0 && in_degree == 0 {
                report.isolated.push(id.clone());
            }
            if out_degree > COUPLING_THRESHOLD {
                report.highly_coupled.push(CoupledNode { id: id.clone(), degree: out_degree });
            }
            if in_degree > COUPLING_THRESHOLD {
                report.central.push(CoupledNode { id: id.clone(), degree: in_degree });
            }
        }
        report.highly_coupled.sort_by(|a, b| b.degree.cmp(&a.degree).then(a.id.cmp(&b.id)));
        report.central.sort_by(|a, b| b.degree.cmp(&a.degree).then(a.id.cmp(&b.id)));
        report
    }
}

impl Default for AnalyzeCoupling {
    fn default() -> Self {
        Self::new()
    }
}
