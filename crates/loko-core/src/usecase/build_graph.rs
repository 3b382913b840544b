//! Builds the architecture graph from the loaded entity tree
//!
//! Relationships come from three sources: component frontmatter, D2 diagram
//! arrows, and the persisted `relationships.toml`. The three are union-merged;
//! `ArchitectureGraph::add_edge` collapses duplicate `(source, target, type)`
//! triples.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::graph::{ArchitectureGraph, GraphEdge, GraphNode, NodeKind};
use crate::ports::{D2Document, D2Parser, ProgressReporter};
use crate::relationship::Relationship;
use crate::system::System;

/// Bounded worker pool for parallel D2 parsing.
const PARSE_WORKERS: usize = 10;

/// Fallback edge type for unlabeled arrows and unspecified frontmatter keys.
const DEFAULT_EDGE_KIND: &str = "uses";

/// Where the arrows of one D2 source resolve from.
#[derive(Debug, Clone)]
struct D2Scope {
    system: String,
    container: Option<String>,
}

pub struct BuildArchitectureGraph {
    d2: Arc<dyn D2Parser>,
}

impl BuildArchitectureGraph {
    pub fn new(d2: Arc<dyn D2Parser>) -> Self {
        BuildArchitectureGraph { d2 }
    }

    pub async fn execute(
        &self,
        systems: &[System],
        persisted: &[Relationship],
        reporter: &dyn ProgressReporter,
    ) -> Result<ArchitectureGraph> {
        let mut graph = ArchitectureGraph::new();

        self.add_nodes(&mut graph, systems)?;
        self.add_frontmatter_edges(&mut graph, systems, reporter);
        self.add_persisted_edges(&mut graph, persisted, reporter);
        self.add_d2_edges(&mut graph, systems, reporter).await;

        Ok(graph)
    }

    fn add_nodes(&self, graph: &mut ArchitectureGraph, systems: &[System]) -> Result<()> {
        for system in systems {
            let mut node = GraphNode::new(&system.id, NodeKind::System, &system.name)
                .with_description(&system.description);
            node.technology = system.language.clone();
            node.tags = system.tags.clone();
            if system.external {
                node.metadata.insert("external".to_string(), "true".to_string());
            }
            graph.add_node(node)?;

            for container in system.containers.values() {
                let container_id = format!("{}/{}", system.id, container.id);
                let mut node = GraphNode::new(&container_id, NodeKind::Container, &container.name)
                    .with_parent(&system.id)
                    .with_description(&container.description);
                node.technology = non_empty(&container.technology);
                node.tags = container.tags.clone();
                graph.add_node(node)?;

                for component in container.components.values() {
                    let component_id = format!("{}/{}", container_id, component.id);
                    let mut node = GraphNode::new(&component_id, NodeKind::Component, &component.name)
                        .with_parent(&container_id)
                        .with_description(&component.description);
                    node.technology = non_empty(&component.technology);
                    node.tags = component.tags.clone();
                    graph.add_node(node)?;
                }
            }
        }
        Ok(())
    }

    fn add_frontmatter_edges(
        &self,
        graph: &mut ArchitectureGraph,
        systems: &[System],
        reporter: &dyn ProgressReporter,
    ) {
        for system in systems {
            for container in system.containers.values() {
                for component in container.components.values() {
                    let source = format!("{}/{}/{}", system.id, container.id, component.id);
                    for (target, kind) in &component.relationships {
                        let kind = if kind.is_empty() { DEFAULT_EDGE_KIND } else { kind.as_str() };
                        let resolved = resolve_node_ref(
                            graph,
                            target,
                            &system.id,
                            Some(container.id.as_str()),
                        );
                        let Some(target) = resolved else {
                            tracing::warn!(source = %source, target = %target, "frontmatter relationship target does not resolve");
                            reporter.info(&format!(
                                "warning: {source}: relationship target '{target}' does not resolve"
                            ));
                            continue;
                        };
                        let mut edge = GraphEdge::new(&source, &target, kind);
                        edge.metadata.insert("origin".to_string(), "frontmatter".to_string());
                        // Silent no-op on a duplicate triple.
                        let _ = graph.add_edge(edge);
                    }
                }
            }
        }
    }

    fn add_persisted_edges(
        &self,
        graph: &mut ArchitectureGraph,
        persisted: &[Relationship],
        reporter: &dyn ProgressReporter,
    ) {
        for rel in persisted {
            if !graph.contains(&rel.source) || !graph.contains(&rel.target) {
                tracing::warn!(id = %rel.id, "persisted relationship references a missing element");
                reporter.info(&format!(
                    "warning: relationship {}: '{}' -> '{}' references a missing element",
                    rel.id, rel.source, rel.target
                ));
                continue;
            }
            let mut edge = GraphEdge::new(&rel.source, &rel.target, &rel.label);
            edge.bidirectional = rel.direction == crate::relationship::Direction::Bidirectional;
            edge.metadata.insert("origin".to_string(), "persisted".to_string());
            edge.metadata.insert("type".to_string(), rel.rel_type.to_string());
            if !rel.technology.is_empty() {
                edge.metadata.insert("technology".to_string(), rel.technology.clone());
            }
            let _ = graph.add_edge(edge);
        }
    }

    /// Parse every on-disk diagram in a bounded worker pool and merge the
    /// arrows. A parse failure on one file contributes zero relationships
    /// and never aborts the build.
    async fn add_d2_edges(
        &self,
        graph: &mut ArchitectureGraph,
        systems: &[System],
        reporter: &dyn ProgressReporter,
    ) {
        let mut jobs: Vec<(D2Scope, String, String)> = Vec::new();
        for system in systems {
            if let Some(diagram) = &system.diagram {
                jobs.push((
                    D2Scope { system: system.id.clone(), container: None },
                    diagram.id.clone(),
                    diagram.source.clone(),
                ));
            }
            for container in system.containers.values() {
                if let Some(diagram) = &container.diagram {
                    jobs.push((
                        D2Scope { system: system.id.clone(), container: Some(container.id.clone()) },
                        diagram.id.clone(),
                        diagram.source.clone(),
                    ));
                }
                for component in container.components.values() {
                    if let Some(diagram) = &component.diagram {
                        jobs.push((
                            D2Scope {
                                system: system.id.clone(),
                                container: Some(container.id.clone()),
                            },
                            diagram.id.clone(),
                            diagram.source.clone(),
                        ));
                    }
                }
            }
        }

        let semaphore = Arc::new(Semaphore::new(PARSE_WORKERS));
        let mut set: JoinSet<(D2Scope, String, Result<D2Document>)> = JoinSet::new();
        for (scope, diagram_id, source) in jobs {
            let permit = Arc::clone(&semaphore);
            let parser = Arc::clone(&self.d2);
            set.spawn(async move {
                let _permit = permit.acquire_owned().await;
                let parsed = parser.parse(&source);
                (scope, diagram_id, parsed)
            });
        }

        let mut parsed: Vec<(D2Scope, String, D2Document)> = Vec::new();
        while let Some(joined) = set.join_next().await {
            let Ok((scope, diagram_id, result)) = joined else { continue };
            match result {
                Ok(doc) => parsed.push((scope, diagram_id, doc)),
                Err(err) => {
                    tracing::warn!(diagram = %diagram_id, error = %err, "d2 parse failed");
                    reporter.info(&format!("warning: diagram '{diagram_id}' failed to parse: {err}"));
                }
            }
        }
        // Merge in a stable order regardless of task completion order.
        parsed.sort_by(|a, b| a.1.cmp(&b.1));

        for (scope, diagram_id, doc) in parsed {
            for rel in doc.relationships {
                let source = resolve_node_ref(graph, &rel.source, &scope.system, scope.container.as_deref());
                let target = resolve_node_ref(graph, &rel.target, &scope.system, scope.container.as_deref());
                let (Some(source), Some(target)) = (source, target) else {
                    tracing::warn!(diagram = %diagram_id, arrow = %rel.key(), "d2 arrow endpoint does not resolve");
                    reporter.info(&format!(
                        "warning: diagram '{diagram_id}': arrow '{}' has an unresolvable endpoint",
                        rel.key()
                    ));
                    continue;
                };
                if source == target {
                    continue;
                }
                let kind = if rel.label.is_empty() { DEFAULT_EDGE_KIND } else { rel.label.as_str() };
                let mut edge = GraphEdge::new(&source, &target, kind);
                edge.metadata.insert("origin".to_string(), "d2".to_string());
                let _ = graph.add_edge(edge);
            }
        }
    }
}

/// Resolve a node reference from frontmatter or a D2 arrow.
///
/// Qualified IDs resolve directly. Short IDs resolve through the short-ID
/// index with locality preference: same container, then same system, then
/// globally unique. Ambiguous references return `None`; the caller warns and
/// never fabricates a target.
pub(crate) fn resolve_node_ref(
    graph: &ArchitectureGraph,
    raw: &str,
    system: &str,
    container: Option<&str>,
) -> Option<String> {
    let cleaned = raw.trim().trim_matches('"');
    if cleaned.is_empty() {
        return None;
    }
    if cleaned.contains('/') {
        return graph.contains(cleaned).then(|| cleaned.to_string());
    }
    // D2 nested keys use dots; the final segment is the short ID.
    let short = cleaned.rsplit('.').next().unwrap_or(cleaned);

    let candidates = graph.short_id_candidates(short);
    match candidates {
        [] => None,
        [only] => Some(only.clone()),
        many => {
            if let Some(container) = container {
                let prefix = format!("{}/{}/", system, container);
                if let Some(found) = many.iter().find(|q| q.starts_with(&prefix)) {
                    return Some(found.clone());
                }
            }
            let prefix = format!("{}/", system);
            let in_system: Vec<&String> = many.iter().filter(|q| q.starts_with(&prefix)).collect();
            match in_system.as_slice() {
                [only] => Some((*only).clone()),
                _ => None,
            }
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::container::Container;
    use crate::diagram::Diagram;
    use crate::ports::NullReporter;
    use crate::relationship::{D2Relationship, RelationType};

    /// Parser double returning canned documents keyed by a marker line.
    struct FakeParser;

    impl D2Parser for FakeParser {
        fn parse(&self, source: &str) -> Result<D2Document> {
            if source.contains("#broken") {
                anyhow::bail!("unexpected token");
            }
            let mut doc = D2Document::default();
            for line in source.lines() {
                if let Some((left, rest)) = line.split_once("->") {
                    let (right, label) = match rest.split_once(':') {
                        Some((r, l)) => (r, l.trim().trim_matches('"')),
                        None => (rest, ""),
                    };
                    doc.relationships.push(D2Relationship::new(
                        left.trim(),
                        right.trim(),
                        label,
                    ));
                }
            }
            Ok(doc)
        }
    }

    fn system_with(component_rels: &[(&str, &str)], d2: Option<&str>) -> System {
        let mut component_a = Component::new("A", "Component A").unwrap();
        for (target, kind) in component_rels {
            component_a.add_relationship(*target, *kind).unwrap();
        }
        if let Some(source) = d2 {
            component_a.diagram = Some(Diagram::new("a.d2", source));
        }
        let component_b = Component::new("B", "Component B").unwrap();
        let mut container = Container::new("Cont", "").unwrap();
        container.add_component(component_a);
        container.add_component(component_b);
        let mut system = System::new("Sys", "").unwrap();
        system.add_container(container);
        system
    }

    fn build(systems: &[System]) -> ArchitectureGraph {
        let uc = BuildArchitectureGraph::new(Arc::new(FakeParser));
        tokio_test::block_on(uc.execute(systems, &[], &NullReporter))
            .expect("graph build")
    }

    #[test]
    fn nodes_created_for_all_levels() {
        let graph = build(&[system_with(&[], None)]);
        assert!(graph.contains("sys"));
        assert!(graph.contains("sys/cont"));
        assert!(graph.contains("sys/cont/a"));
        assert_eq!(graph.parent_of("sys/cont/a"), Some("sys/cont"));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn union_merge_keeps_distinct_types() {
        // Frontmatter says `uses`, the diagram arrow says `calls`.
        let system = system_with(&[("sys/cont/b", "uses")], Some("a -> b: \"calls\""));
        let graph = build(&[system]);
        let kinds: Vec<&str> = graph
            .outgoing_edges("sys/cont/a")
            .iter()
            .map(|e| e.kind.as_str())
            .collect();
        assert_eq!(graph.edge_count(), 2);
        assert!(kinds.contains(&"uses"));
        assert!(kinds.contains(&"calls"));
    }

    #[test]
    fn duplicate_triples_collapse() {
        let system = system_with(&[("sys/cont/b", "uses")], Some("a -> b: \"uses\""));
        let graph = build(&[system]);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.outgoing_edges("sys/cont/a")[0].kind, "uses");
    }

    #[test]
    fn unlabeled_arrow_defaults_to_uses() {
        let system = system_with(&[], Some("a -> b"));
        let graph = build(&[system]);
        assert_eq!(graph.outgoing_edges("sys/cont/a")[0].kind, "uses");
    }

    #[test]
    fn parse_failure_is_graceful() {
        let healthy = system_with(&[], Some("a -> b"));
        let mut broken = System::new("Other", "").unwrap();
        broken.diagram = Some(Diagram::new("other.d2", "#broken"));
        let graph = build(&[healthy, broken]);
        // The broken file contributed nothing; the healthy one still merged.
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn unresolvable_target_is_skipped() {
        let system = system_with(&[], Some("a -> nowhere"));
        let graph = build(&[system]);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn persisted_relationships_merge() {
        let uc = BuildArchitectureGraph::new(Arc::new(FakeParser));
        let system = system_with(&[], None);
        let rel = Relationship::new("sys/cont/a", "sys/cont/b", "publishes", RelationType::Event)
            .unwrap();
        let graph = tokio_test::block_on(uc.execute(&[system], &[rel], &NullReporter)).unwrap();
        assert_eq!(graph.edge_count(), 1);
        let edge = &graph.outgoing_edges("sys/cont/a")[0];
        assert_eq!(edge.kind, "publishes");
        assert_eq!(edge.metadata.get("type").map(|s| s.as_str()), Some("event"));
    }

    #[test]
    fn short_id_resolution_prefers_locality() {
        let mut graph = ArchitectureGraph::new();
        graph.add_node(GraphNode::new("s1", NodeKind::System, "S1")).unwrap();
        graph.add_node(GraphNode::new("s1/c1", NodeKind::Container, "C1").with_parent("s1")).unwrap();
        graph
            .add_node(GraphNode::new("s1/c1/db", NodeKind::Component, "Db").with_parent("s1/c1"))
            .unwrap();
        graph.add_node(GraphNode::new("s2", NodeKind::System, "S2")).unwrap();
        graph.add_node(GraphNode::new("s2/c9", NodeKind::Container, "C9").with_parent("s2")).unwrap();
        graph
            .add_node(GraphNode::new("s2/c9/db", NodeKind::Component, "Db").with_parent("s2/c9"))
            .unwrap();

        // Same-container match wins.
        assert_eq!(
            resolve_node_ref(&graph, "db", "s1", Some("c1")),
            Some("s1/c1/db".to_string())
        );
        // Same-system fallback.
        assert_eq!(resolve_node_ref(&graph, "db", "s2", None), Some("s2/c9/db".to_string()));
        // No scope and two candidates: ambiguous.
        assert_eq!(resolve_node_ref(&graph, "db", "s3", None), None);
    }
}
