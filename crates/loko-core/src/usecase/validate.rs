//! Architecture validation: structural, reference and orphan checks

use crate::graph::{ArchitectureGraph, NodeKind};
use crate::report::{ArchitectureReport, Issue, Severity};
use crate::system::System;
use crate::usecase::build_graph::resolve_node_ref;

pub struct ValidateArchitecture;

impl ValidateArchitecture {
    pub fn new() -> Self {
        ValidateArchitecture
    }

    pub fn execute(
        &self,
        systems: &[System],
        graph: &ArchitectureGraph,
        strict: bool,
    ) -> ArchitectureReport {
        let mut report = ArchitectureReport {
            systems: graph.nodes_by_kind(NodeKind::System).len(),
            containers: graph.nodes_by_kind(NodeKind::Container).len(),
            components: graph.nodes_by_kind(NodeKind::Component).len(),
            ..Default::default()
        };

        self.check_entities(systems, &mut report);
        self.check_structure(graph, &mut report);
        self.check_references(systems, graph, &mut report);
        self.check_orphans(graph, &mut report);

        if strict {
            report.promote_warnings();
        }
        report.issues.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.code.cmp(&b.code)));
        report
    }

    fn check_entities(&self, systems: &[System], report: &mut ArchitectureReport) {
        for system in systems {
            for err in system.validate().0 {
                report.issues.push(
                    Issue::new(Severity::Error, "invalid_entity", format!("Invalid {}", err.entity))
                        .describe(err.to_string())
                        .affecting(&system.id)
                        .suggest("fix the field in the entity's frontmatter"),
                );
            }
        }
    }

    fn check_structure(&self, graph: &ArchitectureGraph, report: &mut ArchitectureReport) {
        for id in graph.sorted_node_ids() {
            let Some(node) = graph.node(&id) else { continue };
            if node.name.is_empty() {
                report.issues.push(
                    Issue::new(Severity::Error, "missing_name", "Element has no name")
                        .affecting(&id)
                        .suggest("set `name` in the frontmatter"),
                );
            }
            match (node.kind, node.parent.as_deref()) {
                (NodeKind::System, Some(parent)) => {
                    report.issues.push(
                        Issue::new(Severity::Error, "invalid_parent", "System must not have a parent")
                            .describe(format!("system '{}' claims parent '{}'", id, parent))
                            .affecting(&id),
                    );
                }
                (NodeKind::Container, None) | (NodeKind::Component, None) => {
                    report.issues.push(
                        Issue::new(Severity::Error, "missing_parent", "Element has no parent")
                            .describe(format!("{} '{}' is not nested in a parent", node.kind, id))
                            .affecting(&id),
                    );
                }
                (NodeKind::Container, Some(parent)) | (NodeKind::Component, Some(parent)) => {
                    let ok = graph
                        .node(parent)
                        .map(|p| p.level() + 1 == node.level())
                        .unwrap_or(false);
                    if !ok {
                        report.issues.push(
                            Issue::new(Severity::Error, "invalid_parent", "Parent has the wrong level")
                                .describe(format!("{} '{}' has parent '{}'", node.kind, id, parent))
                                .affecting(&id),
                        );
                    }
                }
                (NodeKind::System, None) => {}
            }
        }
    }

    fn check_references(
        &self,
        systems: &[System],
        graph: &ArchitectureGraph,
        report: &mut ArchitectureReport,
    ) {
        for system in systems {
            for container in system.containers.values() {
                for component in container.components.values() {
                    let source = format!("{}/{}/{}", system.id, container.id, component.id);
                    for target in component.relationships.keys() {
                        if resolve_node_ref(graph, target, &system.id, Some(&container.id)).is_none() {
                            report.issues.push(
                                Issue::new(
                                    Severity::Error,
                                    "unresolved_reference",
                                    "Relationship target does not exist",
                                )
                                .describe(format!("'{}' declares a relationship to '{}'", source, target))
                                .affecting(&source)
                                .suggest("correct the target qualified ID or create the element"),
                            );
                        }
                    }
                }
            }
        }
    }

    /// Components with neither incoming nor outgoing edges are flagged info.
    fn check_orphans(&self, graph: &ArchitectureGraph, report: &mut ArchitectureReport) {
        for id in graph.sorted_node_ids() {
            let Some(node) = graph.node(&id) else { continue };
            if node.kind != NodeKind::Component {
                continue;
            }
            if graph.outgoing_edges(&id).is_empty() && graph.incoming_edges(&id).is_empty() {
                report.issues.push(
                    Issue::new(Severity::Info, "orphaned_component", "Component has no relationships")
                        .describe(format!("'{}' is not connected to any other element", id))
                        .affecting(&id),
                );
            }
        }
    }
}

impl Default for ValidateArchitecture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEdge, GraphNode};

    fn graph_one_system() -> ArchitectureGraph {
        let mut g = ArchitectureGraph::new();
        g.add_node(GraphNode::new("sys", NodeKind::System, "Sys")).unwrap();
        g.add_node(GraphNode::new("sys/api", NodeKind::Container, "Api").with_parent("sys")).unwrap();
        g.add_node(GraphNode::new("sys/api/a", NodeKind::Component, "A").with_parent("sys/api")).unwrap();
        g.add_node(GraphNode::new("sys/api/b", NodeKind::Component, "B").with_parent("sys/api")).unwrap();
        g
    }

    #[test]
    fn clean_graph_is_valid_with_orphan_infos() {
        let mut g = graph_one_system();
        g.add_edge(GraphEdge::new("sys/api/a", "sys/api/b", "uses")).unwrap();
        let report = ValidateArchitecture::new().execute(&[], &g, false);
        assert!(report.is_valid());
        assert_eq!(report.systems, 1);
        assert_eq!(report.containers, 1);
        assert_eq!(report.components, 2);
        assert!(report.issues.iter().all(|i| i.severity != Severity::Error));
    }

    #[test]
    fn orphan_components_are_info() {
        let g = graph_one_system();
        let report = ValidateArchitecture::new().execute(&[], &g, false);
        let orphans: Vec<&Issue> =
            report.issues.iter().filter(|i| i.code == "orphaned_component").collect();
        assert_eq!(orphans.len(), 2);
        assert!(orphans.iter().all(|i| i.severity == Severity::Info));
        assert!(report.is_valid());
    }

    #[test]
    fn unresolved_reference_is_error() {
        use crate::component::Component;
        use crate::container::Container;

        let mut component = Component::new("A", "").unwrap();
        component.add_relationship("sys/api/missing", "uses").unwrap();
        let mut container = Container::new("Api", "").unwrap();
        container.add_component(component);
        let mut system = System::new("Sys", "").unwrap();
        system.add_container(container);

        let g = graph_one_system();
        let report = ValidateArchitecture::new().execute(&[system], &g, false);
        assert!(!report.is_valid());
        assert!(report.issues.iter().any(|i| i.code == "unresolved_reference"));
    }

    #[test]
    fn strict_mode_promotes_warnings() {
        let mut g = graph_one_system();
        g.add_edge(GraphEdge::new("sys/api/a", "sys/api/b", "uses")).unwrap();
        let mut report = ValidateArchitecture::new().execute(&[], &g, false);
        report.issues.push(Issue::new(Severity::Warning, "some_warning", "W"));
        assert!(report.is_valid());
        report.promote_warnings();
        assert!(!report.is_valid());
    }

    #[test]
    fn dangling_parent_is_error() {
        let mut g = ArchitectureGraph::new();
        g.add_node(GraphNode::new("sys", NodeKind::System, "Sys")).unwrap();
        g.add_node(GraphNode::new("sys/api/x", NodeKind::Component, "X").with_parent("sys/api"))
            .unwrap();
        let report = ValidateArchitecture::new().execute(&[], &g, false);
        assert!(report.issues.iter().any(|i| i.code == "invalid_parent"));
        assert!(!report.is_valid());
    }
}
