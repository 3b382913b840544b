//! Drift detection between frontmatter and D2 diagram source

use std::sync::Arc;

use anyhow::Result;

use crate::drift::{DriftIssue, DriftKind};
use crate::graph::ArchitectureGraph;
use crate::ports::D2Parser;
use crate::system::System;
use crate::usecase::build_graph::resolve_node_ref;

pub struct DetectDrift {
    d2: Arc<dyn D2Parser>,
}

impl DetectDrift {
    pub fn new(d2: Arc<dyn D2Parser>) -> Self {
        DetectDrift { d2 }
    }

    pub fn execute(&self, systems: &[System], graph: &ArchitectureGraph) -> Result<Vec<DriftIssue>> {
        let mut issues = Vec::new();

        for system in systems {
            for container in system.containers.values() {
                for component in container.components.values() {
                    let qualified = format!("{}/{}/{}", system.id, container.id, component.id);

                    if let Some(diagram) = &component.diagram {
                        let doc = match self.d2.parse(&diagram.source) {
                            Ok(doc) => doc,
                            Err(err) => {
                                tracing::warn!(diagram = %diagram.id, error = %err, "d2 parse failed during drift check");
                                continue;
                            }
                        };

                        // Tooltip on the component's own node vs frontmatter description.
                        if let Some(tooltip) = doc.tooltips.get(&component.id) {
                            if !tooltip.is_empty()
                                && !component.description.is_empty()
                                && tooltip != &component.description
                            {
                                issues.push(DriftIssue::new(
                                    &qualified,
                                    DriftKind::DescriptionMismatch,
                                    format!(
                                        "diagram tooltip {:?} differs from frontmatter description {:?}",
                                        tooltip, component.description
                                    ),
                                    diagram.source_path.display().to_string(),
                                ));
                            }
                        }

                        for rel in &doc.relationships {
                            if resolve_node_ref(graph, &rel.target, &system.id, Some(&container.id))
                                .is_none()
                            {
                                issues.push(DriftIssue::new(
                                    &qualified,
                                    DriftKind::MissingComponent,
                                    format!("diagram arrow targets '{}' which does not exist", rel.target),
                                    rel.key(),
                                ));
                            }
                        }
                    }

                    for target in component.relationships.keys() {
                        if resolve_node_ref(graph, target, &system.id, Some(&container.id)).is_none() {
                            issues.push(DriftIssue::new(
                                &qualified,
                                DriftKind::OrphanedRelationship,
                                format!("frontmatter relationship targets '{}' which does not exist", target),
                                target.clone(),
                            ));
                        }
                    }
                }
            }
        }

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::container::Container;
    use crate::diagram::Diagram;
    use crate::graph::{GraphNode, NodeKind};
    use crate::ports::D2Document;
    use crate::relationship::D2Relationship;

    struct StubParser {
        doc: D2Document,
    }

    impl D2Parser for StubParser {
        fn parse(&self, _source: &str) -> Result<D2Document> {
            Ok(self.doc.clone())
        }
    }

    fn fixture(description: &str, rel_target: Option<&str>) -> (Vec<System>, ArchitectureGraph) {
        let mut component = Component::new("X", description).unwrap();
        component.diagram = Some(Diagram::new("x.d2", "irrelevant"));
        if let Some(target) = rel_target {
            component.add_relationship(target, "uses").unwrap();
        }
        let mut container = Container::new("Cont", "").unwrap();
        container.add_component(component);
        let mut system = System::new("Sys", "").unwrap();
        system.add_container(container);

        let mut graph = ArchitectureGraph::new();
        graph.add_node(GraphNode::new("sys", NodeKind::System, "Sys")).unwrap();
        graph.add_node(GraphNode::new("sys/cont", NodeKind::Container, "Cont").with_parent("sys")).unwrap();
        graph
            .add_node(GraphNode::new("sys/cont/x", NodeKind::Component, "X").with_parent("sys/cont"))
            .unwrap();
        (vec![system], graph)
    }

    #[test]
    fn description_mismatch_is_warning() {
        let (systems, graph) = fixture("Handles auth", None);
        let mut doc = D2Document::default();
        doc.tooltips.insert("x".to_string(), "Auth handler".to_string());
        let issues = DetectDrift::new(Arc::new(StubParser { doc })).execute(&systems, &graph).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, DriftKind::DescriptionMismatch);
        assert_eq!(issues[0].severity, crate::report::Severity::Warning);
    }

    #[test]
    fn matching_descriptions_are_quiet() {
        let (systems, graph) = fixture("Handles auth", None);
        let mut doc = D2Document::default();
        doc.tooltips.insert("x".to_string(), "Handles auth".to_string());
        let issues = DetectDrift::new(Arc::new(StubParser { doc })).execute(&systems, &graph).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_arrow_target_is_error() {
        let (systems, graph) = fixture("", None);
        let doc = D2Document {
            relationships: vec![D2Relationship::new("x", "y", "")],
            ..Default::default()
        };
        let issues = DetectDrift::new(Arc::new(StubParser { doc })).execute(&systems, &graph).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, DriftKind::MissingComponent);
        assert_eq!(issues[0].severity, crate::report::Severity::Error);
    }

    #[test]
    fn orphaned_frontmatter_relationship_is_error() {
        let (systems, graph) = fixture("", Some("sys/cont/ghost"));
        let issues = DetectDrift::new(Arc::new(StubParser { doc: D2Document::default() }))
            .execute(&systems, &graph)
            .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, DriftKind::OrphanedRelationship);
    }

    #[test]
    fn combined_scenario_reports_both() {
        let (systems, graph) = fixture("Handles auth", None);
        let mut doc = D2Document {
            relationships: vec![D2Relationship::new("x", "y", "")],
            ..Default::default()
        };
        doc.tooltips.insert("x".to_string(), "Auth handler".to_string());
        let issues = DetectDrift::new(Arc::new(StubParser { doc })).execute(&systems, &graph).unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.kind == DriftKind::DescriptionMismatch));
        assert!(issues.iter().any(|i| i.kind == DriftKind::MissingComponent));
    }
}
