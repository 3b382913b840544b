//! The architecture graph with dual-indexed edges
//!
//! Outgoing and incoming adjacency, the parent/children maps and the
//! short-ID index are maintained on mutation so hierarchy and dependency
//! queries are O(degree), never full edge scans.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::ident;

/// Discriminates what level of the C4 model a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    System,
    Container,
    Component,
}

impl NodeKind {
    /// C4 level: systems are 1, containers 2, components 3.
    pub fn level(&self) -> u8 {
        match self {
            NodeKind::System => 1,
            NodeKind::Container => 2,
            NodeKind::Component => 3,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::System => write!(f, "system"),
            NodeKind::Container => write!(f, "container"),
            NodeKind::Component => write!(f, "component"),
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(NodeKind::System),
            "container" => Ok(NodeKind::Container),
            "component" => Ok(NodeKind::Component),
            other => Err(GraphError::NodeNotFound(other.to_string())),
        }
    }
}

/// A single node in the architecture graph, keyed by qualified ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Qualified ID, e.g. `payment/api/auth-handler`.
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub description: String,
    pub parent: Option<String>,
    /// Projection of the underlying entity used by search filters.
    pub technology: Option<String>,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, name: impl Into<String>) -> Self {
        GraphNode {
            id: id.into(),
            kind,
            name: name.into(),
            description: String::new(),
            parent: None,
            technology: None,
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn level(&self) -> u8 {
        self.kind.level()
    }

    /// Final segment of the qualified ID.
    pub fn short_id(&self) -> &str {
        ident::short_id(&self.id)
    }
}

/// A directed edge in the architecture graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// Relationship type label ("uses", "calls", "triggered_by", ...).
    pub kind: String,
    pub description: String,
    pub bidirectional: bool,
    pub weight: u32,
    pub metadata: HashMap<String, String>,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: impl Into<String>) -> Self {
        GraphEdge {
            source: source.into(),
            target: target.into(),
            kind: kind.into(),
            description: String::new(),
            bidirectional: false,
            weight: 1,
            metadata: HashMap::new(),
        }
    }

    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The architecture graph.
#[derive(Debug, Default, Clone)]
pub struct ArchitectureGraph {
    nodes: HashMap<String, GraphNode>,
    outgoing: HashMap<String, Vec<GraphEdge>>,
    incoming: HashMap<String, Vec<GraphEdge>>,
    parents: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
    short_ids: HashMap<String, Vec<String>>,
    edge_count: usize,
}

impl ArchitectureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutation ────────────────────────────────────────────

    /// Add a node. Duplicate IDs are rejected.
    pub fn add_node(&mut self, node: GraphNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.short_ids
            .entry(node.short_id().to_string())
            .or_default()
            .push(node.id.clone());
        if let Some(parent) = &node.parent {
            self.parents.insert(node.id.clone(), parent.clone());
            self.children.entry(parent.clone()).or_default().push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Add an edge between two existing nodes.
    ///
    /// A duplicate `(source, target, kind)` triple is a silent no-op and
    /// returns `Ok(false)`. A bidirectional edge is stored as two edges, the
    /// reverse with `bidirectional` cleared, so plain traversals see both
    /// directions and the edge count counts both.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<bool, GraphError> {
        if !self.nodes.contains_key(&edge.source) {
            return Err(GraphError::MissingEndpoint(edge.source));
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(GraphError::MissingEndpoint(edge.target));
        }
        let reverse = edge.bidirectional.then(|| GraphEdge {
            source: edge.target.clone(),
            target: edge.source.clone(),
            kind: edge.kind.clone(),
            description: edge.description.clone(),
            bidirectional: false,
            weight: edge.weight,
            metadata: edge.metadata.clone(),
        });
        let added = self.insert_edge(edge);
        if let Some(reverse) = reverse {
            self.insert_edge(reverse);
        }
        Ok(added)
    }

    fn insert_edge(&mut self, edge: GraphEdge) -> bool {
        let exists = self
            .outgoing
            .get(&edge.source)
            .map(|edges| edges.iter().any(|e| e.target == edge.target && e.kind == edge.kind))
            .unwrap_or(false);
        if exists {
            return false;
        }
        self.outgoing.entry(edge.source.clone()).or_default().push(edge.clone());
        self.incoming.entry(edge.target.clone()).or_default().push(edge);
        self.edge_count += 1;
        true
    }

    /// Remove a node and cascade: all edges in both directions, its parent
    /// link, its slot in the parent's children list, and its short-ID entry.
    pub fn remove_node(&mut self, id: &str) -> Option<GraphNode> {
        let node = self.nodes.remove(id)?;

        // Outgoing edges and their incoming mirrors.
        if let Some(edges) = self.outgoing.remove(id) {
            for edge in edges {
                if let Some(inc) = self.incoming.get_mut(&edge.target) {
                    inc.retain(|e| e.source != id);
                }
                self.edge_count -= 1;
            }
        }
        // Incoming edges and their outgoing mirrors. Self-loops were already
        // accounted for by the outgoing pass.
        if let Some(edges) = self.incoming.remove(id) {
            for edge in edges {
                if edge.source == id {
                    continue;
                }
                if let Some(out) = self.outgoing.get_mut(&edge.source) {
                    out.retain(|e| e.target != id);
                }
                self.edge_count -= 1;
            }
        }

        if let Some(parent) = self.parents.remove(id) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|c| c != id);
            }
        }
        self.children.remove(id);

        let short = node.short_id().to_string();
        if let Some(qualified) = self.short_ids.get_mut(&short) {
            qualified.retain(|q| q != id);
            if qualified.is_empty() {
                self.short_ids.remove(&short);
            }
        }

        Some(node)
    }

    /// Remove one specific `(source, target, kind)` edge from both indices.
    pub fn remove_edge(&mut self, source: &str, target: &str, kind: &str) -> bool {
        let mut removed = false;
        if let Some(edges) = self.outgoing.get_mut(source) {
            let before = edges.len();
            edges.retain(|e| !(e.target == target && e.kind == kind));
            removed = edges.len() != before;
        }
        if removed {
            if let Some(edges) = self.incoming.get_mut(target) {
                edges.retain(|e| !(e.source == source && e.kind == kind));
            }
            self.edge_count -= 1;
        }
        removed
    }

    // ── Access ──────────────────────────────────────────────

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// All node IDs in sorted order, for deterministic walks.
    pub fn sorted_node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.outgoing.values().flatten()
    }

    pub fn outgoing_edges(&self, id: &str) -> &[GraphEdge] {
        self.outgoing.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn incoming_edges(&self, id: &str) -> &[GraphEdge] {
        self.incoming.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    // ── Hierarchy ───────────────────────────────────────────

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(|s| s.as_str())
    }

    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Walk up the parent chain until the root.
    pub fn ancestors_of(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            out.push(parent.to_string());
            current = parent;
        }
        out
    }

    /// All transitive children.
    pub fn descendants_of(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = self.children_of(id).iter().map(|s| s.as_str()).collect();
        while let Some(current) = stack.pop() {
            out.push(current.to_string());
            stack.extend(self.children_of(current).iter().map(|s| s.as_str()));
        }
        out
    }

    // ── Dependencies ────────────────────────────────────────

    /// Nodes at the head of outgoing edges.
    pub fn dependencies_of(&self, id: &str) -> Vec<&GraphNode> {
        self.outgoing_edges(id)
            .iter()
            .filter_map(|e| self.nodes.get(&e.target))
            .collect()
    }

    /// Nodes at the tail of incoming edges.
    pub fn dependents_of(&self, id: &str) -> Vec<&GraphNode> {
        self.incoming_edges(id)
            .iter()
            .filter_map(|e| self.nodes.get(&e.source))
            .collect()
    }

    // ── Path search ─────────────────────────────────────────

    /// Unweighted BFS over outgoing edges. Returns the node list including
    /// both endpoints, or empty when unreachable.
    pub fn path_between(&self, source: &str, target: &str) -> Vec<String> {
        if !self.nodes.contains_key(source) || !self.nodes.contains_key(target) {
            return Vec::new();
        }
        if source == target {
            return vec![source.to_string()];
        }
        let mut came_from: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(source);
        came_from.insert(source, source);

        while let Some(current) = queue.pop_front() {
            for edge in self.outgoing_edges(current) {
                let next = edge.target.as_str();
                if came_from.contains_key(next) {
                    continue;
                }
                came_from.insert(next, current);
                if next == target {
                    let mut path = vec![next.to_string()];
                    let mut step = current;
                    while step != source {
                        path.push(step.to_string());
                        step = came_from[step];
                    }
                    path.push(source.to_string());
                    path.reverse();
                    return path;
                }
                queue.push_back(next);
            }
        }
        Vec::new()
    }

    pub fn is_connected(&self, source: &str, target: &str) -> bool {
        !self.path_between(source, target).is_empty()
    }

    // ── Filters ─────────────────────────────────────────────

    pub fn nodes_by_level(&self, level: u8) -> Vec<&GraphNode> {
        self.nodes.values().filter(|n| n.level() == level).collect()
    }

    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<&GraphNode> {
        self.nodes.values().filter(|n| n.kind == kind).collect()
    }

    // ── Short-ID index ──────────────────────────────────────

    /// All qualified IDs carrying this short ID.
    pub fn short_id_candidates(&self, short: &str) -> &[String] {
        self.short_ids.get(short).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The unique qualified ID for a short ID, iff exactly one node carries it.
    pub fn resolve_short_id(&self, short: &str) -> Option<&str> {
        match self.short_id_candidates(short) {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    // ── Integrity ───────────────────────────────────────────

    /// Every edge endpoint and every parent reference must exist, and every
    /// parent must sit one C4 level above its child.
    pub fn validate(&self) -> Result<(), GraphError> {
        for edges in self.outgoing.values() {
            for edge in edges {
                if !self.nodes.contains_key(&edge.source) {
                    return Err(GraphError::MissingEndpoint(edge.source.clone()));
                }
                if !self.nodes.contains_key(&edge.target) {
                    return Err(GraphError::MissingEndpoint(edge.target.clone()));
                }
            }
        }
        for (child, parent) in &self.parents {
            let Some(parent_node) = self.nodes.get(parent) else {
                return Err(GraphError::MissingParent { child: child.clone(), parent: parent.clone() });
            };
            let child_node = self
                .nodes
                .get(child)
                .ok_or_else(|| GraphError::NodeNotFound(child.clone()))?;
            if parent_node.level() + 1 != child_node.level() {
                return Err(GraphError::WrongParentLevel { child: child.clone(), parent: parent.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArchitectureGraph {
        let mut g = ArchitectureGraph::new();
        g.add_node(GraphNode::new("pay", NodeKind::System, "Payment")).unwrap();
        g.add_node(GraphNode::new("pay/api", NodeKind::Container, "API").with_parent("pay")).unwrap();
        g.add_node(
            GraphNode::new("pay/api/auth", NodeKind::Component, "Auth").with_parent("pay/api"),
        )
        .unwrap();
        g.add_node(
            GraphNode::new("pay/api/billing", NodeKind::Component, "Billing").with_parent("pay/api"),
        )
        .unwrap();
        g
    }

    #[test]
    fn duplicate_nodes_rejected() {
        let mut g = sample();
        let err = g.add_node(GraphNode::new("pay", NodeKind::System, "Payment"));
        assert_eq!(err, Err(GraphError::DuplicateNode("pay".to_string())));
    }

    #[test]
    fn edges_require_endpoints() {
        let mut g = sample();
        assert!(g.add_edge(GraphEdge::new("pay/api/auth", "missing", "uses")).is_err());
        assert!(g.add_edge(GraphEdge::new("missing", "pay/api/auth", "uses")).is_err());
    }

    #[test]
    fn duplicate_edge_is_silent_noop() {
        let mut g = sample();
        assert!(g.add_edge(GraphEdge::new("pay/api/auth", "pay/api/billing", "uses")).unwrap());
        assert_eq!(g.edge_count(), 1);
        assert!(!g.add_edge(GraphEdge::new("pay/api/auth", "pay/api/billing", "uses")).unwrap());
        assert_eq!(g.edge_count(), 1);
        // A different kind is a distinct edge.
        assert!(g.add_edge(GraphEdge::new("pay/api/auth", "pay/api/billing", "calls")).unwrap());
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn bidirectional_stores_two_edges() {
        let mut g = sample();
        g.add_edge(GraphEdge::new("pay/api/auth", "pay/api/billing", "syncs").bidirectional())
            .unwrap();
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.outgoing_edges("pay/api/billing").len(), 1);
        let reverse = &g.outgoing_edges("pay/api/billing")[0];
        assert!(!reverse.bidirectional);
        assert_eq!(g.dependencies_of("pay/api/billing")[0].id, "pay/api/auth");
    }

    #[test]
    fn hierarchy_queries() {
        let g = sample();
        assert_eq!(g.parent_of("pay/api/auth"), Some("pay/api"));
        assert_eq!(g.children_of("pay"), &["pay/api".to_string()]);
        assert_eq!(g.ancestors_of("pay/api/auth"), vec!["pay/api", "pay"]);
        let mut descendants = g.descendants_of("pay");
        descendants.sort();
        assert_eq!(descendants, vec!["pay/api", "pay/api/auth", "pay/api/billing"]);
    }

    #[test]
    fn path_endpoints_and_connectivity() {
        let mut g = sample();
        g.add_node(GraphNode::new("pay/api/store", NodeKind::Component, "Store").with_parent("pay/api"))
            .unwrap();
        g.add_edge(GraphEdge::new("pay/api/auth", "pay/api/billing", "uses")).unwrap();
        g.add_edge(GraphEdge::new("pay/api/billing", "pay/api/store", "uses")).unwrap();

        let path = g.path_between("pay/api/auth", "pay/api/store");
        assert_eq!(path.first().map(|s| s.as_str()), Some("pay/api/auth"));
        assert_eq!(path.last().map(|s| s.as_str()), Some("pay/api/store"));
        // Every consecutive pair is connected by an outgoing edge.
        for pair in path.windows(2) {
            assert!(g.outgoing_edges(&pair[0]).iter().any(|e| e.target == pair[1]));
        }

        assert!(g.is_connected("pay/api/auth", "pay/api/store"));
        assert!(!g.is_connected("pay/api/store", "pay/api/auth"));
        assert!(g.path_between("pay/api/store", "pay/api/auth").is_empty());
    }

    #[test]
    fn path_to_self_is_single_node() {
        let g = sample();
        assert_eq!(g.path_between("pay", "pay"), vec!["pay"]);
    }

    #[test]
    fn remove_node_cascades() {
        let mut g = sample();
        g.add_edge(GraphEdge::new("pay/api/auth", "pay/api/billing", "uses")).unwrap();
        g.add_edge(GraphEdge::new("pay/api/billing", "pay/api/auth", "notifies")).unwrap();
        assert_eq!(g.edge_count(), 2);

        let removed = g.remove_node("pay/api/auth");
        assert!(removed.is_some());
        assert!(g.node("pay/api/auth").is_none());
        assert!(g.incoming_edges("pay/api/auth").is_empty());
        assert!(g.outgoing_edges("pay/api/auth").is_empty());
        assert_eq!(g.edge_count(), 0);
        assert!(!g.children_of("pay/api").contains(&"pay/api/auth".to_string()));
        assert!(g.short_id_candidates("auth").is_empty());
        // Remaining indexes stay coherent.
        assert!(g.outgoing_edges("pay/api/billing").is_empty());
        assert!(g.incoming_edges("pay/api/billing").is_empty());
    }

    #[test]
    fn remove_edge_is_directional() {
        let mut g = sample();
        g.add_edge(GraphEdge::new("pay/api/auth", "pay/api/billing", "uses")).unwrap();
        assert!(g.remove_edge("pay/api/auth", "pay/api/billing", "uses"));
        assert_eq!(g.edge_count(), 0);
        assert!(!g.remove_edge("pay/api/auth", "pay/api/billing", "uses"));
    }

    #[test]
    fn short_id_resolution() {
        let mut g = sample();
        assert_eq!(g.resolve_short_id("auth"), Some("pay/api/auth"));
        g.add_node(
            GraphNode::new("pay/worker/auth", NodeKind::Component, "Auth").with_parent("pay/api"),
        )
        .unwrap();
        // Two candidates: no unique resolution.
        assert_eq!(g.resolve_short_id("auth"), None);
        assert_eq!(g.short_id_candidates("auth").len(), 2);
    }

    #[test]
    fn legal_mutations_keep_graph_valid() {
        let mut g = sample();
        g.add_edge(GraphEdge::new("pay/api/auth", "pay/api/billing", "uses")).unwrap();
        g.remove_node("pay/api/billing");
        assert!(g.validate().is_ok());
    }

    #[test]
    fn validate_catches_wrong_parent_level() {
        let mut g = ArchitectureGraph::new();
        g.add_node(GraphNode::new("sys", NodeKind::System, "Sys")).unwrap();
        g.add_node(GraphNode::new("sys/comp", NodeKind::Component, "Comp").with_parent("sys")).unwrap();
        assert!(matches!(g.validate(), Err(GraphError::WrongParentLevel { .. })));
    }

    #[test]
    fn filters_by_level_and_kind() {
        let g = sample();
        assert_eq!(g.nodes_by_level(1).len(), 1);
        assert_eq!(g.nodes_by_level(3).len(), 2);
        assert_eq!(g.nodes_by_kind(NodeKind::Container).len(), 1);
    }
}
