//! Glob-based element search

use serde::{Deserialize, Serialize};

use crate::graph::{ArchitectureGraph, NodeKind};
use crate::ident;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    /// Glob pattern matched against short ID and name.
    pub pattern: String,
    pub kind: Option<NodeKind>,
    /// Exact technology match.
    pub technology: Option<String>,
    /// Exact tag match.
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        SearchQuery {
            pattern: pattern.into(),
            kind: None,
            technology: None,
            tag: None,
            limit: None,
        }
    }

    fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub description: String,
    pub technology: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub matches: Vec<SearchMatch>,
    /// Unclamped number of elements that matched.
    pub total_matched: usize,
    pub message: String,
}

pub struct SearchElements;

impl SearchElements {
    pub fn new() -> Self {
        SearchElements
    }

    pub fn execute(&self, graph: &ArchitectureGraph, query: &SearchQuery) -> SearchResult {
        let limit = query.effective_limit();
        let mut matches = Vec::new();
        let mut total = 0usize;

        for id in graph.sorted_node_ids() {
            let Some(node) = graph.node(&id) else { continue };
            let hit = ident::glob_match(&query.pattern, node.short_id())
                || ident::glob_match(&query.pattern, &node.name);
            if !hit {
                continue;
            }
            if let Some(kind) = query.kind {
                if node.kind != kind {
                    continue;
                }
            }
            if let Some(technology) = &query.technology {
                if node.technology.as_deref() != Some(technology.as_str()) {
                    continue;
                }
            }
            if let Some(tag) = &query.tag {
                if !node.tags.iter().any(|t| t == tag) {
                    continue;
                }
            }
            total += 1;
            if matches.len() < limit {
                matches.push(SearchMatch {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    kind: node.kind,
                    description: node.description.clone(),
                    technology: node.technology.clone(),
                });
            }
        }

        let message = if total == 0 {
            format!("no elements matched pattern '{}'", query.pattern)
        } else {
            format!("{} of {} matching elements", matches.len(), total)
        };

        SearchResult { matches, total_matched: total, message }
    }
}

impl Default for SearchElements {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;

    fn graph_with_components(count: usize) -> ArchitectureGraph {
        let mut g = ArchitectureGraph::new();
        g.add_node(GraphNode::new("shop", NodeKind::System, "Shop")).unwrap();
        g.add_node(GraphNode::new("shop/web", NodeKind::Container, "Web").with_parent("shop")).unwrap();
        for i in 0..count {
            let id = format!("shop/web/payment-{i:02}");
            let mut node = GraphNode::new(&id, NodeKind::Component, format!("payment-{i:02}"))
                .with_parent("shop/web");
            node.technology = Some("Go".to_string());
            node.tags = vec!["billing".to_string()];
            g.add_node(node).unwrap();
        }
        g
    }

    #[test]
    fn limit_caps_results_but_not_total() {
        let g = graph_with_components(30);
        let mut query = SearchQuery::pattern("payment-*");
        query.limit = Some(10);
        let result = SearchElements::new().execute(&g, &query);
        assert_eq!(result.matches.len(), 10);
        assert_eq!(result.total_matched, 30);
    }

    #[test]
    fn limit_clamps_to_max() {
        let mut query = SearchQuery::pattern("*");
        query.limit = Some(5000);
        assert_eq!(query.effective_limit(), MAX_LIMIT);
        assert_eq!(SearchQuery::pattern("*").effective_limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn type_filter_applies() {
        let g = graph_with_components(3);
        let mut query = SearchQuery::pattern("*");
        query.kind = Some(NodeKind::System);
        let result = SearchElements::new().execute(&g, &query);
        assert_eq!(result.total_matched, 1);
        assert_eq!(result.matches[0].id, "shop");
    }

    #[test]
    fn technology_and_tag_filters_are_exact() {
        let g = graph_with_components(3);
        let mut query = SearchQuery::pattern("payment-*");
        query.technology = Some("Go".to_string());
        assert_eq!(SearchElements::new().execute(&g, &query).total_matched, 3);
        query.technology = Some("go".to_string());
        assert_eq!(SearchElements::new().execute(&g, &query).total_matched, 0);

        let mut query = SearchQuery::pattern("payment-*");
        query.tag = Some("billing".to_string());
        assert_eq!(SearchElements::new().execute(&g, &query).total_matched, 3);
    }

    #[test]
    fn empty_result_carries_message() {
        let g = graph_with_components(1);
        let result = SearchElements::new().execute(&g, &SearchQuery::pattern("zzz-*"));
        assert_eq!(result.total_matched, 0);
        assert!(result.message.contains("zzz-*"));
    }

    #[test]
    fn name_matches_too() {
        let mut g = graph_with_components(0);
        let mut node =
            GraphNode::new("shop/web/checkout", NodeKind::Component, "Checkout Flow").with_parent("shop/web");
        node.technology = None;
        g.add_node(node).unwrap();
        let result = SearchElements::new().execute(&g, &SearchQuery::pattern("Checkout*"));
        assert_eq!(result.total_matched, 1);
    }
}
