//! Machine-readable exports of the architecture: JSON, TOML and TOON
//!
//! TOON is a token-efficient tabular text format for LLM consumption:
//! uniform object arrays collapse to a `key[N]{fields}:` header followed by
//! one CSV row per element, cutting roughly a third of the tokens an
//! equivalent JSON document spends on repeated keys and punctuation.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use loko_core::{ArchitectureGraph, OutputEncoder, Project};

/// Flat, deterministic view of the architecture used by every encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureExport {
    pub project: ProjectMeta,
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<EdgeRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub id: String,
    pub kind: String,
    pub level: u8,
    pub name: String,
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source: String,
    pub target: String,
    pub kind: String,
}

impl ArchitectureExport {
    pub fn from_graph(project: &Project, graph: &ArchitectureGraph) -> Self {
        let mut nodes: Vec<NodeRow> = graph
            .nodes()
            .map(|n| NodeRow {
                id: n.id.clone(),
                kind: n.kind.to_string(),
                level: n.level(),
                name: n.name.clone(),
                parent: n.parent.clone().unwrap_or_default(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges: Vec<EdgeRow> = graph
            .edges()
            .map(|e| EdgeRow {
                source: e.source.clone(),
                target: e.target.clone(),
                kind: e.kind.clone(),
            })
            .collect();
        edges.sort();

        ArchitectureExport {
            project: ProjectMeta { name: project.name.clone(), version: project.version.clone() },
            nodes,
            edges,
        }
    }
}

/// Pretty-printed JSON export.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEncoder;

impl OutputEncoder for JsonEncoder {
    fn encode(&self, project: &Project, graph: &ArchitectureGraph) -> Result<String> {
        let export = ArchitectureExport::from_graph(project, graph);
        Ok(serde_json::to_string_pretty(&export)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// TOML export.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlEncoder;

impl OutputEncoder for TomlEncoder {
    fn encode(&self, project: &Project, graph: &ArchitectureGraph) -> Result<String> {
        let export = ArchitectureExport::from_graph(project, graph);
        Ok(toml::to_string_pretty(&export)?)
    }

    fn extension(&self) -> &'static str {
        "toml"
    }
}

/// TOON export: tabular arrays with length markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToonEncoder;

impl OutputEncoder for ToonEncoder {
    fn encode(&self, project: &Project, graph: &ArchitectureGraph) -> Result<String> {
        let export = ArchitectureExport::from_graph(project, graph);
        let mut out = String::new();
        out.push_str("project:\n");
        out.push_str(&format!("  name: {}\n", toon_scalar(&export.project.name)));
        out.push_str(&format!("  version: {}\n", toon_scalar(&export.project.version)));

        out.push_str(&format!("nodes[{}]{{id,kind,level,name,parent}}:\n", export.nodes.len()));
        for node in &export.nodes {
            out.push_str(&format!(
                "  {},{},{},{},{}\n",
                toon_field(&node.id),
                toon_field(&node.kind),
                node.level,
                toon_field(&node.name),
                toon_field(&node.parent),
            ));
        }

        out.push_str(&format!("edges[{}]{{source,target,kind}}:\n", export.edges.len()));
        for edge in &export.edges {
            out.push_str(&format!(
                "  {},{},{}\n",
                toon_field(&edge.source),
                toon_field(&edge.target),
                toon_field(&edge.kind),
            ));
        }
        Ok(out)
    }

    fn extension(&self) -> &'static str {
        "toon"
    }
}

/// Quote a tabular field when it would be ambiguous bare.
fn toon_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value != value.trim() {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn toon_scalar(value: &str) -> String {
    if value.is_empty() {
        "\"\"".to_string()
    } else {
        toon_field(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loko_core::{GraphEdge, GraphNode, NodeKind};

    /// Minimal independent TOON v3 reader used to prove interoperability.
    /// Deliberately shares no code with the encoder.
    mod toon_reader {
        use std::collections::HashMap;

        #[derive(Debug, Default)]
        pub struct ToonDoc {
            pub scalars: HashMap<String, String>,
            pub tables: HashMap<String, ToonTable>,
        }

        #[derive(Debug, Default)]
        pub struct ToonTable {
            pub declared_len: usize,
            pub fields: Vec<String>,
            pub rows: Vec<Vec<String>>,
        }

        pub fn parse(text: &str) -> Result<ToonDoc, String> {
            let mut doc = ToonDoc::default();
            let mut current: Option<String> = None;
            let mut scalar_prefix: Option<String> = None;

            for line in text.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let indented = line.starts_with("  ");
                if !indented {
                    scalar_prefix = None;
                    current = None;
                    if let Some(header) = line.strip_suffix(':') {
                        if let Some(open) = header.find('[') {
                            let key = header[..open].to_string();
                            let close =
                                header.find(']').ok_or_else(|| format!("bad header: {line}"))?;
                            let declared_len: usize = header[open + 1..close]
                                .parse()
                                .map_err(|_| format!("bad length: {line}"))?;
                            let brace_open =
                                header.find('{').ok_or_else(|| format!("no fields: {line}"))?;
                            let brace_close =
                                header.find('}').ok_or_else(|| format!("no fields: {line}"))?;
                            let fields = header[brace_open + 1..brace_close]
                                .split(',')
                                .map(|f| f.trim().to_string())
                                .collect();
                            doc.tables.insert(
                                key.clone(),
                                ToonTable { declared_len, fields, rows: Vec::new() },
                            );
                            current = Some(key);
                        } else {
                            scalar_prefix = Some(header.to_string());
                        }
                    } else {
                        return Err(format!("unexpected line: {line}"));
                    }
                    continue;
                }

                let content = line.trim_start();
                if let Some(table) = current.as_ref().and_then(|k| doc.tables.get_mut(k)) {
                    table.rows.push(split_csv(content)?);
                } else if let Some(prefix) = &scalar_prefix {
                    let (key, value) =
                        content.split_once(':').ok_or_else(|| format!("bad scalar: {line}"))?;
                    doc.scalars
                        .insert(format!("{prefix}.{}", key.trim()), unquote(value.trim()));
                }
            }
            Ok(doc)
        }

        fn split_csv(line: &str) -> Result<Vec<String>, String> {
            let mut fields = Vec::new();
            let mut field = String::new();
            let mut chars = line.chars().peekable();
            let mut in_quotes = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' if in_quotes => {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            field.push('"');
                        } else {
                            in_quotes = false;
                        }
                    }
                    '"' => in_quotes = true,
                    ',' if !in_quotes => {
                        fields.push(field.clone());
                        field.clear();
                    }
                    c => field.push(c),
                }
            }
            if in_quotes {
                return Err(format!("unterminated quote in: {line}"));
            }
            fields.push(field);
            Ok(fields)
        }

        fn unquote(value: &str) -> String {
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                value[1..value.len() - 1].replace("\"\"", "\"")
            } else {
                value.to_string()
            }
        }
    }

    fn fixture() -> (Project, ArchitectureGraph) {
        let project = Project::new("demo", "", ".").unwrap();
        let mut graph = ArchitectureGraph::new();
        graph.add_node(GraphNode::new("pay", NodeKind::System, "Payment, Inc")).unwrap();
        graph.add_node(GraphNode::new("pay/api", NodeKind::Container, "API").with_parent("pay")).unwrap();
        graph
            .add_node(GraphNode::new("pay/api/auth", NodeKind::Component, "Auth").with_parent("pay/api"))
            .unwrap();
        graph
            .add_node(GraphNode::new("pay/api/bill", NodeKind::Component, "Billing").with_parent("pay/api"))
            .unwrap();
        graph.add_edge(GraphEdge::new("pay/api/auth", "pay/api/bill", "uses")).unwrap();
        graph.add_edge(GraphEdge::new("pay/api/bill", "pay/api/auth", "verifies with")).unwrap();
        (project, graph)
    }

    #[test]
    fn toon_round_trips_through_independent_parser() {
        let (project, graph) = fixture();
        let text = ToonEncoder.encode(&project, &graph).unwrap();
        let doc = toon_reader::parse(&text).unwrap();

        let nodes = &doc.tables["nodes"];
        assert_eq!(nodes.declared_len, graph.node_count());
        assert_eq!(nodes.rows.len(), nodes.declared_len);
        assert_eq!(nodes.fields, vec!["id", "kind", "level", "name", "parent"]);

        let edges = &doc.tables["edges"];
        assert_eq!(edges.declared_len, graph.edge_count());

        // Relationship multisets match.
        let mut expected: Vec<(String, String, String)> = graph
            .edges()
            .map(|e| (e.source.clone(), e.target.clone(), e.kind.clone()))
            .collect();
        expected.sort();
        let mut actual: Vec<(String, String, String)> = edges
            .rows
            .iter()
            .map(|r| (r[0].clone(), r[1].clone(), r[2].clone()))
            .collect();
        actual.sort();
        assert_eq!(expected, actual);

        // Quoted comma survived.
        assert!(nodes.rows.iter().any(|r| r[3] == "Payment, Inc"));
        assert_eq!(doc.scalars.get("project.name").map(|s| s.as_str()), Some("demo"));
    }

    #[test]
    fn toon_is_smaller_than_json() {
        let (project, graph) = fixture();
        let toon = ToonEncoder.encode(&project, &graph).unwrap();
        let json = JsonEncoder.encode(&project, &graph).unwrap();
        assert!(toon.len() < json.len());
    }

    #[test]
    fn json_export_is_deterministic() {
        let (project, graph) = fixture();
        let a = JsonEncoder.encode(&project, &graph).unwrap();
        let b = JsonEncoder.encode(&project, &graph).unwrap();
        assert_eq!(a, b);
        let parsed: ArchitectureExport = serde_json::from_str(&a).unwrap();
        assert_eq!(parsed.nodes.len(), 4);
        assert_eq!(parsed.edges.len(), 2);
    }

    #[test]
    fn toml_export_parses_back() {
        let (project, graph) = fixture();
        let text = TomlEncoder.encode(&project, &graph).unwrap();
        let parsed: ArchitectureExport = toml::from_str(&text).unwrap();
        assert_eq!(parsed.project.name, "demo");
        assert_eq!(parsed.edges.len(), 2);
    }

    #[test]
    fn empty_graph_encodes_cleanly() {
        let project = Project::new("demo", "", ".").unwrap();
        let graph = ArchitectureGraph::new();
        let toon = ToonEncoder.encode(&project, &graph).unwrap();
        assert!(toon.contains("nodes[0]{id,kind,level,name,parent}:"));
        assert!(toon.contains("edges[0]{source,target,kind}:"));
        let _doc = toon_reader::parse(&toon).unwrap();
    }
}
