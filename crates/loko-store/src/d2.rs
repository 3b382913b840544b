//! Syntactic D2 parser
//!
//! Extracts arrows and tooltips from D2 source without a full grammar.
//! This is deliberately not a D2 implementation: rendering and layout stay
//! with the external `d2` binary, only relationships and tooltips matter to
//! the architecture graph.

use anyhow::{bail, Result};
use regex::Regex;
use std::sync::OnceLock;

use loko_core::{D2Document, D2Parser, D2Relationship};

static ARROW_RE: OnceLock<Regex> = OnceLock::new();
static BLOCK_RE: OnceLock<Regex> = OnceLock::new();
static KV_RE: OnceLock<Regex> = OnceLock::new();

fn arrow_re() -> &'static Regex {
    ARROW_RE.get_or_init(|| {
        Regex::new(
            r#"^\s*("[^"]+"|[A-Za-z0-9_.-]+)\s*(<->|->)\s*("[^"]+"|[A-Za-z0-9_.-]+)\s*(?::\s*(.*))?$"#,
        )
        .expect("arrow regex compiles")
    })
}

fn block_re() -> &'static Regex {
    BLOCK_RE.get_or_init(|| {
        Regex::new(r#"^\s*("[^"]+"|[A-Za-z0-9_.-]+)\s*:\s*\{\s*$"#).expect("block regex compiles")
    })
}

fn kv_re() -> &'static Regex {
    KV_RE.get_or_init(|| {
        Regex::new(r#"^\s*("[^"]+"|[A-Za-z0-9_.-]+)\s*:\s*(.+)$"#).expect("kv regex compiles")
    })
}

/// Regex-driven line parser for D2 arrows and tooltips.
#[derive(Debug, Default, Clone, Copy)]
pub struct D2SyntaxParser;

impl D2SyntaxParser {
    pub fn new() -> Self {
        D2SyntaxParser
    }
}

impl D2Parser for D2SyntaxParser {
    fn parse(&self, source: &str) -> Result<D2Document> {
        let mut doc = D2Document::default();
        // Stack of open blocks; named entries identify the node a nested
        // `tooltip:` key belongs to.
        let mut stack: Vec<Option<String>> = Vec::new();

        for (line_no, raw) in source.lines().enumerate() {
            let code = strip_comment(raw);
            let code = code.trim();
            if code.is_empty() {
                continue;
            }
            if code == "}" {
                if stack.pop().is_none() {
                    bail!("unbalanced '}}' on line {}", line_no + 1);
                }
                continue;
            }

            if let Some(caps) = arrow_re().captures(code) {
                let source_id = unquote(&caps[1]);
                let target_id = unquote(&caps[3]);
                let mut label = caps.get(4).map(|m| m.as_str()).unwrap_or("").trim().to_string();
                // An arrow may open a style block: `a -> b: label {`.
                if label.ends_with('{') {
                    label = label[..label.len() - 1].trim_end().to_string();
                    stack.push(None);
                }
                let label = unquote(&label).to_string();
                doc.relationships.push(D2Relationship::new(&source_id, &target_id, &label));
                if &caps[2] == "<->" {
                    doc.relationships.push(D2Relationship::new(&target_id, &source_id, &label));
                }
                continue;
            }

            if let Some(caps) = block_re().captures(code) {
                stack.push(Some(node_short_id(&unquote(&caps[1]))));
                continue;
            }

            if let Some(caps) = kv_re().captures(code) {
                let key = unquote(&caps[1]);
                let value = caps[2].trim();
                if key == "tooltip" {
                    if let Some(Some(node)) = stack.iter().rev().find(|entry| entry.is_some()) {
                        doc.tooltips.insert(node.clone(), unquote(value).to_string());
                    }
                } else if let Some(node) = key.strip_suffix(".tooltip") {
                    doc.tooltips.insert(node_short_id(node), unquote(value).to_string());
                } else if value.ends_with('{') {
                    // `x: {` variants with trailing content, or style blocks.
                    stack.push(Some(node_short_id(&key)));
                }
                continue;
            }

            // Bare `{` continuation or unrecognized declaration lines.
            if code.ends_with('{') {
                stack.push(None);
            }
        }

        if !stack.is_empty() {
            bail!("unterminated block: {} still open at end of input", stack.len());
        }
        Ok(doc)
    }
}

/// Drop a `#` comment, respecting double quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Final segment of a dotted D2 key.
fn node_short_id(key: &str) -> String {
    key.rsplit('.').next().unwrap_or(key).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> D2Document {
        D2SyntaxParser::new().parse(source).expect("parse")
    }

    #[test]
    fn plain_arrows() {
        let doc = parse("a -> b\nb -> c\n");
        assert_eq!(doc.relationships.len(), 2);
        assert_eq!(doc.relationships[0], D2Relationship::new("a", "b", ""));
    }

    #[test]
    fn labeled_arrows() {
        let doc = parse("api -> queue: \"publishes to\"\n");
        assert_eq!(doc.relationships[0], D2Relationship::new("api", "queue", "publishes to"));
        let doc = parse("api -> queue: publishes\n");
        assert_eq!(doc.relationships[0].label, "publishes");
    }

    #[test]
    fn bidirectional_arrow_yields_both_directions() {
        let doc = parse("a <-> b: syncs\n");
        assert_eq!(doc.relationships.len(), 2);
        assert_eq!(doc.relationships[0], D2Relationship::new("a", "b", "syncs"));
        assert_eq!(doc.relationships[1], D2Relationship::new("b", "a", "syncs"));
    }

    #[test]
    fn zero_arrows_is_empty_not_error() {
        let doc = parse("a: Label\nb: {\n  shape: cylinder\n}\n");
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn comments_are_ignored() {
        let doc = parse("# a -> b\nx -> y # trailing note\n");
        assert_eq!(doc.relationships.len(), 1);
        assert_eq!(doc.relationships[0].target, "y");
    }

    #[test]
    fn tooltip_in_block() {
        let doc = parse("auth-handler: {\n  tooltip: \"Validates tokens\"\n}\n");
        assert_eq!(doc.tooltips.get("auth-handler").map(|s| s.as_str()), Some("Validates tokens"));
    }

    #[test]
    fn dotted_tooltip_key() {
        let doc = parse("api.auth-handler.tooltip: Checks credentials\n");
        assert_eq!(doc.tooltips.get("auth-handler").map(|s| s.as_str()), Some("Checks credentials"));
    }

    #[test]
    fn arrow_with_style_block() {
        let doc = parse("a -> b: calls {\n  style.stroke-dash: 3\n}\n");
        assert_eq!(doc.relationships.len(), 1);
        assert_eq!(doc.relationships[0].label, "calls");
    }

    #[test]
    fn nested_blocks_track_the_right_node() {
        let source = "outer: {\n  inner: {\n    tooltip: deep\n  }\n  tooltip: shallow\n}\n";
        let doc = parse(source);
        assert_eq!(doc.tooltips.get("inner").map(|s| s.as_str()), Some("deep"));
        assert_eq!(doc.tooltips.get("outer").map(|s| s.as_str()), Some("shallow"));
    }

    #[test]
    fn unbalanced_braces_error() {
        assert!(D2SyntaxParser::new().parse("a: {\n").is_err());
        assert!(D2SyntaxParser::new().parse("}\n").is_err());
    }

    #[test]
    fn quoted_identifiers() {
        let doc = parse("\"Email Queue\" -> \"Delivery Table\": writes\n");
        assert_eq!(doc.relationships[0].source, "Email Queue");
        assert_eq!(doc.relationships[0].target, "Delivery Table");
    }
}
