//! Markdown documentation builder
//!
//! Emits a consolidated architecture document plus one document per system.
//! Generated content lives under known headings; a user-authored `## Notes`
//! section in an existing output file is carried over verbatim.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use loko_core::{ArchitectureGraph, MarkdownBuilder, ProgressReporter, Project, System};

const CONSOLIDATED_FILE: &str = "architecture.md";
const NOTES_HEADING: &str = "## Notes";

/// Extract a user-authored `## Notes` section (heading included) from an
/// existing document, up to the next `## ` heading.
pub fn extract_notes(text: &str) -> Option<String> {
    let start = text.find(NOTES_HEADING)?;
    let after = &text[start..];
    let end = after[NOTES_HEADING.len()..]
        .find("\n## ")
        .map(|i| NOTES_HEADING.len() + i + 1)
        .unwrap_or(after.len());
    Some(after[..end].trim_end().to_string())
}

pub struct MarkdownDocsBuilder;

impl MarkdownDocsBuilder {
    pub fn new() -> Self {
        MarkdownDocsBuilder
    }

    fn consolidated(&self, project: &Project, systems: &[System], graph: &ArchitectureGraph) -> String {
        let mut out = format!("# {}\n\n", project.name);
        if !project.description.is_empty() {
            out.push_str(&format!("{}\n\n", project.description));
        }
        out.push_str(&format!(
            "_{} systems, {} elements, {} relationships._\n\n",
            systems.len(),
            graph.node_count(),
            graph.edge_count(),
        ));

        out.push_str("## Systems\n\n| System | Description | Containers |\n|---|---|---|\n");
        for system in systems {
            out.push_str(&format!(
                "| [{}](docs/{}.md) | {} | {} |\n",
                system.name,
                system.id,
                system.description.replace('|', "\\|"),
                system.containers.len(),
            ));
        }
        out.push('\n');

        for system in systems {
            out.push_str(&self.system_section(system, graph, 2));
        }
        out
    }

    fn system_section(&self, system: &System, graph: &ArchitectureGraph, level: usize) -> String {
        let h = "#".repeat(level);
        let mut out = format!("{h} {}\n\n", system.name);
        if !system.description.is_empty() {
            out.push_str(&format!("{}\n\n", system.description));
        }
        if !system.containers.is_empty() {
            out.push_str(&format!(
                "{h}# Containers\n\n| Container | Technology | Components |\n|---|---|---|\n"
            ));
            for container in system.containers.values() {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    container.name,
                    container.technology.replace('|', "\\|"),
                    container.components.len(),
                ));
            }
            out.push('\n');
        }
        for container in system.containers.values() {
            if container.components.is_empty() {
                continue;
            }
            out.push_str(&format!(
                "{h}# {} components\n\n| Component | Technology | Description |\n|---|---|---|\n",
                container.name
            ));
            for component in container.components.values() {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    component.name,
                    component.technology.replace('|', "\\|"),
                    component.description.replace('|', "\\|"),
                ));
            }
            out.push('\n');
        }

        // Relationship listing for the system's components.
        let mut rels = Vec::new();
        for container in system.containers.values() {
            for component in container.components.values() {
                let id = format!("{}/{}/{}", system.id, container.id, component.id);
                for edge in graph.outgoing_edges(&id) {
                    rels.push(format!("- `{}` {} `{}`\n", edge.source, edge.kind, edge.target));
                }
            }
        }
        if !rels.is_empty() {
            rels.sort();
            out.push_str(&format!("{h}# Relationships\n\n"));
            for rel in rels {
                out.push_str(&rel);
            }
            out.push('\n');
        }
        out
    }

    async fn write_preserving_notes(
        &self,
        path: &Path,
        mut text: String,
        files: &mut Vec<PathBuf>,
    ) -> Result<()> {
        if let Ok(existing) = tokio::fs::read_to_string(path).await {
            if let Some(notes) = extract_notes(&existing) {
                if !text.contains(NOTES_HEADING) {
                    text.push_str("\n");
                }
                // Replace a generated Notes section, or append one.
                if let Some(start) = text.find(NOTES_HEADING) {
                    let head = text[..start].to_string();
                    text = format!("{head}{notes}\n");
                } else {
                    text.push_str(&notes);
                    text.push('\n');
                }
            }
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        files.push(path.to_path_buf());
        Ok(())
    }
}

impl Default for MarkdownDocsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarkdownBuilder for MarkdownDocsBuilder {
    async fn build(
        &self,
        project: &Project,
        systems: &[System],
        graph: &ArchitectureGraph,
        output: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let consolidated = self.consolidated(project, systems, graph);
        self.write_preserving_notes(&output.join(CONSOLIDATED_FILE), consolidated, &mut files)
            .await?;

        let total = systems.len();
        for (i, system) in systems.iter().enumerate() {
            reporter.step("markdown", i + 1, total, &system.id);
            let doc = format!("{}\n", self.system_section(system, graph, 1));
            self.write_preserving_notes(
                &output.join("docs").join(format!("{}.md", system.id)),
                doc,
                &mut files,
            )
            .await?;
        }
        Ok(files)
    }
}
