//! HTML site builder
//!
//! One page per entity plus an index. Markdown bodies render through
//! pulldown-cmark with syntect-highlighted code fences; diagrams are
//! referenced by relative path into the shared `diagrams/` tree.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use loko_core::{
    ArchitectureGraph, Component, Container, ProgressReporter, Project, SiteBuilder, System,
};

pub static STYLE_CSS: &str = r#"
:root { --ink: #1c1e21; --paper: #ffffff; --accent: #3451b2; --line: #e3e5e8; }
* { box-sizing: border-box; }
body { margin: 0; color: var(--ink); background: var(--paper);
  font: 16px/1.6 system-ui, -apple-system, "Segoe UI", sans-serif; }
main { max-width: 60rem; margin: 0 auto; padding: 2rem 1.25rem 4rem; }
nav.crumbs { font-size: 0.85rem; color: #5b6068; margin-bottom: 1.5rem; }
nav.crumbs a { color: var(--accent); text-decoration: none; }
h1, h2, h3 { line-height: 1.25; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--line); padding: 0.4rem 0.6rem; text-align: left; }
th { background: #f6f7f8; }
img.diagram { max-width: 100%; border: 1px solid var(--line); padding: 0.5rem; }
code { background: #f2f3f5; padding: 0.1rem 0.3rem; border-radius: 3px; }
pre code { background: none; padding: 0; }
span.tag { display: inline-block; background: #eef1fb; color: var(--accent);
  border-radius: 3px; padding: 0 0.4rem; margin-right: 0.3rem; font-size: 0.8rem; }
footer { color: #8a8f98; font-size: 0.8rem; border-top: 1px solid var(--line);
  margin-top: 3rem; padding-top: 1rem; }
"#;

fn syntax_assets() -> &'static (SyntaxSet, Theme) {
    static ASSETS: OnceLock<(SyntaxSet, Theme)> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntaxes = SyntaxSet::load_defaults_newlines();
        let theme = ThemeSet::load_defaults().themes["InspiredGitHub"].clone();
        (syntaxes, theme)
    })
}

/// Render a Markdown body to HTML with highlighted code fences.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(markdown, options);

    let mut events: Vec<Event> = Vec::new();
    let mut code = String::new();
    let mut lang: Option<String> = None;
    let mut in_code = false;
    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code = true;
                code.clear();
                lang = match kind {
                    CodeBlockKind::Fenced(token) if !token.is_empty() => Some(token.to_string()),
                    _ => None,
                };
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code = false;
                events.push(Event::Html(highlight_block(&code, lang.as_deref()).into()));
            }
            Event::Text(text) if in_code => code.push_str(&text),
            other => events.push(other),
        }
    }

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    html
}

fn highlight_block(code: &str, lang: Option<&str>) -> String {
    let (syntaxes, theme) = syntax_assets();
    let syntax = lang
        .and_then(|token| syntaxes.find_syntax_by_token(token))
        .unwrap_or_else(|| syntaxes.find_syntax_plain_text());
    highlighted_html_for_string(code, syntaxes, syntax, theme)
        .unwrap_or_else(|_| format!("<pre><code>{}</code></pre>", escape(code)))
}

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page(title: &str, depth: usize, crumbs: &str, content: &str) -> String {
    let prefix = "../".repeat(depth);
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="{prefix}assets/style.css">
</head>
<body>
<main>
<nav class="crumbs">{crumbs}</nav>
{content}
<footer>Generated by loko</footer>
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn tags_html(tags: &[String]) -> String {
    tags.iter().map(|t| format!(r#"<span class="tag">{}</span>"#, escape(t))).collect()
}

fn diagram_img(depth: usize, system_id: &str, diagram_id: &str) -> String {
    let prefix = "../".repeat(depth);
    format!(
        r#"<img class="diagram" src="{prefix}diagrams/{system_id}/{diagram_id}.svg" alt="{diagram_id} diagram">"#
    )
}

/// Relationships of one node, rendered as a table.
fn relationships_html(graph: &ArchitectureGraph, id: &str) -> String {
    let outgoing = graph.outgoing_edges(id);
    let incoming = graph.incoming_edges(id);
    if outgoing.is_empty() && incoming.is_empty() {
        return String::new();
    }
    let mut out = String::from("<h2>Relationships</h2>\n<table>\n<tr><th></th><th>Element</th><th>Type</th></tr>\n");
    for edge in outgoing {
        out.push_str(&format!(
            "<tr><td>→</td><td><code>{}</code></td><td>{}</td></tr>\n",
            escape(&edge.target),
            escape(&edge.kind)
        ));
    }
    for edge in incoming {
        out.push_str(&format!(
            "<tr><td>←</td><td><code>{}</code></td><td>{}</td></tr>\n",
            escape(&edge.source),
            escape(&edge.kind)
        ));
    }
    out.push_str("</table>\n");
    out
}

pub struct HtmlSiteBuilder;

impl HtmlSiteBuilder {
    pub fn new() -> Self {
        HtmlSiteBuilder
    }

    async fn write(&self, path: &Path, text: String, files: &mut Vec<PathBuf>) -> Result<()> {
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

    fn index_page(&self, project: &Project, systems: &[System]) -> String {
        let mut content = format!("<h1>{}</h1>\n", escape(&project.name));
        if !project.description.is_empty() {
            content.push_str(&format!("<p>{}</p>\n", escape(&project.description)));
        }
        content.push_str("<h2>Systems</h2>\n<table>\n<tr><th>System</th><th>Description</th><th>Tags</th></tr>\n");
        for system in systems {
            content.push_str(&format!(
                "<tr><td><a href=\"systems/{id}.html\">{name}</a></td><td>{desc}</td><td>{tags}</td></tr>\n",
                id = system.id,
                name = escape(&system.name),
                desc = escape(&system.description),
                tags = tags_html(&system.tags),
            ));
        }
        content.push_str("</table>\n");
        page(&project.name, 0, &escape(&project.name), &content)
    }

    fn system_page(&self, project: &Project, system: &System, graph: &ArchitectureGraph) -> String {
        let mut content = format!("<h1>{}</h1>\n", escape(&system.name));
        content.push_str(&tags_html(&system.tags));
        if let Some(diagram) = &system.diagram {
            content.push_str(&diagram_img(1, &system.id, &diagram.id));
        }
        content.push_str(&markdown_to_html(&system.body));
        content.push_str("<h2>Containers</h2>\n<table>\n<tr><th>Container</th><th>Technology</th><th>Description</th></tr>\n");
        for container in system.containers.values() {
            content.push_str(&format!(
                "<tr><td><a href=\"{sys}/{id}.html\">{name}</a></td><td>{tech}</td><td>{desc}</td></tr>\n",
                sys = system.id,
                id = container.id,
                name = escape(&container.name),
                tech = escape(&container.technology),
                desc = escape(&container.description),
            ));
        }
        content.push_str("</table>\n");
        content.push_str(&relationships_html(graph, &system.id));

        let crumbs = format!(
            "<a href=\"../index.html\">{}</a> / {}",
            escape(&project.name),
            escape(&system.name)
        );
        page(&system.name, 1, &crumbs, &content)
    }

    fn container_page(
        &self,
        project: &Project,
        system: &System,
        container: &Container,
        graph: &ArchitectureGraph,
    ) -> String {
        let qualified = format!("{}/{}", system.id, container.id);
        let mut content = format!("<h1>{}</h1>\n", escape(&container.name));
        if !container.technology.is_empty() {
            content.push_str(&format!("<p><code>{}</code></p>\n", escape(&container.technology)));
        }
        if let Some(diagram) = &container.diagram {
            content.push_str(&diagram_img(2, &system.id, &diagram.id));
        }
        content.push_str(&markdown_to_html(&container.body));
        content.push_str("<h2>Components</h2>\n<table>\n<tr><th>Component</th><th>Technology</th><th>Description</th></tr>\n");
        for component in container.components.values() {
            content.push_str(&format!(
                "<tr><td><a href=\"{cont}/{id}.html\">{name}</a></td><td>{tech}</td><td>{desc}</td></tr>\n",
                cont = container.id,
                id = component.id,
                name = escape(&component.name),
                tech = escape(&component.technology),
                desc = escape(&component.description),
            ));
        }
        content.push_str("</table>\n");
        content.push_str(&relationships_html(graph, &qualified));

        let crumbs = format!(
            "<a href=\"../../index.html\">{}</a> / <a href=\"../{}.html\">{}</a> / {}",
            escape(&project.name),
            system.id,
            escape(&system.name),
            escape(&container.name)
        );
        page(&container.name, 2, &crumbs, &content)
    }

    fn component_page(
        &self,
        project: &Project,
        system: &System,
        container: &Container,
        component: &Component,
        graph: &ArchitectureGraph,
    ) -> String {
        let qualified = format!("{}/{}/{}", system.id, container.id, component.id);
        let mut content = format!("<h1>{}</h1>\n", escape(&component.name));
        if !component.technology.is_empty() {
            content.push_str(&format!("<p><code>{}</code></p>\n", escape(&component.technology)));
        }
        content.push_str(&tags_html(&component.tags));
        if let Some(diagram) = &component.diagram {
            content.push_str(&diagram_img(3, &system.id, &diagram.id));
        }
        content.push_str(&markdown_to_html(&component.body));
        content.push_str(&relationships_html(graph, &qualified));

        let crumbs = format!(
            "<a href=\"../../../index.html\">{}</a> / <a href=\"../../{sys}.html\">{sys_name}</a> / <a href=\"../{cont}.html\">{cont_name}</a> / {name}",
            escape(&project.name),
            sys = system.id,
            sys_name = escape(&system.name),
            cont = container.id,
            cont_name = escape(&container.name),
            name = escape(&component.name),
        );
        page(&component.name, 3, &crumbs, &content)
    }
}

impl Default for HtmlSiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteBuilder for HtmlSiteBuilder {
    async fn build(
        &self,
        project: &Project,
        systems: &[System],
        graph: &ArchitectureGraph,
        output: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        self.write(&output.join("assets/style.css"), STYLE_CSS.to_string(), &mut files).await?;
        self.write(&output.join("index.html"), self.index_page(project, systems), &mut files)
            .await?;

        let total = systems.len();
        for (i, system) in systems.iter().enumerate() {
            reporter.step("html", i + 1, total, &system.id);
            let sys_dir = output.join("systems");
            self.write(
                &sys_dir.join(format!("{}.html", system.id)),
                self.system_page(project, system, graph),
                &mut files,
            )
            .await?;
            for container in system.containers.values() {
                self.write(
                    &sys_dir.join(&system.id).join(format!("{}.html", container.id)),
                    self.container_page(project, system, container, graph),
                    &mut files,
                )
                .await?;
                for component in container.components.values() {
                    self.write(
                        &sys_dir
                            .join(&system.id)
                            .join(&container.id)
                            .join(format!("{}.html", component.id)),
                        self.component_page(project, system, container, component, graph),
                        &mut files,
                    )
                    .await?;
                }
            }
        }
        Ok(files)
    }
}
