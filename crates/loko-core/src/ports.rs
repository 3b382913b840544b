//! Ports: the interfaces the core depends on
//!
//! Adapters live in the loko-store, loko-render and loko-watcher crates;
//! tests substitute in-memory doubles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::component::Component;
use crate::container::Container;
use crate::diagram::DiagramFormat;
use crate::graph::ArchitectureGraph;
use crate::project::Project;
use crate::relationship::{D2Relationship, Relationship};
use crate::system::System;

/// Structured progress emitted by long-running use cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Progress {
    Step { step: String, current: usize, total: usize, message: String },
    Info(String),
    Success(String),
    Error(String),
}

/// Sink for progress events; the delivery layer renders them.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: Progress);

    fn info(&self, message: &str) {
        self.report(Progress::Info(message.to_string()));
    }

    fn success(&self, message: &str) {
        self.report(Progress::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.report(Progress::Error(message.to_string()));
    }

    fn step(&self, step: &str, current: usize, total: usize, message: &str) {
        self.report(Progress::Step {
            step: step.to_string(),
            current,
            total,
            message: message.to_string(),
        });
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, _event: Progress) {}
}

/// Persistence of the project tree. The filesystem is the authoritative
/// store; implementations never delete files the user may have edited.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Read root configuration; the returned project has no systems loaded.
    async fn load_project(&self, root: &Path) -> Result<Project>;

    /// Load every system with its containers and components.
    async fn list_systems(&self, root: &Path) -> Result<Vec<System>>;

    /// Cross-cutting relationships persisted at the project root.
    async fn load_relationships(&self, root: &Path) -> Result<Vec<Relationship>>;

    async fn save_project(&self, project: &Project) -> Result<Vec<PathBuf>>;

    async fn save_system(&self, root: &Path, system: &System) -> Result<Vec<PathBuf>>;

    async fn save_container(
        &self,
        root: &Path,
        system_id: &str,
        container: &Container,
    ) -> Result<Vec<PathBuf>>;

    async fn save_component(
        &self,
        root: &Path,
        system_id: &str,
        container_id: &str,
        component: &Component,
    ) -> Result<Vec<PathBuf>>;

    /// Overwrite a single diagram source file (used when a parent diagram is
    /// regenerated after scaffolding a child).
    async fn write_diagram(&self, path: &Path, source: &str) -> Result<()>;
}

/// Result of syntactically parsing one D2 source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct D2Document {
    pub relationships: Vec<D2Relationship>,
    /// Node ID -> tooltip text.
    pub tooltips: HashMap<String, String>,
}

/// Syntactic D2 parser; extraction only, no rendering.
pub trait D2Parser: Send + Sync {
    fn parse(&self, source: &str) -> Result<D2Document>;

    fn parse_relationships(&self, source: &str) -> Result<Vec<D2Relationship>> {
        Ok(self.parse(source)?.relationships)
    }
}

/// Renders D2 source to an image file.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn render(
        &self,
        source: &str,
        output: &Path,
        format: DiagramFormat,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn is_available(&self) -> bool;
}

/// Builds the HTML site from the loaded model.
#[async_trait]
pub trait SiteBuilder: Send + Sync {
    async fn build(
        &self,
        project: &Project,
        systems: &[System],
        graph: &ArchitectureGraph,
        output: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<PathBuf>>;
}

/// Builds consolidated and per-system Markdown documents.
#[async_trait]
pub trait MarkdownBuilder: Send + Sync {
    async fn build(
        &self,
        project: &Project,
        systems: &[System],
        graph: &ArchitectureGraph,
        output: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<PathBuf>>;
}

/// Renders the built site to PDF through an external tool.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn render(&self, site_dir: &Path, output: &Path, cancel: &CancellationToken) -> Result<()>;

    /// Shown when PDF was explicitly requested but the tool is missing.
    fn install_instructions(&self) -> String;
}

/// Serialises the architecture for machine consumption (JSON, TOML, TOON).
pub trait OutputEncoder: Send + Sync {
    fn encode(&self, project: &Project, graph: &ArchitectureGraph) -> Result<String>;

    /// File extension without the dot.
    fn extension(&self) -> &'static str;
}

/// Renders named templates with a JSON context.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String>;

    fn has_template(&self, template: &str) -> bool;
}

/// Enumerates the scaffold templates visible through the layered search paths.
pub trait TemplateRegistry: Send + Sync {
    fn names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }
}

/// A filesystem change observed by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

/// Source of watch events for the project tree.
#[async_trait]
pub trait FileWatcher: Send + Sync {
    async fn watch(&mut self, root: &Path) -> Result<()>;

    /// Next event, or `None` when the stream has closed.
    async fn next_event(&mut self) -> Option<WatchEvent>;
}
