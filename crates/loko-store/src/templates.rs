//! Template engine with layered search paths
//!
//! Resolution order, lowest to highest: built-in templates, the XDG
//! templates directory, `LOKO_TEMPLATE_DIR`, the project-local `templates/`
//! directory. Later layers override earlier ones by template name.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tera::Tera;

use loko_core::{TemplateEngine, TemplateRegistry};

use crate::config::ConfigEnv;

/// Built-in `standard-3layer` scaffold templates.
mod builtin {
    pub const SYSTEM_MD: &str = r#"# {{ name }}

{{ description }}

## Responsibilities

- TBD

## Containers

_Scaffold containers with `loko new container <name> --parent {{ id }}`._

## Notes
"#;

    pub const CONTAINER_MD: &str = r#"# {{ name }}

{{ description }}

**Technology:** {{ technology }}

## Components

_Scaffold components with `loko new component <name> --parent {{ system }}/{{ id }}`._

## Notes
"#;

    pub const COMPONENT_GENERIC_MD: &str = r#"# {{ name }}

{{ description }}

**Technology:** {{ technology }}

## Interface

## Notes
"#;

    pub const COMPONENT_COMPUTE_MD: &str = r#"# {{ name }}

{{ description }}

**Technology:** {{ technology }}

## Runtime

- Entry point:
- Timeout / memory:

## Scaling

## Notes
"#;

    pub const COMPONENT_DATASTORE_MD: &str = r#"# {{ name }}

{{ description }}

**Technology:** {{ technology }}

## Schema

| Attribute | Type | Notes |
|---|---|---|

## Access patterns

## Notes
"#;

    pub const COMPONENT_MESSAGING_MD: &str = r#"# {{ name }}

{{ description }}

**Technology:** {{ technology }}

## Message contract

## Producers / consumers

## Notes
"#;

    pub const COMPONENT_API_MD: &str = r#"# {{ name }}

{{ description }}

**Technology:** {{ technology }}

## Endpoints

| Method | Path | Description |
|---|---|---|

## Notes
"#;

    pub const COMPONENT_EVENT_MD: &str = r#"# {{ name }}

{{ description }}

**Technology:** {{ technology }}

## Trigger

## Targets

## Notes
"#;

    pub const COMPONENT_STORAGE_MD: &str = r#"# {{ name }}

{{ description }}

**Technology:** {{ technology }}

## Layout

## Lifecycle / retention

## Notes
"#;

    pub const SYSTEM_D2: &str = r#"{{ id }}: {
  label: "{{ name }}"
}
"#;

    pub const CONTAINER_D2: &str = r#"{{ id }}: {
  label: "{{ name }}"
}
"#;

    pub const COMPONENT_D2: &str = r#"{{ id }}: {
  label: "{{ name }}"
  tooltip: "{{ description }}"
}
"#;

    pub const ALL: &[(&str, &str)] = &[
        ("system.md", SYSTEM_MD),
        ("container.md", CONTAINER_MD),
        ("component-generic.md", COMPONENT_GENERIC_MD),
        ("component-compute.md", COMPONENT_COMPUTE_MD),
        ("component-datastore.md", COMPONENT_DATASTORE_MD),
        ("component-messaging.md", COMPONENT_MESSAGING_MD),
        ("component-api.md", COMPONENT_API_MD),
        ("component-event.md", COMPONENT_EVENT_MD),
        ("component-storage.md", COMPONENT_STORAGE_MD),
        ("system.d2", SYSTEM_D2),
        ("container.d2", CONTAINER_D2),
        ("component.d2", COMPONENT_D2),
    ];
}

/// The layered directories a project resolves templates from.
#[derive(Debug, Clone, Default)]
pub struct TemplateSearchPaths {
    /// Lowest to highest precedence.
    pub dirs: Vec<PathBuf>,
}

impl TemplateSearchPaths {
    /// Standard layering for a project root.
    pub fn for_project(root: &Path, env: &ConfigEnv) -> Self {
        let mut dirs = Vec::new();
        if let Some(home) = env.config_home() {
            dirs.push(home.join("templates"));
        }
        if let Some(extra) = env.template_dir() {
            dirs.push(extra);
        }
        dirs.push(root.join("templates"));
        TemplateSearchPaths { dirs }
    }
}

/// Tera-backed implementation of the `TemplateEngine` port.
pub struct TeraTemplateEngine {
    tera: Mutex<Tera>,
}

impl TeraTemplateEngine {
    /// Built-ins only.
    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();
        for (name, source) in builtin::ALL {
            tera.add_raw_template(name, source)
                .with_context(|| format!("builtin template {name}"))?;
        }
        Ok(TeraTemplateEngine { tera: Mutex::new(tera) })
    }

    /// Built-ins plus every `.md`/`.d2` file found in the search paths;
    /// later directories override earlier ones and the built-ins.
    pub fn with_search_paths(paths: &TemplateSearchPaths) -> Result<Self> {
        let engine = Self::builtin()?;
        {
            let mut tera = engine.tera.lock().expect("template engine lock");
            for dir in &paths.dirs {
                if !dir.is_dir() {
                    continue;
                }
                let mut files = Vec::new();
                collect_template_files(dir, dir, &mut files);
                files.sort();
                for (name, path) in files {
                    let source = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading template {}", path.display()))?;
                    tera.add_raw_template(&name, &source)
                        .with_context(|| format!("template {}", path.display()))?;
                }
            }
        }
        Ok(engine)
    }
}

/// Collect template files, named by their path relative to the layer root.
fn collect_template_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_template_files(root, &path, out);
            continue;
        }
        let is_template = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("d2") | Some("html")
        );
        if !is_template {
            continue;
        }
        if let Ok(rel) = path.strip_prefix(root) {
            let name = rel.to_string_lossy().replace('\\', "/");
            out.push((name, path));
        }
    }
}

impl TemplateEngine for TeraTemplateEngine {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String> {
        let tera = self.tera.lock().expect("template engine lock");
        let context = tera::Context::from_serialize(context).context("template context")?;
        tera.render(template, &context)
            .with_context(|| format!("rendering template {template}"))
    }

    fn has_template(&self, template: &str) -> bool {
        let tera = self.tera.lock().expect("template engine lock");
        let found = tera.get_template_names().any(|n| n == template);
        found
    }
}

impl TemplateRegistry for TeraTemplateEngine {
    fn names(&self) -> Vec<String> {
        let tera = self.tera.lock().expect("template engine lock");
        let mut names: Vec<String> = tera.get_template_names().map(|n| n.to_string()).collect();
        names.sort();
        names
    }
}
