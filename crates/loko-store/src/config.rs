//! Layered configuration loading
//!
//! Precedence, lowest to highest: built-in defaults, global XDG
//! `config.toml`, project `loko.toml`, `LOKO_*` environment variables.
//! CLI flags override on top of the result in the delivery layer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml::Value;

use loko_core::ProjectConfig;

/// Project configuration file name at the project root.
pub const PROJECT_FILE: &str = "loko.toml";

/// Environment variables that are not configuration keys.
const RESERVED_VARS: &[&str] = &["CONFIG_HOME", "TEMPLATE_DIR", "VERBOSE"];

/// Snapshot of the `LOKO_*` environment, injectable for tests.
#[derive(Debug, Clone, Default)]
pub struct ConfigEnv {
    vars: Vec<(String, String)>,
}

impl ConfigEnv {
    /// Capture `LOKO_*` variables from the process environment.
    pub fn from_process() -> Self {
        let vars = std::env::vars()
            .filter_map(|(k, v)| k.strip_prefix("LOKO_").map(|rest| (rest.to_string(), v)))
            .collect();
        ConfigEnv { vars }
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.push((key.to_string(), value.to_string()));
        self
    }

    /// XDG config directory, honouring `LOKO_CONFIG_HOME`.
    pub fn config_home(&self) -> Option<PathBuf> {
        if let Some((_, home)) = self.vars.iter().find(|(k, _)| k == "CONFIG_HOME") {
            return Some(PathBuf::from(home));
        }
        dirs::config_dir().map(|dir| dir.join("loko"))
    }

    /// Extra template search path from `LOKO_TEMPLATE_DIR`.
    pub fn template_dir(&self) -> Option<PathBuf> {
        self.vars
            .iter()
            .find(|(k, _)| k == "TEMPLATE_DIR")
            .map(|(_, v)| PathBuf::from(v))
    }

    fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .filter(|(k, _)| !RESERVED_VARS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Load the effective configuration for a project root.
pub fn load_config(root: &Path, env: &ConfigEnv) -> Result<ProjectConfig> {
    let mut merged = Value::Table(Default::default());

    if let Some(home) = env.config_home() {
        let global = home.join("config.toml");
        if global.exists() {
            let text = std::fs::read_to_string(&global)
                .with_context(|| format!("reading {}", global.display()))?;
            let value: Value = text.parse().with_context(|| format!("parsing {}", global.display()))?;
            deep_merge(&mut merged, value);
        }
    }

    let project_file = root.join(PROJECT_FILE);
    if project_file.exists() {
        let text = std::fs::read_to_string(&project_file)
            .with_context(|| format!("reading {}", project_file.display()))?;
        let value: Value =
            text.parse().with_context(|| format!("parsing {}", project_file.display()))?;
        deep_merge(&mut merged, value);
    }

    for (key, value) in env.overrides() {
        apply_env_override(&mut merged, key, value);
    }

    // Missing keys fall back to serde defaults.
    let config: ProjectConfig = merged.try_into().context("invalid configuration")?;
    Ok(config)
}

/// Write a project configuration to `<root>/loko.toml`.
pub fn save_config(root: &Path, config: &ProjectConfig) -> Result<PathBuf> {
    let path = root.join(PROJECT_FILE);
    let text = toml::to_string_pretty(config).context("serializing configuration")?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Recursively merge `overlay` into `base`; overlay scalars win.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Apply one `LOKO_<SECTION>_<KEY>` override, e.g. `LOKO_BUILD_MAX_WORKERS=8`.
fn apply_env_override(merged: &mut Value, key: &str, value: &str) {
    let lowered = key.to_lowercase();
    let Some((section, key)) = lowered.split_once('_') else {
        tracing::warn!(var = %lowered, "ignoring LOKO_ variable without a section");
        return;
    };
    let parsed = coerce(value);
    let Value::Table(table) = merged else { return };
    let entry = table
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(Default::default()));
    if let Value::Table(section_table) = entry {
        section_table.insert(key.to_string(), parsed);
    }
}

/// Environment values are strings; coerce the obvious scalar types.
fn coerce(value: &str) -> Value {
    if let Ok(b) = value.parse::<bool>() {
        return Value::Boolean(b);
    }
    if let Ok(i) = value.parse::<i64>() {
        return Value::Integer(i);
    }
    Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn empty_env() -> ConfigEnv {
        // Point CONFIG_HOME at a throwaway dir so a developer's real global
        // config never leaks into tests.
        ConfigEnv::default().with_var("CONFIG_HOME", "/nonexistent/loko-tests")
    }

    #[test]
    fn missing_files_yield_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path(), &empty_env()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn project_file_overrides_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(PROJECT_FILE),
            "[paths]\nsource = \"./model\"\n\n[build]\nmax_workers = 8\n",
        )
        .unwrap();
        let config = load_config(tmp.path(), &empty_env()).unwrap();
        assert_eq!(config.paths.source, "./model");
        assert_eq!(config.paths.output, "./dist");
        assert_eq!(config.build.max_workers, 8);
        assert!(config.build.parallel);
    }

    #[test]
    fn env_overrides_project_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PROJECT_FILE), "[server]\napi_port = 9000\n").unwrap();
        let env = empty_env()
            .with_var("SERVER_API_PORT", "9001")
            .with_var("OUTPUTS_MARKDOWN", "true")
            .with_var("D2_THEME", "dark-mauve");
        let config = load_config(tmp.path(), &env).unwrap();
        assert_eq!(config.server.api_port, 9001);
        assert!(config.outputs.markdown);
        assert_eq!(config.d2.theme, "dark-mauve");
    }

    #[test]
    fn global_config_sits_under_project_config() {
        let tmp = TempDir::new().unwrap();
        let global_home = tmp.path().join("xdg");
        std::fs::create_dir_all(&global_home).unwrap();
        std::fs::write(
            global_home.join("config.toml"),
            "[d2]\ntheme = \"grape-soda\"\nlayout = \"dagre\"\n",
        )
        .unwrap();
        let project = tmp.path().join("proj");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join(PROJECT_FILE), "[d2]\nlayout = \"elk\"\n").unwrap();

        let env = ConfigEnv::default().with_var("CONFIG_HOME", global_home.to_str().unwrap());
        let config = load_config(&project, &env).unwrap();
        // Global provides the theme, project wins on layout.
        assert_eq!(config.d2.theme, "grape-soda");
        assert_eq!(config.d2.layout, "elk");
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let mut config = ProjectConfig::default();
        config.project.name = "demo".to_string();
        config.api.rate_limit = 250;
        save_config(tmp.path(), &config).unwrap();
        let loaded = load_config(tmp.path(), &empty_env()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn multi_word_keys_map_from_env() {
        let tmp = TempDir::new().unwrap();
        let env = empty_env().with_var("BUILD_MAX_WORKERS", "2").with_var("API_RATE_LIMIT", "60");
        let config = load_config(tmp.path(), &env).unwrap();
        assert_eq!(config.build.max_workers, 2);
        assert_eq!(config.api.rate_limit, 60);
    }
}
