//! Project configuration as persisted in `loko.toml`

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Full project configuration with the built-in defaults of every section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub paths: PathsConfig,
    pub project: ProjectSection,
    pub d2: D2Config,
    pub outputs: OutputsConfig,
    pub build: BuildConfig,
    pub server: ServerConfig,
    pub api: ApiConfig,
    /// Custom command aliases: name -> replacement argv (string or list).
    pub aliases: BTreeMap<String, Alias>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub source: String,
    pub output: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig { source: "./src".to_string(), output: "./dist".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub name: String,
    pub description: String,
    pub version: String,
    pub template: String,
}

impl Default for ProjectSection {
    fn default() -> Self {
        ProjectSection {
            name: String::new(),
            description: String::new(),
            version: "0.1.0".to_string(),
            template: "standard-3layer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct D2Config {
    pub theme: String,
    pub layout: String,
    pub cache: bool,
}

impl Default for D2Config {
    fn default() -> Self {
        D2Config {
            theme: "neutral-default".to_string(),
            layout: "elk".to_string(),
            cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsConfig {
    pub html: bool,
    pub markdown: bool,
    pub pdf: bool,
}

impl Default for OutputsConfig {
    fn default() -> Self {
        OutputsConfig { html: true, markdown: false, pdf: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub parallel: bool,
    pub max_workers: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig { parallel: true, max_workers: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub serve_port: u16,
    pub api_port: u16,
    pub hot_reload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { serve_port: 8080, api_port: 8081, hot_reload: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Requests per minute per client IP. 0 disables rate limiting.
    pub rate_limit: u32,
    pub allowed_origins: Vec<String>,
    /// Request timeout, humantime syntax ("30s").
    pub timeout: String,
    pub enable_swagger: bool,
    /// Bearer token; auth is enforced only when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            rate_limit: 0,
            allowed_origins: vec!["http://localhost:*".to_string()],
            timeout: "30s".to_string(),
            enable_swagger: true,
            key: None,
        }
    }
}

impl ApiConfig {
    /// Parsed request timeout, falling back to the default on bad input.
    pub fn request_timeout(&self) -> Duration {
        humantime::parse_duration(&self.timeout).unwrap_or(Duration::from_secs(30))
    }
}

/// An alias expands to either a single string or an argv list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Alias {
    Single(String),
    Argv(Vec<String>),
}

impl Alias {
    /// The argv form, splitting single-string aliases on whitespace.
    pub fn to_argv(&self) -> Vec<String> {
        match self {
            Alias::Single(s) => s.split_whitespace().map(|w| w.to_string()).collect(),
            Alias::Argv(v) => v.clone(),
        }
    }
}
