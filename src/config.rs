//! Layered configuration: built-in defaults, a per-user file and a
//! per-repository file, merged table by table.

use error_set::error_set;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

error_set! {
    /// Errors from loading configuration files
    ConfigError := {
        #[display("Failed to read config {path}: {message}")]
        Read { path: String, message: String },
        #[display("Invalid config {path}: {message}")]
        Parse { path: String, message: String },
    }
}

/// Name of the per-repository config file
pub const REPO_CONFIG_FILE: &str = ".line-stager.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub diff: DiffConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitConfig {
    /// Executable used for every git invocation
    #[serde(default = "default_program")]
    pub program: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiffConfig {
    /// Unchanged lines shown around each change
    #[serde(default = "default_context_lines")]
    pub context_lines: u32,
}

fn default_program() -> String {
    "git".to_string()
}

fn default_context_lines() -> u32 {
    3
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
        }
    }
}

impl Config {
    /// Load the user config (`~/.config/line-stager/config.toml`), then the
    /// repository's `.line-stager.toml`, then `extra` if given.
    ///
    /// Missing files are skipped; later files override earlier ones key by key.
    pub fn load(repo: &Path, extra: Option<&Path>) -> Result<Self, ConfigError> {
        let mut paths: Vec<PathBuf> = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("line-stager").join("config.toml"));
        }
        paths.push(repo.join(REPO_CONFIG_FILE));

        let mut layers = Vec::new();
        for path in &paths {
            if let Some(table) = read_table(path, false)? {
                layers.push(table);
            }
        }
        if let Some(path) = extra {
            layers.extend(read_table(path, true)?);
        }

        Self::from_layers(layers)
    }

    /// Merge parsed tables in order and deserialize the result
    pub fn from_layers(
        layers: impl IntoIterator<Item = toml::Table>,
    ) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for layer in layers {
            deep_merge(&mut merged, layer);
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: "<merged>".to_string(),
                message: e.to_string(),
            })
    }
}

/// Read and parse one config file. A missing file is `None` unless
/// `required` is set.
fn read_table(path: &Path, required: bool) -> Result<Option<toml::Table>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => return Ok(None),
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    debug!(path = %path.display(), "loading config");
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
