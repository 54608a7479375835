//! Configuration types and parsing for tidewater.yml

use crate::error::{CoreError, CoreResult};
use crate::migration::{read_steps_file, MigrationSet, MigrationStep};
use crate::serde_helpers::default_true;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main project configuration from tidewater.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Inline migration steps, in order
    #[serde(default)]
    pub migrations: Vec<MigrationStep>,

    /// Extra YAML files holding step lists, appended after the inline steps
    /// in the order given
    #[serde(default)]
    pub migration_files: Vec<String>,

    /// Streaming pipe settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database path (":memory:" for an in-memory database)
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Ledger key for this database; defaults to the project name
    #[serde(default)]
    pub target_id: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            target_id: None,
        }
    }
}

/// Streaming pipe and request body settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    /// Bytes buffered by the pass-through pipe before a sink write
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Emit the result's leading frame (CSV header, NDJSON column list) at
    /// the start of every pipe; `false` streams rows only
    #[serde(default = "default_true")]
    pub repeat_leading_frame: bool,

    /// Frames buffered between the query producer and the pipe
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            flush_threshold: default_flush_threshold(),
            max_body_bytes: default_max_body_bytes(),
            repeat_leading_frame: true,
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Migrate to the latest step before accepting requests
    #[serde(default = "default_true")]
    pub migrate_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            migrate_on_start: true,
        }
    }
}

fn default_db_path() -> String {
    ":memory:".to_string()
}

fn default_flush_threshold() -> usize {
    65_536
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_channel_capacity() -> usize {
    16
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    ///
    /// Looks for tidewater.yml or tidewater.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("tidewater.yml");
        let yaml_path = dir.join("tidewater.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Check values serde cannot express.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "'name' must not be empty".to_string(),
            });
        }
        if self.stream.flush_threshold == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "stream.flush_threshold must be greater than zero".to_string(),
            });
        }
        if self.stream.max_body_bytes == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "stream.max_body_bytes must be greater than zero".to_string(),
            });
        }
        if self.stream.channel_capacity == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "stream.channel_capacity must be greater than zero".to_string(),
            });
        }
        if matches!(&self.database.target_id, Some(id) if id.trim().is_empty()) {
            return Err(CoreError::ConfigInvalid {
                message: "database.target_id must not be empty when set".to_string(),
            });
        }
        Ok(())
    }

    /// Ledger key for the configured database.
    pub fn target_id(&self) -> &str {
        self.database.target_id.as_deref().unwrap_or(&self.name)
    }

    /// Absolute paths of the extra migration files.
    pub fn migration_files_absolute(&self, root: &Path) -> Vec<PathBuf> {
        self.migration_files.iter().map(|p| root.join(p)).collect()
    }

    /// Database path resolved against `root`; `:memory:` passes through.
    pub fn database_path(&self, root: &Path) -> String {
        if self.database.path == ":memory:" {
            return self.database.path.clone();
        }
        root.join(&self.database.path).display().to_string()
    }

    /// Build the validated step set: inline steps first, then each file in order.
    pub fn migration_set(&self, root: &Path) -> CoreResult<MigrationSet> {
        let mut steps = self.migrations.clone();
        for path in self.migration_files_absolute(root) {
            let extra = read_steps_file(&path)?;
            log::debug!("Loaded {} migration steps from {}", extra.len(), path.display());
            steps.extend(extra);
        }
        MigrationSet::new(steps)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
