//! Runtime context for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tw_core::{Config, MigrationSet};
use tw_db::{Database, DuckDbBackend};
use tw_migrate::Migrator;

use crate::cli::GlobalArgs;

/// Runtime context containing the loaded project and database connection
pub struct RuntimeContext {
    /// Parsed and validated configuration
    pub config: Config,

    /// Ordered migration steps
    pub steps: MigrationSet,

    /// Database connection
    pub db: Arc<dyn Database>,
}

impl RuntimeContext {
    /// Create a new runtime context from global arguments
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&args.project_dir);

        let config = if let Some(config_path) = &args.config {
            Config::load(Path::new(config_path)).context("Failed to load configuration file")?
        } else {
            Config::load_from_dir(&root).context("Failed to load project configuration")?
        };

        let steps = config
            .migration_set(&root)
            .context("Failed to load migration steps")?;

        let db_path = config.database_path(&root);
        log::debug!("Opening database at {db_path}");
        let db: Arc<dyn Database> =
            Arc::new(DuckDbBackend::new(&db_path).context("Failed to connect to database")?);

        Ok(Self {
            config,
            steps,
            db,
        })
    }

    /// Migrator for the configured target
    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(self.db.as_ref(), &self.steps, self.config.target_id())
    }
}
