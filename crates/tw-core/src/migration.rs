//! Migration steps and the target selector.
//!
//! A [`MigrationSet`] is the ordered, immutable list of steps the engine
//! walks. Position in the set is the authoritative identity of a step; the
//! name is only a lookup convenience. Steps are validated when the set is
//! built so malformed entries never reach a transaction.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One reversible schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationStep {
    /// Unique, human-readable name
    pub name: String,

    /// SQL applied when moving forward past this step
    pub up: String,

    /// SQL applied when rolling this step back
    pub down: String,
}

impl MigrationStep {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, up: impl Into<String>, down: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Validated, ordered sequence of migration steps.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    steps: Vec<MigrationStep>,
    by_name: HashMap<String, usize>,
}

impl MigrationSet {
    /// Build a set, rejecting blank fields and duplicate names.
    pub fn new(steps: Vec<MigrationStep>) -> CoreResult<Self> {
        let mut by_name = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            for (field, value) in [("name", &step.name), ("up", &step.up), ("down", &step.down)] {
                if value.trim().is_empty() {
                    return Err(CoreError::InvalidMigrationStep {
                        position,
                        reason: format!("'{field}' must not be empty"),
                    });
                }
            }
            if step.name.trim().parse::<i64>().is_ok() || step.name.eq_ignore_ascii_case("latest") {
                return Err(CoreError::InvalidMigrationStep {
                    position,
                    reason: format!("name '{}' is reserved for target selection", step.name),
                });
            }
            if let Some(first) = by_name.insert(step.name.clone(), position) {
                return Err(CoreError::DuplicateMigrationName {
                    name: step.name.clone(),
                    first,
                    second: position,
                });
            }
        }
        Ok(Self { steps, by_name })
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the set holds no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at `index`, if any. Negative indices return `None`.
    pub fn get(&self, index: i64) -> Option<&MigrationStep> {
        usize::try_from(index).ok().and_then(|i| self.steps.get(i))
    }

    /// Position of the step called `name`.
    pub fn index_of(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).map(|&i| i as i64)
    }

    /// Highest valid position: `len - 1`, or `-1` for an empty set.
    pub fn latest_index(&self) -> i64 {
        self.steps.len() as i64 - 1
    }

    /// Iterate steps in order.
    pub fn iter(&self) -> impl Iterator<Item = &MigrationStep> {
        self.steps.iter()
    }

    /// Borrow the steps as a slice.
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }
}

/// Read a raw list of steps from a YAML file without validating it.
pub(crate) fn read_steps_file(path: &Path) -> CoreResult<Vec<MigrationStep>> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| CoreError::MigrationFileParseError {
        path: path.display().to_string(),
        details: e.to_string(),
    })
}

/// Where a migration run should end up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MigrationTarget {
    /// Apply every step
    #[default]
    Latest,
    /// The step with this name
    Name(String),
    /// An explicit position; `-1` means nothing applied
    Index(i64),
}

impl fmt::Display for MigrationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationTarget::Latest => write!(f, "latest"),
            MigrationTarget::Name(name) => write!(f, "{name}"),
            MigrationTarget::Index(index) => write!(f, "{index}"),
        }
    }
}

impl FromStr for MigrationTarget {
    type Err = std::convert::Infallible;

    /// Integers parse as positions, `latest` as [`MigrationTarget::Latest`],
    /// anything else as a step name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("latest") {
            return Ok(MigrationTarget::Latest);
        }
        Ok(match trimmed.parse::<i64>() {
            Ok(index) => MigrationTarget::Index(index),
            Err(_) => MigrationTarget::Name(trimmed.to_string()),
        })
    }
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
