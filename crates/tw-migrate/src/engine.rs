//! Transactional migration engine.
//!
//! [`Migrator::migrate_to`] opens one transaction, walks the ledger's
//! position one step at a time toward the requested target, records every
//! step in the audit log, updates the ledger, and commits. Any failure rolls
//! the whole delta back, so the ledger only ever shows a position that was
//! reached completely.

use crate::error::{MigrateError, MigrateResult};
use crate::ledger::{Direction, Ledger};
use serde::Serialize;
use tw_core::{MigrationSet, MigrationTarget};
use tw_db::Database;

/// One step the engine would apply or has applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub index: i64,
    pub name: String,
    pub direction: Direction,
    /// The change executed for this direction
    pub sql: String,
}

/// Result of a committed [`Migrator::migrate_to`] call.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub target_id: String,
    pub from_index: i64,
    pub to_index: i64,
    pub applied: Vec<PlannedStep>,
}

impl MigrationOutcome {
    /// True when no step had to run.
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Position of a target relative to the configured steps.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub target_id: String,
    pub current_index: i64,
    pub current_name: Option<String>,
    pub total_steps: usize,
    pub pending: usize,
}

/// Applies a [`MigrationSet`] to one target through a [`Database`].
///
/// Not safe to run concurrently against the same target: callers make sure
/// a single process migrates before any worker starts.
pub struct Migrator<'a> {
    db: &'a dyn Database,
    steps: &'a MigrationSet,
    target_id: String,
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a dyn Database, steps: &'a MigrationSet, target_id: impl Into<String>) -> Self {
        Self {
            db,
            steps,
            target_id: target_id.into(),
        }
    }

    /// Ledger key this migrator writes to.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Turn a target selector into a position in `[-1, latest]`.
    ///
    /// A name that matches no step resolves to `latest`.
    pub fn resolve_target(&self, target: &MigrationTarget) -> MigrateResult<i64> {
        let latest = self.steps.latest_index();
        match target {
            MigrationTarget::Latest => Ok(latest),
            MigrationTarget::Name(name) => match self.steps.index_of(name) {
                Some(index) => Ok(index),
                None => {
                    log::warn!(
                        "Unknown migration target '{name}', migrating to latest ({latest})"
                    );
                    Ok(latest)
                }
            },
            MigrationTarget::Index(index) if (-1..=latest).contains(index) => Ok(*index),
            MigrationTarget::Index(index) => Err(MigrateError::TargetOutOfRange {
                index: *index,
                latest,
            }),
        }
    }

    /// Steps needed to move from position `from` to position `to`.
    ///
    /// Backward moves run `down` from `from` to `to + 1` in descending order;
    /// forward moves run `up` from `from + 1` to `to` in ascending order.
    pub fn plan_between(&self, from: i64, to: i64) -> MigrateResult<Vec<PlannedStep>> {
        if from > self.steps.latest_index() {
            return Err(MigrateError::LedgerAhead {
                target_id: self.target_id.clone(),
                index: from,
                available: self.steps.len(),
            });
        }

        let (indices, direction): (Vec<i64>, Direction) = if from > to {
            (((to + 1)..=from).rev().collect(), Direction::Down)
        } else {
            (((from + 1)..=to).collect(), Direction::Up)
        };

        indices
            .into_iter()
            .map(|index| {
                let step = self.steps.get(index).ok_or(MigrateError::TargetOutOfRange {
                    index,
                    latest: self.steps.latest_index(),
                })?;
                let sql = match direction {
                    Direction::Up => &step.up,
                    Direction::Down => &step.down,
                };
                Ok(PlannedStep {
                    index,
                    name: step.name.clone(),
                    direction,
                    sql: sql.clone(),
                })
            })
            .collect()
    }

    /// Steps [`migrate_to`](Self::migrate_to) would apply right now, without
    /// changing anything.
    pub async fn plan(&self, target: &MigrationTarget) -> MigrateResult<Vec<PlannedStep>> {
        let to = self.resolve_target(target)?;
        let from = self.current_index().await?;
        self.plan_between(from, to)
    }

    /// Current position and pending step count. Read-only.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let ledger = Ledger::new(self.db);
        let entry = if ledger.storage_exists().await? {
            ledger.read(&self.target_id).await?
        } else {
            None
        };
        let (current_index, current_name) = entry
            .map(|e| (e.latest_index, e.latest_name))
            .unwrap_or((-1, None));
        let pending = usize::try_from(self.steps.latest_index() - current_index).unwrap_or(0);
        Ok(MigrationStatus {
            target_id: self.target_id.clone(),
            current_index,
            current_name,
            total_steps: self.steps.len(),
            pending,
        })
    }

    /// Move the target to `target` atomically.
    ///
    /// Requesting the current position commits without running any step.
    /// On failure the transaction is rolled back and the original error is
    /// returned; the ledger keeps its previous position.
    pub async fn migrate_to(&self, target: &MigrationTarget) -> MigrateResult<MigrationOutcome> {
        let to = self.resolve_target(target)?;

        self.db.begin().await?;
        let outcome = match self.apply(to).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.rollback_after(&err).await;
                return Err(err);
            }
        };
        if let Err(err) = self.db.commit().await {
            let err = MigrateError::from(err);
            self.rollback_after(&err).await;
            return Err(err);
        }

        if outcome.is_noop() {
            log::info!(
                "Target '{}' already at migration {}",
                self.target_id,
                outcome.to_index
            );
        } else {
            log::info!(
                "Migrated '{}' from {} to {} ({} steps)",
                self.target_id,
                outcome.from_index,
                outcome.to_index,
                outcome.applied.len()
            );
        }
        Ok(outcome)
    }

    async fn apply(&self, to: i64) -> MigrateResult<MigrationOutcome> {
        let ledger = Ledger::new(self.db);
        ledger.ensure_storage().await?;
        let entry = ledger.create_if_absent(&self.target_id).await?;
        let from = entry.latest_index;

        if let Some(step) = self.steps.get(from) {
            if entry.latest_name.as_deref() != Some(step.name.as_str()) {
                log::warn!(
                    "Ledger for '{}' names {:?} at position {from}, configured step is '{}'",
                    self.target_id,
                    entry.latest_name,
                    step.name
                );
            }
        }

        let plan = self.plan_between(from, to)?;
        for step in &plan {
            log::debug!(
                "Applying migration {} '{}' ({})",
                step.index,
                step.name,
                step.direction
            );
            if let Err(err) = self.db.execute_batch(&step.sql).await {
                log::error!(
                    "Migration {} '{}' ({}) failed for '{}': {err}",
                    step.index,
                    step.name,
                    step.direction,
                    self.target_id
                );
                return Err(err.into());
            }
            ledger
                .append_audit(
                    &self.target_id,
                    step.index,
                    &step.name,
                    step.direction,
                    &step.sql,
                )
                .await?;
        }

        let latest_name = self.steps.get(to).map(|s| s.name.as_str());
        ledger.commit(&self.target_id, to, latest_name).await?;

        Ok(MigrationOutcome {
            target_id: self.target_id.clone(),
            from_index: from,
            to_index: to,
            applied: plan,
        })
    }

    async fn current_index(&self) -> MigrateResult<i64> {
        let ledger = Ledger::new(self.db);
        if !ledger.storage_exists().await? {
            return Ok(-1);
        }
        Ok(ledger
            .read(&self.target_id)
            .await?
            .map_or(-1, |entry| entry.latest_index))
    }

    async fn rollback_after(&self, cause: &MigrateError) {
        if let Err(rollback_err) = self.db.rollback().await {
            log::warn!(
                "Rollback of '{}' failed after error ({cause}): {rollback_err}",
                self.target_id
            );
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
