//! Durable migration position and audit log.
//!
//! The ledger holds one row per target. Every mutating call here is meant to
//! run inside the transaction opened by the engine, so the position and the
//! audit rows describing how it was reached become visible together.

use crate::ddl::{AUDIT_TABLE, LEDGER_DDL, LEDGER_TABLE, META_SCHEMA};
use crate::error::{MigrateError, MigrateResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tw_core::SqlValue;
use tw_db::Database;

/// Direction a step was applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(MigrateError::CorruptLedger(format!(
                "unknown direction '{other}'"
            ))),
        }
    }
}

/// Current position of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub target_id: String,
    /// `-1` when nothing has been applied
    pub latest_index: i64,
    pub latest_name: Option<String>,
}

/// One applied step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub id: i64,
    pub target_id: String,
    pub applied_at: DateTime<Utc>,
    pub name: String,
    pub direction: Direction,
    /// The literal change that was executed
    pub query: String,
    pub index: i64,
}

/// Ledger and audit storage accessed through a [`Database`].
pub struct Ledger<'a> {
    db: &'a dyn Database,
}

impl<'a> Ledger<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Create the ledger and audit tables if missing.
    pub async fn ensure_storage(&self) -> MigrateResult<()> {
        self.db.execute_batch(LEDGER_DDL).await?;
        Ok(())
    }

    /// Whether the ledger tables have been created yet.
    pub async fn storage_exists(&self) -> MigrateResult<bool> {
        let rows = self
            .db
            .query_rows(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = ? AND table_name IN ('migration_ledger', 'migration_audit')",
                &[SqlValue::from(META_SCHEMA)],
            )
            .await?;
        let count = rows.first().and_then(|r| r.first()).and_then(SqlValue::as_i64);
        Ok(count == Some(2))
    }

    /// Read the entry for `target_id`, if one exists.
    pub async fn read(&self, target_id: &str) -> MigrateResult<Option<LedgerEntry>> {
        let rows = self
            .db
            .query_rows(
                &format!(
                    "SELECT target_id, latest_index, latest_name FROM {LEDGER_TABLE} WHERE target_id = ?"
                ),
                &[SqlValue::from(target_id)],
            )
            .await?;
        rows.first().map(|row| decode_entry(row)).transpose()
    }

    /// Read the entry for `target_id`, inserting one at position `-1` first
    /// if it does not exist. Idempotent.
    pub async fn create_if_absent(&self, target_id: &str) -> MigrateResult<LedgerEntry> {
        if let Some(entry) = self.read(target_id).await? {
            return Ok(entry);
        }
        self.db
            .execute_params(
                &format!(
                    "INSERT INTO {LEDGER_TABLE} (target_id, latest_index, latest_name) VALUES (?, -1, NULL)"
                ),
                &[SqlValue::from(target_id)],
            )
            .await?;
        log::debug!("Created migration ledger entry for '{target_id}'");
        Ok(LedgerEntry {
            target_id: target_id.to_string(),
            latest_index: -1,
            latest_name: None,
        })
    }

    /// Record the new position for `target_id`.
    pub async fn commit(
        &self,
        target_id: &str,
        latest_index: i64,
        latest_name: Option<&str>,
    ) -> MigrateResult<()> {
        let updated = self
            .db
            .execute_params(
                &format!(
                    "UPDATE {LEDGER_TABLE} SET latest_index = ?, latest_name = ? WHERE target_id = ?"
                ),
                &[
                    SqlValue::Integer(latest_index),
                    SqlValue::from(latest_name),
                    SqlValue::from(target_id),
                ],
            )
            .await?;
        if updated != 1 {
            return Err(MigrateError::CorruptLedger(format!(
                "expected one ledger row for '{target_id}', updated {updated}"
            )));
        }
        Ok(())
    }

    /// Append one audit row.
    pub async fn append_audit(
        &self,
        target_id: &str,
        index: i64,
        name: &str,
        direction: Direction,
        query: &str,
    ) -> MigrateResult<()> {
        self.db
            .execute_params(
                &format!(
                    "INSERT INTO {AUDIT_TABLE} (target_id, name, direction, query, step_index) \
                     VALUES (?, ?, ?, ?, ?)"
                ),
                &[
                    SqlValue::from(target_id),
                    SqlValue::from(name),
                    SqlValue::from(direction.as_str()),
                    SqlValue::from(query),
                    SqlValue::Integer(index),
                ],
            )
            .await?;
        Ok(())
    }

    /// Audit records for `target_id` in the order they were written.
    ///
    /// Returns an empty list when the ledger tables do not exist yet.
    pub async fn history(&self, target_id: &str) -> MigrateResult<Vec<AuditRecord>> {
        if !self.storage_exists().await? {
            return Ok(Vec::new());
        }
        let rows = self
            .db
            .query_rows(
                &format!(
                    "SELECT id, target_id, epoch_ms(applied_at), name, direction, query, step_index \
                     FROM {AUDIT_TABLE} WHERE target_id = ? ORDER BY id"
                ),
                &[SqlValue::from(target_id)],
            )
            .await?;
        rows.iter().map(|row| decode_audit(row)).collect()
    }
}

fn decode_entry(row: &[SqlValue]) -> MigrateResult<LedgerEntry> {
    Ok(LedgerEntry {
        target_id: text_at(row, 0, "target_id")?,
        latest_index: int_at(row, 1, "latest_index")?,
        latest_name: optional_text_at(row, 2, "latest_name")?,
    })
}

fn decode_audit(row: &[SqlValue]) -> MigrateResult<AuditRecord> {
    let millis = int_at(row, 2, "applied_at")?;
    let applied_at = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        MigrateError::CorruptLedger(format!("applied_at {millis} is out of range"))
    })?;
    Ok(AuditRecord {
        id: int_at(row, 0, "id")?,
        target_id: text_at(row, 1, "target_id")?,
        applied_at,
        name: text_at(row, 3, "name")?,
        direction: text_at(row, 4, "direction")?.parse()?,
        query: text_at(row, 5, "query")?,
        index: int_at(row, 6, "step_index")?,
    })
}

fn int_at(row: &[SqlValue], idx: usize, column: &str) -> MigrateResult<i64> {
    row.get(idx)
        .and_then(SqlValue::as_i64)
        .ok_or_else(|| MigrateError::CorruptLedger(format!("column '{column}' is not an integer")))
}

fn text_at(row: &[SqlValue], idx: usize, column: &str) -> MigrateResult<String> {
    optional_text_at(row, idx, column)?
        .ok_or_else(|| MigrateError::CorruptLedger(format!("column '{column}' is null")))
}

fn optional_text_at(row: &[SqlValue], idx: usize, column: &str) -> MigrateResult<Option<String>> {
    match row.get(idx) {
        Some(SqlValue::Null) => Ok(None),
        Some(SqlValue::Text(s)) => Ok(Some(s.clone())),
        _ => Err(MigrateError::CorruptLedger(format!(
            "column '{column}' is not text"
        ))),
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
