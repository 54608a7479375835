//! Versioned schema migrations for Tidewater.
//!
//! The [`Migrator`] walks an ordered [`tw_core::MigrationSet`] forward or
//! backward to a requested position inside a single transaction. Its
//! position is kept per target in a durable [`Ledger`] row, next to an
//! append-only audit log of every step applied.

pub mod ddl;
pub mod engine;
pub mod error;
pub mod ledger;

pub use engine::{MigrationOutcome, MigrationStatus, Migrator, PlannedStep};
pub use error::{MigrateError, MigrateResult};
pub use ledger::{AuditRecord, Direction, Ledger, LedgerEntry};
