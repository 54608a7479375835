//! tw-core - Core library for Tidewater
//!
//! This crate provides the shared types used across all Tidewater
//! components: project configuration, the ordered migration step set and
//! its target selector, SQL values, and the frame formats used when
//! streaming query results.

pub mod config;
pub mod error;
pub mod frame;
pub mod migration;
pub(crate) mod serde_helpers;
pub mod value;

pub use config::{Config, DatabaseConfig, ServerConfig, StreamConfig};
pub use error::{CoreError, CoreResult};
pub use frame::{Frame, FrameFormat, FrameKind};
pub use migration::{MigrationSet, MigrationStep, MigrationTarget};
pub use value::SqlValue;
