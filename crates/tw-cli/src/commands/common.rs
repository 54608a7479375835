//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use serde::Serialize;

/// Human-readable ledger position, e.g. `2 (add_email)` or `-1 (nothing applied)`.
pub(crate) fn describe_position(index: i64, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("{index} ({name})"),
        None if index < 0 => format!("{index} (nothing applied)"),
        None => index.to_string(),
    }
}

/// Pretty-print `value` as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
