//! History command implementation

use anyhow::{Context, Result};
use tw_migrate::Ledger;

use crate::cli::{GlobalArgs, HistoryArgs, OutputFormat};
use crate::commands::common::print_json;
use crate::context::RuntimeContext;

/// Execute the history command
pub async fn execute(args: &HistoryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let records = Ledger::new(ctx.db.as_ref())
        .history(ctx.config.target_id())
        .await
        .context("Failed to read migration history")?;

    if args.output == OutputFormat::Json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No migrations recorded for '{}'", ctx.config.target_id());
        return Ok(());
    }

    println!(
        "{:>5}  {:<20}  {:>5}  {:<5}  NAME",
        "ID", "APPLIED AT", "INDEX", "DIR"
    );
    for record in &records {
        println!(
            "{:>5}  {:<20}  {:>5}  {:<5}  {}",
            record.id,
            record.applied_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.index,
            record.direction,
            record.name
        );
        if args.show_sql {
            println!("       {}", record.query.trim());
        }
    }
    Ok(())
}
