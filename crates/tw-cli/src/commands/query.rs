//! Query command implementation

use anyhow::{Context, Result};
use tw_core::MigrationTarget;
use tw_stream::{relay_query, RelayOptions, WriterSink};

use crate::cli::{GlobalArgs, QueryArgs};
use crate::context::RuntimeContext;

/// Execute the query command
pub async fn execute(args: &QueryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;

    if !args.no_migrate {
        let outcome = ctx
            .migrator()
            .migrate_to(&MigrationTarget::Latest)
            .await
            .context("Failed to migrate before query")?;
        if !outcome.is_noop() {
            log::info!(
                "Applied {} migration step(s) before query",
                outcome.applied.len()
            );
        }
    }

    let options = RelayOptions::from_config(&ctx.config.stream, args.format);
    let summary = relay_query(
        ctx.db.clone(),
        args.sql.clone(),
        options,
        WriterSink::new(tokio::io::stdout()),
    )
    .await
    .context("Query failed")?;

    log::debug!("{} row(s) in {} write(s)", summary.rows, summary.flushes);
    Ok(())
}
