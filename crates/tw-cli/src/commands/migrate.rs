//! Migrate command implementation

use anyhow::{Context, Result};
use tw_migrate::MigrationOutcome;

use crate::cli::{GlobalArgs, MigrateArgs};
use crate::commands::common::describe_position;
use crate::context::RuntimeContext;

/// Execute the migrate command
pub async fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let migrator = ctx.migrator();
    let target = args.to.clone().unwrap_or_default();

    if args.dry_run {
        let plan = migrator
            .plan(&target)
            .await
            .context("Failed to plan migration")?;
        if plan.is_empty() {
            println!("Dry run - '{}' is already at {target}", migrator.target_id());
            return Ok(());
        }
        println!(
            "Dry run - would apply {} step(s) to '{}':",
            plan.len(),
            migrator.target_id()
        );
        for step in &plan {
            println!("  {:>4} {:<5} {}", step.index, step.direction, step.name);
            if global.verbose {
                println!("       {}", step.sql.trim());
            }
        }
        return Ok(());
    }

    let outcome = migrator
        .migrate_to(&target)
        .await
        .with_context(|| format!("Migration to {target} failed"))?;
    print_outcome(&ctx, &outcome);
    Ok(())
}

fn print_outcome(ctx: &RuntimeContext, outcome: &MigrationOutcome) {
    let name_at = |index: i64| ctx.steps.get(index).map(|s| s.name.as_str());
    if outcome.is_noop() {
        println!(
            "'{}' already at {}",
            outcome.target_id,
            describe_position(outcome.to_index, name_at(outcome.to_index))
        );
        return;
    }

    for step in &outcome.applied {
        println!("  {:>4} {:<5} {}", step.index, step.direction, step.name);
    }
    println!(
        "Migrated '{}' from {} to {} ({} step(s))",
        outcome.target_id,
        describe_position(outcome.from_index, name_at(outcome.from_index)),
        describe_position(outcome.to_index, name_at(outcome.to_index)),
        outcome.applied.len()
    );
}
