//! Status command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{describe_position, print_json};
use crate::context::RuntimeContext;

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let status = ctx
        .migrator()
        .status()
        .await
        .context("Failed to read migration status")?;

    match args.output {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => {
            println!("Target:   {}", status.target_id);
            println!(
                "Position: {}",
                describe_position(status.current_index, status.current_name.as_deref())
            );
            println!("Steps:    {}", status.total_steps);
            println!("Pending:  {}", status.pending);
        }
    }
    Ok(())
}
