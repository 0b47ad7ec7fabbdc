//! Tables command implementation

use anyhow::{Context, Result};
use tsync_pipeline::create_destination_tables;

use crate::cli::{GlobalArgs, TablesArgs, TablesCommand};
use crate::context::RuntimeContext;

/// Execute the tables command
pub async fn execute(args: &TablesArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match args.command {
        TablesCommand::Create => {
            let stores = ctx.open_destination_stores()?;
            let tables = create_destination_tables(&ctx.pipeline(&stores))
                .await
                .context("Failed to create destination tables")?;
            if tables.is_empty() {
                println!("No active groups with tags.");
                return Ok(());
            }
            for (table, created) in &tables {
                println!(
                    "  {table}: {}",
                    if *created { "created" } else { "exists" }
                );
            }
            let created = tables.iter().filter(|(_, c)| *c).count();
            println!();
            println!("{created} of {} tables created", tables.len());
            Ok(())
        }
    }
}
