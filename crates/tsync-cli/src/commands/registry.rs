//! Registry command implementation

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tsync_core::ValueKind;
use tsync_meta::csv::{read_csv_file, CsvTable};
use tsync_meta::registry::{import_registry_rows, set_active};
use tsync_meta::{RegistryLevel, RegistryRow};

use crate::cli::{GlobalArgs, RegistryArgs, RegistryCommand, RegistryImportArgs};
use crate::context::RuntimeContext;

const SOURCE_ID_HEADERS: &[&str] = &["source_id", "tag", "id"];
const COLUMN_HEADERS: &[&str] = &["column_name", "column"];
const GROUP_HEADERS: &[&str] = &["group", "plant", "group_label"];
const NODE_HEADERS: &[&str] = &["node", "level", "node_label"];
const KIND_HEADERS: &[&str] = &["kind", "type"];
const ACTIVE_HEADERS: &[&str] = &["active"];

/// Execute the registry command
pub fn execute(args: &RegistryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match &args.command {
        RegistryCommand::Import(import_args) => import(&ctx, import_args),
        RegistryCommand::Activate(toggle) => {
            toggle_active(&ctx, toggle.level.into(), &toggle.key, true)
        }
        RegistryCommand::Deactivate(toggle) => {
            toggle_active(&ctx, toggle.level.into(), &toggle.key, false)
        }
    }
}

fn import(ctx: &RuntimeContext, args: &RegistryImportArgs) -> Result<()> {
    let conn = ctx.canonical.conn();
    let sheet = read_csv_file(conn, Path::new(&args.file))?;
    let rows = registry_rows(&sheet)
        .with_context(|| format!("Invalid registry file {}", args.file))?;

    let summary = ctx
        .canonical
        .transaction(|conn| import_registry_rows(conn, &rows))
        .context("Registry import failed; nothing was written")?;

    println!(
        "Imported {} tags: {} new, {} updated ({} groups, {} nodes created)",
        rows.len(),
        summary.tags_inserted,
        summary.tags_updated,
        summary.groups_created,
        summary.nodes_created
    );
    Ok(())
}

fn toggle_active(
    ctx: &RuntimeContext,
    level: RegistryLevel,
    key: &str,
    active: bool,
) -> Result<()> {
    let changed = set_active(ctx.canonical.conn(), level, key, active)?;
    println!(
        "{} {level} '{key}' ({changed} rows)",
        if active { "Activated" } else { "Deactivated" }
    );
    Ok(())
}

/// Convert a registry sheet into import rows.
///
/// Errors name the 1-based data line of the first bad row.
pub(crate) fn registry_rows(sheet: &CsvTable) -> Result<Vec<RegistryRow>> {
    let source_col = sheet.require_column(SOURCE_ID_HEADERS)?;
    let column_col = sheet.require_column(COLUMN_HEADERS)?;
    let group_col = sheet.require_column(GROUP_HEADERS)?;
    let node_col = sheet.require_column(NODE_HEADERS)?;
    let kind_col = sheet.require_column(KIND_HEADERS)?;
    let active_col = sheet.column_index(ACTIVE_HEADERS);

    (0..sheet.rows.len())
        .map(|row| {
            let line = row + 1;
            let cell = |col: usize, what: &str| {
                sheet
                    .cell(row, col)
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("line {line}: missing {what}"))
            };
            let kind: ValueKind = cell(kind_col, "kind")?
                .parse()
                .map_err(|e| anyhow!("line {line}: {e}"))?;
            let active = match active_col.and_then(|col| sheet.cell(row, col)) {
                None => true,
                Some(flag) => parse_flag(flag).ok_or_else(|| {
                    anyhow!("line {line}: active must be true/false, got '{flag}'")
                })?,
            };
            Ok(RegistryRow {
                source_id: cell(source_col, "source id")?,
                column_name: cell(column_col, "column name")?,
                group_label: cell(group_col, "group")?,
                node_label: cell(node_col, "node")?,
                kind,
                active,
            })
        })
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
