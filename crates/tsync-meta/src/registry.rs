//! Registry reads and imports.
//!
//! Reads always go to the store so that a deactivation takes effect on the
//! next stage invocation. A tag is returned only when the tag, its node, and
//! the node's group are all active.

use crate::error::{MetaError, MetaResult, MetaResultExt};
use duckdb::{Connection, ToSql};
use serde::Serialize;
use std::fmt;
use tsync_core::naming::column_name;
use tsync_core::{CoreError, Group, RegisteredTag, ValueKind};

const ACTIVE_TAG_SELECT: &str = "SELECT t.source_id, t.column_name, t.node_id, n.group_id, t.kind
     FROM tsync.tags t
     JOIN tsync.nodes n ON n.node_id = t.node_id
     JOIN tsync.groups g ON g.group_id = n.group_id
     WHERE t.active AND n.active AND g.active";

/// Every eligible tag, ordered by source id.
pub fn active_tags(conn: &Connection) -> MetaResult<Vec<RegisteredTag>> {
    collect_tags(conn, &format!("{ACTIVE_TAG_SELECT} ORDER BY t.source_id"), &[])
}

/// Eligible tags of one group, ordered by column name.
pub fn tags_for_group(conn: &Connection, group_id: i64) -> MetaResult<Vec<RegisteredTag>> {
    collect_tags(
        conn,
        &format!("{ACTIVE_TAG_SELECT} AND g.group_id = ? ORDER BY t.column_name"),
        &[&group_id],
    )
}

/// Active groups, ordered by label.
pub fn active_groups(conn: &Connection) -> MetaResult<Vec<Group>> {
    let mut stmt = conn
        .prepare(
            "SELECT group_id, label, code, active FROM tsync.groups WHERE active ORDER BY label",
        )
        .query_context("prepare active_groups")?;
    let groups = stmt
        .query_map([], |row| {
            Ok(Group {
                group_id: row.get(0)?,
                label: row.get(1)?,
                code: row.get(2)?,
                active: row.get(3)?,
            })
        })
        .query_context("query active_groups")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("read active_groups row")?;
    Ok(groups)
}

fn collect_tags(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> MetaResult<Vec<RegisteredTag>> {
    let mut stmt = conn.prepare(sql).query_context("prepare registry query")?;
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .query_context("query registry")?
        .collect::<Result<Vec<_>, _>>()
        .query_context("read registry row")?;

    rows.into_iter()
        .map(|(source_id, column_name, node_id, group_id, kind)| {
            Ok(RegisteredTag {
                source_id,
                column_name,
                node_id,
                group_id,
                kind: kind
                    .parse()
                    .map_err(|e: CoreError| MetaError::InvalidData(e.to_string()))?,
            })
        })
        .collect()
}

/// One registry line as supplied by an import file.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryRow {
    pub source_id: String,
    pub column_name: String,
    pub group_label: String,
    pub node_label: String,
    pub kind: ValueKind,
    pub active: bool,
}

/// Counts of what an import changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryImportSummary {
    pub groups_created: usize,
    pub nodes_created: usize,
    pub tags_inserted: usize,
    pub tags_updated: usize,
}

/// Insert or update tags, creating missing groups and nodes on the fly.
///
/// Call inside a transaction: a conflict on any row leaves earlier rows
/// written.
pub fn import_registry_rows(
    conn: &Connection,
    rows: &[RegistryRow],
) -> MetaResult<RegistryImportSummary> {
    let mut summary = RegistryImportSummary::default();

    for row in rows {
        let source_id = row.source_id.trim();
        let column = column_name(&row.column_name);
        if source_id.is_empty() || column.is_empty() {
            return Err(MetaError::RegistryConflict(format!(
                "tag '{source_id}' needs both a source id and a column name"
            )));
        }

        let group_id = ensure_group(conn, row.group_label.trim(), &mut summary)?;
        let node_id = ensure_node(conn, group_id, row.node_label.trim(), &mut summary)?;

        let owner = conn.query_row(
            "SELECT source_id FROM tsync.tags WHERE column_name = ? AND source_id <> ? LIMIT 1",
            duckdb::params![column, source_id],
            |r| r.get::<_, String>(0),
        );
        match owner {
            Ok(other) => {
                return Err(MetaError::RegistryConflict(format!(
                    "column '{column}' is already mapped to tag '{other}'"
                )))
            }
            Err(duckdb::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(MetaError::QueryError(format!("check column owner: {e}"))),
        }

        let updated = conn
            .execute(
                "UPDATE tsync.tags SET column_name = ?, node_id = ?, kind = ?, active = ? WHERE source_id = ?",
                duckdb::params![column, node_id, row.kind.as_str(), row.active, source_id],
            )
            .write_context("update tags")?;
        if updated > 0 {
            summary.tags_updated += 1;
            continue;
        }

        conn.execute(
            "INSERT INTO tsync.tags (source_id, column_name, node_id, kind, active) VALUES (?, ?, ?, ?, ?)",
            duckdb::params![source_id, column, node_id, row.kind.as_str(), row.active],
        )
        .write_context("insert tags")?;
        summary.tags_inserted += 1;
    }

    log::debug!(
        "Registry import: {} tags inserted, {} updated, {} groups and {} nodes created",
        summary.tags_inserted,
        summary.tags_updated,
        summary.groups_created,
        summary.nodes_created
    );
    Ok(summary)
}

fn registry_code(label: &str) -> String {
    column_name(label).to_ascii_uppercase()
}

fn ensure_group(
    conn: &Connection,
    label: &str,
    summary: &mut RegistryImportSummary,
) -> MetaResult<i64> {
    if label.is_empty() {
        return Err(MetaError::RegistryConflict("group label cannot be empty".into()));
    }
    match conn.query_row(
        "SELECT group_id FROM tsync.groups WHERE label = ?",
        duckdb::params![label],
        |r| r.get::<_, i64>(0),
    ) {
        Ok(id) => return Ok(id),
        Err(duckdb::Error::QueryReturnedNoRows) => {}
        Err(e) => return Err(MetaError::QueryError(format!("select group_id: {e}"))),
    }

    let id: i64 = conn
        .query_row(
            "INSERT INTO tsync.groups (label, code) VALUES (?, ?) RETURNING group_id",
            duckdb::params![label, registry_code(label)],
            |r| r.get(0),
        )
        .write_context("insert groups")?;
    log::info!("Created group '{label}'");
    summary.groups_created += 1;
    Ok(id)
}

fn ensure_node(
    conn: &Connection,
    group_id: i64,
    label: &str,
    summary: &mut RegistryImportSummary,
) -> MetaResult<i64> {
    if label.is_empty() {
        return Err(MetaError::RegistryConflict("node label cannot be empty".into()));
    }
    match conn.query_row(
        "SELECT node_id FROM tsync.nodes WHERE group_id = ? AND label = ?",
        duckdb::params![group_id, label],
        |r| r.get::<_, i64>(0),
    ) {
        Ok(id) => return Ok(id),
        Err(duckdb::Error::QueryReturnedNoRows) => {}
        Err(e) => return Err(MetaError::QueryError(format!("select node_id: {e}"))),
    }

    let id: i64 = conn
        .query_row(
            "INSERT INTO tsync.nodes (group_id, label, code) VALUES (?, ?, ?) RETURNING node_id",
            duckdb::params![group_id, label, registry_code(label)],
            |r| r.get(0),
        )
        .write_context("insert nodes")?;
    log::info!("Created node '{label}' under group {group_id}");
    summary.nodes_created += 1;
    Ok(id)
}

/// Registry level addressed by an activation toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryLevel {
    Group,
    Node,
    Tag,
}

impl RegistryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryLevel::Group => "group",
            RegistryLevel::Node => "node",
            RegistryLevel::Tag => "tag",
        }
    }
}

impl fmt::Display for RegistryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flip the active flag of a group (by label), node, or tag (by source id).
///
/// A node key is either a bare label, which matches that label under every
/// group, or `group label/node label`. Returns the number of rows changed.
pub fn set_active(
    conn: &Connection,
    level: RegistryLevel,
    key: &str,
    active: bool,
) -> MetaResult<usize> {
    let key = key.trim();
    let changed = match level {
        RegistryLevel::Group => conn.execute(
            "UPDATE tsync.groups SET active = ? WHERE label = ?",
            duckdb::params![active, key],
        ),
        RegistryLevel::Node => match key.split_once('/') {
            Some((group, node)) => conn.execute(
                "UPDATE tsync.nodes SET active = ?
                 WHERE label = ? AND group_id IN (SELECT group_id FROM tsync.groups WHERE label = ?)",
                duckdb::params![active, node.trim(), group.trim()],
            ),
            None => conn.execute(
                "UPDATE tsync.nodes SET active = ? WHERE label = ?",
                duckdb::params![active, key],
            ),
        },
        RegistryLevel::Tag => conn.execute(
            "UPDATE tsync.tags SET active = ? WHERE source_id = ?",
            duckdb::params![active, key],
        ),
    }
    .write_context(&format!("update {level} active flag"))?;

    if changed == 0 {
        return Err(MetaError::NotFound {
            kind: level.as_str(),
            key: key.to_string(),
        });
    }
    Ok(changed)
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
