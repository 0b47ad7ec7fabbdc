use super::*;
use crate::CanonicalDb;

fn row(source_id: &str, column: &str, group: &str, node: &str, kind: ValueKind) -> RegistryRow {
    RegistryRow {
        source_id: source_id.to_string(),
        column_name: column.to_string(),
        group_label: group.to_string(),
        node_label: node.to_string(),
        kind,
        active: true,
    }
}

fn seeded() -> CanonicalDb {
    let db = CanonicalDb::open_memory().unwrap();
    db.transaction(|conn| {
        import_registry_rows(
            conn,
            &[
                row("101", "A", "G1", "Level 1", ValueKind::Numeric),
                row("102", "B", "G1", "Level 1", ValueKind::Boolean),
                row("201", "C", "G2", "Level 1", ValueKind::Numeric),
            ],
        )
    })
    .unwrap();
    db
}

fn source_ids(tags: &[RegisteredTag]) -> Vec<&str> {
    tags.iter().map(|t| t.source_id.as_str()).collect()
}

#[test]
fn import_creates_groups_and_nodes_on_the_fly() {
    let db = CanonicalDb::open_memory().unwrap();
    let summary = import_registry_rows(
        db.conn(),
        &[
            row("101", "A", "G1", "Level 1", ValueKind::Numeric),
            row("102", "B", "G1", "Level 1", ValueKind::Boolean),
            row("201", "C", "G2", "Level 1", ValueKind::Numeric),
        ],
    )
    .unwrap();
    assert_eq!(
        summary,
        RegistryImportSummary {
            groups_created: 2,
            nodes_created: 2,
            tags_inserted: 3,
            tags_updated: 0,
        }
    );
}

#[test]
fn reimport_updates_in_place() {
    let db = seeded();
    let summary = import_registry_rows(
        db.conn(),
        &[row("101", "A Renamed", "G1", "Level 2", ValueKind::Numeric)],
    )
    .unwrap();
    assert_eq!(summary.tags_updated, 1);
    assert_eq!(summary.nodes_created, 1);

    let tags = active_tags(db.conn()).unwrap();
    let a = tags.iter().find(|t| t.source_id == "101").unwrap();
    assert_eq!(a.column_name, "A_Renamed");
}

#[test]
fn duplicate_column_is_rejected() {
    let db = seeded();
    let err = import_registry_rows(
        db.conn(),
        &[row("999", "A", "G1", "Level 1", ValueKind::Numeric)],
    )
    .unwrap_err();
    assert!(matches!(err, MetaError::RegistryConflict(_)), "{err}");
}

#[test]
fn active_tags_carry_kind_and_group() {
    let db = seeded();
    let tags = active_tags(db.conn()).unwrap();
    assert_eq!(source_ids(&tags), vec!["101", "102", "201"]);
    let b = &tags[1];
    assert_eq!(b.kind, ValueKind::Boolean);
    assert_eq!(b.column_name, "B");
    assert_eq!(b.group_id, tags[0].group_id);
    assert_ne!(tags[2].group_id, tags[0].group_id);
}

#[test]
fn deactivation_is_transitive() {
    let db = seeded();

    set_active(db.conn(), RegistryLevel::Tag, "102", false).unwrap();
    assert_eq!(source_ids(&active_tags(db.conn()).unwrap()), vec!["101", "201"]);

    set_active(db.conn(), RegistryLevel::Node, "G1/Level 1", false).unwrap();
    assert_eq!(source_ids(&active_tags(db.conn()).unwrap()), vec!["201"]);

    set_active(db.conn(), RegistryLevel::Node, "G1/Level 1", true).unwrap();
    set_active(db.conn(), RegistryLevel::Group, "G2", false).unwrap();
    assert_eq!(source_ids(&active_tags(db.conn()).unwrap()), vec!["101"]);

    let groups = active_groups(db.conn()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].label, "G1");
}

#[test]
fn tags_for_group_orders_by_column() {
    let db = seeded();
    let groups = active_groups(db.conn()).unwrap();
    let g1 = groups.iter().find(|g| g.label == "G1").unwrap();
    let tags = tags_for_group(db.conn(), g1.group_id).unwrap();
    let columns: Vec<_> = tags.iter().map(|t| t.column_name.as_str()).collect();
    assert_eq!(columns, vec!["A", "B"]);
}

#[test]
fn set_active_unknown_key() {
    let db = seeded();
    let err = set_active(db.conn(), RegistryLevel::Group, "nope", false).unwrap_err();
    assert!(matches!(err, MetaError::NotFound { kind: "group", .. }), "{err}");
}
