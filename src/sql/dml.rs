//! INSERT / UPDATE / DELETE rendering
//!
//! Statements are rendered from a [`TableEntity`] with literals inlined, using
//! the same text conventions as SELECT rendering.

use crate::table::{TableEntity, TableField};

/// `INSERT INTO t (a,b) VALUES (1,'x')`
///
/// The identity column is left out when the storage generates it.
pub fn render_insert(table: &TableEntity) -> String {
    let fields: Vec<&TableField> = table
        .all_fields()
        .iter()
        .filter(|f| !f.descriptor().is_storage_generated())
        .collect();

    let columns = fields
        .iter()
        .map(|f| f.column_name())
        .collect::<Vec<_>>()
        .join(",");
    let values = fields
        .iter()
        .map(|f| f.value().to_sql_literal())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.table_name(),
        columns,
        values
    )
}

/// `UPDATE t SET a = 1,b = 'x' WHERE id = 1`, covering only the changed fields
///
/// Returns `None` when the last dirty check marked nothing.
pub fn render_update(table: &TableEntity) -> Option<String> {
    let changed = table.changed_fields();
    if changed.is_empty() {
        return None;
    }

    let assignments = changed
        .iter()
        .map(|f| format!("{} = {}", f.column_name(), f.value().to_sql_literal()))
        .collect::<Vec<_>>()
        .join(",");

    Some(format!(
        "UPDATE {} SET {} WHERE {}",
        table.table_name(),
        assignments,
        id_predicate(table)
    ))
}

/// `DELETE FROM t WHERE id = 1`
pub fn render_delete(table: &TableEntity) -> String {
    format!("DELETE FROM {} WHERE {}", table.table_name(), id_predicate(table))
}

fn id_predicate(table: &TableEntity) -> String {
    let id = table.id();
    format!("{} = {}", id.column_name(), id.value().to_sql_literal())
}
