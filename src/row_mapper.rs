//! Row mapping
//!
//! A [`RowMapper`] consumes one logical result from a [`RowCursor`]: a single
//! row for plain queries, or every contiguous row of one root identity when
//! eager one-to-many targets were joined in.

use std::rc::Rc;

use crate::classifier::EntityMeta;
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::relation::RelationFields;
use crate::row::{RowCursor, column_label};
use crate::table::TableEntity;

/// Builds one result from the rows at the cursor, advancing past them
pub trait RowMapper<T> {
    fn map_row(&mut self, rows: &mut RowCursor) -> Result<T>;
}

/// Binds exactly one row per entity
pub struct DefaultRowMapper<E> {
    meta: Rc<EntityMeta<E>>,
}

impl<E: Entity> DefaultRowMapper<E> {
    /// Mapper for rows labeled with bare column names
    pub fn new(meta: Rc<EntityMeta<E>>) -> Self {
        Self { meta }
    }
}

impl<E: Entity> RowMapper<E> for DefaultRowMapper<E> {
    fn map_row(&mut self, rows: &mut RowCursor) -> Result<E> {
        let type_name = self.meta.type_name();
        let row = rows.current().ok_or_else(|| {
            OrmError::row_mapping(
                type_name,
                OrmError::value_conversion("no row at the cursor"),
            )
        })?;
        let entity = self
            .meta
            .bind(row, None)
            .map_err(|e| OrmError::row_mapping(type_name, e))?;
        rows.advance();
        Ok(entity)
    }
}

/// Collapses joined rows into one root with its eager collections filled
///
/// Rows of one root identity must be contiguous. Each row contributes one
/// child per eager relation; lazy relations stay unloaded.
pub struct EntityGraphRowMapper<E> {
    meta: Rc<EntityMeta<E>>,
    table: TableEntity,
    relations: RelationFields,
}

impl<E: Entity> EntityGraphRowMapper<E> {
    /// `table` and the targets in `relations` carry the aliases used by the query
    pub fn new(meta: Rc<EntityMeta<E>>, table: TableEntity, relations: RelationFields) -> Self {
        Self {
            meta,
            table,
            relations,
        }
    }
}

impl<E: Entity> RowMapper<E> for EntityGraphRowMapper<E> {
    fn map_row(&mut self, rows: &mut RowCursor) -> Result<E> {
        let type_name = self.meta.type_name();
        let id_label = column_label(self.table.alias(), self.table.id().column_name());

        let row = rows.current().ok_or_else(|| {
            OrmError::row_mapping(
                type_name,
                OrmError::value_conversion("no row at the cursor"),
            )
        })?;
        let root_id = row.get(&id_label).cloned().ok_or_else(|| {
            OrmError::row_mapping(
                type_name,
                OrmError::missing_identifier(format!("result has no column {}", id_label)),
            )
        })?;
        let mut root = self
            .meta
            .bind(row, self.table.alias())
            .map_err(|e| OrmError::row_mapping(type_name, e))?;

        self.meta.append_children(&mut root, row, &self.relations)?;
        rows.advance();

        let mut consumed = 1usize;
        while let Some(row) = rows.current() {
            if row.get(&id_label) != Some(&root_id) {
                break;
            }
            self.meta.append_children(&mut root, row, &self.relations)?;
            rows.advance();
            consumed += 1;
        }

        tracing::trace!(
            entity = type_name,
            id = %root_id,
            rows = consumed,
            "Mapped entity graph"
        );
        Ok(root)
    }
}
