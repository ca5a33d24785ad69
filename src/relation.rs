//! Relation graph
//!
//! One [`RelationField`] per one-to-many association of an entity type, each
//! carrying the nested [`TableEntity`] of its target.

use std::any::TypeId;

use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::table::{AliasScope, TableEntity};
use crate::types::FetchMode;

/// One one-to-many association and its target table
///
/// `Clone` is a deep copy: the nested table (and its alias) is never shared
/// between copies.
#[derive(Debug, Clone)]
pub struct RelationField {
    field_name: &'static str,
    fetch: FetchMode,
    join_column: String,
    table: TableEntity,
    target_type: TypeId,
    target_name: &'static str,
    valued: bool,
}

impl RelationField {
    pub(crate) fn new(
        field_name: &'static str,
        fetch: FetchMode,
        join_column: String,
        table: TableEntity,
        target_type: TypeId,
        target_name: &'static str,
        valued: bool,
    ) -> Self {
        Self {
            field_name,
            fetch,
            join_column,
            table,
            target_type,
            target_name,
            valued,
        }
    }

    pub fn field_name(&self) -> &'static str {
        self.field_name
    }

    pub fn fetch(&self) -> FetchMode {
        self.fetch
    }

    pub fn is_eager(&self) -> bool {
        self.fetch == FetchMode::Eager
    }

    /// Column on the target table that references the owner
    pub fn join_column(&self) -> &str {
        &self.join_column
    }

    /// Target table model
    pub fn table(&self) -> &TableEntity {
        &self.table
    }

    pub fn target_type(&self) -> TypeId {
        self.target_type
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    /// Whether the owner held a non-empty collection when the model was built
    pub fn is_valued(&self) -> bool {
        self.valued
    }
}

/// The relation fields of one entity type, in declaration order
#[derive(Debug, Clone, Default)]
pub struct RelationFields {
    fields: Vec<RelationField>,
}

impl RelationFields {
    pub fn new(fields: Vec<RelationField>) -> Self {
        Self { fields }
    }

    pub fn all(&self) -> &[RelationField] {
        &self.fields
    }

    pub fn eager(&self) -> impl Iterator<Item = &RelationField> {
        self.fields.iter().filter(|r| r.is_eager())
    }

    pub fn valued(&self) -> impl Iterator<Item = &RelationField> {
        self.fields.iter().filter(|r| r.is_valued())
    }

    /// The relation whose target is `T`
    pub fn of_type<T: Entity>(&self) -> Result<&RelationField> {
        let target = TypeId::of::<T>();
        self.fields
            .iter()
            .find(|r| r.target_type == target)
            .ok_or_else(|| {
                OrmError::type_not_in_relation(format!(
                    "{} is not a relation target",
                    T::entity_name()
                ))
            })
    }

    pub fn has_relation<T: Entity>(&self) -> bool {
        self.of_type::<T>().is_ok()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the eager relations
    pub(crate) fn retain_eager(&mut self) {
        self.fields.retain(RelationField::is_eager);
    }

    /// Alias every target table that has none yet
    pub(crate) fn assign_aliases(&mut self, scope: &mut AliasScope) {
        for relation in &mut self.fields {
            relation.table.add_alias_if_not_assigned(scope);
        }
    }
}
