//! Table model
//!
//! [`TableEntity`] is the table-shaped view of one entity instance: its column
//! values in declaration order, the changed-field markers set by the dirty
//! checker, the alias used by join rendering and the relation graph of the type.

use std::any::TypeId;
use std::collections::HashMap;
use std::rc::Rc;

use crate::classifier::{EntityMeta, FieldDescriptor};
use crate::config::OrmConfig;
use crate::entity::Entity;
use crate::error::Result;
use crate::relation::RelationFields;
use crate::row::column_label;
use crate::types::Value;

/// A column-backed field with its live value
#[derive(Debug, Clone, PartialEq)]
pub struct TableField {
    descriptor: Rc<FieldDescriptor>,
    value: Value,
}

impl TableField {
    pub fn new(descriptor: Rc<FieldDescriptor>, value: Value) -> Self {
        Self { descriptor, value }
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub fn field_name(&self) -> &'static str {
        self.descriptor.field_name
    }

    pub fn column_name(&self) -> &str {
        &self.descriptor.column_name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.value = value.into();
    }

    /// Whether this is the primary (identity) field
    pub fn is_id(&self) -> bool {
        self.descriptor.is_identity
    }
}

/// Ordered column fields plus one changed marker per field
#[derive(Debug, Clone, PartialEq)]
pub struct TableFields {
    fields: Vec<TableField>,
    changed: Vec<bool>,
}

impl TableFields {
    pub fn new(fields: Vec<TableField>) -> Self {
        let changed = vec![false; fields.len()];
        Self { fields, changed }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn as_slice(&self) -> &[TableField] {
        &self.fields
    }

    pub fn get(&self, index: usize) -> Option<&TableField> {
        self.fields.get(index)
    }

    pub fn is_changed(&self, index: usize) -> bool {
        self.changed.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn mark_changed(&mut self, index: usize) {
        if let Some(flag) = self.changed.get_mut(index) {
            *flag = true;
        }
    }

    pub(crate) fn reset_changed(&mut self) {
        self.changed.iter_mut().for_each(|flag| *flag = false);
    }
}

/// Hands out `{table}_{n}` aliases within one render context
#[derive(Debug, Default)]
pub struct AliasScope {
    next: usize,
}

impl AliasScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next alias for `table`; the counter is shared by every table in the scope
    pub fn next_alias(&mut self, table: &str) -> String {
        self.next += 1;
        format!("{}_{}", table, self.next)
    }
}

/// Table-shaped view of one entity instance
#[derive(Debug, Clone)]
pub struct TableEntity {
    type_id: TypeId,
    type_name: &'static str,
    table_name: String,
    alias: Option<String>,
    fields: TableFields,
    id_index: usize,
    relations: RelationFields,
}

impl TableEntity {
    pub(crate) fn new(
        type_id: TypeId,
        type_name: &'static str,
        table_name: String,
        fields: Vec<TableField>,
        id_index: usize,
        relations: RelationFields,
    ) -> Self {
        Self {
            type_id,
            type_name,
            table_name,
            alias: None,
            fields: TableFields::new(fields),
            id_index,
            relations,
        }
    }

    /// Empty table model of `E` (every field at its default value)
    pub fn of<E: Entity>(config: &OrmConfig) -> Result<Self> {
        Ok(EntityMeta::<E>::classify(config)?.template())
    }

    /// Table model of `entity` with its current values
    pub fn from_entity<E: Entity>(entity: &E, config: &OrmConfig) -> Result<Self> {
        Ok(EntityMeta::<E>::classify(config)?.table_entity(entity))
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Assign an alias from `scope` unless one is already set
    pub fn add_alias_if_not_assigned(&mut self, scope: &mut AliasScope) -> &str {
        self.alias
            .get_or_insert_with(|| scope.next_alias(&self.table_name))
    }

    /// Result label of `column` under this table's alias
    pub fn column_label(&self, column: &str) -> String {
        column_label(self.alias(), column)
    }

    /// `alias.column`, or the bare column when no alias is assigned
    pub fn qualified_column(&self, column: &str) -> String {
        match self.alias() {
            Some(alias) => format!("{}.{}", alias, column),
            None => column.to_string(),
        }
    }

    // =========================================================================
    // Fields
    // =========================================================================

    pub fn fields(&self) -> &TableFields {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut TableFields {
        &mut self.fields
    }

    /// Every column field, identity included, in declaration order
    pub fn all_fields(&self) -> &[TableField] {
        self.fields.as_slice()
    }

    /// Column fields other than the identity
    pub fn non_id_fields(&self) -> impl Iterator<Item = &TableField> {
        self.all_fields().iter().filter(|f| !f.is_id())
    }

    /// Fields marked by the last dirty check
    pub fn changed_fields(&self) -> Vec<&TableField> {
        self.all_fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| self.fields.is_changed(*i))
            .map(|(_, f)| f)
            .collect()
    }

    pub fn id(&self) -> &TableField {
        &self.fields.as_slice()[self.id_index]
    }

    pub(crate) fn id_index(&self) -> usize {
        self.id_index
    }

    pub fn set_id(&mut self, value: impl Into<Value>) {
        self.fields.fields[self.id_index].set_value(value);
    }

    /// Field by column name
    pub fn field(&self, column: &str) -> Option<&TableField> {
        self.all_fields().iter().find(|f| f.column_name() == column)
    }

    /// Overwrite every field whose column appears in `incoming`
    ///
    /// Fields without a counterpart keep their value.
    pub fn replace_all_fields(&mut self, incoming: &[TableField]) {
        let by_column: HashMap<&str, &Value> = incoming
            .iter()
            .map(|f| (f.column_name(), f.value()))
            .collect();
        for field in &mut self.fields.fields {
            if let Some(value) = by_column.get(field.column_name()) {
                field.value = (*value).clone();
            }
        }
    }

    /// Write this table's values onto `entity` through the registered setters
    pub fn apply_to<E: Entity>(&self, meta: &EntityMeta<E>, entity: &mut E) -> Result<()> {
        meta.write_back(self, entity)
    }

    // =========================================================================
    // Relations
    // =========================================================================

    pub fn relation_fields(&self) -> &RelationFields {
        &self.relations
    }
}
