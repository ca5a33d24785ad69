//! Field classification
//!
//! Turns an entity's registration table into [`FieldDescriptor`]s and partitions
//! them into identity, columns, one-to-many relations and transient fields.

use std::any::TypeId;
use std::rc::Rc;

use crate::config::OrmConfig;
use crate::entity::{ColumnAccess, Entity, FieldAccess, FieldDef, RelationAccess};
use crate::error::{OrmError, Result};
use crate::relation::{RelationField, RelationFields};
use crate::row::{Row, column_label};
use crate::sql::sanitize::validate_identifier;
use crate::table::{TableEntity, TableField};
use crate::types::{ColumnType, FetchMode, GenerationType, RelationKind, Value};

/// Classified metadata of one declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name as declared on the entity type
    pub field_name: &'static str,
    /// Column name resolved by the naming strategy
    pub column_name: String,
    pub is_identity: bool,
    pub is_column: bool,
    pub is_transient: bool,
    pub relation_kind: Option<RelationKind>,
    pub fetch_mode: Option<FetchMode>,
    pub generation: GenerationType,
    /// Column type for DDL; `None` for relation and transient fields
    pub column_type: Option<ColumnType>,
    pub nullable: bool,
}

impl FieldDescriptor {
    /// Whether the identity value is produced by the storage on insert
    pub fn is_storage_generated(&self) -> bool {
        self.is_identity && self.generation == GenerationType::Identity
    }
}

pub(crate) struct ColumnMeta<E> {
    descriptor: Rc<FieldDescriptor>,
    access: Box<dyn ColumnAccess<E>>,
}

pub(crate) struct RelationMeta<E> {
    descriptor: FieldDescriptor,
    join_column: Option<&'static str>,
    access: Box<dyn RelationAccess<E>>,
    target: Option<TableEntity>,
}

/// Classified view of an entity type
///
/// Derived once per type; holds the descriptors together with the accessors
/// needed to read, bind and write back values.
pub struct EntityMeta<E> {
    type_name: &'static str,
    table_name: String,
    columns: Vec<ColumnMeta<E>>,
    id_index: usize,
    relations: Vec<RelationMeta<E>>,
    transients: Vec<FieldDescriptor>,
}

impl<E: Entity> EntityMeta<E> {
    /// Classify `E`, resolving every one-to-many target
    pub fn classify(config: &OrmConfig) -> Result<Self> {
        let mut meta = Self::classify_shallow(config)?;
        for relation in &mut meta.relations {
            relation.target = Some(relation.access.resolve(config)?);
        }
        Ok(meta)
    }

    /// Classify `E` without resolving relation targets
    ///
    /// Nested targets are described one level deep, which keeps mutually
    /// referencing entity types from recursing.
    pub(crate) fn classify_shallow(config: &OrmConfig) -> Result<Self> {
        let type_name = E::entity_name();
        let table_name = config.naming.table_name(type_name, E::table_name());
        if config.validate_identifiers {
            validate_identifier(&table_name).map_err(|e| {
                OrmError::invalid_entity(format!("entity {} table name: {}", type_name, e))
            })?;
        }

        let fields = E::fields();
        let mut columns = Vec::with_capacity(fields.len());
        let mut relations = Vec::new();
        let mut transients = Vec::new();
        let mut id_index = None;

        for FieldDef { name, meta, access } in fields {
            if meta.transient && meta.column {
                return Err(OrmError::invalid_entity(format!(
                    "entity {} field {}: transient and column cannot be used on the same field",
                    type_name, name
                )));
            }

            let column_name = config.naming.column_name(name, meta.column_name);
            let mut descriptor = FieldDescriptor {
                field_name: name,
                column_name,
                is_identity: meta.id,
                is_column: meta.column,
                is_transient: meta.transient,
                relation_kind: meta.relation,
                fetch_mode: meta.relation.map(|_| meta.fetch),
                generation: meta.generation,
                column_type: meta.column_type,
                nullable: true,
            };

            if meta.transient {
                tracing::trace!(entity = type_name, field = name, "Skipping transient field");
                transients.push(descriptor);
                continue;
            }

            if let Some(kind) = meta.relation {
                if kind != RelationKind::OneToMany {
                    return Err(OrmError::not_yet_implemented(format!(
                        "entity {} field {}: {:?} relations are not supported, only OneToMany",
                        type_name, name, kind
                    )));
                }
                let FieldAccess::Relation(access) = access else {
                    return Err(OrmError::invalid_entity(format!(
                        "entity {} field {}: one-to-many field has no collection accessor",
                        type_name, name
                    )));
                };
                relations.push(RelationMeta {
                    descriptor,
                    join_column: meta.join_column,
                    access,
                    target: None,
                });
                continue;
            }

            let FieldAccess::Column(access) = access else {
                return Err(OrmError::invalid_entity(format!(
                    "entity {} field {}: persistent field has no accessor",
                    type_name, name
                )));
            };

            if config.validate_identifiers {
                validate_identifier(&descriptor.column_name).map_err(|e| {
                    OrmError::invalid_entity(format!(
                        "entity {} field {} column name: {}",
                        type_name, name, e
                    ))
                })?;
            }

            if meta.id {
                if id_index.is_some() {
                    return Err(OrmError::invalid_entity(format!(
                        "entity {} declares more than one identity field",
                        type_name
                    )));
                }
                id_index = Some(columns.len());
            }

            descriptor.column_type = Some(meta.column_type.unwrap_or_else(|| access.column_type()));
            descriptor.nullable = access.nullable();
            columns.push(ColumnMeta {
                descriptor: Rc::new(descriptor),
                access,
            });
        }

        let id_index = id_index.ok_or_else(|| {
            OrmError::invalid_entity(format!("entity {} has no identity field", type_name))
        })?;

        tracing::trace!(
            entity = type_name,
            table = %table_name,
            columns = columns.len(),
            relations = relations.len(),
            transients = transients.len(),
            "Classified entity fields"
        );

        Ok(Self {
            type_name,
            table_name,
            columns,
            id_index,
            relations,
            transients,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    // =========================================================================
    // Partitions
    // =========================================================================

    /// The identity field
    pub fn id_field(&self) -> &FieldDescriptor {
        &self.columns[self.id_index].descriptor
    }

    /// Every column-backed field, identity included, in declaration order
    pub fn all_columns(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.columns.iter().map(|c| c.descriptor.as_ref())
    }

    /// Column-backed fields other than the identity
    pub fn column_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.all_columns().filter(|d| !d.is_identity)
    }

    /// One-to-many relation fields
    pub fn relation_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.relations.iter().map(|r| &r.descriptor)
    }

    /// Transient (non-persistent) fields
    pub fn transient_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.transients.iter()
    }

    pub fn has_eager_relations(&self) -> bool {
        self.relations
            .iter()
            .any(|r| r.descriptor.fetch_mode == Some(FetchMode::Eager))
    }

    // =========================================================================
    // Table model construction
    // =========================================================================

    /// Table model of `entity` with the current field values
    pub fn table_entity(&self, entity: &E) -> TableEntity {
        let fields = self
            .columns
            .iter()
            .map(|c| TableField::new(Rc::clone(&c.descriptor), c.access.get(entity)))
            .collect();

        let relations = self
            .relations
            .iter()
            .filter_map(|r| {
                let target = r.target.as_ref()?;
                let join_column = r
                    .join_column
                    .map_or_else(|| target.id().column_name().to_string(), str::to_string);
                Some(RelationField::new(
                    r.descriptor.field_name,
                    r.descriptor.fetch_mode.unwrap_or_default(),
                    join_column,
                    target.clone(),
                    r.access.target_type(),
                    r.access.target_name(),
                    r.access.is_valued(entity),
                ))
            })
            .collect();

        TableEntity::new(
            TypeId::of::<E>(),
            self.type_name,
            self.table_name.clone(),
            fields,
            self.id_index,
            RelationFields::new(relations),
        )
    }

    /// Table model of a default-constructed `E`
    pub fn template(&self) -> TableEntity {
        self.table_entity(&E::default())
    }

    // =========================================================================
    // Value access
    // =========================================================================

    pub fn identity_value(&self, entity: &E) -> Value {
        self.columns[self.id_index].access.get(entity)
    }

    pub fn set_identity(&self, entity: &mut E, value: Value) -> Result<()> {
        self.columns[self.id_index].access.set(entity, value)
    }

    /// `value` in the canonical form of the identity field (`"7"` becomes `7` for an `i64` id)
    pub fn normalize_identity(&self, value: Value) -> Result<Value> {
        self.columns[self.id_index].access.normalize(value)
    }

    /// Construct a new `E` from the columns `row` exposes
    ///
    /// A column is bound only when the row has its label (`{alias}_{column}`, or the
    /// bare column without an alias); missing labels keep the default value.
    pub fn bind(&self, row: &Row, alias: Option<&str>) -> Result<E> {
        let mut entity = E::default();
        for column in &self.columns {
            let label = column_label(alias, &column.descriptor.column_name);
            if let Some(value) = row.get(&label) {
                column.access.set(&mut entity, value.clone())?;
            }
        }
        Ok(entity)
    }

    /// Write the values of `table` onto `entity`, matching by column name
    pub fn write_back(&self, table: &TableEntity, entity: &mut E) -> Result<()> {
        for column in &self.columns {
            if let Some(field) = table.field(&column.descriptor.column_name) {
                column.access.set(entity, field.value().clone())?;
            }
        }
        Ok(())
    }

    /// Append one child per eager relation in `relations`, built from `row`
    pub(crate) fn append_children(
        &self,
        owner: &mut E,
        row: &Row,
        relations: &RelationFields,
    ) -> Result<()> {
        for relation in relations.eager() {
            let meta = self
                .relations
                .iter()
                .find(|r| r.descriptor.field_name == relation.field_name())
                .ok_or_else(|| {
                    OrmError::type_not_in_relation(format!(
                        "{} has no relation field {}",
                        self.type_name,
                        relation.field_name()
                    ))
                })?;
            meta.access.append_child(owner, row, relation.table())?;
        }
        Ok(())
    }
}
