//! Declarative entity metadata
//!
//! An entity type registers its fields once through [`Entity::fields`]. Each
//! [`FieldDef`] carries the per-field flags (identity, column, transient,
//! relation, fetch mode) plus the get/set capability used to read and write the
//! live value, so nothing is discovered at runtime.
//!
//! ```
//! use entorm::{Entity, FetchMode, FieldDef};
//!
//! #[derive(Debug, Default)]
//! struct OrderItem {
//!     id: Option<i64>,
//!     product: String,
//!     order_id: Option<i64>,
//! }
//!
//! impl Entity for OrderItem {
//!     fn table_name() -> Option<&'static str> {
//!         Some("order_items")
//!     }
//!
//!     fn fields() -> Vec<FieldDef<Self>> {
//!         vec![
//!             FieldDef::id("id", |i: &Self| &i.id, |i: &mut Self| &mut i.id),
//!             FieldDef::field("product", |i: &Self| &i.product, |i: &mut Self| &mut i.product),
//!             FieldDef::field("order_id", |i: &Self| &i.order_id, |i: &mut Self| &mut i.order_id),
//!         ]
//!     }
//! }
//!
//! #[derive(Debug, Default)]
//! struct Order {
//!     id: Option<i64>,
//!     items: Option<Vec<OrderItem>>,
//! }
//!
//! impl Entity for Order {
//!     fn table_name() -> Option<&'static str> {
//!         Some("orders")
//!     }
//!
//!     fn fields() -> Vec<FieldDef<Self>> {
//!         vec![
//!             FieldDef::id("id", |o: &Self| &o.id, |o: &mut Self| &mut o.id),
//!             FieldDef::one_to_many("items", |o: &Self| &o.items, |o: &mut Self| &mut o.items)
//!                 .fetch(FetchMode::Eager)
//!                 .join_column("order_id"),
//!         ]
//!     }
//! }
//! ```

use std::any::{TypeId, type_name};
use std::cell::OnceCell;
use std::rc::Rc;

use crate::classifier::EntityMeta;
use crate::config::OrmConfig;
use crate::error::{OrmError, Result};
use crate::row::Row;
use crate::table::TableEntity;
use crate::types::{ColumnType, FetchMode, GenerationType, RelationKind, SqlValue, Value};

/// A record type mapped to one table
pub trait Entity: Default + 'static {
    /// Name of the type, fed to the naming strategy for the table name
    fn entity_name() -> &'static str {
        let full = type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Explicit table name, if the naming strategy should not derive one
    fn table_name() -> Option<&'static str> {
        None
    }

    /// Field registration table, in declaration order
    fn fields() -> Vec<FieldDef<Self>>;
}

/// Declarative flags attached to one field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMeta {
    /// Field is the identity (primary key)
    pub id: bool,
    /// Field carries explicit column metadata
    pub column: bool,
    /// Explicit column name override
    pub column_name: Option<&'static str>,
    /// Field is not persisted
    pub transient: bool,
    /// Association kind, if the field is a relation
    pub relation: Option<RelationKind>,
    /// Fetch mode of the association
    pub fetch: FetchMode,
    /// Join column on the target table
    pub join_column: Option<&'static str>,
    /// How the identity value is produced
    pub generation: GenerationType,
    /// Column type override for DDL
    pub column_type: Option<ColumnType>,
}

/// One declared field of an entity: its flags plus how to reach its value
pub struct FieldDef<E> {
    pub(crate) name: &'static str,
    pub(crate) meta: FieldMeta,
    pub(crate) access: FieldAccess<E>,
}

pub(crate) enum FieldAccess<E> {
    Column(Box<dyn ColumnAccess<E>>),
    Relation(Box<dyn RelationAccess<E>>),
    Detached,
}

impl<E: Entity> FieldDef<E> {
    /// Identity field
    pub fn id<V: SqlValue + 'static>(
        name: &'static str,
        get: fn(&E) -> &V,
        get_mut: fn(&mut E) -> &mut V,
    ) -> Self {
        let mut def = Self::field(name, get, get_mut);
        def.meta.id = true;
        def
    }

    /// Plain persistent field, mapped to a column named by the naming strategy
    pub fn field<V: SqlValue + 'static>(
        name: &'static str,
        get: fn(&E) -> &V,
        get_mut: fn(&mut E) -> &mut V,
    ) -> Self {
        Self {
            name,
            meta: FieldMeta::default(),
            access: FieldAccess::Column(Box::new(TypedColumn { get, get_mut })),
        }
    }

    /// Field that is never persisted
    pub fn transient(name: &'static str) -> Self {
        Self {
            name,
            meta: FieldMeta {
                transient: true,
                ..FieldMeta::default()
            },
            access: FieldAccess::Detached,
        }
    }

    /// One-to-many association to `T`, held as an optional collection
    ///
    /// `None` means the collection was never loaded; eager loading creates it.
    pub fn one_to_many<T: Entity>(
        name: &'static str,
        get: fn(&E) -> &Option<Vec<T>>,
        get_mut: fn(&mut E) -> &mut Option<Vec<T>>,
    ) -> Self {
        Self {
            name,
            meta: FieldMeta {
                relation: Some(RelationKind::OneToMany),
                ..FieldMeta::default()
            },
            access: FieldAccess::Relation(Box::new(OneToManyAccess {
                get,
                get_mut,
                target: OnceCell::new(),
            })),
        }
    }

    /// Association of an arbitrary kind without an accessor
    ///
    /// Only [`RelationKind::OneToMany`] is supported; classifying an entity with any
    /// other kind fails with [`OrmError::NotYetImplemented`].
    pub fn relation(name: &'static str, kind: RelationKind) -> Self {
        Self {
            name,
            meta: FieldMeta {
                relation: Some(kind),
                ..FieldMeta::default()
            },
            access: FieldAccess::Detached,
        }
    }

    /// Mark the field with explicit column metadata
    pub fn column(mut self) -> Self {
        self.meta.column = true;
        self
    }

    /// Mark the field with explicit column metadata and a column name
    pub fn column_named(mut self, column_name: &'static str) -> Self {
        self.meta.column = true;
        self.meta.column_name = Some(column_name);
        self
    }

    /// Mark the field transient
    pub fn as_transient(mut self) -> Self {
        self.meta.transient = true;
        self
    }

    pub fn fetch(mut self, fetch: FetchMode) -> Self {
        self.meta.fetch = fetch;
        self
    }

    /// Join column on the target table (defaults to the target's identity column)
    pub fn join_column(mut self, column: &'static str) -> Self {
        self.meta.join_column = Some(column);
        self
    }

    pub fn generated(mut self, generation: GenerationType) -> Self {
        self.meta.generation = generation;
        self
    }

    /// Override the column type used for DDL
    pub fn column_type(mut self, column_type: ColumnType) -> Self {
        self.meta.column_type = Some(column_type);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn meta(&self) -> &FieldMeta {
        &self.meta
    }
}

// ============================================================================
// Column access
// ============================================================================

pub(crate) trait ColumnAccess<E> {
    fn get(&self, entity: &E) -> Value;
    fn set(&self, entity: &mut E, value: Value) -> Result<()>;
    /// `value` converted through the field type and back
    fn normalize(&self, value: Value) -> Result<Value>;
    fn column_type(&self) -> ColumnType;
    fn nullable(&self) -> bool;
}

struct TypedColumn<E, V> {
    get: fn(&E) -> &V,
    get_mut: fn(&mut E) -> &mut V,
}

impl<E, V: SqlValue> ColumnAccess<E> for TypedColumn<E, V> {
    fn get(&self, entity: &E) -> Value {
        (self.get)(entity).to_value()
    }

    fn set(&self, entity: &mut E, value: Value) -> Result<()> {
        *(self.get_mut)(entity) = V::from_value(value)?;
        Ok(())
    }

    fn normalize(&self, value: Value) -> Result<Value> {
        Ok(V::from_value(value)?.to_value())
    }

    fn column_type(&self) -> ColumnType {
        V::column_type()
    }

    fn nullable(&self) -> bool {
        V::nullable()
    }
}

// ============================================================================
// Relation access
// ============================================================================

pub(crate) trait RelationAccess<E> {
    fn target_type(&self) -> TypeId;

    fn target_name(&self) -> &'static str;

    /// Classify the target type and return its empty table model
    fn resolve(&self, config: &OrmConfig) -> Result<TableEntity>;

    /// Whether the owner currently holds a collection for this relation
    fn is_valued(&self, owner: &E) -> bool;

    /// Build one target instance from `row` and append it to the owner's collection
    ///
    /// Returns `false` when the row carries no target (NULL identity).
    fn append_child(&self, owner: &mut E, row: &Row, target: &TableEntity) -> Result<bool>;
}

struct OneToManyAccess<E, T: Entity> {
    get: fn(&E) -> &Option<Vec<T>>,
    get_mut: fn(&mut E) -> &mut Option<Vec<T>>,
    target: OnceCell<Rc<EntityMeta<T>>>,
}

impl<E, T: Entity> RelationAccess<E> for OneToManyAccess<E, T> {
    fn target_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn target_name(&self) -> &'static str {
        T::entity_name()
    }

    fn resolve(&self, config: &OrmConfig) -> Result<TableEntity> {
        if let Some(meta) = self.target.get() {
            return Ok(meta.template());
        }
        let meta = Rc::new(EntityMeta::<T>::classify_shallow(config)?);
        let template = meta.template();
        let _ = self.target.set(meta);
        Ok(template)
    }

    fn is_valued(&self, owner: &E) -> bool {
        (self.get)(owner).as_ref().is_some_and(|items| !items.is_empty())
    }

    fn append_child(&self, owner: &mut E, row: &Row, target: &TableEntity) -> Result<bool> {
        let meta = self.target.get().ok_or_else(|| {
            OrmError::invalid_entity(format!(
                "relation target {} was never resolved",
                T::entity_name()
            ))
        })?;

        let id_label = target.column_label(target.id().column_name());
        if row.get(&id_label).is_some_and(Value::is_null) {
            return Ok(false);
        }

        let child = meta
            .bind(row, target.alias())
            .map_err(|e| OrmError::row_mapping(T::entity_name(), e))?;
        (self.get_mut)(owner).get_or_insert_with(Vec::new).push(child);
        Ok(true)
    }
}
