//! Fluent SELECT building
//!
//! ```
//! use entorm::{Entity, FieldDef, QueryBuilder, eq};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     id: Option<i64>,
//!     name: String,
//!     age: i32,
//! }
//!
//! impl Entity for Person {
//!     fn fields() -> Vec<FieldDef<Self>> {
//!         vec![
//!             FieldDef::id("id", |p: &Self| &p.id, |p: &mut Self| &mut p.id),
//!             FieldDef::field("name", |p: &Self| &p.name, |p: &mut Self| &mut p.name),
//!             FieldDef::field("age", |p: &Self| &p.age, |p: &mut Self| &mut p.age),
//!         ]
//!     }
//! }
//!
//! let sql = QueryBuilder::new()
//!     .select_from::<Person>()
//!     .unwrap()
//!     .filter(eq("id", 1).and(eq("name", "X")).or(eq("age", 30)))
//!     .extract_sql();
//! assert_eq!(sql, "SELECT id,name,age FROM person WHERE id = 1 AND name = 'X' OR age = 30");
//! ```

use std::rc::Rc;

use tracing::debug;

use crate::classifier::EntityMeta;
use crate::config::OrmConfig;
use crate::entity::Entity;
use crate::error::Result;
use crate::relation::RelationFields;
use crate::row_mapper::{DefaultRowMapper, EntityGraphRowMapper};
use crate::runner::QueryRunner;
use crate::sql::condition::{Condition, Conditions, eq};
use crate::sql::render::{SelectRenderer, SimpleSelectRenderer, WithJoinQueryRenderer};
use crate::table::{AliasScope, TableEntity};
use crate::types::Value;

/// Entry point for SELECT queries
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    config: OrmConfig,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OrmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    /// Start a query over every column of `E`
    pub fn select_from<E: Entity>(&self) -> Result<Select<E>> {
        let meta = EntityMeta::<E>::classify(&self.config)?;
        Ok(Select::with_meta(Rc::new(meta)))
    }
}

/// One SELECT under construction
///
/// Starts without a predicate; `filter`/`find_by_id` attach one and
/// `join_all_eager`/`join` switch to the join renderer. Terminal `fetch_one`
/// and `fetch` leave the query untouched.
pub struct Select<E> {
    meta: Rc<EntityMeta<E>>,
    table: TableEntity,
    relations: RelationFields,
    conditions: Conditions,
    aliases: AliasScope,
    joined: bool,
}

impl<E: Entity> Select<E> {
    /// Query over an already classified entity type
    pub fn with_meta(meta: Rc<EntityMeta<E>>) -> Self {
        let table = meta.template();
        Self {
            meta,
            table,
            relations: RelationFields::default(),
            conditions: Conditions::new(),
            aliases: AliasScope::new(),
            joined: false,
        }
    }

    /// Append a predicate; predicates are AND-joined
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.add(condition);
        self
    }

    /// Append several predicates at once, AND-joined
    pub fn filter_all(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.conditions.add_all(conditions);
        self
    }

    /// Drop every predicate
    pub fn find_all(mut self) -> Self {
        self.conditions.clear();
        self
    }

    /// Replace the predicates with `id_column = id`
    pub fn find_by_id(mut self, id: impl Into<Value>) -> Self {
        let column = self.table.id().column_name().to_string();
        self.conditions.clear();
        self.conditions.add(eq(column, id));
        self
    }

    /// Like [`Select::find_by_id`], qualifying the column with the alias when one is assigned
    pub fn where_with_id(mut self, id: impl Into<Value>) -> Self {
        let column = self.table.qualified_column(self.table.id().column_name());
        self.conditions.clear();
        self.conditions.add(eq(column, id));
        self
    }

    /// Join every eager one-to-many target into the query
    pub fn join_all_eager(mut self) -> Self {
        self.joined = true;
        self.table.add_alias_if_not_assigned(&mut self.aliases);
        let mut relations = self.table.relation_fields().clone();
        relations.retain_eager();
        relations.assign_aliases(&mut self.aliases);
        self.relations = relations;
        self
    }

    /// Switch to the join renderer for a manual join with `T`
    ///
    /// Only aliases the driving table; the eager relation snapshot is left as is.
    pub fn join<T: Entity>(mut self) -> Result<Self> {
        self.table.relation_fields().of_type::<T>()?;
        self.joined = true;
        self.table.add_alias_if_not_assigned(&mut self.aliases);
        Ok(self)
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// Driving table model
    pub fn table(&self) -> &TableEntity {
        &self.table
    }

    /// Eager relations captured by [`Select::join_all_eager`]
    pub fn relations(&self) -> &RelationFields {
        &self.relations
    }

    /// Render the query
    pub fn extract_sql(&self) -> String {
        if self.joined {
            WithJoinQueryRenderer.render(&self.table, &self.relations, &self.conditions)
        } else {
            SimpleSelectRenderer.render(&self.table, &self.relations, &self.conditions)
        }
    }

    /// Run the query and map the first result
    pub fn fetch_one<R: QueryRunner>(&self, runner: &mut R) -> Result<Option<E>> {
        let sql = self.extract_sql();
        debug!(entity = self.meta.type_name(), sql = %sql, "Fetching one");
        if self.joined {
            runner.fetch_one(&sql, &mut self.graph_mapper())
        } else {
            runner.fetch_one(&sql, &mut self.default_mapper())
        }
    }

    /// Run the query and map every result
    pub fn fetch<R: QueryRunner>(&self, runner: &mut R) -> Result<Vec<E>> {
        let sql = self.extract_sql();
        debug!(entity = self.meta.type_name(), sql = %sql, "Fetching");
        if self.joined {
            runner.fetch(&sql, &mut self.graph_mapper())
        } else {
            runner.fetch(&sql, &mut self.default_mapper())
        }
    }

    fn graph_mapper(&self) -> EntityGraphRowMapper<E> {
        EntityGraphRowMapper::new(
            Rc::clone(&self.meta),
            self.table.clone(),
            self.relations.clone(),
        )
    }

    fn default_mapper(&self) -> DefaultRowMapper<E> {
        DefaultRowMapper::new(Rc::clone(&self.meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::FieldDef;
    use crate::error::OrmError;
    use crate::types::FetchMode;

    #[derive(Debug, Default)]
    struct Person {
        id: Option<i64>,
        name: String,
        age: i32,
    }

    impl Entity for Person {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::id("id", |p: &Self| &p.id, |p: &mut Self| &mut p.id),
                FieldDef::field("name", |p: &Self| &p.name, |p: &mut Self| &mut p.name),
                FieldDef::field("age", |p: &Self| &p.age, |p: &mut Self| &mut p.age),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Pet {
        id: i64,
        owner_id: i64,
    }

    impl Entity for Pet {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::id("id", |p: &Self| &p.id, |p: &mut Self| &mut p.id),
                FieldDef::field("owner_id", |p: &Self| &p.owner_id, |p: &mut Self| {
                    &mut p.owner_id
                }),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Owner {
        id: i64,
        pets: Option<Vec<Pet>>,
    }

    impl Entity for Owner {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::id("id", |o: &Self| &o.id, |o: &mut Self| &mut o.id),
                FieldDef::one_to_many("pets", |o: &Self| &o.pets, |o: &mut Self| &mut o.pets)
                    .fetch(FetchMode::Eager)
                    .join_column("owner_id"),
            ]
        }
    }

    fn persons() -> Select<Person> {
        QueryBuilder::new().select_from::<Person>().unwrap()
    }

    // =========================================================================
    // Predicate Tests
    // =========================================================================

    #[test]
    fn test_select_all_columns() {
        assert_eq!(persons().extract_sql(), "SELECT id,name,age FROM person");
    }

    #[test]
    fn test_filter_single() {
        let sql = persons().filter(eq("id", 1)).extract_sql();
        assert_eq!(sql, "SELECT id,name,age FROM person WHERE id = 1");
    }

    #[test]
    fn test_filter_all_and_joins() {
        let sql = persons()
            .filter_all([eq("name", "X"), eq("age", 30)])
            .extract_sql();
        assert_eq!(sql, "SELECT id,name,age FROM person WHERE name = 'X' AND age = 30");
    }

    #[test]
    fn test_find_all_clears_predicates() {
        let select = persons().filter(eq("id", 1)).find_all();
        assert!(!select.conditions().has_condition());
        assert_eq!(select.extract_sql(), "SELECT id,name,age FROM person");
    }

    #[test]
    fn test_find_by_id_replaces_predicates() {
        let sql = persons().filter(eq("age", 30)).find_by_id(5).extract_sql();
        assert_eq!(sql, "SELECT id,name,age FROM person WHERE id = 5");
    }

    #[test]
    fn test_where_with_id_without_alias_is_bare() {
        let sql = persons().where_with_id(2).extract_sql();
        assert_eq!(sql, "SELECT id,name,age FROM person WHERE id = 2");
    }

    // =========================================================================
    // Join Tests
    // =========================================================================

    #[test]
    fn test_join_all_eager_renders_join() {
        let sql = QueryBuilder::new()
            .select_from::<Owner>()
            .unwrap()
            .join_all_eager()
            .where_with_id(1)
            .extract_sql();

        assert_eq!(
            sql,
            "SELECT owner_1.id,pet_2.id,pet_2.owner_id FROM owner owner_1 \
             JOIN pet pet_2 ON owner_1.id = pet_2.owner_id WHERE owner_1.id = 1"
        );
    }

    #[test]
    fn test_join_all_eager_is_idempotent_for_driving_alias() {
        let select = QueryBuilder::new()
            .select_from::<Owner>()
            .unwrap()
            .join_all_eager()
            .join_all_eager();

        assert_eq!(select.table().alias(), Some("owner_1"));
        assert_eq!(select.relations().len(), 1);
    }

    #[test]
    fn test_manual_join_keeps_relation_snapshot() {
        let select = QueryBuilder::new()
            .select_from::<Owner>()
            .unwrap()
            .join::<Pet>()
            .unwrap();

        assert!(select.is_joined());
        assert!(select.relations().is_empty());
        assert_eq!(select.extract_sql(), "SELECT owner_1.id FROM owner owner_1");
    }

    #[test]
    fn test_manual_join_rejects_unrelated_type() {
        let err = QueryBuilder::new()
            .select_from::<Owner>()
            .unwrap()
            .join::<Person>()
            .err()
            .unwrap();
        assert!(matches!(err, OrmError::TypeNotInRelation(_)));
    }
}
