//! SELECT rendering
//!
//! Two renderers share the [`SelectRenderer`] seam: the simple one for
//! single-table queries and the join one for queries that pull eager
//! one-to-many targets into the same statement.

use crate::relation::RelationFields;
use crate::sql::condition::Conditions;
use crate::table::TableEntity;

/// Renders one SELECT statement
pub trait SelectRenderer {
    fn render(&self, table: &TableEntity, relations: &RelationFields, conditions: &Conditions)
    -> String;
}

/// `SELECT c1,c2 FROM table[ WHERE p]`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleSelectRenderer;

impl SelectRenderer for SimpleSelectRenderer {
    fn render(
        &self,
        table: &TableEntity,
        _relations: &RelationFields,
        conditions: &Conditions,
    ) -> String {
        let columns = table
            .all_fields()
            .iter()
            .map(|f| f.column_name())
            .collect::<Vec<_>>()
            .join(",");

        let mut sql = format!("SELECT {} FROM {}", columns, table.table_name());
        push_where(&mut sql, conditions);
        sql
    }
}

/// Alias-qualified SELECT with one JOIN per eager relation
///
/// Expects aliases to be assigned on the driving table and every relation
/// target; tables without an alias render unqualified.
#[derive(Debug, Clone, Copy, Default)]
pub struct WithJoinQueryRenderer;

impl WithJoinQueryRenderer {
    fn qualified_columns(table: &TableEntity) -> String {
        table
            .all_fields()
            .iter()
            .map(|f| table.qualified_column(f.column_name()))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn table_reference(table: &TableEntity) -> String {
        match table.alias() {
            Some(alias) => format!("{} {}", table.table_name(), alias),
            None => table.table_name().to_string(),
        }
    }
}

impl SelectRenderer for WithJoinQueryRenderer {
    fn render(
        &self,
        table: &TableEntity,
        relations: &RelationFields,
        conditions: &Conditions,
    ) -> String {
        let mut select_list = vec![Self::qualified_columns(table)];
        select_list.extend(relations.eager().map(|r| Self::qualified_columns(r.table())));

        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list.join(","),
            Self::table_reference(table)
        );

        let joins = relations
            .eager()
            .map(|r| {
                format!(
                    "JOIN {} ON {} = {}",
                    Self::table_reference(r.table()),
                    table.qualified_column(table.id().column_name()),
                    r.table().qualified_column(r.join_column())
                )
            })
            .collect::<Vec<_>>();
        if !joins.is_empty() {
            sql.push(' ');
            sql.push_str(&joins.join(" "));
        }

        push_where(&mut sql, conditions);
        sql
    }
}

fn push_where(sql: &mut String, conditions: &Conditions) {
    if let Some(predicate) = conditions.render_condition() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrmConfig;
    use crate::entity::{Entity, FieldDef};
    use crate::sql::condition::eq;
    use crate::table::AliasScope;
    use crate::types::FetchMode;

    #[derive(Debug, Default)]
    struct Line {
        id: i64,
        basket_id: i64,
    }

    impl Entity for Line {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::id("id", |l: &Self| &l.id, |l: &mut Self| &mut l.id),
                FieldDef::field("basket_id", |l: &Self| &l.basket_id, |l: &mut Self| {
                    &mut l.basket_id
                }),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Basket {
        id: i64,
        label: String,
        lines: Option<Vec<Line>>,
    }

    impl Entity for Basket {
        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::id("id", |b: &Self| &b.id, |b: &mut Self| &mut b.id),
                FieldDef::field("label", |b: &Self| &b.label, |b: &mut Self| &mut b.label),
                FieldDef::one_to_many("lines", |b: &Self| &b.lines, |b: &mut Self| &mut b.lines)
                    .fetch(FetchMode::Eager)
                    .join_column("basket_id"),
            ]
        }
    }

    fn basket() -> TableEntity {
        TableEntity::of::<Basket>(&OrmConfig::default()).unwrap()
    }

    // =========================================================================
    // Simple Renderer Tests
    // =========================================================================

    #[test]
    fn test_simple_without_condition() {
        let table = basket();
        let sql = SimpleSelectRenderer.render(&table, table.relation_fields(), &Conditions::new());
        assert_eq!(sql, "SELECT id,label FROM basket");
    }

    #[test]
    fn test_simple_with_condition() {
        let table = basket();
        let mut conditions = Conditions::new();
        conditions.add(eq("label", "x"));
        let sql = SimpleSelectRenderer.render(&table, table.relation_fields(), &conditions);
        assert_eq!(sql, "SELECT id,label FROM basket WHERE label = 'x'");
    }

    // =========================================================================
    // Join Renderer Tests
    // =========================================================================

    #[test]
    fn test_join_renders_one_clause_per_eager_relation() {
        let mut scope = AliasScope::new();
        let mut table = basket();
        table.add_alias_if_not_assigned(&mut scope);
        let mut relations = table.relation_fields().clone();
        relations.assign_aliases(&mut scope);

        let mut conditions = Conditions::new();
        conditions.add(eq("basket_1.id", 3));
        let sql = WithJoinQueryRenderer.render(&table, &relations, &conditions);

        assert_eq!(
            sql,
            "SELECT basket_1.id,basket_1.label,line_2.id,line_2.basket_id \
             FROM basket basket_1 \
             JOIN line line_2 ON basket_1.id = line_2.basket_id \
             WHERE basket_1.id = 3"
        );
    }

    #[test]
    fn test_join_without_eager_relations_has_no_join_clause() {
        let mut table = basket();
        table.add_alias_if_not_assigned(&mut AliasScope::new());

        let sql = WithJoinQueryRenderer.render(&table, &RelationFields::default(), &Conditions::new());

        assert_eq!(sql, "SELECT basket_1.id,basket_1.label FROM basket basket_1");
    }
}
