//! Condition building for SQL WHERE clauses
//!
//! Predicates are equality leaves combined with AND/OR. Rendering keeps the
//! construction order verbatim and never inserts parentheses, so
//! `eq("id", 1).and(eq("name", "X")).or(eq("age", 30))` renders as
//! `id = 1 AND name = 'X' OR age = 30`.

use std::fmt;

use crate::types::Value;

/// A predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = literal`
    Eq { column: String, value: Value },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

/// Equality predicate on `column`
pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Condition {
    Condition::Eq {
        column: column.into(),
        value: value.into(),
    }
}

impl Condition {
    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Render as SQL text with inlined literals
    pub fn render(&self) -> String {
        match self {
            Condition::Eq { column, value } => format!("{} = {}", column, value.to_sql_literal()),
            Condition::And(left, right) => format!("{} AND {}", left.render(), right.render()),
            Condition::Or(left, right) => format!("{} OR {}", left.render(), right.render()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// The predicates attached to one query, AND-joined on render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    conditions: Vec<Condition>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn add_all(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.conditions.extend(conditions);
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
    }

    pub fn has_condition(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Render the WHERE predicate (without the keyword); `None` when empty
    pub fn render_condition(&self) -> Option<String> {
        if self.conditions.is_empty() {
            return None;
        }
        Some(
            self.conditions
                .iter()
                .map(Condition::render)
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }
}
