//! Result rows
//!
//! A [`Row`] is one labeled result row as produced by a
//! [`QueryRunner`](crate::runner::QueryRunner); a [`RowCursor`] walks a result set
//! forward for the row mappers.

use crate::error::{OrmError, Result};
use crate::types::Value;

/// Result label of `column`: `{alias}_{column}`, or the bare column without an alias
pub fn column_label(alias: Option<&str>, column: &str) -> String {
    match alias {
        Some(alias) => format!("{}_{}", alias, column),
        None => column.to_string(),
    }
}

/// One result row: ordered `(label, value)` pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Row::push`]
    pub fn with(mut self, label: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(label, value);
        self
    }

    /// Append a column, replacing an earlier value with the same label
    pub fn push(&mut self, label: impl Into<String>, value: impl Into<Value>) {
        let label = label.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(l, _)| *l == label) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Build a row from a JSON object, one column per key
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(OrmError::value_conversion(format!(
                "expected a JSON object for a row, got {}",
                other
            ))),
        }
    }
}

impl<L: Into<String>, V: Into<Value>> FromIterator<(L, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (L, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (label, value) in iter {
            row.push(label, value);
        }
        row
    }
}

/// Forward-only cursor over a result set
#[derive(Debug, Clone, Default)]
pub struct RowCursor {
    rows: Vec<Row>,
    position: usize,
}

impl RowCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, position: 0 }
    }

    pub fn current(&self) -> Option<&Row> {
        self.rows.get(self.position)
    }

    pub fn advance(&mut self) {
        if self.position < self.rows.len() {
            self.position += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.rows.len()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len() - self.position.min(self.rows.len())
    }
}

impl From<Vec<Row>> for RowCursor {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}
