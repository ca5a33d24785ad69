//! SQL execution seam
//!
//! The crate renders SQL and maps rows; running statements is left to a
//! [`QueryRunner`] supplied by the caller. Implementations report their own
//! failures as [`OrmError::Execution`](crate::error::OrmError::Execution), which
//! is propagated unchanged.

use crate::error::Result;
use crate::row::{Row, RowCursor};
use crate::row_mapper::RowMapper;
use crate::types::Value;

/// Runs rendered SQL against a database
pub trait QueryRunner {
    /// Run a SELECT and return its rows, labeled as the mappers expect
    fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Run an UPDATE or DELETE and return the number of affected rows
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run an INSERT and return the storage-generated key, if any
    fn insert(&mut self, sql: &str) -> Result<Option<Value>>;

    /// Run `sql` and map the first result, `None` when there are no rows
    fn fetch_one<T, M>(&mut self, sql: &str, mapper: &mut M) -> Result<Option<T>>
    where
        Self: Sized,
        M: RowMapper<T>,
    {
        let mut rows = RowCursor::new(self.query(sql)?);
        if rows.is_exhausted() {
            return Ok(None);
        }
        mapper.map_row(&mut rows).map(Some)
    }

    /// Run `sql` and map every result
    fn fetch<T, M>(&mut self, sql: &str, mapper: &mut M) -> Result<Vec<T>>
    where
        Self: Sized,
        M: RowMapper<T>,
    {
        let mut rows = RowCursor::new(self.query(sql)?);
        let mut results = Vec::new();
        while !rows.is_exhausted() {
            results.push(mapper.map_row(&mut rows)?);
        }
        Ok(results)
    }
}

impl<R: QueryRunner + ?Sized> QueryRunner for &mut R {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        (**self).query(sql)
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        (**self).execute(sql)
    }

    fn insert(&mut self, sql: &str) -> Result<Option<Value>> {
        (**self).insert(sql)
    }
}
