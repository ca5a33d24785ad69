//! SQL rendering
//!
//! Provides predicate building, SELECT/DML/DDL generation and identifier validation.

pub mod condition;
pub mod ddl;
pub mod dml;
pub mod render;
pub mod sanitize;
pub mod select;

pub use condition::{Condition, Conditions, eq};
pub use ddl::DdlGenerator;
pub use dml::{render_delete, render_insert, render_update};
pub use render::{SelectRenderer, SimpleSelectRenderer, WithJoinQueryRenderer};
pub use sanitize::{SQL_RESERVED_WORDS, validate_identifier};
pub use select::{QueryBuilder, Select};
