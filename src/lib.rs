//! # entorm
//!
//! A small entity-graph ORM core.
//!
//! Entity types declare their fields once; the crate classifies them, renders
//! SQL, rebuilds object graphs (including eager one-to-many collections) from
//! joined result rows, and tracks managed instances in a session with an
//! identity map and dirty checking. Executing SQL is delegated to a
//! caller-supplied [`QueryRunner`].
//!
//! ## Features
//!
//! - **Declarative Fields**: identity, column, transient and one-to-many metadata per field
//! - **Query Builder**: fluent `select_from` / `filter` / `find_by_id` / `join_all_eager`
//! - **Join Rendering**: one JOIN per eager relation with deterministic `{table}_{n}` aliases
//! - **Graph Mapping**: contiguous joined rows collapse into one root with its children
//! - **Session**: identity map, persist / find / merge / remove, change-only UPDATEs
//! - **DDL**: CREATE / DROP TABLE statements from entity declarations
//!
//! ## Quick Start
//!
//! ```rust
//! use entorm::{Entity, FieldDef, Managed, QueryRunner, Result, Row, Session, Value};
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
//! /// Prints statements instead of running them
//! struct DryRun;
//!
//! impl QueryRunner for DryRun {
//!     fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
//!         println!("{sql}");
//!         Ok(Vec::new())
//!     }
//!
//!     fn execute(&mut self, sql: &str) -> Result<u64> {
//!         println!("{sql}");
//!         Ok(1)
//!     }
//!
//!     fn insert(&mut self, sql: &str) -> Result<Option<Value>> {
//!         println!("{sql}");
//!         Ok(None)
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let mut session = Session::new(DryRun);
//!
//!     let ann = Managed::new(Person { id: Some(1), name: "Ann".into(), age: 30 });
//!     session.persist(&ann)?;
//!
//!     // served from the identity map
//!     let found = session.find::<Person>(1)?.expect("managed");
//!     assert!(found.ptr_eq(&ann));
//!
//!     ann.borrow_mut().age = 31;
//!     session.merge(&ann)?; // UPDATE person SET age = 31 WHERE id = 1
//!
//!     session.remove(&ann)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Naming and identifier validation are configured with `OrmConfig`:
//!
//! ```rust
//! use entorm::{OrmConfig, SnakeCaseNaming};
//!
//! let config = OrmConfig::builder()
//!     .naming(SnakeCaseNaming)       // CamelCase types -> snake_case tables (default)
//!     .validate_identifiers(true)    // reject reserved words and unsafe names (default)
//!     .build();
//! ```
//!
//! ## Logging
//!
//! Rendered statements and session operations are emitted through `tracing`
//! at `debug`; identity-map hits and row mapping at `trace`. The crate never
//! installs a subscriber.

pub mod classifier;
pub mod config;
pub mod dirty_check;
pub mod entity;
pub mod error;
pub mod relation;
pub mod row;
pub mod row_mapper;
pub mod runner;
pub mod session;
pub mod sql;
pub mod table;
pub mod types;

// Re-export main types for convenience
pub use classifier::{EntityMeta, FieldDescriptor};
pub use config::{NamingStrategy, OrmConfig, OrmConfigBuilder, SnakeCaseNaming};
pub use dirty_check::DirtyCheckMarker;
pub use entity::{Entity, FieldDef, FieldMeta};
pub use error::{OrmError, Result};
pub use relation::{RelationField, RelationFields};
pub use row::{Row, RowCursor};
pub use row_mapper::{DefaultRowMapper, EntityGraphRowMapper, RowMapper};
pub use runner::QueryRunner;
pub use session::{EntityKey, IdKey, IdentityMap, Managed, Session};
pub use table::{AliasScope, TableEntity, TableField, TableFields};
pub use types::{ColumnType, FetchMode, GenerationType, RelationKind, SqlValue, Value};

// Re-export SQL building for convenience
pub use sql::condition::{Condition, Conditions, eq};
pub use sql::ddl::DdlGenerator;
pub use sql::select::{QueryBuilder, Select};
