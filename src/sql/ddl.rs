//! DDL generation for entity tables
//!
//! Generates CREATE TABLE / DROP TABLE statements from the classified columns
//! of an entity type. Relation and transient fields have no column.

use crate::classifier::{EntityMeta, FieldDescriptor};
use crate::config::OrmConfig;
use crate::entity::Entity;
use crate::error::Result;
use crate::types::{ColumnType, GenerationType};

/// DDL generator for entity tables
pub struct DdlGenerator<'a> {
    config: &'a OrmConfig,
}

impl<'a> DdlGenerator<'a> {
    /// Create a new DDL generator with the given configuration
    pub fn new(config: &'a OrmConfig) -> Self {
        Self { config }
    }

    /// Generate the CREATE TABLE statement for `E`
    ///
    /// Columns follow declaration order:
    /// - the identity column is the PRIMARY KEY
    /// - storage-generated identities get `GENERATED BY DEFAULT AS IDENTITY`
    /// - columns backed by a non-`Option` type are NOT NULL
    pub fn generate_create_table<E: Entity>(&self) -> Result<String> {
        let meta = EntityMeta::<E>::classify_shallow(self.config)?;
        Ok(Self::create_table_for(&meta))
    }

    /// Generate CREATE TABLE statements for `E` followed by each relation target
    pub fn generate_create_tables<E: Entity>(&self) -> Result<Vec<String>> {
        let meta = EntityMeta::<E>::classify(self.config)?;
        let mut statements = vec![Self::create_table_for(&meta)];

        for relation in meta.template().relation_fields().all() {
            let target = relation.table();
            let columns = target
                .all_fields()
                .iter()
                .map(|f| Self::format_column_definition(f.descriptor()))
                .collect::<Vec<_>>();
            statements.push(format!(
                "CREATE TABLE {} ({})",
                target.table_name(),
                columns.join(",")
            ));
        }
        Ok(statements)
    }

    /// Generate DROP TABLE statement
    pub fn generate_drop_table<E: Entity>(&self) -> Result<String> {
        let meta = EntityMeta::<E>::classify_shallow(self.config)?;
        Ok(format!("DROP TABLE IF EXISTS {}", meta.table_name()))
    }

    fn create_table_for<E: Entity>(meta: &EntityMeta<E>) -> String {
        let columns = meta
            .all_columns()
            .map(Self::format_column_definition)
            .collect::<Vec<_>>();
        format!("CREATE TABLE {} ({})", meta.table_name(), columns.join(","))
    }

    /// Format a single column definition
    pub fn format_column_definition(field: &FieldDescriptor) -> String {
        let column_type = field.column_type.unwrap_or(ColumnType::String);
        let mut parts = vec![field.column_name.clone(), column_type.to_sql_type().to_string()];

        if field.is_identity {
            if field.generation == GenerationType::Identity {
                parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string());
            }
            parts.push("PRIMARY KEY".to_string());
        } else if !field.nullable {
            parts.push("NOT NULL".to_string());
        }

        parts.join(" ")
    }
}
