//! Configuration for the ORM
//!
//! Provides a builder pattern for configuring naming and identifier validation.

use std::fmt;
use std::rc::Rc;

/// Resolves table and column names for entity types and fields
///
/// Consulted once per type and once per field during classification.
pub trait NamingStrategy: fmt::Debug {
    /// Table name for an entity type, honouring an explicit override
    fn table_name(&self, entity_name: &str, explicit: Option<&str>) -> String;

    /// Column name for a field, honouring an explicit override
    fn column_name(&self, field_name: &str, explicit: Option<&str>) -> String;
}

/// Default naming: explicit names win, otherwise `CamelCase` becomes `snake_case`
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCaseNaming;

impl NamingStrategy for SnakeCaseNaming {
    fn table_name(&self, entity_name: &str, explicit: Option<&str>) -> String {
        explicit.map_or_else(|| to_snake_case(entity_name), str::to_string)
    }

    fn column_name(&self, field_name: &str, explicit: Option<&str>) -> String {
        explicit.map_or_else(|| to_snake_case(field_name), str::to_string)
    }
}

/// Convert `OrderItem` / `orderNumber` into `order_item` / `order_number`
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Configuration for classification and SQL rendering
#[derive(Debug, Clone)]
pub struct OrmConfig {
    /// Naming strategy for tables and columns
    pub naming: Rc<dyn NamingStrategy>,
    /// Whether resolved table/column names are validated as safe identifiers
    pub validate_identifiers: bool,
}

impl OrmConfig {
    /// Create a new configuration builder
    pub fn builder() -> OrmConfigBuilder {
        OrmConfigBuilder::new()
    }
}

impl Default for OrmConfig {
    fn default() -> Self {
        OrmConfigBuilder::new().build()
    }
}

/// Builder for OrmConfig
#[derive(Debug)]
pub struct OrmConfigBuilder {
    naming: Rc<dyn NamingStrategy>,
    validate_identifiers: bool,
}

impl OrmConfigBuilder {
    /// Create a new builder with snake_case naming and validation enabled
    pub fn new() -> Self {
        Self {
            naming: Rc::new(SnakeCaseNaming),
            validate_identifiers: true,
        }
    }

    /// Set the naming strategy (default: [`SnakeCaseNaming`])
    pub fn naming(mut self, naming: impl NamingStrategy + 'static) -> Self {
        self.naming = Rc::new(naming);
        self
    }

    /// Enable or disable identifier validation (default: true)
    pub fn validate_identifiers(mut self, enabled: bool) -> Self {
        self.validate_identifiers = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> OrmConfig {
        OrmConfig {
            naming: self.naming,
            validate_identifiers: self.validate_identifiers,
        }
    }
}

impl Default for OrmConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct PrefixNaming;

    impl NamingStrategy for PrefixNaming {
        fn table_name(&self, entity_name: &str, _explicit: Option<&str>) -> String {
            format!("tbl_{}", to_snake_case(entity_name))
        }

        fn column_name(&self, field_name: &str, explicit: Option<&str>) -> String {
            explicit.unwrap_or(field_name).to_string()
        }
    }

    // =========================================================================
    // Naming Tests
    // =========================================================================

    #[test]
    fn test_snake_case_conversion() {
        assert_eq!(to_snake_case("Person"), "person");
        assert_eq!(to_snake_case("OrderItem"), "order_item");
        assert_eq!(to_snake_case("orderNumber"), "order_number");
        assert_eq!(to_snake_case("order_id"), "order_id");
        assert_eq!(to_snake_case("Item2Box"), "item2_box");
    }

    #[test]
    fn test_snake_case_naming_prefers_explicit() {
        let naming = SnakeCaseNaming;
        assert_eq!(naming.table_name("Order", Some("orders")), "orders");
        assert_eq!(naming.table_name("OrderItem", None), "order_item");
        assert_eq!(
            naming.column_name("field_name2", Some("annotated_name")),
            "annotated_name"
        );
        assert_eq!(naming.column_name("age", None), "age");
    }

    // =========================================================================
    // Builder Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = OrmConfig::default();
        assert!(config.validate_identifiers);
        assert_eq!(config.naming.table_name("Person", None), "person");
    }

    #[test]
    fn test_builder_overrides() {
        let config = OrmConfig::builder()
            .naming(PrefixNaming)
            .validate_identifiers(false)
            .build();
        assert!(!config.validate_identifiers);
        assert_eq!(config.naming.table_name("Person", None), "tbl_person");
    }
}
