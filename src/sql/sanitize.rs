//! SQL identifier validation
//!
//! Rendered SQL leaves identifiers unquoted, so every table and column name
//! resolved by the naming strategy is checked before it can reach a statement.

use std::sync::LazyLock;

use regex::Regex;

/// Keywords that cannot be used as unquoted table or column names
pub const SQL_RESERVED_WORDS: &[&str] = &[
    "ALL", "AND", "ANY", "ARRAY", "AS", "ASC", "BETWEEN", "BOTH", "CASE", "CAST", "CHECK",
    "COLLATE", "COLUMN", "CONSTRAINT", "CREATE", "CROSS", "CURRENT_DATE", "CURRENT_TIME",
    "CURRENT_TIMESTAMP", "CURRENT_USER", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DO",
    "DROP", "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FETCH", "FOR", "FOREIGN", "FROM",
    "FULL", "GRANT", "GROUP", "HAVING", "IN", "INNER", "INSERT", "INTERSECT", "INTO", "IS",
    "JOIN", "LEADING", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "ONLY", "OR",
    "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RETURNING", "RIGHT", "SELECT", "SET",
    "SOME", "TABLE", "THEN", "TO", "TRAILING", "TRUE", "UNION", "UNIQUE", "UPDATE", "USER",
    "USING", "VALUES", "WHEN", "WHERE", "WINDOW", "WITH",
];

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("identifier pattern is valid"));

/// Validate a table or column name
///
/// Rules:
/// - Must start with a lowercase letter (a-z)
/// - Can only contain lowercase letters, numbers, and underscores
/// - Cannot be a reserved SQL keyword
///
/// # Example
/// ```
/// use entorm::sql::validate_identifier;
///
/// assert!(validate_identifier("person").is_ok());
/// assert!(validate_identifier("select").is_err()); // reserved keyword
/// assert!(validate_identifier("Person").is_err()); // uppercase
/// ```
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    if !IDENTIFIER_PATTERN.is_match(name) {
        return Err(format!(
            "Identifier '{}' is invalid. Must start with a lowercase letter and contain only lowercase letters, numbers, and underscores.",
            name
        ));
    }

    if SQL_RESERVED_WORDS.contains(&name.to_uppercase().as_str()) {
        return Err(format!(
            "Identifier '{}' is a reserved SQL keyword and cannot be used.",
            name
        ));
    }

    Ok(())
}
