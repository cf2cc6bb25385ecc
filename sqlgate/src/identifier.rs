//! Identifier validation and quoting
//!
//! Identifiers (schema, table and column names) cannot be bound as statement
//! parameters, so they are embedded as SQL text. Every caller-supplied
//! identifier passes [`validate_identifier`] before it reaches a statement and
//! is then double-quoted with [`quote_identifier`].

use crate::database::traits::GatewayError;

/// Schema used when a request leaves the schema empty
pub const DEFAULT_SCHEMA: &str = "public";

/// Check whether a string is a plain SQL identifier
///
/// Accepts `^[A-Za-z_][A-Za-z0-9_]*$`: ASCII letters, digits and underscore,
/// not starting with a digit, non-empty.
pub fn is_valid_identifier(identifier: &str) -> bool {
    let mut characters = identifier.chars();

    match characters.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    characters.all(|character| character.is_ascii_alphanumeric() || character == '_')
}

/// Validate an identifier, returning it unchanged on success
pub fn validate_identifier(identifier: &str) -> Result<&str, GatewayError> {
    if is_valid_identifier(identifier) {
        Ok(identifier)
    } else {
        Err(GatewayError::InvalidIdentifier(identifier.to_string()))
    }
}

/// Quote an identifier for PostgreSQL
///
/// Embedded double quotes are doubled. Callers validate first, so in practice
/// the identifier is simply wrapped.
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Validate and quote in one step
pub fn quoted(identifier: &str) -> Result<String, GatewayError> {
    validate_identifier(identifier).map(quote_identifier)
}

/// Resolve an optional schema name to the default when empty
pub fn schema_or_default(schema: &str) -> &str {
    if schema.is_empty() {
        DEFAULT_SCHEMA
    } else {
        schema
    }
}

/// Validate and quote a `"schema"."table"` reference
pub fn qualified_table(schema: &str, table: &str) -> Result<String, GatewayError> {
    let schema = quoted(schema_or_default(schema))?;
    let table = quoted(table)?;
    Ok(format!("{}.{}", schema, table))
}
