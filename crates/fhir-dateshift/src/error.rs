//! Error types for schema registration.

use thiserror::Error;

/// Errors that can occur while building a schema.
///
/// The traversal itself never fails; values it cannot interpret are left
/// untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A registered type names a base that is not in the schema.
    #[error("type {type_name} has unknown base type {base}")]
    UnknownBaseType {
        /// The type being registered.
        type_name: String,
        /// The missing base type.
        base: String,
    },

    /// A type was registered with an empty name.
    #[error("type name must not be empty")]
    EmptyTypeName,
}
