//! Error types for the property store

use thiserror::Error;

/// Result type for property operations
pub type PropertyResult<T = ()> = Result<T, PropertyError>;

/// Errors that can occur when reading or writing properties
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    /// Property is protected and cannot be written by user commands
    #[error("property '{0}' is protected and cannot be changed")]
    Protected(String),

    /// Property not found
    #[error("property not found: {0}")]
    NotFound(String),

    /// Property name is not usable
    #[error("invalid property name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Text could not be converted to the requested type
    #[error("invalid {expected} value: '{value}'")]
    InvalidValue { expected: &'static str, value: String },

    /// Unknown property type name
    #[error("unknown property type '{0}' (expected str, int, float, bool or list)")]
    UnknownType(String),

    /// Stored value has a different type than the caller asked for
    #[error("property '{name}' has type {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl PropertyError {
    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        PropertyError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(expected: &'static str, value: impl Into<String>) -> Self {
        PropertyError::InvalidValue {
            expected,
            value: value.into(),
        }
    }
}
