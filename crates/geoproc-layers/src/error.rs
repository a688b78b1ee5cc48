//! Error types for the layer crate

use std::path::PathBuf;

use thiserror::Error;

/// Layer registry errors
#[derive(Debug, Error)]
pub enum LayerError {
    /// Layer not found in registry
    #[error("Layer not found: {0}")]
    NotFound(String),

    /// Layer already exists with this id
    #[error("Layer already exists: {0}")]
    Exists(String),

    /// Layer id is not usable
    #[error("Invalid layer id: '{0}'")]
    InvalidId(String),

    /// Toolkit error while producing or consuming a layer
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
}

/// Result type for layer operations
pub type LayerResult<T> = Result<T, LayerError>;

/// Errors reported by a GIS toolkit
#[derive(Debug, Error)]
pub enum ToolkitError {
    /// Toolkit used before `initialize` or after `shutdown`
    #[error("GIS toolkit '{0}' is not initialized")]
    NotInitialized(String),

    /// Dataset format not handled by the toolkit
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Geoprocessing operation not handled by the toolkit
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// File could not be read or written
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dataset content is not usable
    #[error("Dataset error: {0}")]
    Dataset(String),
}

/// Result type for toolkit operations
pub type ToolkitResult<T> = Result<T, ToolkitError>;

impl ToolkitError {
    /// Create an I/O error for a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolkitError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a dataset error
    pub fn dataset(msg: impl Into<String>) -> Self {
        ToolkitError::Dataset(msg.into())
    }
}
