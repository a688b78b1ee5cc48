//! Error types for the command system
//!
//! `ParseError` covers command-file syntax and never escapes the factory: a
//! line that fails to parse becomes a placeholder command. `CmdError` is
//! returned by `Command::run` and becomes a FAILURE message on the command.

use geoproc_layers::{LayerError, ToolkitError};
use geoproc_props::PropertyError;
use thiserror::Error;

/// Result type for command operations
pub type CmdResult<T = ()> = Result<T, CmdError>;

/// Errors that can occur while a command runs
#[derive(Debug, Error)]
pub enum CmdError {
    /// Parameter value is not usable
    #[error("invalid value '{value}' for parameter {name}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// Required parameter not given
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// Property store error
    #[error(transparent)]
    Property(#[from] PropertyError),

    /// Layer registry error
    #[error(transparent)]
    Layer(#[from] LayerError),

    /// GIS toolkit error
    #[error("GIS toolkit error: {0}")]
    Toolkit(#[from] ToolkitError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic execution error
    #[error("{0}")]
    Execution(String),
}

impl CmdError {
    /// Create an invalid parameter error
    pub fn invalid_param(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CmdError::InvalidParameter {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        CmdError::Execution(msg.into())
    }

    /// Recommended user action for the status log
    pub fn recommendation(&self) -> String {
        match self {
            CmdError::InvalidParameter { name, .. } => {
                format!("Specify a valid value for the {} parameter.", name)
            }
            CmdError::MissingParameter(name) => format!("Specify the {} parameter.", name),
            CmdError::Property(PropertyError::Protected(name)) => format!(
                "Property {} is set by the processor; use a different property name.",
                name
            ),
            CmdError::Property(PropertyError::NotFound(name)) => {
                format!("Set property {} before it is used.", name)
            }
            CmdError::Property(_) => "Check the property name and value.".to_string(),
            CmdError::Layer(LayerError::NotFound(id)) => format!(
                "Verify that layer {} is read or created by an earlier command.",
                id
            ),
            CmdError::Layer(LayerError::Exists(id)) => {
                format!("Layer {} already exists; use a different identifier.", id)
            }
            CmdError::Layer(LayerError::Toolkit(_)) | CmdError::Toolkit(_) => {
                "Check the input data and the GIS toolkit messages in the log.".to_string()
            }
            CmdError::Layer(_) => "Check the layer identifier.".to_string(),
            CmdError::Io(_) => "Check that the file and its folder exist and are accessible.".to_string(),
            CmdError::Execution(_) => "See the log for details.".to_string(),
        }
    }
}

/// Errors that can occur while parsing a command line
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Blank line where a command was expected
    #[error("empty command")]
    EmptyCommand,

    /// Command name missing or not made of letters, digits and underscores
    #[error("invalid command name: '{0}'")]
    InvalidName(String),

    /// Parameter name missing or malformed
    #[error("invalid parameter name: '{0}'")]
    InvalidParameterName(String),

    /// Parameter written without `=`
    #[error("expected '=' after parameter {0}")]
    MissingEquals(String),

    /// Same parameter given twice
    #[error("duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// Quoted value without a closing quote
    #[error("unterminated string: {0}")]
    UnterminatedString(String),

    /// Missing `)`
    #[error("unbalanced parentheses")]
    UnbalancedParens,

    /// Text after the closing `)` or between parameters
    #[error("unexpected text: '{0}'")]
    TrailingInput(String),

    /// Generic parse error with message
    #[error("parse error: {0}")]
    Generic(String),
}

impl From<nom::Err<nom::error::Error<&str>>> for ParseError {
    fn from(err: nom::Err<nom::error::Error<&str>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => ParseError::UnbalancedParens,
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                ParseError::Generic(format!("at '{}'", e.input.chars().take(20).collect::<String>()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CmdError::MissingParameter("InputFile".to_string());
        assert_eq!(format!("{}", err), "missing required parameter: InputFile");

        let err = CmdError::invalid_param("Sequence", "1:x", "end is not a number");
        assert_eq!(
            format!("{}", err),
            "invalid value '1:x' for parameter Sequence: end is not a number"
        );
    }

    #[test]
    fn test_recommendation_names_parameter() {
        let err = CmdError::invalid_param("OutputFile", "", "empty");
        assert!(err.recommendation().contains("OutputFile"));

        let err = CmdError::from(PropertyError::Protected("WorkingDir".to_string()));
        assert!(err.recommendation().contains("WorkingDir"));
    }

    #[test]
    fn test_parse_error() {
        let err = ParseError::MissingEquals("Folder".to_string());
        assert_eq!(format!("{}", err), "expected '=' after parameter Folder");
    }
}
