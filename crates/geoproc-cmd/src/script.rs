//! Commands as loaded from a command file

use std::fmt;
use std::sync::Arc;

use crate::command::{BlockRole, Command};
use crate::params::Parameters;
use crate::parser::escape_value;
use crate::status::CommandStatus;

/// What a line of the command file turned into
#[derive(Clone)]
pub enum CommandKind {
    /// Blank line, `#` comment, or line inside a `/* */` block
    Comment,
    /// Line that could not be parsed or names no registered command
    Unrecognized { reason: String },
    /// A registered command
    Known(Arc<dyn Command>),
}

impl fmt::Debug for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Comment => write!(f, "Comment"),
            CommandKind::Unrecognized { reason } => {
                f.debug_struct("Unrecognized").field("reason", reason).finish()
            }
            CommandKind::Known(cmd) => f.debug_tuple("Known").field(&cmd.name()).finish(),
        }
    }
}

/// One line of a command file with its parameters and status
#[derive(Debug, Clone)]
pub struct ScriptCommand {
    line_number: usize,
    text: String,
    kind: CommandKind,
    name: String,
    parameters: Parameters,
    status: CommandStatus,
}

impl ScriptCommand {
    /// Create a comment line
    pub fn comment(text: impl Into<String>, line_number: usize) -> Self {
        Self {
            line_number,
            text: text.into(),
            kind: CommandKind::Comment,
            name: String::new(),
            parameters: Parameters::new(),
            status: CommandStatus::new(),
        }
    }

    /// Create a placeholder for a line that cannot run
    pub fn unrecognized(
        text: impl Into<String>,
        line_number: usize,
        name: impl Into<String>,
        parameters: Parameters,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            line_number,
            text: text.into(),
            kind: CommandKind::Unrecognized {
                reason: reason.into(),
            },
            name: name.into(),
            parameters,
            status: CommandStatus::new(),
        }
    }

    /// Create a registered command
    ///
    /// The command's own name is used, so `to_text` writes the canonical
    /// spelling whatever case the file used.
    pub fn known(
        text: impl Into<String>,
        line_number: usize,
        command: Arc<dyn Command>,
        parameters: Parameters,
    ) -> Self {
        Self {
            line_number,
            text: text.into(),
            name: command.name().to_string(),
            kind: CommandKind::Known(command),
            parameters,
            status: CommandStatus::new(),
        }
    }

    /// Line number in the command file (1-based)
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Original line text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Command name; empty for comments
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the kind
    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    /// Get the command implementation, if registered
    pub fn command(&self) -> Option<&Arc<dyn Command>> {
        match &self.kind {
            CommandKind::Known(cmd) => Some(cmd),
            _ => None,
        }
    }

    /// Check if this line is a comment
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, CommandKind::Comment)
    }

    /// Raw, unsubstituted parameters
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Get the status
    pub fn status(&self) -> &CommandStatus {
        &self.status
    }

    /// Get mutable status
    pub fn status_mut(&mut self) -> &mut CommandStatus {
        &mut self.status
    }

    /// Borrow parameters and status together
    pub(crate) fn split_mut(&mut self) -> (&Parameters, &mut CommandStatus) {
        (&self.parameters, &mut self.status)
    }

    /// Part the command plays in block structure
    pub fn block_role(&self) -> BlockRole {
        self.command()
            .map(|c| c.block_role())
            .unwrap_or(BlockRole::None)
    }

    /// Canonical command text
    ///
    /// Registered commands are written as `Name(P1="v1",P2="v2")`. Comments
    /// and unrecognized lines are written as read.
    pub fn to_text(&self) -> String {
        match self.kind {
            CommandKind::Known(_) => {
                let params: Vec<String> = self
                    .parameters
                    .iter()
                    .map(|(name, value)| format!("{}=\"{}\"", name, escape_value(value)))
                    .collect();
                format!("{}({})", self.name, params.join(","))
            }
            _ => self.text.clone(),
        }
    }
}

impl fmt::Display for ScriptCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}
