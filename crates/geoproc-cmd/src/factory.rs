//! Command factory: one command file line in, one command out

use crate::command::CommandRegistry;
use crate::parser::parse_command;
use crate::script::ScriptCommand;
use crate::status::{tags, CommandPhase, Severity};

/// Creates commands from command file lines
///
/// Creation never fails: a line that cannot be parsed, or that names an
/// unregistered command, becomes a placeholder with an INITIALIZATION
/// failure. No engine state is touched.
pub struct CommandFactory {
    registry: CommandRegistry,
}

impl Default for CommandFactory {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CommandFactory {
    /// Create a factory over a registry
    pub fn new(registry: CommandRegistry) -> Self {
        Self { registry }
    }

    /// Create a factory with the built-in commands
    pub fn with_builtins() -> Self {
        Self::new(CommandRegistry::with_builtins())
    }

    /// Get the registry
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Get mutable access to the registry
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    /// Create a command from one line
    pub fn create(&self, line: &str, line_number: usize) -> ScriptCommand {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return ScriptCommand::comment(line, line_number);
        }

        let parsed = match parse_command(trimmed) {
            Ok(parsed) => parsed,
            Err(e) => {
                let reason = e.to_string();
                let mut cmd = ScriptCommand::unrecognized(
                    line,
                    line_number,
                    "",
                    Default::default(),
                    reason.clone(),
                );
                cmd.status_mut().log(
                    CommandPhase::Initialization,
                    Severity::Failure,
                    tags::SYNTAX,
                    format!("Invalid command syntax at line {}: {}.", line_number, reason),
                    "Write the command as Name(Parameter=\"value\",...).",
                );
                return cmd;
            }
        };

        match self.registry.get(&parsed.name) {
            Some(command) => ScriptCommand::known(line, line_number, command, parsed.parameters),
            None => {
                let mut cmd = ScriptCommand::unrecognized(
                    line,
                    line_number,
                    parsed.name.as_str(),
                    parsed.parameters,
                    "unrecognized command",
                );
                cmd.status_mut().log(
                    CommandPhase::Initialization,
                    Severity::Failure,
                    tags::COMMAND,
                    format!(
                        "Unrecognized command {} at line {}.",
                        parsed.name, line_number
                    ),
                    "Check the command name; see the list of available commands.",
                );
                cmd
            }
        }
    }
}
