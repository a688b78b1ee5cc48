//! Command trait and registry
//!
//! Defines the interface for commands and the registry that maps names to implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use geoproc_props::{names, PropertyValue};

use crate::error::{CmdError, CmdResult};
use crate::params::{self, ParamDef, Parameters, ValidationResult};
use crate::processor::ProcessorState;
use crate::status::{tags, CommandPhase, LogRecord, PhaseStatus, Severity};

/// Where the processor goes after a command runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next command
    Next,
    /// Jump past the current block: If (false) to after Else or EndIf,
    /// Else to after EndIf, For (exhausted) to after EndFor
    SkipBlock,
    /// Jump back to the matching For
    LoopBack,
    /// Leave the enclosing loop
    Break,
    /// Start the next iteration of the enclosing loop
    Continue,
    /// Stop the run
    Exit,
}

/// Part a command plays in block structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRole {
    None,
    If,
    Else,
    EndIf,
    For,
    EndFor,
    Break,
    Continue,
}

impl BlockRole {
    /// Check if the role opens a block
    pub fn is_opener(self) -> bool {
        matches!(self, BlockRole::If | BlockRole::For)
    }
}

/// Iteration state of one running For loop
///
/// Created when the loop starts and discarded when it is exhausted or left
/// with Break.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopCursor {
    /// Explicit values
    Items {
        items: Vec<PropertyValue>,
        position: usize,
    },
    /// Inclusive integer range
    IntRange { next: i64, end: i64, step: i64 },
    /// Inclusive float range, computed from the index to avoid drift
    FloatRange {
        start: f64,
        end: f64,
        step: f64,
        index: u64,
    },
}

impl LoopCursor {
    /// Cursor over explicit values
    pub fn items(items: Vec<PropertyValue>) -> Self {
        LoopCursor::Items { items, position: 0 }
    }

    /// Advance and return the next value
    pub fn next_value(&mut self) -> Option<PropertyValue> {
        match self {
            LoopCursor::Items { items, position } => {
                let item = items.get(*position).cloned();
                if item.is_some() {
                    *position += 1;
                }
                item
            }
            LoopCursor::IntRange { next, end, step } => {
                let done = if *step > 0 { *next > *end } else { *next < *end };
                if done {
                    return None;
                }
                let value = *next;
                match next.checked_add(*step) {
                    Some(n) => *next = n,
                    // Past the representable range; stop after this value
                    None => *end = if *step > 0 { i64::MIN } else { i64::MAX },
                }
                Some(PropertyValue::Int(value))
            }
            LoopCursor::FloatRange {
                start,
                end,
                step,
                index,
            } => {
                let value = *start + *step * (*index as f64);
                let tolerance = step.abs() * 1e-9;
                let done = if *step > 0.0 {
                    value > *end + tolerance
                } else {
                    value < *end - tolerance
                };
                if done {
                    return None;
                }
                *index += 1;
                Some(PropertyValue::Float(value))
            }
        }
    }
}

/// Command execution context
///
/// Gives a running command access to the shared processor state, its own
/// RUN status, and (for For) the loop cursor stored by the processor.
pub struct CommandContext<'a> {
    /// Properties, layers and the GIS toolkit
    pub state: &'a mut ProcessorState,
    /// RUN phase status of the running command
    pub status: &'a mut PhaseStatus,
    /// Loop cursor owned by the running command
    pub loop_cursor: &'a mut Option<LoopCursor>,
    /// Index of the command in the command list
    pub index: usize,
    /// Line number in the command file (1-based)
    pub line_number: usize,
}

impl<'a> CommandContext<'a> {
    /// Log a record in the RUN phase
    pub fn log(
        &mut self,
        severity: Severity,
        tag: &'static str,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) {
        self.status.push(LogRecord {
            severity,
            phase: CommandPhase::Run,
            tag,
            message: message.into(),
            recommendation: recommendation.into(),
        });
    }

    /// Log a warning
    pub fn warning(&mut self, message: impl Into<String>, recommendation: impl Into<String>) {
        let message = message.into();
        log::warn!("line {}: {}", self.line_number, message);
        self.log(Severity::Warning, tags::RUN, message, recommendation);
    }

    /// Log a failure
    pub fn failure(&mut self, message: impl Into<String>, recommendation: impl Into<String>) {
        let message = message.into();
        log::error!("line {}: {}", self.line_number, message);
        self.log(Severity::Failure, tags::RUN, message, recommendation);
    }

    /// Expand a parameter value, warning about undefined properties
    ///
    /// Returns `None` if the parameter is absent.
    pub fn param(&mut self, params: &Parameters, name: &str) -> Option<String> {
        let raw = params.get(name)?;
        let expansion = self.state.properties.expand(raw);
        for missing in &expansion.missing {
            self.log(
                Severity::Warning,
                tags::PROPERTY,
                format!(
                    "Parameter {} references undefined property ${{{}}}.",
                    name, missing
                ),
                format!("Set property {} before this command.", missing),
            );
        }
        Some(expansion.text)
    }

    /// Expanded parameter value, or `default` if absent or empty
    pub fn param_or(&mut self, params: &Parameters, name: &str, default: &str) -> String {
        self.param(params, name)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    /// Expanded value of a required parameter
    pub fn required(&mut self, params: &Parameters, name: &str) -> CmdResult<String> {
        self.param(params, name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CmdError::MissingParameter(name.to_string()))
    }

    /// Current working folder
    pub fn working_dir(&self) -> PathBuf {
        self.state
            .properties
            .get_string(names::WORKING_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path against the working folder
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir().join(path)
        }
    }
}

/// Trait for command implementations
///
/// A command is stateless: everything it needs comes from its parameters and
/// the [`CommandContext`]. One instance serves every line that uses it.
pub trait Command: Send + Sync {
    /// Get the command name as written in command files
    fn name(&self) -> &str;

    /// Get list of command aliases
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Get help text for this command
    fn help(&self) -> &str {
        "No help available."
    }

    /// Get parameter definitions for validation and help
    fn parameter_defs(&self) -> &[ParamDef] {
        &[]
    }

    /// Check parameters at load time
    ///
    /// The default checks against [`parameter_defs`](Self::parameter_defs).
    fn check_parameters(&self, params: &Parameters) -> ValidationResult {
        params::validate(self.parameter_defs(), params)
    }

    /// Names of properties this command would define when run
    fn discover(&self, _params: &Parameters) -> Vec<String> {
        Vec::new()
    }

    /// Part the command plays in block structure
    fn block_role(&self) -> BlockRole {
        BlockRole::None
    }

    /// Where to go when `run` fails
    fn flow_on_error(&self) -> Flow {
        Flow::Next
    }

    /// Execute the command
    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow>;
}

/// Registry mapping command names to implementations
///
/// Lookup ignores case: names and aliases are stored in upper case.
pub struct CommandRegistry {
    /// Commands indexed by upper-case name
    commands: AHashMap<String, Arc<dyn Command>>,
    /// Aliases mapping upper-case alias -> upper-case command name
    aliases: AHashMap<String, String>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            commands: AHashMap::new(),
            aliases: AHashMap::new(),
        }
    }

    /// Create a registry with all built-in commands registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::commands::register_all(&mut registry);
        registry
    }

    /// Register a command
    ///
    /// Also registers any aliases defined by the command. A command with the
    /// same name is replaced.
    pub fn register<C: Command + 'static>(&mut self, cmd: C) {
        self.register_arc(Arc::new(cmd));
    }

    /// Register a command with an Arc
    pub fn register_arc(&mut self, cmd: Arc<dyn Command>) {
        let key = cmd.name().to_uppercase();

        for alias in cmd.aliases() {
            self.aliases.insert(alias.to_uppercase(), key.clone());
        }

        self.commands.insert(key, cmd);
    }

    /// Look up a command by name or alias, ignoring case
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        let key = name.to_uppercase();

        if let Some(cmd) = self.commands.get(&key) {
            return Some(cmd.clone());
        }

        self.aliases
            .get(&key)
            .and_then(|real| self.commands.get(real))
            .cloned()
    }

    /// Check if a command exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get all command names as registered, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.values().map(|c| c.name()).collect();
        names.sort_unstable_by_key(|n| n.to_uppercase());
        names
    }

    /// Get the number of registered commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Remove a command and its aliases
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Command>> {
        let key = name.to_uppercase();
        self.aliases.retain(|_, v| v != &key);
        self.commands.remove(&key)
    }
}
