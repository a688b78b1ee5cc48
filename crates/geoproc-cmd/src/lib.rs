//! GeoProc Command System
//!
//! This crate provides command file parsing, command registration, and the
//! command processor that runs geoprocessing workflows.
//!
//! # Overview
//!
//! A command file holds one command per line:
//! - `Name(Param1="value",Param2=value)` commands
//! - `#` comments, blank lines and `/* ... */` comment blocks
//! - `${Property}` references, expanded when the command runs
//! - `If`/`Else`/`EndIf` and `For`/`EndFor` blocks, `Break`, `Continue`, `Exit`
//!
//! # Example
//!
//! ```rust
//! use geoproc_cmd::{CommandProcessor, RunOutcome, Severity};
//! use geoproc_layers::MemoryToolkit;
//!
//! let mut processor = CommandProcessor::new(Box::new(MemoryToolkit::new()));
//! processor.load(
//!     "SetProperty(PropertyName=Total,PropertyValue=0,PropertyType=int)\n\
//!      For(IteratorProperty=i,Sequence=\"1:3\")\n\
//!      SetProperty(PropertyName=Last,PropertyValue=\"${i}\")\n\
//!      EndFor()",
//! );
//! let summary = processor.run();
//!
//! assert_eq!(summary.outcome, RunOutcome::Completed);
//! assert_eq!(summary.severity, Severity::Success);
//! assert_eq!(processor.properties().get_string("Last").as_deref(), Some("3"));
//! ```
//!
//! # Architecture
//!
//! - **Parser**: parses one line into a `ParsedCommand`
//! - **CommandFactory**: turns lines into `ScriptCommand`s, never failing
//! - **Command trait**: interface for implementing commands
//! - **CommandRegistry**: maps command names to implementations
//! - **BlockMap**: pairs control-flow openers and closers at load time
//! - **CommandProcessor**: loads command files and runs them

mod blocks;
mod command;
pub mod commands;
mod error;
mod factory;
mod params;
mod parser;
mod processor;
mod script;
mod status;

// Re-export main types
pub use blocks::{BlockDiagnostic, BlockLinks, BlockMap};
pub use command::{BlockRole, Command, CommandContext, CommandRegistry, Flow, LoopCursor};
pub use error::{CmdError, CmdResult, ParseError};
pub use factory::CommandFactory;
pub use params::{validate, ParamDef, ParamType, Parameters, ValidationResult};
pub use parser::{escape_value, parse_command, ParsedCommand};
pub use processor::{
    CancelHandle, CommandProcessor, ProcessorConfig, ProcessorState, RunMode, RunOutcome,
    RunSummary, DEFAULT_MAX_STEPS,
};
pub use script::{CommandKind, ScriptCommand};
pub use status::{tags, CommandPhase, CommandStatus, LogRecord, PhaseStatus, Severity};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::command::{Command, CommandContext, CommandRegistry, Flow};
    pub use crate::error::{CmdError, CmdResult};
    pub use crate::params::{ParamDef, ParamType, Parameters};
    pub use crate::processor::{CommandProcessor, ProcessorConfig, RunMode, RunOutcome};
    pub use crate::status::Severity;
}
