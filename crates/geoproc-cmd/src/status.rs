//! Command status model
//!
//! Each command carries one [`PhaseStatus`] per [`CommandPhase`]. A phase
//! severity is the maximum severity of the records logged in that phase
//! since the phase was last reset.

use std::fmt;
use std::str::FromStr;

/// Severity of a status record, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    /// Phase has not been evaluated
    #[default]
    Unknown,
    /// Completed without problems
    Success,
    /// Completed with problems the user should look at
    Warning,
    /// Did not complete
    Failure,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Unknown => "UNKNOWN",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Failure => "FAILURE",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "UNKNOWN" => Ok(Severity::Unknown),
            "SUCCESS" => Ok(Severity::Success),
            "WARNING" => Ok(Severity::Warning),
            "FAILURE" => Ok(Severity::Failure),
            _ => Err(format!("unknown status '{}'", s)),
        }
    }
}

/// Lifecycle phase of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandPhase {
    /// Parsing and parameter checks at load time
    Initialization,
    /// Pre-run discovery of defined properties
    Discovery,
    /// Execution
    Run,
}

impl fmt::Display for CommandPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandPhase::Initialization => write!(f, "INITIALIZATION"),
            CommandPhase::Discovery => write!(f, "DISCOVERY"),
            CommandPhase::Run => write!(f, "RUN"),
        }
    }
}

/// Record tags
pub mod tags {
    pub const SYNTAX: &str = "syntax";
    pub const COMMAND: &str = "command";
    pub const PARAMETER: &str = "parameter";
    pub const BLOCK: &str = "block";
    pub const PROPERTY: &str = "property";
    pub const RUN: &str = "run";
    pub const USER: &str = "user";
}

/// A message logged against a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub phase: CommandPhase,
    /// Short category, see [`tags`]
    pub tag: &'static str,
    pub message: String,
    /// What the user should do about it
    pub recommendation: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.phase, self.message)?;
        if !self.recommendation.is_empty() {
            write!(f, " ({})", self.recommendation)?;
        }
        Ok(())
    }
}

/// Status of one phase of one command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseStatus {
    severity: Severity,
    records: Vec<LogRecord>,
    skipped: bool,
}

impl PhaseStatus {
    /// Get the phase severity
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Get the records in logging order
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Check if the phase was skipped
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Clear records, severity and the skipped marker
    pub fn reset(&mut self) {
        self.severity = Severity::Unknown;
        self.records.clear();
        self.skipped = false;
    }

    /// Raise an unevaluated phase to SUCCESS
    pub fn mark_success(&mut self) {
        self.severity = self.severity.max(Severity::Success);
    }

    /// Mark the phase as skipped
    pub fn mark_skipped(&mut self) {
        self.skipped = true;
    }

    /// Append a record, raising the phase severity
    pub fn push(&mut self, record: LogRecord) {
        self.severity = self.severity.max(record.severity);
        self.records.push(record);
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            write!(f, "SKIPPED")
        } else {
            write!(f, "{}", self.severity)
        }
    }
}

/// Status of a command across all phases
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandStatus {
    initialization: PhaseStatus,
    discovery: PhaseStatus,
    run: PhaseStatus,
}

impl CommandStatus {
    /// Create an empty status
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the status of a phase
    pub fn phase(&self, phase: CommandPhase) -> &PhaseStatus {
        match phase {
            CommandPhase::Initialization => &self.initialization,
            CommandPhase::Discovery => &self.discovery,
            CommandPhase::Run => &self.run,
        }
    }

    /// Get mutable status of a phase
    pub fn phase_mut(&mut self, phase: CommandPhase) -> &mut PhaseStatus {
        match phase {
            CommandPhase::Initialization => &mut self.initialization,
            CommandPhase::Discovery => &mut self.discovery,
            CommandPhase::Run => &mut self.run,
        }
    }

    /// Log a record in a phase
    pub fn log(
        &mut self,
        phase: CommandPhase,
        severity: Severity,
        tag: &'static str,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) {
        self.phase_mut(phase).push(LogRecord {
            severity,
            phase,
            tag,
            message: message.into(),
            recommendation: recommendation.into(),
        });
    }

    /// Severity a command contributes to the overall run status
    ///
    /// A skipped command contributes its initialization severity.
    pub fn run_contribution(&self) -> Severity {
        if self.run.skipped {
            self.initialization.severity
        } else {
            self.run.severity
        }
    }

    /// All records, initialization first
    pub fn records(&self) -> impl Iterator<Item = &LogRecord> {
        self.initialization
            .records
            .iter()
            .chain(self.discovery.records.iter())
            .chain(self.run.records.iter())
    }
}
