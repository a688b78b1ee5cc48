//! Command processor
//!
//! Owns the command list and the run-time state, loads command files and runs
//! them with control-flow redirection, per-command status tracking and run
//! modes.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use chrono::{DateTime, Local};
use geoproc_layers::{GisToolkit, LayerRegistry};
use geoproc_props::{names, PropertyError, PropertyResult, PropertyStore, PropertyValue};

use crate::blocks::BlockMap;
use crate::command::{CommandContext, CommandRegistry, Flow, LoopCursor};
use crate::error::{CmdError, CmdResult};
use crate::factory::CommandFactory;
use crate::script::ScriptCommand;
use crate::status::{tags, CommandPhase, LogRecord, Severity};

/// Default limit on commands executed in one run
pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// How the processor reacts to problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Run every command regardless of status
    #[default]
    Continue,
    /// Stop after a command ends with FAILURE
    HaltOnFailure,
    /// Stop after a command ends with WARNING or FAILURE
    HaltOnWarning,
}

impl RunMode {
    /// Check if a command ending with `severity` stops the run
    pub fn halts_on(self, severity: Severity) -> bool {
        match self {
            RunMode::Continue => false,
            RunMode::HaltOnFailure => severity >= Severity::Failure,
            RunMode::HaltOnWarning => severity >= Severity::Warning,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Continue => write!(f, "Continue"),
            RunMode::HaltOnFailure => write!(f, "HaltOnFailure"),
            RunMode::HaltOnWarning => write!(f, "HaltOnWarning"),
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(RunMode::Continue),
            "haltonfailure" => Ok(RunMode::HaltOnFailure),
            "haltonwarning" => Ok(RunMode::HaltOnWarning),
            _ => Err(format!(
                "unknown run mode '{}' (expected Continue, HaltOnFailure or HaltOnWarning)",
                s
            )),
        }
    }
}

/// Processor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Initial value of the `RunMode` property
    pub run_mode: RunMode,
    /// Skip commands whose initialization failed
    pub strict: bool,
    /// Maximum commands executed per run
    pub max_steps: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Continue,
            strict: true,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl ProcessorConfig {
    /// Set the run mode
    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    /// Set strictness
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the iteration guard
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Shared flag for cancelling a run from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation; the run stops before its next command
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ran past the last command
    Completed,
    /// Stopped by the run mode or the iteration guard after the command at `index`
    Halted { index: usize },
    /// Stopped by Exit at `index`
    Exited { index: usize },
    /// Stopped by the cancel handle
    Cancelled,
}

/// Result of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Overall status after the run, as reported by `overall_status`
    pub severity: Severity,
    /// Highest severity of any single execution, earlier loop passes included
    pub peak_severity: Severity,
    /// Number of commands run (skipped commands and comments excluded)
    pub commands_executed: usize,
    pub started: DateTime<Local>,
    pub elapsed: Duration,
}

/// State shared by all commands of a run
pub struct ProcessorState {
    pub properties: PropertyStore,
    pub layers: LayerRegistry,
    pub toolkit: Box<dyn GisToolkit>,
}

/// Loads and runs command files
pub struct CommandProcessor {
    factory: CommandFactory,
    config: ProcessorConfig,
    state: ProcessorState,
    commands: Vec<ScriptCommand>,
    blocks: BlockMap,
    cursors: AHashMap<usize, LoopCursor>,
    cancel: CancelHandle,
    source: Option<PathBuf>,
}

impl CommandProcessor {
    /// Create a processor with the default configuration
    pub fn new(toolkit: Box<dyn GisToolkit>) -> Self {
        Self::with_config(toolkit, ProcessorConfig::default())
    }

    /// Create a processor
    ///
    /// The working folder starts as the process current directory.
    pub fn with_config(toolkit: Box<dyn GisToolkit>, config: ProcessorConfig) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut properties = PropertyStore::with_system_properties(&cwd);
        properties.define(names::RUN_MODE, config.run_mode.to_string(), false);

        Self {
            factory: CommandFactory::with_builtins(),
            config,
            state: ProcessorState {
                properties,
                layers: LayerRegistry::new(),
                toolkit,
            },
            commands: Vec::new(),
            blocks: BlockMap::default(),
            cursors: AHashMap::new(),
            cancel: CancelHandle::default(),
            source: None,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Get the command registry
    pub fn registry(&self) -> &CommandRegistry {
        self.factory.registry()
    }

    /// Get mutable access to the command registry
    ///
    /// Commands registered here are used by the next load.
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        self.factory.registry_mut()
    }

    /// Get the shared state
    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    /// Get mutable access to the shared state
    pub fn state_mut(&mut self) -> &mut ProcessorState {
        &mut self.state
    }

    /// Get the property store
    pub fn properties(&self) -> &PropertyStore {
        &self.state.properties
    }

    /// Get the layer registry
    pub fn layers(&self) -> &LayerRegistry {
        &self.state.layers
    }

    /// Get the loaded commands
    pub fn commands(&self) -> &[ScriptCommand] {
        &self.commands
    }

    /// Command file of the last `load_file`
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Get a handle that cancels running scripts
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Define a property that survives reloads
    ///
    /// Used for values supplied by the caller, e.g. on the command line.
    pub fn define_property(
        &mut self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> PropertyResult<()> {
        geoproc_props::validate_name(name)?;
        if self.state.properties.is_protected(name) {
            return Err(PropertyError::Protected(name.to_string()));
        }
        self.state.properties.define(name, value, false);
        Ok(())
    }

    /// Set the working folder
    pub fn set_working_dir(&mut self, dir: &Path) {
        let dir = dir.display().to_string();
        if let Err(e) = self.state.properties.set_system(names::WORKING_DIR, dir) {
            log::warn!("Cannot set working folder: {}", e);
        }
    }

    /// Discard the loaded commands and return to the initial state
    ///
    /// Layers are dropped, non-protected properties return to their
    /// initial values and a pending cancellation is cleared.
    pub fn reset(&mut self) {
        self.cancel.reset();
        self.commands.clear();
        self.blocks = BlockMap::default();
        self.cursors.clear();
        self.state.layers.clear();
        self.state.properties.reset();
    }

    /// Load command text, replacing any loaded commands
    pub fn load(&mut self, text: &str) {
        self.reset();

        let mut in_block_comment = false;
        for (i, line) in text.lines().enumerate() {
            let line_number = i + 1;
            let trimmed = line.trim();

            if in_block_comment {
                if trimmed.starts_with("*/") || trimmed.ends_with("*/") {
                    in_block_comment = false;
                }
                self.commands.push(ScriptCommand::comment(line, line_number));
                continue;
            }
            if trimmed.starts_with("/*") {
                in_block_comment = !(trimmed.len() >= 4 && trimmed.ends_with("*/"));
                self.commands.push(ScriptCommand::comment(line, line_number));
                continue;
            }

            let mut cmd = self.factory.create(line, line_number);
            if let Some(command) = cmd.command().cloned() {
                let result = command.check_parameters(cmd.parameters());
                let init = cmd.status_mut().phase_mut(CommandPhase::Initialization);
                for record in result.into_records() {
                    init.push(record);
                }
                init.mark_success();
            }
            self.commands.push(cmd);
        }

        if in_block_comment {
            log::warn!("Block comment is not closed before the end of the file");
        }

        let (blocks, diagnostics) = BlockMap::analyze(&self.commands);
        for diag in diagnostics {
            log::warn!(
                "line {}: {}",
                self.commands[diag.index].line_number(),
                diag.message
            );
            self.commands[diag.index].status_mut().log(
                CommandPhase::Initialization,
                Severity::Failure,
                tags::BLOCK,
                diag.message,
                diag.recommendation,
            );
        }
        self.blocks = blocks;

        log::info!(
            "Loaded {} commands, initialization status {}",
            self.commands.iter().filter(|c| !c.is_comment()).count(),
            self.load_status()
        );
    }

    /// Load a command file
    ///
    /// `WorkingDir` becomes the folder containing the file.
    pub fn load_file(&mut self, path: &Path) -> CmdResult<()> {
        let text = std::fs::read_to_string(path)?;

        let folder = path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .or_else(|| path.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));

        self.load(&text);
        self.set_working_dir(&folder);
        self.source = Some(path.to_path_buf());
        log::info!("Read command file {}", path.display());
        Ok(())
    }

    /// Initialize the GIS toolkit if needed
    pub fn initialize_toolkit(&mut self) -> CmdResult<()> {
        if !self.state.toolkit.is_initialized() {
            self.state.toolkit.initialize()?;
        }
        Ok(())
    }

    /// Shut down the GIS toolkit
    pub fn shutdown_toolkit(&mut self) -> CmdResult<()> {
        self.state.toolkit.shutdown().map_err(CmdError::from)
    }

    /// Report property names the loaded commands would define
    ///
    /// Fills the DISCOVERY phase of every command. Names are returned once,
    /// in order of first appearance.
    pub fn discover(&mut self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for cmd in &mut self.commands {
            let Some(command) = cmd.command().cloned() else {
                continue;
            };
            let names = command.discover(cmd.parameters());
            let phase = cmd.status_mut().phase_mut(CommandPhase::Discovery);
            phase.reset();
            phase.mark_success();
            for name in names {
                if !found.contains(&name) {
                    found.push(name);
                }
            }
        }
        found
    }

    /// Run the loaded commands
    ///
    /// A cancellation requested through the handle stays in effect until the
    /// next load or `CancelHandle::reset`, so running again without
    /// reloading stops before the first command.
    pub fn run(&mut self) -> RunSummary {
        let started = Local::now();
        let clock = Instant::now();

        if let Err(e) = self.initialize_toolkit() {
            log::error!("GIS toolkit initialization failed: {}", e);
        }

        self.cursors.clear();
        for cmd in &mut self.commands {
            cmd.status_mut().phase_mut(CommandPhase::Run).reset();
        }

        let mut outcome = RunOutcome::Completed;
        let mut worst = Severity::Unknown;
        let mut executed = 0usize;
        let mut steps = 0usize;
        let mut bad_run_mode: Option<String> = None;
        let mut i = 0usize;

        log::info!("Running {} commands", self.commands.len());

        while i < self.commands.len() {
            if self.cancel.is_cancelled() {
                log::warn!("Run cancelled before line {}", self.commands[i].line_number());
                outcome = RunOutcome::Cancelled;
                break;
            }
            if self.commands[i].is_comment() {
                i += 1;
                continue;
            }
            if steps >= self.config.max_steps {
                let message = format!(
                    "Run stopped after {} commands; the script may contain an endless loop.",
                    steps
                );
                log::error!("{}", message);
                self.commands[i].status_mut().log(
                    CommandPhase::Run,
                    Severity::Failure,
                    tags::RUN,
                    message,
                    "Check loop conditions or raise the iteration limit.",
                );
                worst = Severity::Failure;
                outcome = RunOutcome::Halted { index: i };
                break;
            }
            steps += 1;

            let (severity, flow) = self.step(i);
            worst = worst.max(severity);
            if flow.is_some() {
                executed += 1;
            }

            let mode = self.current_run_mode(&mut bad_run_mode);
            if mode.halts_on(severity) {
                log::warn!(
                    "Run halted at line {} ({} with status {})",
                    self.commands[i].line_number(),
                    mode,
                    severity
                );
                outcome = RunOutcome::Halted { index: i };
                break;
            }

            i = match flow {
                Some(Flow::Exit) => {
                    log::info!("Exit at line {}", self.commands[i].line_number());
                    outcome = RunOutcome::Exited { index: i };
                    break;
                }
                Some(flow) => self.resolve_flow(i, flow),
                None => self.skip_target(i),
            };
        }

        let summary = RunSummary {
            outcome,
            severity: self.overall_status(),
            peak_severity: worst,
            commands_executed: executed,
            started,
            elapsed: clock.elapsed(),
        };
        log::info!(
            "Run finished: {:?}, status {}, {} commands in {:.3}s",
            summary.outcome,
            summary.severity,
            summary.commands_executed,
            summary.elapsed.as_secs_f64()
        );
        summary
    }

    /// Execute or skip the command at `index`
    ///
    /// Returns the severity the command contributes and the flow it returned,
    /// or `None` for the flow when the command was skipped.
    fn step(&mut self, index: usize) -> (Severity, Option<Flow>) {
        let strict = self.config.strict;
        let cmd = &mut self.commands[index];
        let line_number = cmd.line_number();
        let init_severity = cmd.status().phase(CommandPhase::Initialization).severity();

        let runnable = cmd
            .command()
            .filter(|_| !(strict && init_severity >= Severity::Failure))
            .cloned();
        let Some(command) = runnable else {
            log::debug!("Skipping line {}", line_number);
            let run = cmd.status_mut().phase_mut(CommandPhase::Run);
            run.reset();
            run.mark_skipped();
            return (init_severity, None);
        };

        let (params, status) = cmd.split_mut();
        let run_status = status.phase_mut(CommandPhase::Run);
        run_status.reset();

        let mut cursor = self.cursors.remove(&index);
        let result = {
            let mut ctx = CommandContext {
                state: &mut self.state,
                status: &mut *run_status,
                loop_cursor: &mut cursor,
                index,
                line_number,
            };
            panic::catch_unwind(AssertUnwindSafe(|| command.run(&mut ctx, params)))
        };

        let flow = match result {
            Ok(Ok(flow)) => {
                if let Some(cursor) = cursor {
                    self.cursors.insert(index, cursor);
                }
                flow
            }
            Ok(Err(e)) => {
                log::error!("line {}: {} failed: {}", line_number, command.name(), e);
                run_status.push(LogRecord {
                    severity: Severity::Failure,
                    phase: CommandPhase::Run,
                    tag: tags::RUN,
                    message: e.to_string(),
                    recommendation: e.recommendation(),
                });
                command.flow_on_error()
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                log::error!("line {}: {} panicked: {}", line_number, command.name(), detail);
                run_status.push(LogRecord {
                    severity: Severity::Failure,
                    phase: CommandPhase::Run,
                    tag: tags::RUN,
                    message: format!("Unexpected error in {}: {}", command.name(), detail),
                    recommendation: "Report the problem with the command file and log."
                        .to_string(),
                });
                command.flow_on_error()
            }
        };

        run_status.mark_success();
        (run_status.severity(), Some(flow))
    }

    /// Next index after a command ran
    fn resolve_flow(&mut self, index: usize, flow: Flow) -> usize {
        let next = index + 1;
        match flow {
            Flow::Next | Flow::Exit => next,
            Flow::SkipBlock => self.blocks.skip_target(index).unwrap_or(next),
            Flow::LoopBack => self.blocks.partner(index).unwrap_or(next),
            Flow::Break => match self.blocks.enclosing_loop(index) {
                Some(start) => {
                    self.cursors.remove(&start);
                    self.blocks.skip_target(start).unwrap_or(next)
                }
                None => next,
            },
            Flow::Continue => self.blocks.enclosing_loop(index).unwrap_or(next),
        }
    }

    /// Next index after a command was skipped
    ///
    /// A skipped If or For skips its whole block.
    fn skip_target(&mut self, index: usize) -> usize {
        let next = index + 1;
        if self.commands[index].block_role().is_opener() {
            self.cursors.remove(&index);
            self.blocks.skip_target(index).unwrap_or(next)
        } else {
            next
        }
    }

    fn current_run_mode(&self, reported: &mut Option<String>) -> RunMode {
        let Some(text) = self.state.properties.get_string(names::RUN_MODE) else {
            return RunMode::Continue;
        };
        match text.parse::<RunMode>() {
            Ok(mode) => mode,
            Err(e) => {
                if reported.as_deref() != Some(text.as_str()) {
                    log::warn!("{}; continuing", e);
                    *reported = Some(text);
                }
                RunMode::Continue
            }
        }
    }

    /// Highest INITIALIZATION severity over all commands
    pub fn load_status(&self) -> Severity {
        self.commands
            .iter()
            .filter(|c| !c.is_comment())
            .map(|c| c.status().phase(CommandPhase::Initialization).severity())
            .max()
            .unwrap_or(Severity::Unknown)
    }

    /// Highest RUN severity over all commands
    ///
    /// A skipped command contributes its INITIALIZATION severity.
    pub fn overall_status(&self) -> Severity {
        self.commands
            .iter()
            .map(|c| c.status().run_contribution())
            .max()
            .unwrap_or(Severity::Unknown)
    }

    /// Records of the command at `index`, across all phases
    pub fn command_log(&self, index: usize) -> Option<Vec<&LogRecord>> {
        self.commands
            .get(index)
            .map(|c| c.status().records().collect())
    }

    /// Canonical text of the loaded commands, one per line
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for cmd in &self.commands {
            text.push_str(&cmd.to_text());
            text.push('\n');
        }
        text
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoproc_layers::MemoryToolkit;

    fn processor() -> CommandProcessor {
        CommandProcessor::new(Box::new(MemoryToolkit::new()))
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("HaltOnFailure".parse::<RunMode>(), Ok(RunMode::HaltOnFailure));
        assert_eq!("haltonwarning".parse::<RunMode>(), Ok(RunMode::HaltOnWarning));
        assert!("Stop".parse::<RunMode>().is_err());
        assert!(RunMode::HaltOnWarning.halts_on(Severity::Warning));
        assert!(!RunMode::HaltOnFailure.halts_on(Severity::Warning));
        assert!(!RunMode::Continue.halts_on(Severity::Failure));
    }

    #[test]
    fn test_config_builder() {
        let config = ProcessorConfig::default()
            .with_run_mode(RunMode::HaltOnFailure)
            .with_strict(false)
            .with_max_steps(10);
        assert_eq!(config.run_mode, RunMode::HaltOnFailure);
        assert!(!config.strict);
        assert_eq!(config.max_steps, 10);
    }

    #[test]
    fn test_run_mode_property_defined() {
        let p = CommandProcessor::with_config(
            Box::new(MemoryToolkit::new()),
            ProcessorConfig::default().with_run_mode(RunMode::HaltOnWarning),
        );
        assert_eq!(
            p.properties().get_string(names::RUN_MODE).as_deref(),
            Some("HaltOnWarning")
        );
        assert!(!p.properties().is_protected(names::RUN_MODE));
    }

    #[test]
    fn test_block_comment() {
        let mut p = processor();
        p.load("/* start\nSetProperty(PropertyName=A,PropertyValue=1)\n*/\nSetProperty(PropertyName=B,PropertyValue=2)");
        assert!(p.commands()[0].is_comment());
        assert!(p.commands()[1].is_comment());
        assert!(p.commands()[2].is_comment());
        assert!(!p.commands()[3].is_comment());
        p.run();
        assert!(p.properties().get("A").is_none());
        assert_eq!(p.properties().get_string("B").as_deref(), Some("2"));
    }

    #[test]
    fn test_one_line_block_comment() {
        let mut p = processor();
        p.load("/* note */\nExit()");
        assert!(p.commands()[0].is_comment());
        assert!(!p.commands()[1].is_comment());
    }

    #[test]
    fn test_define_property_rejects_protected() {
        let mut p = processor();
        assert!(p.define_property(names::WORKING_DIR, "/x").is_err());
        p.define_property("Region", "north").unwrap();
        p.load("Exit()");
        assert_eq!(p.properties().get_string("Region").as_deref(), Some("north"));
    }

    #[test]
    fn test_command_log() {
        let mut p = processor();
        p.load("Bogus()");
        let log = p.command_log(0).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].severity, Severity::Failure);
        assert!(p.command_log(5).is_none());
    }

    #[test]
    fn test_to_text() {
        let mut p = processor();
        p.load("# c\nsetproperty(PropertyName=A, PropertyValue=1)");
        assert_eq!(
            p.to_text(),
            "# c\nSetProperty(PropertyName=\"A\",PropertyValue=\"1\")\n"
        );
    }
}
