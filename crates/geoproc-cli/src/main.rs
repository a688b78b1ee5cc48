//! GeoProc command-line runner
//!
//! Usage: `geoproc <command-file> [--run-mode MODE] [--property Name=Value]...`

use std::path::PathBuf;
use std::process;

use clap::Parser;
use geoproc_cmd::{
    CommandPhase, CommandProcessor, CommandRegistry, ProcessorConfig, RunMode, RunOutcome,
    RunSummary, Severity, DEFAULT_MAX_STEPS,
};
use geoproc_layers::MemoryToolkit;

/// Exit code when the run ends without warnings or failures
const EXIT_SUCCESS: i32 = 0;
const EXIT_WARNING: i32 = 1;
const EXIT_FAILURE: i32 = 2;
const EXIT_CANCELLED: i32 = 3;

#[derive(Parser, Debug)]
#[command(name = "geoproc", version)]
#[command(about = "Run a GeoProc command file")]
struct Args {
    /// Command file to run
    #[arg(required_unless_present_any = ["list_commands", "describe"])]
    command_file: Option<PathBuf>,

    /// Initial run mode: Continue, HaltOnFailure or HaltOnWarning
    #[arg(long = "run-mode", default_value = "Continue", value_parser = parse_run_mode)]
    run_mode: RunMode,

    /// Run commands whose parameters failed the load-time check
    #[arg(long = "no-strict")]
    no_strict: bool,

    /// Maximum number of commands executed in one run
    #[arg(long = "max-steps", default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Set a property before the run (repeatable)
    #[arg(short = 'p', long = "property", value_name = "NAME=VALUE", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// Load and check the command file without running it
    #[arg(long)]
    check: bool,

    /// List the available commands and exit
    #[arg(long = "list-commands")]
    list_commands: bool,

    /// Show help for one command and exit
    #[arg(long, value_name = "COMMAND")]
    describe: Option<String>,
}

fn parse_run_mode(s: &str) -> Result<RunMode, String> {
    s.parse()
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let name = name.trim();
    geoproc_props::validate_name(name).map_err(|e| e.to_string())?;
    Ok((name.to_string(), value.to_string()))
}

/// Exit code for a finished run
fn exit_code(summary: &RunSummary) -> i32 {
    if summary.outcome == RunOutcome::Cancelled {
        return EXIT_CANCELLED;
    }
    severity_exit_code(summary.severity)
}

fn severity_exit_code(severity: Severity) -> i32 {
    match severity {
        Severity::Unknown | Severity::Success => EXIT_SUCCESS,
        Severity::Warning => EXIT_WARNING,
        Severity::Failure => EXIT_FAILURE,
    }
}

/// Print every warning and failure, one line per record
fn report(processor: &CommandProcessor) {
    for (index, cmd) in processor.commands().iter().enumerate() {
        let Some(records) = processor.command_log(index) else {
            continue;
        };
        for record in records.into_iter().filter(|r| r.severity > Severity::Success) {
            eprintln!("line {}: {}", cmd.line_number(), record);
        }
        if cmd.status().phase(CommandPhase::Run).is_skipped() {
            eprintln!("line {}: {} was not run", cmd.line_number(), cmd.name());
        }
    }
}

fn list_commands(registry: &CommandRegistry) {
    for name in registry.names() {
        println!("{}", name);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ProcessorConfig::default()
        .with_run_mode(args.run_mode)
        .with_strict(!args.no_strict)
        .with_max_steps(args.max_steps);
    let mut processor = CommandProcessor::with_config(Box::new(MemoryToolkit::new()), config);

    if args.list_commands {
        list_commands(processor.registry());
        return;
    }
    if let Some(name) = &args.describe {
        match processor.registry().get(name) {
            Some(command) => println!("{}", command.help().trim_end()),
            None => {
                eprintln!("Unknown command: {}", name);
                process::exit(EXIT_FAILURE);
            }
        }
        return;
    }

    for (name, value) in &args.properties {
        if let Err(e) = processor.define_property(name, value.as_str()) {
            eprintln!("Cannot set property {}: {}", name, e);
            process::exit(EXIT_FAILURE);
        }
    }

    let Some(path) = args.command_file else {
        eprintln!("No command file given");
        process::exit(EXIT_FAILURE);
    };
    if let Err(e) = processor.load_file(&path) {
        eprintln!("Cannot read {}: {}", path.display(), e);
        process::exit(EXIT_FAILURE);
    }

    if args.check {
        let status = processor.load_status();
        report(&processor);
        log::info!("{}: load status {}", path.display(), status);
        process::exit(severity_exit_code(status));
    }

    let summary = processor.run();
    report(&processor);
    if let Err(e) = processor.shutdown_toolkit() {
        log::warn!("GIS toolkit shutdown failed: {}", e);
    }

    println!(
        "{}: {} ({:?}, {} commands, {:.3}s, started {})",
        path.display(),
        summary.severity,
        summary.outcome,
        summary.commands_executed,
        summary.elapsed.as_secs_f64(),
        summary.started.format("%Y-%m-%d %H:%M:%S")
    );
    process::exit(exit_code(&summary));
}
