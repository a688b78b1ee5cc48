//! End-to-end tests of loading and running command text

use geoproc_cmd::prelude::*;
use geoproc_cmd::{CancelHandle, CommandPhase, DEFAULT_MAX_STEPS};
use geoproc_layers::MemoryToolkit;
use geoproc_props::names;
use pretty_assertions::assert_eq;

fn processor() -> CommandProcessor {
    CommandProcessor::new(Box::new(MemoryToolkit::new()))
}

fn run(text: &str) -> (CommandProcessor, geoproc_cmd::RunSummary) {
    let mut p = processor();
    p.load(text);
    let summary = p.run();
    (p, summary)
}

fn prop(p: &CommandProcessor, name: &str) -> Option<String> {
    p.properties().get_string(name)
}

fn run_severity(p: &CommandProcessor, index: usize) -> Severity {
    p.commands()[index].status().phase(CommandPhase::Run).severity()
}

// ============================================================================
// Straight-line scripts
// ============================================================================

#[test]
fn straight_line_visits_each_command_once_in_order() {
    let (p, summary) = run(
        "SetProperty(PropertyName=Trail,PropertyValue=\"\")\n\
         SetProperty(PropertyName=Trail,PropertyValue=\"${Trail}a\")\n\
         # comment\n\
         SetProperty(PropertyName=Trail,PropertyValue=\"${Trail}b\")\n\
         \n\
         SetProperty(PropertyName=Trail,PropertyValue=\"${Trail}c\")",
    );
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.severity, Severity::Success);
    assert_eq!(summary.commands_executed, 4);
    assert_eq!(prop(&p, "Trail").as_deref(), Some("abc"));
}

#[test]
fn empty_script_completes() {
    let (p, summary) = run("");
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.commands_executed, 0);
    assert_eq!(p.overall_status(), Severity::Unknown);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn protected_property_rejects_set_property() {
    let mut p = processor();
    let before = prop(&p, names::WORKING_DIR);
    p.load(
        "SetProperty(PropertyName=WorkingDir,PropertyValue=\"/elsewhere\")\n\
         SetProperty(PropertyName=Region,PropertyValue=north)\n\
         SetProperty(PropertyName=Region,PropertyValue=south)",
    );
    let summary = p.run();

    assert_eq!(prop(&p, names::WORKING_DIR), before);
    assert_eq!(run_severity(&p, 0), Severity::Failure);
    let log = p.command_log(0).unwrap();
    assert!(log.iter().any(|r| r.message.contains("protected")));

    assert_eq!(run_severity(&p, 2), Severity::Success);
    assert_eq!(prop(&p, "Region").as_deref(), Some("south"));
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.severity, Severity::Failure);
}

#[test]
fn typed_properties() {
    let (p, summary) = run(
        "SetProperty(PropertyName=N,PropertyValue=\" 42 \",PropertyType=int)\n\
         SetProperty(PropertyName=Flag,PropertyValue=yes,PropertyType=bool)\n\
         SetProperty(PropertyName=Names,PropertyValue=\"a, b\",PropertyType=list)\n\
         SetProperty(PropertyName=Bad,PropertyValue=\"${Names}\",PropertyType=int)",
    );
    assert_eq!(p.properties().get("N"), Some(&geoproc_props::PropertyValue::Int(42)));
    assert_eq!(prop(&p, "Flag").as_deref(), Some("true"));
    assert_eq!(prop(&p, "Names").as_deref(), Some("a,b"));
    assert!(p.properties().get("Bad").is_none());
    assert_eq!(run_severity(&p, 3), Severity::Failure);
    assert_eq!(summary.severity, Severity::Failure);
}

#[test]
fn undefined_reference_is_warning_and_kept_verbatim() {
    let (p, _) = run("SetProperty(PropertyName=A,PropertyValue=\"x${Nope}y\")");
    assert_eq!(prop(&p, "A").as_deref(), Some("x${Nope}y"));
    assert_eq!(run_severity(&p, 0), Severity::Warning);
}

#[test]
fn substitution_is_single_pass() {
    let (p, _) = run(
        "SetProperty(PropertyName=Inner,PropertyValue=\"value\")\n\
         SetProperty(PropertyName=Ref,PropertyValue=\"$\")\n\
         SetProperty(PropertyName=Out,PropertyValue=\"${Ref}{Inner}\")",
    );
    assert_eq!(prop(&p, "Out").as_deref(), Some("${Inner}"));
}

#[test]
fn set_working_dir_changes_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    let mut p = processor();
    p.set_working_dir(dir.path());
    p.load(
        "SetWorkingDir(Folder=sub)\n\
         WritePropertiesToFile(OutputFile=props.txt,IncludeProperties=\"Working*\")\n\
         SetWorkingDir(Folder=missing)",
    );
    p.run();

    let out = dir.path().join("sub").join("props.txt");
    let text = std::fs::read_to_string(out).unwrap();
    assert!(text.starts_with("WorkingDir="));
    assert!(text.trim_end().ends_with("sub"));
    assert_eq!(run_severity(&p, 2), Severity::Failure);
}

#[test]
fn write_properties_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = processor();
    p.set_working_dir(dir.path());
    p.load(
        "SetProperty(PropertyName=Count,PropertyValue=3,PropertyType=int)\n\
         SetProperty(PropertyName=Country,PropertyValue=\"Chile\")\n\
         SetProperty(PropertyName=Other,PropertyValue=x)\n\
         WritePropertiesToFile(OutputFile=p.json,IncludeProperties=\"Count*,Country\",FileFormat=JSON)",
    );
    let summary = p.run();
    assert_eq!(summary.severity, Severity::Success);

    let text = std::fs::read_to_string(dir.path().join("p.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, serde_json::json!({"Count": 3, "Country": "Chile"}));
}

// ============================================================================
// If / Else
// ============================================================================

const IF_SCRIPT: &str = "SetProperty(PropertyName=\"X\",PropertyValue=\"5\")\n\
                         If(Condition=\"${X} > 3\")\n\
                         SetProperty(PropertyName=\"Y\",PropertyValue=\"10\")\n\
                         EndIf";

#[test]
fn if_true_runs_block() {
    let (p, summary) = run(IF_SCRIPT);
    assert_eq!(prop(&p, "Y").as_deref(), Some("10"));
    assert_eq!(summary.severity, Severity::Success);
}

#[test]
fn if_false_skips_block() {
    let (p, summary) = run(&IF_SCRIPT.replace("\"5\"", "\"2\""));
    assert!(p.properties().get("Y").is_none());
    assert_eq!(summary.severity, Severity::Success);
    assert_eq!(run_severity(&p, 2), Severity::Unknown);
}

#[test]
fn if_else_branches() {
    let script = |x: &str| {
        format!(
            "SetProperty(PropertyName=X,PropertyValue={})\n\
             If(Name=check,Condition=\"${{X}} >= 10\")\n\
             SetProperty(PropertyName=Branch,PropertyValue=big)\n\
             Else(Name=check)\n\
             SetProperty(PropertyName=Branch,PropertyValue=small)\n\
             EndIf(Name=check)\n\
             SetProperty(PropertyName=After,PropertyValue=yes)",
            x
        )
    };

    let (p, _) = run(&script("12"));
    assert_eq!(prop(&p, "Branch").as_deref(), Some("big"));
    assert_eq!(prop(&p, "After").as_deref(), Some("yes"));

    let (p, _) = run(&script("9"));
    assert_eq!(prop(&p, "Branch").as_deref(), Some("small"));
    assert_eq!(prop(&p, "After").as_deref(), Some("yes"));
}

#[test]
fn if_string_comparison() {
    let (p, _) = run(
        "If(Condition=\"10 > 9\",CompareAsStrings=True)\n\
         SetProperty(PropertyName=A,PropertyValue=1)\n\
         EndIf()\n\
         If(Condition=\"roads_2020 contains 2020\")\n\
         SetProperty(PropertyName=B,PropertyValue=1)\n\
         EndIf()",
    );
    assert!(p.properties().get("A").is_none());
    assert_eq!(prop(&p, "B").as_deref(), Some("1"));
}

#[test]
fn if_with_undefined_property_fails_and_is_false() {
    let (p, summary) = run(
        "If(Condition=\"${Missing} > 3\")\n\
         SetProperty(PropertyName=Y,PropertyValue=1)\n\
         EndIf()\n\
         SetProperty(PropertyName=Z,PropertyValue=1)",
    );
    assert!(p.properties().get("Y").is_none());
    assert_eq!(prop(&p, "Z").as_deref(), Some("1"));
    assert_eq!(run_severity(&p, 0), Severity::Failure);
    assert_eq!(summary.severity, Severity::Failure);
}

#[test]
fn if_treats_nan_and_inf_words_as_text() {
    let (p, _) = run(
        "SetProperty(PropertyName=River,PropertyValue=Nan)\n\
         If(Condition=\"${River} == Nan\")\n\
         SetProperty(PropertyName=Same,PropertyValue=yes)\n\
         EndIf()\n\
         If(Condition=\"inf == Infinity\")\n\
         SetProperty(PropertyName=Different,PropertyValue=yes)\n\
         EndIf()",
    );
    assert_eq!(prop(&p, "Same").as_deref(), Some("yes"));
    assert!(p.properties().get("Different").is_none());
}

#[test]
fn nested_if() {
    let (p, _) = run(
        "If(Condition=true)\n\
         If(Condition=false)\n\
         SetProperty(PropertyName=Inner,PropertyValue=1)\n\
         EndIf()\n\
         SetProperty(PropertyName=Outer,PropertyValue=1)\n\
         EndIf()",
    );
    assert!(p.properties().get("Inner").is_none());
    assert_eq!(prop(&p, "Outer").as_deref(), Some("1"));
}

// ============================================================================
// For loops
// ============================================================================

#[test]
fn for_runs_body_once_per_item() {
    let (p, summary) = run(
        "SetProperty(PropertyName=Seen,PropertyValue=\"\")\n\
         SetProperty(PropertyName=After,PropertyValue=\"\")\n\
         For(IteratorProperty=i,List=\"a,b,c\")\n\
         SetProperty(PropertyName=Seen,PropertyValue=\"${Seen}${i}\")\n\
         EndFor()\n\
         SetProperty(PropertyName=After,PropertyValue=\"${After}x\")",
    );
    assert_eq!(prop(&p, "Seen").as_deref(), Some("abc"));
    assert_eq!(prop(&p, "After").as_deref(), Some("x"));
    // 2 setup + 4 For + 3 body + 3 EndFor + 1 after
    assert_eq!(summary.commands_executed, 13);
    assert_eq!(summary.severity, Severity::Success);
}

#[test]
fn for_sequence_last_binding_wins() {
    let (p, summary) = run(
        "For(IteratorProperty=\"i\",Sequence=\"1:3\")\n\
         SetProperty(PropertyName=\"Last\",PropertyValue=\"${i}\")\n\
         EndFor",
    );
    assert_eq!(prop(&p, "Last").as_deref(), Some("3"));
    assert_eq!(summary.outcome, RunOutcome::Completed);
}

#[test]
fn for_empty_list_skips_body() {
    let (p, _) = run(
        "SetProperty(PropertyName=Items,PropertyValue=\"\",PropertyType=list)\n\
         For(IteratorProperty=i,ListProperty=Items)\n\
         SetProperty(PropertyName=Body,PropertyValue=1)\n\
         EndFor()\n\
         SetProperty(PropertyName=After,PropertyValue=1)",
    );
    assert!(p.properties().get("Body").is_none());
    assert_eq!(prop(&p, "After").as_deref(), Some("1"));
}

#[test]
fn for_list_property() {
    let (p, _) = run(
        "SetProperty(PropertyName=Years,PropertyValue=\"2019,2020\",PropertyType=list)\n\
         SetProperty(PropertyName=Seen,PropertyValue=\"\")\n\
         For(IteratorProperty=Year,ListProperty=Years)\n\
         SetProperty(PropertyName=Seen,PropertyValue=\"${Seen}[${Year}]\")\n\
         EndFor()",
    );
    assert_eq!(prop(&p, "Seen").as_deref(), Some("[2019][2020]"));
}

#[test]
fn nested_loops_restart_inner_cursor() {
    let (p, _) = run(
        "SetProperty(PropertyName=Pairs,PropertyValue=\"\")\n\
         For(Name=outer,IteratorProperty=i,Sequence=\"1:2\")\n\
         For(Name=inner,IteratorProperty=j,List=\"a,b\")\n\
         SetProperty(PropertyName=Pairs,PropertyValue=\"${Pairs}${i}${j} \")\n\
         EndFor(Name=inner)\n\
         EndFor(Name=outer)",
    );
    assert_eq!(prop(&p, "Pairs").as_deref(), Some("1a 1b 2a 2b "));
}

#[test]
fn loop_runs_again_when_reentered() {
    let (p, _) = run(
        "SetProperty(PropertyName=Count,PropertyValue=\"\")\n\
         For(IteratorProperty=pass,List=\"x,y\")\n\
         For(IteratorProperty=i,Sequence=\"1:3\")\n\
         SetProperty(PropertyName=Count,PropertyValue=\"${Count}.\")\n\
         EndFor()\n\
         EndFor()",
    );
    assert_eq!(prop(&p, "Count").as_deref(), Some("......"));
}

#[test]
fn break_leaves_innermost_loop() {
    let (p, _) = run(
        "SetProperty(PropertyName=Seen,PropertyValue=\"\")\n\
         For(IteratorProperty=i,Sequence=\"1:2\")\n\
         For(IteratorProperty=j,Sequence=\"1:5\")\n\
         If(Condition=\"${j} > 2\")\n\
         Break()\n\
         EndIf()\n\
         SetProperty(PropertyName=Seen,PropertyValue=\"${Seen}${i}${j},\")\n\
         EndFor()\n\
         EndFor()",
    );
    assert_eq!(prop(&p, "Seen").as_deref(), Some("11,12,21,22,"));
}

#[test]
fn continue_skips_rest_of_body() {
    let (p, _) = run(
        "SetProperty(PropertyName=Seen,PropertyValue=\"\")\n\
         For(IteratorProperty=i,Sequence=\"1:4\")\n\
         If(Condition=\"${i} == 2\")\n\
         Continue()\n\
         EndIf()\n\
         SetProperty(PropertyName=Seen,PropertyValue=\"${Seen}${i}\")\n\
         EndFor()",
    );
    assert_eq!(prop(&p, "Seen").as_deref(), Some("134"));
}

#[test]
fn for_over_geolayers() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["county_a", "county_b", "roads"] {
        std::fs::write(
            dir.path().join(format!("{}.geojson", name)),
            r#"{"type":"FeatureCollection","features":[]}"#,
        )
        .unwrap();
    }

    let mut p = processor();
    p.set_working_dir(dir.path());
    p.load(
        "ReadGeoLayerFromFile(InputFile=county_a.geojson)\n\
         ReadGeoLayerFromFile(InputFile=roads.geojson)\n\
         ReadGeoLayerFromFile(InputFile=county_b.geojson)\n\
         SetProperty(PropertyName=Seen,PropertyValue=\"\")\n\
         For(IteratorProperty=Layer,GeoLayers=\"county_*\")\n\
         SetProperty(PropertyName=Seen,PropertyValue=\"${Seen}${Layer};\")\n\
         EndFor()",
    );
    let summary = p.run();
    assert_eq!(summary.severity, Severity::Success);
    assert_eq!(prop(&p, "Seen").as_deref(), Some("county_a;county_b;"));
}

#[test]
fn summary_severity_follows_last_execution() {
    let (p, summary) = run(
        "For(IteratorProperty=S,List=\"WARNING,SUCCESS\")\n\
         Message(Message=x,CommandStatus=${S})\n\
         EndFor()",
    );
    assert_eq!(run_severity(&p, 1), Severity::Success);
    assert_eq!(summary.severity, p.overall_status());
    assert_eq!(summary.severity, Severity::Success);
    assert_eq!(summary.peak_severity, Severity::Warning);
}

#[test]
fn message_rejects_substituted_bad_status() {
    for bad in ["BOGUS", "UNKNOWN"] {
        let script = format!(
            "SetProperty(PropertyName=S,PropertyValue={})\n\
             Message(Message=x,CommandStatus=${{S}})",
            bad
        );
        let (p, summary) = run(&script);
        assert_eq!(run_severity(&p, 1), Severity::Failure);
        assert_eq!(summary.severity, Severity::Failure);
        let log = p.command_log(1).unwrap();
        assert!(log
            .iter()
            .any(|r| r.message.contains("CommandStatus") && r.message.contains(bad)));
        assert!(log.iter().all(|r| r.severity != Severity::Unknown));
    }
}

// ============================================================================
// Exit, run modes, cancellation, iteration guard
// ============================================================================

#[test]
fn exit_stops_run() {
    let (p, summary) = run(
        "SetProperty(PropertyName=A,PropertyValue=1)\n\
         Exit()\n\
         SetProperty(PropertyName=B,PropertyValue=1)",
    );
    assert_eq!(summary.outcome, RunOutcome::Exited { index: 1 });
    assert_eq!(prop(&p, "A").as_deref(), Some("1"));
    assert!(p.properties().get("B").is_none());
}

#[test]
fn halt_on_failure() {
    let script = "SetProperty(PropertyName=RunMode,PropertyValue=HaltOnFailure)\n\
                  Message(Message=careful,CommandStatus=WARNING)\n\
                  Message(Message=broken,CommandStatus=FAILURE)\n\
                  SetProperty(PropertyName=After,PropertyValue=1)";
    let (p, summary) = run(script);
    assert_eq!(summary.outcome, RunOutcome::Halted { index: 2 });
    assert!(p.properties().get("After").is_none());
    assert_eq!(summary.severity, Severity::Failure);
}

#[test]
fn halt_on_warning_from_config() {
    let mut p = CommandProcessor::with_config(
        Box::new(MemoryToolkit::new()),
        ProcessorConfig::default().with_run_mode(RunMode::HaltOnWarning),
    );
    p.load(
        "Message(Message=careful,CommandStatus=WARNING)\n\
         SetProperty(PropertyName=After,PropertyValue=1)",
    );
    let summary = p.run();
    assert_eq!(summary.outcome, RunOutcome::Halted { index: 0 });
    assert!(p.properties().get("After").is_none());
}

#[test]
fn continue_mode_runs_everything() {
    let (p, summary) = run(
        "Message(Message=broken,CommandStatus=FAILURE)\n\
         SetProperty(PropertyName=After,PropertyValue=1)",
    );
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(prop(&p, "After").as_deref(), Some("1"));
    assert_eq!(p.overall_status(), Severity::Failure);
}

#[test]
fn bad_run_mode_acts_as_continue() {
    let (p, summary) = run(
        "SetProperty(PropertyName=RunMode,PropertyValue=StopEverything)\n\
         Message(Message=broken,CommandStatus=FAILURE)\n\
         SetProperty(PropertyName=After,PropertyValue=1)",
    );
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(prop(&p, "After").as_deref(), Some("1"));
}

struct CancelCommand(CancelHandle);

impl Command for CancelCommand {
    fn name(&self) -> &str {
        "CancelRun"
    }

    fn run(&self, _ctx: &mut CommandContext<'_>, _params: &Parameters) -> CmdResult<Flow> {
        self.0.cancel();
        Ok(Flow::Next)
    }
}

#[test]
fn cancel_stops_before_next_command() {
    let mut p = processor();
    let handle = p.cancel_handle();
    p.registry_mut().register(CancelCommand(handle.clone()));
    p.load(
        "SetProperty(PropertyName=A,PropertyValue=1)\n\
         CancelRun()\n\
         SetProperty(PropertyName=B,PropertyValue=1)",
    );
    let summary = p.run();

    assert_eq!(summary.outcome, RunOutcome::Cancelled);
    assert_eq!(prop(&p, "A").as_deref(), Some("1"));
    assert!(p.properties().get("B").is_none());
    assert!(handle.is_cancelled());

    handle.reset();
    let summary = p.run();
    assert_eq!(summary.outcome, RunOutcome::Cancelled);
}

#[test]
fn reload_clears_cancellation() {
    let mut p = processor();
    let handle = p.cancel_handle();
    p.registry_mut().register(CancelCommand(handle));
    p.load("CancelRun()\nSetProperty(PropertyName=A,PropertyValue=1)");
    assert_eq!(p.run().outcome, RunOutcome::Cancelled);

    p.load("SetProperty(PropertyName=B,PropertyValue=1)");
    assert!(!p.cancel_handle().is_cancelled());
    let summary = p.run();
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(prop(&p, "B").as_deref(), Some("1"));
}

#[test]
fn iteration_guard_stops_runaway_loop() {
    let mut p = CommandProcessor::with_config(
        Box::new(MemoryToolkit::new()),
        ProcessorConfig::default().with_max_steps(50),
    );
    p.load(
        "For(IteratorProperty=i,Sequence=\"1:1000000\")\n\
         SetProperty(PropertyName=Last,PropertyValue=\"${i}\")\n\
         EndFor()",
    );
    let summary = p.run();
    assert!(matches!(summary.outcome, RunOutcome::Halted { .. }));
    assert_eq!(summary.severity, Severity::Failure);
    assert_eq!(summary.commands_executed, 50);
    assert!(DEFAULT_MAX_STEPS > 50);
}

// ============================================================================
// Faults and load-time failures
// ============================================================================

struct PanicCommand;

impl Command for PanicCommand {
    fn name(&self) -> &str {
        "Explode"
    }

    fn run(&self, _ctx: &mut CommandContext<'_>, _params: &Parameters) -> CmdResult<Flow> {
        panic!("internal fault");
    }
}

#[test]
fn panicking_command_fails_alone() {
    let mut p = processor();
    p.registry_mut().register(PanicCommand);
    p.load(
        "SetProperty(PropertyName=A,PropertyValue=1)\n\
         Explode()\n\
         SetProperty(PropertyName=B,PropertyValue=1)",
    );
    let summary = p.run();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(run_severity(&p, 0), Severity::Success);
    assert_eq!(run_severity(&p, 1), Severity::Failure);
    assert_eq!(run_severity(&p, 2), Severity::Success);
    assert_eq!(prop(&p, "B").as_deref(), Some("1"));
    let log = p.command_log(1).unwrap();
    assert!(log.iter().any(|r| r.message.contains("internal fault")));
}

#[test]
fn unknown_command_scenario() {
    let (p, summary) = run("NOSUCHCOMMAND(Foo=\"bar\")");
    assert_eq!(p.commands().len(), 1);
    let status = p.commands()[0].status();
    assert_eq!(
        status.phase(CommandPhase::Initialization).severity(),
        Severity::Failure
    );
    assert!(status.phase(CommandPhase::Run).is_skipped());
    assert_eq!(p.overall_status(), Severity::Failure);
    assert_eq!(summary.severity, Severity::Failure);
}

#[test]
fn invalid_parameters_skip_command_when_strict() {
    let (p, _) = run(
        "SetProperty(PropertyValue=1)\n\
         SetProperty(PropertyName=After,PropertyValue=1)",
    );
    assert!(p.commands()[0].status().phase(CommandPhase::Run).is_skipped());
    assert_eq!(prop(&p, "After").as_deref(), Some("1"));
}

#[test]
fn non_strict_runs_commands_with_load_failures() {
    let mut p = CommandProcessor::with_config(
        Box::new(MemoryToolkit::new()),
        ProcessorConfig::default().with_strict(false),
    );
    p.load("SetProperty(PropertyName=Count,PropertyValue=abc,PropertyType=int)");
    p.run();
    let status = p.commands()[0].status();
    assert!(!status.phase(CommandPhase::Run).is_skipped());
    assert_eq!(status.phase(CommandPhase::Run).severity(), Severity::Failure);
}

#[test]
fn unknown_parameter_is_warning() {
    let (p, _) = run("Message(Message=hi,Colour=red)");
    assert_eq!(p.load_status(), Severity::Warning);
    assert_eq!(run_severity(&p, 0), Severity::Success);
}

#[test]
fn unmatched_blocks_fail_at_load_and_fall_through() {
    let (p, _) = run(
        "If(Condition=false)\n\
         SetProperty(PropertyName=A,PropertyValue=1)\n\
         EndFor()\n\
         Break()",
    );
    assert_eq!(p.load_status(), Severity::Failure);
    for index in [0, 2, 3] {
        assert_eq!(
            p.commands()[index]
                .status()
                .phase(CommandPhase::Initialization)
                .severity(),
            Severity::Failure,
            "command {}",
            index
        );
    }
    // The unmatched If is skipped, so the body runs
    assert_eq!(prop(&p, "A").as_deref(), Some("1"));
}

#[test]
fn mismatched_names_fail_on_closer() {
    let (p, _) = run(
        "For(Name=a,IteratorProperty=i,List=x)\n\
         EndFor(Name=b)",
    );
    let init = |i: usize| {
        p.commands()[i]
            .status()
            .phase(CommandPhase::Initialization)
            .severity()
    };
    assert_eq!(init(0), Severity::Success);
    assert_eq!(init(1), Severity::Failure);
}

#[test]
fn skipped_for_skips_its_block() {
    let (p, summary) = run(
        "For(IteratorProperty=i)\n\
         SetProperty(PropertyName=Body,PropertyValue=1)\n\
         EndFor()\n\
         SetProperty(PropertyName=After,PropertyValue=1)",
    );
    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert!(p.properties().get("Body").is_none());
    assert_eq!(prop(&p, "After").as_deref(), Some("1"));
}

// ============================================================================
// Reload, discovery, serialization
// ============================================================================

#[test]
fn reload_resets_state() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.geojson"),
        r#"{"type":"FeatureCollection","features":[]}"#,
    )
    .unwrap();

    let mut p = processor();
    p.set_working_dir(dir.path());
    p.load(
        "ReadGeoLayerFromFile(InputFile=a.geojson)\n\
         SetProperty(PropertyName=A,PropertyValue=1)\n\
         SetProperty(PropertyName=RunMode,PropertyValue=HaltOnWarning)",
    );
    p.run();
    assert_eq!(p.layers().len(), 1);

    p.load("Exit()");
    assert_eq!(p.commands().len(), 1);
    assert!(p.layers().is_empty());
    assert!(p.properties().get("A").is_none());
    assert_eq!(prop(&p, names::RUN_MODE).as_deref(), Some("Continue"));
    assert!(p.properties().contains(names::USER_NAME));
}

#[test]
fn load_file_sets_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("workflow.gp");
    std::fs::write(
        &file,
        "WritePropertiesToFile(OutputFile=out.txt,IncludeProperties=\"RunMode\")\n",
    )
    .unwrap();

    let mut p = processor();
    p.load_file(&file).unwrap();
    assert_eq!(p.source(), Some(file.as_path()));
    let summary = p.run();
    assert_eq!(summary.severity, Severity::Success);

    let text = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert_eq!(text, "RunMode=Continue\n");
}

#[test]
fn load_file_missing() {
    let mut p = processor();
    assert!(p
        .load_file(std::path::Path::new("/definitely/not/here.gp"))
        .is_err());
}

#[test]
fn discover_lists_defined_properties() {
    let mut p = processor();
    p.load(
        "SetProperty(PropertyName=Region,PropertyValue=north)\n\
         For(IteratorProperty=Year,Sequence=\"2019:2020\")\n\
         SetProperty(PropertyName=Region,PropertyValue=south)\n\
         SetProperty(PropertyName=\"${Dynamic}\",PropertyValue=x)\n\
         EndFor()",
    );
    assert_eq!(p.discover(), vec!["Region".to_string(), "Year".to_string()]);
    assert_eq!(
        p.commands()[0]
            .status()
            .phase(CommandPhase::Discovery)
            .severity(),
        Severity::Success
    );
}

#[test]
fn to_text_is_stable_after_reload() {
    let mut p = processor();
    p.load(
        "# workflow\n\
         setproperty(PropertyName = A, PropertyValue='a \"quoted\" value')\n\
         If(Condition=\"${A} contains quoted\")\n\
         Bogus(x=1\n\
         endif",
    );
    let once = p.to_text();
    p.load(&once);
    assert_eq!(p.to_text(), once);
    assert!(once.contains("SetProperty(PropertyName=\"A\",PropertyValue=\"a \\\"quoted\\\" value\")"));
    assert!(once.contains("EndIf()"));
}
