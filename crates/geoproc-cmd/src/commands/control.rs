//! Control commands: If, Else, EndIf, For, EndFor, Break, Continue
//!
//! These commands do no domain work. They return a [`Flow`] that the
//! processor resolves against the block map built at load time.

use geoproc_props::{has_reference, parse_bool, split_list, PropertyValue};

use super::condition;
use crate::command::{BlockRole, Command, CommandContext, CommandRegistry, Flow, LoopCursor};
use crate::error::{CmdError, CmdResult};
use crate::params::{self, ParamDef, ParamType, Parameters, ValidationResult};

/// Register control commands
pub fn register(registry: &mut CommandRegistry) {
    registry.register(IfCommand);
    registry.register(ElseCommand);
    registry.register(EndIfCommand);
    registry.register(ForCommand);
    registry.register(EndForCommand);
    registry.register(BreakCommand);
    registry.register(ContinueCommand);
}

const NAME_ONLY: &[ParamDef] = &[ParamDef::optional("Name", ParamType::String)];

/// Block closers and jumps that take only an optional Name
macro_rules! simple_block_command {
    ($ty:ident, $name:literal, $role:expr, $flow:expr, $help:literal) => {
        struct $ty;

        impl Command for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn help(&self) -> &str {
                $help
            }

            fn parameter_defs(&self) -> &[ParamDef] {
                NAME_ONLY
            }

            fn block_role(&self) -> BlockRole {
                $role
            }

            fn run(&self, _ctx: &mut CommandContext<'_>, _params: &Parameters) -> CmdResult<Flow> {
                Ok($flow)
            }
        }
    };
}

// ============================================================================
// If command
// ============================================================================

struct IfCommand;

const IF_PARAMS: &[ParamDef] = &[
    ParamDef::optional("Name", ParamType::String),
    ParamDef::required("Condition", ParamType::String),
    ParamDef::optional("CompareAsStrings", ParamType::Boolean),
];

impl Command for IfCommand {
    fn name(&self) -> &str {
        "If"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "If" runs the commands up to the matching Else or EndIf when the
    condition is true. Otherwise it continues after the Else, or after
    the EndIf when there is no Else.

USAGE

    If([Name=name,] Condition="left OP right" [, CompareAsStrings=True])

ARGUMENTS

    Name = string: block name, must match the Name of EndIf if both are given
    Condition = string: comparison using <, <=, >, >=, ==, !=, contains or
                !contains, or a single True/False
    CompareAsStrings = boolean: compare numbers as text (default: False)

EXAMPLES

    If(Name=big,Condition="${Count} > 100")
    Message(Message="Large dataset")
    Else()
    Message(Message="Small dataset")
    EndIf(Name=big)
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        IF_PARAMS
    }

    fn check_parameters(&self, params: &Parameters) -> ValidationResult {
        let mut result = params::validate(IF_PARAMS, params);
        if let Some(text) = params.get_non_empty("Condition") {
            if !has_reference(text) {
                if let Err(reason) = condition::parse(text) {
                    result.failure(
                        format!("Condition \"{}\" is invalid: {}.", text, reason),
                        "Write the condition as left OP right, for example \"${Count} > 0\".",
                    );
                }
            }
        }
        result
    }

    fn block_role(&self) -> BlockRole {
        BlockRole::If
    }

    fn flow_on_error(&self) -> Flow {
        Flow::SkipBlock
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let raw = params
            .get_non_empty("Condition")
            .ok_or_else(|| CmdError::MissingParameter("Condition".to_string()))?;
        let expansion = ctx.state.properties.expand(raw);
        if !expansion.missing.is_empty() {
            return Err(CmdError::invalid_param(
                "Condition",
                raw,
                format!(
                    "undefined properties {}; condition is treated as false",
                    expansion.missing.join(", ")
                ),
            ));
        }

        let as_strings_text = ctx.param_or(params, "CompareAsStrings", "False");
        let as_strings = parse_bool(&as_strings_text).ok_or_else(|| {
            CmdError::invalid_param("CompareAsStrings", as_strings_text.as_str(), "expected True or False")
        })?;

        let result = condition::evaluate(&expansion.text, as_strings)
            .map_err(|reason| CmdError::invalid_param("Condition", expansion.text.as_str(), reason))?;

        log::debug!(
            "line {}: If \"{}\" is {}",
            ctx.line_number,
            expansion.text,
            result
        );
        Ok(if result { Flow::Next } else { Flow::SkipBlock })
    }
}

simple_block_command!(
    ElseCommand,
    "Else",
    BlockRole::Else,
    Flow::SkipBlock,
    r#"
DESCRIPTION

    "Else" starts the commands run when the condition of the matching
    If is false. Reaching Else after the true branch continues after
    the EndIf.

USAGE

    Else([Name=name])
"#
);

simple_block_command!(
    EndIfCommand,
    "EndIf",
    BlockRole::EndIf,
    Flow::Next,
    r#"
DESCRIPTION

    "EndIf" ends the block started by If.

USAGE

    EndIf([Name=name])
"#
);

// ============================================================================
// For command
// ============================================================================

struct ForCommand;

const FOR_PARAMS: &[ParamDef] = &[
    ParamDef::optional("Name", ParamType::String),
    ParamDef::required("IteratorProperty", ParamType::String),
    ParamDef::optional("List", ParamType::String),
    ParamDef::optional("ListProperty", ParamType::String),
    ParamDef::optional("Sequence", ParamType::String),
    ParamDef::optional("GeoLayers", ParamType::String),
];

const FOR_SOURCES: &[&str] = &["List", "ListProperty", "Sequence", "GeoLayers"];

/// Parse `start:end[:step]` into a cursor
///
/// All-integer sequences iterate integers; anything else iterates floats.
/// Without a step the sequence counts up by one, or down by one when `end`
/// is below `start`.
fn parse_sequence(text: &str) -> Result<LoopCursor, String> {
    let parts: Vec<&str> = text.split(':').map(str::trim).collect();
    if !(2..=3).contains(&parts.len()) {
        return Err("expected start:end or start:end:step".to_string());
    }

    let ints: Option<Vec<i64>> = parts.iter().map(|p| p.parse::<i64>().ok()).collect();
    if let Some(ints) = ints {
        let (start, end) = (ints[0], ints[1]);
        let step = match ints.get(2) {
            Some(&step) => step,
            None if end < start => -1,
            None => 1,
        };
        if step == 0 {
            return Err("step cannot be zero".to_string());
        }
        return Ok(LoopCursor::IntRange {
            next: start,
            end,
            step,
        });
    }

    let floats: Vec<f64> = parts
        .iter()
        .map(|p| {
            p.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| format!("\"{}\" is not a number", p))
        })
        .collect::<Result<_, _>>()?;
    let (start, end) = (floats[0], floats[1]);
    let step = match floats.get(2) {
        Some(&step) => step,
        None if end < start => -1.0,
        None => 1.0,
    };
    if step == 0.0 {
        return Err("step cannot be zero".to_string());
    }
    Ok(LoopCursor::FloatRange {
        start,
        end,
        step,
        index: 0,
    })
}

impl ForCommand {
    /// Build the cursor for a new pass through the loop
    fn start(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<LoopCursor> {
        let given: Vec<&str> = FOR_SOURCES
            .iter()
            .copied()
            .filter(|s| params.get_non_empty(s).is_some())
            .collect();
        let [source] = given.as_slice() else {
            return Err(CmdError::execution(format!(
                "For needs exactly one of {}",
                FOR_SOURCES.join(", ")
            )));
        };

        let text = ctx.param_or(params, source, "");
        match *source {
            "List" => Ok(LoopCursor::items(
                split_list(&text).into_iter().map(PropertyValue::String).collect(),
            )),
            "ListProperty" => {
                let name = text.trim();
                let value = ctx.state.properties.require(name)?.clone();
                let items = match value {
                    PropertyValue::List(items) => items,
                    PropertyValue::String(s) => {
                        split_list(&s).into_iter().map(PropertyValue::String).collect()
                    }
                    other => {
                        return Err(CmdError::invalid_param(
                            "ListProperty",
                            name,
                            format!("property has type {}, expected list", other.type_name()),
                        ))
                    }
                };
                Ok(LoopCursor::items(items))
            }
            "Sequence" => parse_sequence(&text)
                .map_err(|reason| CmdError::invalid_param("Sequence", text.as_str(), reason)),
            _ => {
                let mut ids: Vec<PropertyValue> = Vec::new();
                for pattern in split_list(&text) {
                    for id in ctx.state.layers.matching(&pattern) {
                        let id = PropertyValue::String(id);
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
                Ok(LoopCursor::items(ids))
            }
        }
    }
}

impl Command for ForCommand {
    fn name(&self) -> &str {
        "For"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "For" runs the commands up to the matching EndFor once for each
    value, setting the iterator property to the value before each pass.

USAGE

    For([Name=name,] IteratorProperty=name, List="a,b" | ListProperty=name |
        Sequence="start:end[:step]" | GeoLayers="pattern")

ARGUMENTS

    Name = string: loop name, must match the Name of EndFor if both are given
    IteratorProperty = string: property set to the current value
    List = string: comma-separated values
    ListProperty = string: name of a list property
    Sequence = string: inclusive numeric range
    GeoLayers = string: layer identifiers, * matches any text

EXAMPLES

    For(Name=years,IteratorProperty=Year,Sequence="2015:2020")
    ReadGeoLayerFromFile(InputFile="counties_${Year}.geojson")
    EndFor(Name=years)

    For(IteratorProperty=Layer,GeoLayers="county_*")
    WriteGeoLayerToFile(GeoLayerID=${Layer},OutputFile="out/${Layer}.geojson")
    EndFor()
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        FOR_PARAMS
    }

    fn check_parameters(&self, params: &Parameters) -> ValidationResult {
        let mut result = params::validate(FOR_PARAMS, params);

        let given: Vec<&str> = FOR_SOURCES
            .iter()
            .copied()
            .filter(|s| params.get_non_empty(s).is_some())
            .collect();
        if given.len() != 1 {
            result.failure(
                if given.is_empty() {
                    "For has no values to iterate over.".to_string()
                } else {
                    format!("For has more than one value source: {}.", given.join(", "))
                },
                format!("Specify exactly one of {}.", FOR_SOURCES.join(", ")),
            );
        }

        if let Some(text) = params.get_non_empty("Sequence") {
            if !has_reference(text) {
                if let Err(reason) = parse_sequence(text) {
                    result.failure(
                        format!("Sequence \"{}\" is invalid: {}.", text, reason),
                        "Write the sequence as start:end or start:end:step.",
                    );
                }
            }
        }
        result
    }

    fn discover(&self, params: &Parameters) -> Vec<String> {
        params
            .get_non_empty("IteratorProperty")
            .filter(|name| !has_reference(name))
            .map(|name| vec![name.trim().to_string()])
            .unwrap_or_default()
    }

    fn block_role(&self) -> BlockRole {
        BlockRole::For
    }

    fn flow_on_error(&self) -> Flow {
        Flow::SkipBlock
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let iterator = ctx.required(params, "IteratorProperty")?;

        if ctx.loop_cursor.is_none() {
            let cursor = self.start(ctx, params)?;
            *ctx.loop_cursor = Some(cursor);
        }

        let next = ctx.loop_cursor.as_mut().and_then(LoopCursor::next_value);
        match next {
            Some(value) => {
                log::debug!("line {}: {} = {}", ctx.line_number, iterator, value);
                ctx.state.properties.set(iterator.trim(), value)?;
                Ok(Flow::Next)
            }
            None => {
                *ctx.loop_cursor = None;
                Ok(Flow::SkipBlock)
            }
        }
    }
}

simple_block_command!(
    EndForCommand,
    "EndFor",
    BlockRole::EndFor,
    Flow::LoopBack,
    r#"
DESCRIPTION

    "EndFor" ends the loop started by For and returns to it for the
    next value.

USAGE

    EndFor([Name=name])
"#
);

simple_block_command!(
    BreakCommand,
    "Break",
    BlockRole::Break,
    Flow::Break,
    r#"
DESCRIPTION

    "Break" leaves the innermost For loop and continues after its EndFor.

USAGE

    Break()
"#
);

simple_block_command!(
    ContinueCommand,
    "Continue",
    BlockRole::Continue,
    Flow::Continue,
    r#"
DESCRIPTION

    "Continue" skips the rest of the innermost For loop body and starts
    the next pass.

USAGE

    Continue()
"#
);
