//! General commands: Message, Exit

use crate::command::{Command, CommandContext, CommandRegistry, Flow};
use crate::error::{CmdError, CmdResult};
use crate::params::{ParamDef, ParamType, Parameters};
use crate::status::{tags, Severity};

/// Register general commands
pub fn register(registry: &mut CommandRegistry) {
    registry.register(MessageCommand);
    registry.register(ExitCommand);
}

// ============================================================================
// Message command
// ============================================================================

struct MessageCommand;

const MESSAGE_PARAMS: &[ParamDef] = &[
    ParamDef::required("Message", ParamType::String),
    ParamDef::optional(
        "CommandStatus",
        ParamType::Choice(&["SUCCESS", "WARNING", "FAILURE"]),
    ),
];

/// Severity named by CommandStatus; UNKNOWN is not a status a message can carry
fn message_status(text: &str) -> CmdResult<Severity> {
    match text.parse::<Severity>() {
        Ok(severity) if severity > Severity::Unknown => Ok(severity),
        _ => Err(CmdError::invalid_param(
            "CommandStatus",
            text,
            "expected SUCCESS, WARNING or FAILURE",
        )),
    }
}

impl Command for MessageCommand {
    fn name(&self) -> &str {
        "Message"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "Message" writes a message to the log and to the command status.
    With CommandStatus the message is logged at that severity, which
    can be used with the run mode to stop a workflow.

USAGE

    Message(Message="text" [, CommandStatus=SUCCESS|WARNING|FAILURE])

ARGUMENTS

    Message = string: message text, may contain ${Property} references
    CommandStatus = SUCCESS, WARNING or FAILURE (default: SUCCESS)

EXAMPLES

    Message(Message="Processing ${Region}")
    Message(Message="No input layers found",CommandStatus=WARNING)
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        MESSAGE_PARAMS
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let message = ctx.required(params, "Message")?;
        let severity = message_status(&ctx.param_or(params, "CommandStatus", "SUCCESS"))?;

        match severity {
            Severity::Failure => log::error!("{}", message),
            Severity::Warning => log::warn!("{}", message),
            _ => log::info!("{}", message),
        }
        let recommendation = if severity > Severity::Success {
            "Review the workflow condition that produced this message."
        } else {
            ""
        };
        ctx.log(severity, tags::USER, message, recommendation);
        Ok(Flow::Next)
    }
}

// ============================================================================
// Exit command
// ============================================================================

struct ExitCommand;

impl Command for ExitCommand {
    fn name(&self) -> &str {
        "Exit"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "Exit" stops the workflow. Commands after it are not run.

USAGE

    Exit()

EXAMPLES

    If(Condition="${LayerCount} == 0")
    Exit()
    EndIf()
"#
    }

    fn run(&self, ctx: &mut CommandContext<'_>, _params: &Parameters) -> CmdResult<Flow> {
        log::info!("Exit at line {}", ctx.line_number);
        Ok(Flow::Exit)
    }
}
