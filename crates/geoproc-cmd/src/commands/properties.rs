//! Property commands: SetProperty, SetWorkingDir, WritePropertiesToFile

use std::fs;
use std::io::Write;

use geoproc_layers::pattern;
use geoproc_props::{
    has_reference, names, split_list, validate_name, PropertyType, PropertyValue,
};

use crate::command::{Command, CommandContext, CommandRegistry, Flow};
use crate::error::{CmdError, CmdResult};
use crate::params::{self, ParamDef, ParamType, Parameters, ValidationResult};

/// Register property commands
pub fn register(registry: &mut CommandRegistry) {
    registry.register(SetPropertyCommand);
    registry.register(SetWorkingDirCommand);
    registry.register(WritePropertiesToFileCommand);
}

// ============================================================================
// SetProperty command
// ============================================================================

struct SetPropertyCommand;

const SET_PROPERTY_PARAMS: &[ParamDef] = &[
    ParamDef::required("PropertyName", ParamType::String),
    ParamDef::optional("PropertyValue", ParamType::String),
    ParamDef::optional(
        "PropertyType",
        ParamType::Choice(&["str", "string", "int", "integer", "float", "double", "bool", "boolean", "list"]),
    ),
];

fn property_type(text: Option<&str>) -> Result<PropertyType, String> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.parse::<PropertyType>().map_err(|e| e.to_string()),
        None => Ok(PropertyType::Str),
    }
}

impl Command for SetPropertyCommand {
    fn name(&self) -> &str {
        "SetProperty"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "SetProperty" sets a property that later commands can reference
    as ${PropertyName}. Properties set by the processor, such as
    WorkingDir, cannot be changed.

USAGE

    SetProperty(PropertyName=name, PropertyValue="value" [, PropertyType=type])

ARGUMENTS

    PropertyName = string: property name
    PropertyValue = string: value text (default: empty)
    PropertyType = str, int, float, bool or list (default: str)

EXAMPLES

    SetProperty(PropertyName=Region,PropertyValue="north")
    SetProperty(PropertyName=Count,PropertyValue=10,PropertyType=int)
    SetProperty(PropertyName=Years,PropertyValue="2019,2020",PropertyType=list)
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        SET_PROPERTY_PARAMS
    }

    fn check_parameters(&self, params: &Parameters) -> ValidationResult {
        let mut result = params::validate(SET_PROPERTY_PARAMS, params);

        if let Some(name) = params.get_non_empty("PropertyName") {
            if !has_reference(name) {
                if let Err(e) = validate_name(name.trim()) {
                    result.failure(
                        format!("PropertyName \"{}\" is invalid: {}.", name, e),
                        "Use a non-empty name without '$', '{' or '}'.",
                    );
                }
            }
        }

        if let Ok(ty) = property_type(params.get("PropertyType")) {
            if let Some(value) = params.get_non_empty("PropertyValue") {
                if !has_reference(value) {
                    if let Err(e) = ty.parse_value(value) {
                        result.failure(
                            format!("PropertyValue \"{}\" is invalid: {}.", value, e),
                            format!("Specify a {} value or change PropertyType.", ty),
                        );
                    }
                }
            }
        }

        result
    }

    fn discover(&self, params: &Parameters) -> Vec<String> {
        params
            .get_non_empty("PropertyName")
            .filter(|name| !has_reference(name))
            .map(|name| vec![name.trim().to_string()])
            .unwrap_or_default()
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let name = ctx.required(params, "PropertyName")?;
        let name = name.trim();
        let text = ctx.param(params, "PropertyValue").unwrap_or_default();
        let type_text = ctx.param(params, "PropertyType");
        let ty = property_type(type_text.as_deref()).map_err(|reason| {
            CmdError::invalid_param("PropertyType", type_text.unwrap_or_default(), reason)
        })?;

        let value = ty
            .parse_value(&text)
            .map_err(|e| CmdError::invalid_param("PropertyValue", text.as_str(), e.to_string()))?;

        log::debug!("SetProperty {} = {}", name, value);
        ctx.state.properties.set(name, value)?;
        Ok(Flow::Next)
    }
}

// ============================================================================
// SetWorkingDir command
// ============================================================================

struct SetWorkingDirCommand;

const SET_WORKING_DIR_PARAMS: &[ParamDef] = &[ParamDef::required("Folder", ParamType::String)];

impl Command for SetWorkingDirCommand {
    fn name(&self) -> &str {
        "SetWorkingDir"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "SetWorkingDir" changes the WorkingDir property. Relative paths
    in later commands are resolved against the new folder.

USAGE

    SetWorkingDir(Folder="path")

ARGUMENTS

    Folder = string: existing folder, relative to the current WorkingDir

EXAMPLES

    SetWorkingDir(Folder="data")
    SetWorkingDir(Folder="${InitialWorkingDir}")
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        SET_WORKING_DIR_PARAMS
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let folder = ctx.required(params, "Folder")?;
        let path = ctx.resolve_path(&folder);
        if !path.is_dir() {
            return Err(CmdError::invalid_param(
                "Folder",
                folder,
                format!("folder {} does not exist", path.display()),
            ));
        }

        let path = path.canonicalize().unwrap_or(path);
        log::info!("Working folder is now {}", path.display());
        ctx.state
            .properties
            .set_system(names::WORKING_DIR, path.display().to_string())?;
        Ok(Flow::Next)
    }
}

// ============================================================================
// WritePropertiesToFile command
// ============================================================================

struct WritePropertiesToFileCommand;

const WRITE_PROPERTIES_PARAMS: &[ParamDef] = &[
    ParamDef::required("OutputFile", ParamType::String),
    ParamDef::optional("IncludeProperties", ParamType::String),
    ParamDef::optional("FileFormat", ParamType::Choice(&["NameValue", "JSON"])),
];

impl Command for WritePropertiesToFileCommand {
    fn name(&self) -> &str {
        "WritePropertiesToFile"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "WritePropertiesToFile" writes properties to a file, for use by
    other programs or to check the results of a workflow.

USAGE

    WritePropertiesToFile(OutputFile="path" [, IncludeProperties="patterns"] [, FileFormat=format])

ARGUMENTS

    OutputFile = string: output file, relative to WorkingDir
    IncludeProperties = string: comma-separated names, * matches any text (default: *)
    FileFormat = NameValue or JSON (default: NameValue)

EXAMPLES

    WritePropertiesToFile(OutputFile="results.txt",IncludeProperties="Count*,Region")
    WritePropertiesToFile(OutputFile="results.json",FileFormat=JSON)
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        WRITE_PROPERTIES_PARAMS
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let output = ctx.required(params, "OutputFile")?;
        let include = split_list(&ctx.param_or(params, "IncludeProperties", "*"));
        let format = ctx.param_or(params, "FileFormat", "NameValue");

        let mut selected: Vec<(&str, &PropertyValue)> = ctx
            .state
            .properties
            .iter()
            .filter(|(name, _)| pattern::matches_any(&include, name))
            .collect();
        selected.sort_by(|a, b| a.0.cmp(b.0));

        let content = if format.eq_ignore_ascii_case("json") {
            let map: serde_json::Map<String, serde_json::Value> = selected
                .iter()
                .map(|(name, value)| {
                    serde_json::to_value(value).map(|v| (name.to_string(), v))
                })
                .collect::<Result<_, _>>()
                .map_err(|e| CmdError::execution(format!("cannot serialize properties: {}", e)))?;
            let mut text = serde_json::to_string_pretty(&serde_json::Value::Object(map))
                .map_err(|e| CmdError::execution(format!("cannot serialize properties: {}", e)))?;
            text.push('\n');
            text
        } else if format.eq_ignore_ascii_case("namevalue") {
            let mut text = String::new();
            for (name, value) in &selected {
                text.push_str(&format!("{}={}\n", name, value));
            }
            text
        } else {
            return Err(CmdError::invalid_param(
                "FileFormat",
                format,
                "expected NameValue or JSON",
            ));
        };

        let count = selected.len();
        if count == 0 {
            ctx.warning(
                format!("No properties match IncludeProperties=\"{}\".", include.join(",")),
                "Check the property names and wildcards.",
            );
        }

        let path = ctx.resolve_path(&output);
        let mut file = fs::File::create(&path)?;
        file.write_all(content.as_bytes())?;
        log::info!("Wrote {} properties to {}", count, path.display());
        Ok(Flow::Next)
    }
}
