//! Layer commands: ReadGeoLayerFromFile, WriteGeoLayerToFile, CopyGeoLayer,
//! FreeGeoLayers, RunGeoprocessing
//!
//! Reading, writing and processing are delegated to the GIS toolkit held in
//! the processor state. Layers live in the processor's layer registry.

use geoproc_layers::{Dataset, GeoLayer, LayerError, LayerKind};
use geoproc_props::{has_reference, split_list};

use crate::command::{Command, CommandContext, CommandRegistry, Flow};
use crate::error::{CmdError, CmdResult};
use crate::params::{self, ParamDef, ParamType, Parameters, ValidationResult};

/// Register layer commands
pub fn register(registry: &mut CommandRegistry) {
    registry.register(ReadGeoLayerFromFileCommand);
    registry.register(WriteGeoLayerToFileCommand);
    registry.register(CopyGeoLayerCommand);
    registry.register(FreeGeoLayersCommand);
    registry.register(RunGeoprocessingCommand);
}

/// Expand a comma-separated list of ids and `*` patterns against the registry
///
/// Returns matching ids in registry order, each once, and the patterns that
/// matched nothing.
fn resolve_ids(ctx: &CommandContext<'_>, text: &str) -> (Vec<String>, Vec<String>) {
    let mut ids: Vec<String> = Vec::new();
    let mut unmatched = Vec::new();
    for pattern in split_list(text) {
        let found = ctx.state.layers.matching(&pattern);
        if found.is_empty() {
            unmatched.push(pattern);
        }
        for id in found {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    (ids, unmatched)
}

// ============================================================================
// ReadGeoLayerFromFile command
// ============================================================================

struct ReadGeoLayerFromFileCommand;

const READ_LAYER_PARAMS: &[ParamDef] = &[
    ParamDef::required("InputFile", ParamType::String),
    ParamDef::optional("GeoLayerID", ParamType::String),
    ParamDef::optional("LayerKind", ParamType::Choice(&["Vector", "Raster"])),
];

impl Command for ReadGeoLayerFromFileCommand {
    fn name(&self) -> &str {
        "ReadGeoLayerFromFile"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "ReadGeoLayerFromFile" reads a spatial data file into a layer.
    An existing layer with the same identifier is replaced.

USAGE

    ReadGeoLayerFromFile(InputFile="path" [, GeoLayerID=id] [, LayerKind=Vector|Raster])

ARGUMENTS

    InputFile = string: file to read, relative to WorkingDir
    GeoLayerID = string: layer identifier (default: file name without extension)
    LayerKind = Vector or Raster (default: Vector)

EXAMPLES

    ReadGeoLayerFromFile(InputFile="data/counties.geojson",GeoLayerID=counties)
    ReadGeoLayerFromFile(InputFile="${InputFolder}/${Region}.geojson")
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        READ_LAYER_PARAMS
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let input = ctx.required(params, "InputFile")?;
        let path = ctx.resolve_path(&input);
        let kind_text = ctx.param_or(params, "LayerKind", "Vector");
        let kind: LayerKind = kind_text
            .parse()
            .map_err(|reason: String| CmdError::invalid_param("LayerKind", kind_text.as_str(), reason))?;

        let default_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = ctx.param_or(params, "GeoLayerID", &default_id);
        if id.trim().is_empty() {
            return Err(CmdError::MissingParameter("GeoLayerID".to_string()));
        }

        if !path.is_file() {
            return Err(CmdError::invalid_param(
                "InputFile",
                input,
                format!("file {} does not exist", path.display()),
            ));
        }

        let dataset = ctx.state.toolkit.load_dataset(&path, kind)?;
        let count = dataset.feature_count();
        let layer = GeoLayer::new(id.trim(), kind, dataset).with_source(path.clone());

        if ctx.state.layers.add(layer)?.is_some() {
            ctx.warning(
                format!("Layer {} was replaced by the layer read from {}.", id, path.display()),
                "Use a different GeoLayerID to keep both layers.",
            );
        }
        log::info!(
            "Read layer {} from {} ({} features)",
            id,
            path.display(),
            count.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string())
        );
        Ok(Flow::Next)
    }
}

// ============================================================================
// WriteGeoLayerToFile command
// ============================================================================

struct WriteGeoLayerToFileCommand;

const WRITE_LAYER_PARAMS: &[ParamDef] = &[
    ParamDef::required("GeoLayerID", ParamType::String),
    ParamDef::required("OutputFile", ParamType::String),
    ParamDef::optional("OutputFormat", ParamType::String),
];

impl Command for WriteGeoLayerToFileCommand {
    fn name(&self) -> &str {
        "WriteGeoLayerToFile"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "WriteGeoLayerToFile" writes a layer to a file using the GIS toolkit.

USAGE

    WriteGeoLayerToFile(GeoLayerID=id, OutputFile="path" [, OutputFormat=format])

ARGUMENTS

    GeoLayerID = string: layer to write
    OutputFile = string: output file, relative to WorkingDir
    OutputFormat = string: format name understood by the toolkit (default: GeoJSON)

EXAMPLES

    WriteGeoLayerToFile(GeoLayerID=counties,OutputFile="out/counties.geojson")
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        WRITE_LAYER_PARAMS
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let id = ctx.required(params, "GeoLayerID")?;
        let output = ctx.required(params, "OutputFile")?;
        let format = ctx.param_or(params, "OutputFormat", "GeoJSON");
        let path = ctx.resolve_path(&output);

        if let Some(folder) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !folder.is_dir() {
                return Err(CmdError::invalid_param(
                    "OutputFile",
                    output,
                    format!("folder {} does not exist", folder.display()),
                ));
            }
        }

        let state = &mut *ctx.state;
        let layer = state.layers.require(id.trim())?;
        state
            .toolkit
            .write_dataset(layer.dataset(), &path, &format)?;
        log::info!("Wrote layer {} to {}", id, path.display());
        Ok(Flow::Next)
    }
}

// ============================================================================
// CopyGeoLayer command
// ============================================================================

struct CopyGeoLayerCommand;

const COPY_LAYER_PARAMS: &[ParamDef] = &[
    ParamDef::required("GeoLayerID", ParamType::String),
    ParamDef::optional("CopiedGeoLayerID", ParamType::String),
];

impl Command for CopyGeoLayerCommand {
    fn name(&self) -> &str {
        "CopyGeoLayer"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "CopyGeoLayer" copies a layer under a new identifier.

USAGE

    CopyGeoLayer(GeoLayerID=id [, CopiedGeoLayerID=new_id])

ARGUMENTS

    GeoLayerID = string: layer to copy
    CopiedGeoLayerID = string: identifier of the copy (default: id_copy)

EXAMPLES

    CopyGeoLayer(GeoLayerID=counties,CopiedGeoLayerID=counties_backup)
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        COPY_LAYER_PARAMS
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let id = ctx.required(params, "GeoLayerID")?;
        let id = id.trim();
        let copy_id = ctx.param_or(params, "CopiedGeoLayerID", &format!("{}_copy", id));

        match ctx.state.layers.copy(id, copy_id.trim()) {
            Ok(()) => {
                log::info!("Copied layer {} to {}", id, copy_id);
                Ok(Flow::Next)
            }
            Err(LayerError::Exists(existing)) => Err(CmdError::invalid_param(
                "CopiedGeoLayerID",
                existing,
                "a layer with this identifier already exists",
            )),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// FreeGeoLayers command
// ============================================================================

struct FreeGeoLayersCommand;

const FREE_LAYERS_PARAMS: &[ParamDef] = &[ParamDef::required("GeoLayerIDs", ParamType::String)];

impl Command for FreeGeoLayersCommand {
    fn name(&self) -> &str {
        "FreeGeoLayers"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "FreeGeoLayers" removes layers to release their memory.

USAGE

    FreeGeoLayers(GeoLayerIDs="ids")

ARGUMENTS

    GeoLayerIDs = string: comma-separated identifiers, * matches any text

EXAMPLES

    FreeGeoLayers(GeoLayerIDs="counties,roads")
    FreeGeoLayers(GeoLayerIDs="tmp_*")
    FreeGeoLayers(GeoLayerIDs="*")
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        FREE_LAYERS_PARAMS
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let text = ctx.required(params, "GeoLayerIDs")?;
        let (ids, unmatched) = resolve_ids(ctx, &text);

        for pattern in unmatched {
            ctx.warning(
                format!("GeoLayerIDs \"{}\" matches no layer.", pattern),
                "Check the layer identifiers.",
            );
        }
        for id in &ids {
            ctx.state.layers.remove(id);
        }
        log::debug!("Freed {} layers", ids.len());
        Ok(Flow::Next)
    }
}

// ============================================================================
// RunGeoprocessing command
// ============================================================================

struct RunGeoprocessingCommand;

const GEOPROCESSING_PARAMS: &[ParamDef] = &[
    ParamDef::required("Operation", ParamType::String),
    ParamDef::required("InputGeoLayerIDs", ParamType::String),
    ParamDef::required("OutputGeoLayerID", ParamType::String),
    ParamDef::optional("Parameters", ParamType::String),
];

/// Parse `key:value;key:value`
fn parse_operation_parameters(text: &str) -> Result<Vec<(String, String)>, String> {
    text.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(format!("\"{}\" is not key:value", item)),
        })
        .collect()
}

impl Command for RunGeoprocessingCommand {
    fn name(&self) -> &str {
        "RunGeoprocessing"
    }

    fn help(&self) -> &str {
        r#"
DESCRIPTION

    "RunGeoprocessing" runs a GIS toolkit operation on one or more
    layers and stores the result as a new layer.

USAGE

    RunGeoprocessing(Operation=name, InputGeoLayerIDs="ids", OutputGeoLayerID=id [, Parameters="k:v;k:v"])

ARGUMENTS

    Operation = string: toolkit operation, for example merge or filter
    InputGeoLayerIDs = string: comma-separated input layers, * matches any text
    OutputGeoLayerID = string: identifier of the result layer
    Parameters = string: operation parameters as key:value pairs separated by ;

EXAMPLES

    RunGeoprocessing(Operation=merge,InputGeoLayerIDs="county_*",OutputGeoLayerID=state)
    RunGeoprocessing(Operation=filter,InputGeoLayerIDs=state,OutputGeoLayerID=urban,Parameters="Attribute:type;Value:urban")
"#
    }

    fn parameter_defs(&self) -> &[ParamDef] {
        GEOPROCESSING_PARAMS
    }

    fn check_parameters(&self, params: &Parameters) -> ValidationResult {
        let mut result = params::validate(GEOPROCESSING_PARAMS, params);
        if let Some(text) = params.get_non_empty("Parameters") {
            if !has_reference(text) {
                if let Err(reason) = parse_operation_parameters(text) {
                    result.failure(
                        format!("Parameters \"{}\" is invalid: {}.", text, reason),
                        "Write operation parameters as key:value pairs separated by ;.",
                    );
                }
            }
        }
        result
    }

    fn run(&self, ctx: &mut CommandContext<'_>, params: &Parameters) -> CmdResult<Flow> {
        let operation = ctx.required(params, "Operation")?;
        let inputs_text = ctx.required(params, "InputGeoLayerIDs")?;
        let output_id = ctx.required(params, "OutputGeoLayerID")?;
        let parameters_text = ctx.param_or(params, "Parameters", "");
        let parameters = parse_operation_parameters(&parameters_text)
            .map_err(|reason| CmdError::invalid_param("Parameters", parameters_text.as_str(), reason))?;

        let (input_ids, unmatched) = resolve_ids(ctx, &inputs_text);
        if let Some(pattern) = unmatched.first() {
            return Err(LayerError::NotFound(pattern.clone()).into());
        }

        let state = &mut *ctx.state;
        let mut inputs: Vec<&dyn Dataset> = Vec::with_capacity(input_ids.len());
        let mut kind = LayerKind::default();
        for (i, id) in input_ids.iter().enumerate() {
            let layer = state.layers.require(id)?;
            if i == 0 {
                kind = layer.kind();
            }
            inputs.push(layer.dataset());
        }

        let result = state
            .toolkit
            .execute(operation.trim(), &inputs, &parameters)?;
        drop(inputs);

        let count = result.feature_count();
        state
            .layers
            .add(GeoLayer::new(output_id.trim(), kind, result))?;
        log::info!(
            "{} of {} layers produced {} ({} features)",
            operation,
            input_ids.len(),
            output_id,
            count.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string())
        );
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parameters() {
        assert_eq!(
            parse_operation_parameters("Attribute: type ;Value:urban;"),
            Ok(vec![
                ("Attribute".to_string(), "type".to_string()),
                ("Value".to_string(), "urban".to_string())
            ])
        );
        assert_eq!(parse_operation_parameters(""), Ok(vec![]));
        assert!(parse_operation_parameters("Attribute").is_err());
        assert!(parse_operation_parameters(":x").is_err());
    }

    #[test]
    fn test_check_parameters() {
        let cmd = RunGeoprocessingCommand;
        let params = Parameters::new()
            .with("Operation", "merge")
            .with("InputGeoLayerIDs", "a,b")
            .with("OutputGeoLayerID", "c")
            .with("Parameters", "bad");
        assert!(!cmd.check_parameters(&params).is_ok());
    }
}
