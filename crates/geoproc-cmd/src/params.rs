//! Command parameters and load-time validation

use std::fmt;

use geoproc_props::{has_reference, parse_bool};

use crate::status::{tags, CommandPhase, LogRecord, Severity};

/// Ordered `Name=Value` pairs as written in the command file
///
/// Values are raw text: `${...}` references are kept and only expanded when
/// the command runs. Name lookup ignores ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    /// Create an empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    /// Get a raw value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a raw value, treating an empty value as absent
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }

    /// Check if a parameter is present
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over (name, value) in written order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Get the number of parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no parameters
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Value type of a parameter, checked at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Any text
    String,
    /// Signed integer
    Integer,
    /// Floating-point number
    Float,
    /// true/false, yes/no, on/off, 1/0
    Boolean,
    /// One of a fixed set of words, case-insensitive
    Choice(&'static [&'static str]),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::String => write!(f, "string"),
            ParamType::Integer => write!(f, "integer"),
            ParamType::Float => write!(f, "float"),
            ParamType::Boolean => write!(f, "boolean"),
            ParamType::Choice(choices) => write!(f, "one of {}", choices.join(", ")),
        }
    }
}

/// Definition of a parameter accepted by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDef {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
}

impl ParamDef {
    /// A parameter that must be given with a non-empty value
    pub const fn required(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            required: true,
        }
    }

    /// A parameter that may be omitted
    pub const fn optional(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            required: false,
        }
    }

    /// Check a literal value against the parameter type
    pub fn check_value(&self, value: &str) -> Result<(), String> {
        let trimmed = value.trim();
        match self.param_type {
            ParamType::String => Ok(()),
            ParamType::Integer => trimmed
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| "expected an integer".to_string()),
            ParamType::Float => trimmed
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| "expected a number".to_string()),
            ParamType::Boolean => parse_bool(trimmed)
                .map(|_| ())
                .ok_or_else(|| "expected True or False".to_string()),
            ParamType::Choice(choices) => {
                if choices.iter().any(|c| c.eq_ignore_ascii_case(trimmed)) {
                    Ok(())
                } else {
                    Err(format!("expected one of {}", choices.join(", ")))
                }
            }
        }
    }
}

/// Records produced by a load-time parameter check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    records: Vec<LogRecord>,
}

impl ValidationResult {
    /// Create an empty (passing) result
    pub fn new() -> Self {
        Self::default()
    }

    fn add(
        &mut self,
        severity: Severity,
        tag: &'static str,
        message: String,
        recommendation: String,
    ) {
        self.records.push(LogRecord {
            severity,
            phase: CommandPhase::Initialization,
            tag,
            message,
            recommendation,
        });
    }

    /// Add a warning
    pub fn warning(&mut self, message: impl Into<String>, recommendation: impl Into<String>) {
        self.add(
            Severity::Warning,
            tags::PARAMETER,
            message.into(),
            recommendation.into(),
        );
    }

    /// Add a failure
    pub fn failure(&mut self, message: impl Into<String>, recommendation: impl Into<String>) {
        self.add(
            Severity::Failure,
            tags::PARAMETER,
            message.into(),
            recommendation.into(),
        );
    }

    /// Highest severity recorded, SUCCESS if none
    pub fn severity(&self) -> Severity {
        self.records
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or(Severity::Success)
    }

    /// Check if nothing worse than a warning was recorded
    pub fn is_ok(&self) -> bool {
        self.severity() < Severity::Failure
    }

    /// Get the records
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Consume into the records
    pub fn into_records(self) -> Vec<LogRecord> {
        self.records
    }
}

/// Check parameters against definitions
///
/// Reports missing required parameters, unknown parameter names, and literal
/// values that do not match their type. Values containing `${` are checked
/// when the command runs instead.
pub fn validate(defs: &[ParamDef], params: &Parameters) -> ValidationResult {
    let mut result = ValidationResult::new();

    for def in defs.iter().filter(|d| d.required) {
        if params.get_non_empty(def.name).is_none() {
            result.failure(
                format!("Parameter {} is required.", def.name),
                format!("Specify the {} parameter.", def.name),
            );
        }
    }

    for (name, value) in params.iter() {
        let Some(def) = defs.iter().find(|d| d.name.eq_ignore_ascii_case(name)) else {
            let valid: Vec<&str> = defs.iter().map(|d| d.name).collect();
            result.warning(
                format!("Unknown parameter {}=\"{}\".", name, value),
                if valid.is_empty() {
                    "Remove the parameter; the command takes none.".to_string()
                } else {
                    format!("Remove the parameter; valid parameters are {}.", valid.join(", "))
                },
            );
            continue;
        };

        if value.trim().is_empty() || has_reference(value) {
            continue;
        }
        if let Err(reason) = def.check_value(value) {
            result.failure(
                format!(
                    "Parameter {} value \"{}\" is invalid: {}.",
                    def.name, value, reason
                ),
                format!("Specify {} for {}.", def.param_type, def.name),
            );
        }
    }

    result
}
