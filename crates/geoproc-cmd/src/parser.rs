//! Command line parser using nom
//!
//! Parses one line of a command file into a [`ParsedCommand`].
//!
//! # Supported Syntax
//!
//! - Bare commands: `Exit`, `EndIf()`
//! - Named parameters: `SetProperty(PropertyName="Dir",PropertyValue="/data")`
//! - Double-quoted values with `\"` and `\\` escapes: `Message(Message="say \"hi\"")`
//! - Single-quoted values, taken literally: `If(Condition='${A} == "x"')`
//! - Unquoted values running to the next top-level `,` or `)`: `For(Sequence=1:3)`
//! - `${Property}` references are kept verbatim for run-time substitution

use nom::{
    bytes::complete::{escaped, take_till, take_while1},
    character::complete::{anychar, char, none_of},
    combinator::opt,
    sequence::delimited,
    IResult,
};

use crate::error::ParseError;
use crate::params::Parameters;

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command name as written
    pub name: String,
    /// Parameters in written order
    pub parameters: Parameters,
}

/// Parse a single command line
///
/// # Example
/// ```
/// use geoproc_cmd::parse_command;
///
/// let cmd = parse_command(r#"ReadGeoLayerFromFile(InputFile="in.geojson",GeoLayerID=counties)"#).unwrap();
/// assert_eq!(cmd.name, "ReadGeoLayerFromFile");
/// assert_eq!(cmd.parameters.get("InputFile"), Some("in.geojson"));
/// assert_eq!(cmd.parameters.get("GeoLayerID"), Some("counties"));
/// ```
pub fn parse_command(input: &str) -> Result<ParsedCommand, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::EmptyCommand);
    }

    let (rest, name) = command_name(input)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| ParseError::InvalidName(first_token(input)))?;

    let rest = rest.trim_start();
    if rest.is_empty() {
        return Ok(ParsedCommand {
            name: name.to_string(),
            parameters: Parameters::new(),
        });
    }

    let Some(rest) = rest.strip_prefix('(') else {
        return Err(ParseError::TrailingInput(rest.to_string()));
    };
    let (rest, parameters) = parameter_list(rest)?;

    let rest = rest.trim();
    if !rest.is_empty() {
        return Err(ParseError::TrailingInput(rest.to_string()));
    }

    Ok(ParsedCommand {
        name: name.to_string(),
        parameters,
    })
}

/// Parse parameters after the opening `(` up to and including the closing `)`
fn parameter_list(input: &str) -> Result<(&str, Parameters), ParseError> {
    let mut params = Parameters::new();
    let mut rest = input.trim_start();

    if let Some(after) = rest.strip_prefix(')') {
        return Ok((after, params));
    }

    loop {
        if rest.is_empty() {
            return Err(ParseError::UnbalancedParens);
        }

        let (after, name) = parameter_name(rest)
            .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                ParseError::InvalidParameterName(first_token(rest))
            })?;
        let after = after.trim_start();
        let after = after
            .strip_prefix('=')
            .ok_or_else(|| ParseError::MissingEquals(name.to_string()))?;
        let (after, value) = parameter_value(after.trim_start())?;

        if params.contains(name) {
            return Err(ParseError::DuplicateParameter(name.to_string()));
        }
        params.push(name, value);

        let after = after.trim_start();
        if let Some(next) = after.strip_prefix(',') {
            rest = next.trim_start();
        } else if let Some(end) = after.strip_prefix(')') {
            return Ok((end, params));
        } else if after.is_empty() {
            return Err(ParseError::UnbalancedParens);
        } else {
            return Err(ParseError::TrailingInput(after.to_string()));
        }
    }
}

/// Parse a command name (letters, digits, underscore)
fn command_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Parse a parameter name (letters, digits, underscore)
fn parameter_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Parse a parameter value
fn parameter_value(input: &str) -> Result<(&str, String), ParseError> {
    match input.chars().next() {
        Some('"') => double_quoted(input)
            .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                ParseError::UnterminatedString(input.to_string())
            }),
        Some('\'') => single_quoted(input)
            .map(|(rest, s)| (rest, s.to_string()))
            .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                ParseError::UnterminatedString(input.to_string())
            }),
        _ => {
            let (rest, value) = unquoted_value(input)?;
            Ok((rest, value.to_string()))
        }
    }
}

/// Parse a double-quoted string, unescaping `\"` and `\\`
fn double_quoted(input: &str) -> IResult<&str, String> {
    let (rest, raw) = delimited(
        char('"'),
        opt(escaped(none_of("\"\\"), '\\', anychar)),
        char('"'),
    )(input)?;
    Ok((rest, unescape_string(raw.unwrap_or(""))))
}

/// Parse a single-quoted string, taken literally
fn single_quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('\''), take_till(|c| c == '\''), char('\''))(input)
}

/// Take text up to the next `,` or `)` outside nested parentheses
fn unquoted_value(input: &str) -> Result<(&str, &str), ParseError> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Ok((&input[i..], input[..i].trim_end())),
            ')' => depth -= 1,
            ',' if depth == 0 => return Ok((&input[i..], input[..i].trim_end())),
            _ => {}
        }
    }
    Err(ParseError::UnbalancedParens)
}

/// Unescape `\"` and `\\`; any other backslash is kept as written
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Escape a value for writing inside double quotes
pub fn escape_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

fn first_token(input: &str) -> String {
    input
        .split(|c: char| c.is_whitespace() || c == '(' || c == ',' || c == '=')
        .find(|s| !s.is_empty())
        .unwrap_or(input)
        .chars()
        .take(40)
        .collect()
}
