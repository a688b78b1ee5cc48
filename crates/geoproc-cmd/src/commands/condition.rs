//! Condition expressions for If
//!
//! `left OP right` with `<`, `<=`, `>`, `>=`, `==`, `!=`, `contains` and
//! `!contains`, or a lone `true`/`false`. Operands compare as numbers when
//! both parse as numbers, unless string comparison is requested.

use std::cmp::Ordering;

use geoproc_props::parse_bool;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Contains,
    NotContains,
}

impl Operator {
    fn symbol(self) -> &'static str {
        match self {
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Contains => "contains",
            Operator::NotContains => "!contains",
        }
    }
}

/// Longest symbols first so `<=` is not read as `<`
const SYMBOLS: &[Operator] = &[
    Operator::LessEqual,
    Operator::GreaterEqual,
    Operator::Equal,
    Operator::NotEqual,
    Operator::Less,
    Operator::Greater,
];

/// A parsed condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition<'a> {
    Literal(bool),
    Compare {
        left: &'a str,
        op: Operator,
        right: &'a str,
    },
}

/// Parse a condition
pub fn parse(text: &str) -> Result<Condition<'_>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("condition is empty".to_string());
    }

    if let Some((pos, op)) = find_operator(text) {
        let left = unquote(text[..pos].trim());
        let right = unquote(text[pos + op.symbol().len()..].trim());
        if left.is_empty() && right.is_empty() {
            return Err(format!("operator {} has no operands", op.symbol()));
        }
        return Ok(Condition::Compare { left, op, right });
    }

    match parse_bool(text) {
        Some(value) if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") => {
            Ok(Condition::Literal(value))
        }
        _ => Err(format!(
            "no comparison operator in \"{}\" (use <, <=, >, >=, ==, !=, contains, !contains)",
            text
        )),
    }
}

/// Evaluate a condition
pub fn evaluate(text: &str, compare_as_strings: bool) -> Result<bool, String> {
    match parse(text)? {
        Condition::Literal(value) => Ok(value),
        Condition::Compare { left, op, right } => Ok(compare(left, op, right, compare_as_strings)),
    }
}

fn compare(left: &str, op: Operator, right: &str, compare_as_strings: bool) -> bool {
    match op {
        Operator::Contains => return left.contains(right),
        Operator::NotContains => return !left.contains(right),
        _ => {}
    }

    let ordering = match (number(left), number(right)) {
        (Some(a), Some(b)) if !compare_as_strings => {
            a.partial_cmp(&b).unwrap_or_else(|| left.cmp(right))
        }
        _ => left.cmp(right),
    };

    match op {
        Operator::Less => ordering == Ordering::Less,
        Operator::LessEqual => ordering != Ordering::Greater,
        Operator::Greater => ordering == Ordering::Greater,
        Operator::GreaterEqual => ordering != Ordering::Less,
        Operator::Equal => ordering == Ordering::Equal,
        Operator::NotEqual => ordering != Ordering::Equal,
        Operator::Contains | Operator::NotContains => false,
    }
}

/// Finite numeric value of an operand; words such as `nan` or `inf` stay text
fn number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Find the first operator, left to right
fn find_operator(text: &str) -> Option<(usize, Operator)> {
    for (pos, _) in text.char_indices() {
        let rest = &text[pos..];
        let before_space = text[..pos].ends_with(char::is_whitespace);

        if before_space {
            for op in [Operator::NotContains, Operator::Contains] {
                if let Some(after) = rest.strip_prefix(op.symbol()) {
                    if after.starts_with(char::is_whitespace) {
                        return Some((pos, op));
                    }
                }
            }
        }

        for op in SYMBOLS {
            if rest.starts_with(op.symbol()) {
                return Some((pos, *op));
            }
        }
    }
    None
}

fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
