//! `${Name}` property substitution
//!
//! Substitution is a single left-to-right pass. Text produced by a
//! substitution is never scanned again, so a property whose value contains
//! `${...}` is inserted verbatim. References to undefined properties are left
//! in place and reported in [`Expansion::missing`].

use crate::store::PropertyStore;

/// Result of expanding a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// The expanded text
    pub text: String,
    /// Names referenced but not defined, in order of appearance
    pub missing: Vec<String>,
}

impl Expansion {
    /// True if every reference was resolved
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Expand `${Name}` references using the store
pub fn expand(text: &str, store: &PropertyStore) -> Expansion {
    let mut result = String::with_capacity(text.len());
    let mut missing = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match store.get(name) {
                    Some(value) => result.push_str(&value.to_string()),
                    None => {
                        result.push_str(&rest[start..start + 2 + end + 1]);
                        missing.push(name.to_string());
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated reference is literal text
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);

    Expansion {
        text: result,
        missing,
    }
}

/// Check if text contains a `${...}` reference
pub fn has_reference(text: &str) -> bool {
    references(text).next().is_some()
}

/// Iterate over the property names referenced in text
pub fn references(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let start = rest.find("${")?;
        let after = &rest[start + 2..];
        let end = after.find('}')?;
        rest = &after[end + 1..];
        Some(&after[..end])
    })
}

impl PropertyStore {
    /// Expand `${Name}` references in text, see [`expand`]
    pub fn expand(&self, text: &str) -> Expansion {
        expand(text, self)
    }
}
