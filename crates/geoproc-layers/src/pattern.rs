//! Wildcard matching for ids and property names
//!
//! Only `*` is special: it matches any run of characters, including none.
//! Matching is case-sensitive.

/// Check if `name` matches `pattern`
pub fn matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, last) = (parts[0], parts[parts.len() - 1]);

    if !name.starts_with(first) {
        return false;
    }
    let mut rest = &name[first.len()..];

    // Middle parts must appear in order, leftmost match is sufficient
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}

/// Check if `name` matches any of the patterns
///
/// An empty pattern list matches nothing.
pub fn matches_any<S: AsRef<str>>(patterns: &[S], name: &str) -> bool {
    patterns.iter().any(|p| matches(p.as_ref(), name))
}
