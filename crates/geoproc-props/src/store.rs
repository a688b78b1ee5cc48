//! Property storage with protected names and reset-to-initial support

use ahash::{AHashMap, AHashSet};

use crate::error::{PropertyError, PropertyResult};
use crate::value::PropertyValue;

// =============================================================================
// Property Store
// =============================================================================

/// Ordered mapping from property name to value
///
/// Names are case-sensitive. Properties defined with [`PropertyStore::define`]
/// make up the initial state that [`PropertyStore::reset`] returns to; those
/// defined as protected reject writes through [`PropertyStore::set`].
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    /// Current values
    values: AHashMap<String, PropertyValue>,
    /// Names in insertion order
    order: Vec<String>,
    /// Names that user commands cannot overwrite
    protected: AHashSet<String>,
    /// Values captured by `define`, restored by `reset`
    initial: Vec<(String, PropertyValue)>,
}

impl PropertyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Define an initial property
    ///
    /// Used at engine start. The value is remembered as the property's initial
    /// value; `protected` marks it read-only for user commands.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>, protected: bool) {
        let name = name.into();
        let value = value.into();

        match self.initial.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value.clone(),
            None => self.initial.push((name.clone(), value.clone())),
        }
        if protected {
            self.protected.insert(name.clone());
        } else {
            self.protected.remove(&name);
        }
        self.insert(name, value);
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Get a property value rendered as text
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|v| v.to_string())
    }

    /// Get a property value or fail with `NotFound`
    pub fn require(&self, name: &str) -> PropertyResult<&PropertyValue> {
        self.values
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))
    }

    /// Check if a property exists
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Check if a property is protected
    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(name)
    }

    /// Set a property on behalf of a user command
    ///
    /// Fails with [`PropertyError::Protected`] for protected names, leaving the
    /// stored value unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) -> PropertyResult<()> {
        validate_name(name)?;
        if self.protected.contains(name) {
            return Err(PropertyError::Protected(name.to_string()));
        }
        self.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Set a property on behalf of the engine, ignoring protection
    pub fn set_system(&mut self, name: &str, value: impl Into<PropertyValue>) -> PropertyResult<()> {
        validate_name(name)?;
        self.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Return every non-protected property to its initial value
    ///
    /// Properties that were not defined initially are dropped. Protected
    /// properties keep their current value.
    pub fn reset(&mut self) {
        let mut values = AHashMap::with_capacity(self.initial.len());
        let mut order = Vec::with_capacity(self.initial.len());

        for (name, initial) in &self.initial {
            let value = if self.protected.contains(name) {
                self.values.get(name).cloned().unwrap_or_else(|| initial.clone())
            } else {
                initial.clone()
            };
            values.insert(name.clone(), value);
            order.push(name.clone());
        }

        log::debug!(
            "Reset properties: {} kept, {} dropped",
            order.len(),
            self.order.len().saturating_sub(order.len())
        );
        self.values = values;
        self.order = order;
    }

    /// Get the number of properties
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Property names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Iterate over (name, value) in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.order
            .iter()
            .filter_map(move |name| self.values.get(name).map(|v| (name.as_str(), v)))
    }

    fn insert(&mut self, name: String, value: PropertyValue) {
        if !self.values.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.values.insert(name, value);
    }
}

/// Property names must be non-empty and free of substitution syntax
pub fn validate_name(name: &str) -> PropertyResult<()> {
    if name.trim().is_empty() {
        return Err(PropertyError::invalid_name(name, "name is empty"));
    }
    if name.contains(['$', '{', '}']) {
        return Err(PropertyError::invalid_name(
            name,
            "name cannot contain '$', '{' or '}'",
        ));
    }
    Ok(())
}
