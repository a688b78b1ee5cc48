//! Layer registry
//!
//! Layers are stored by id and kept in insertion order so listings and
//! wildcard iteration are deterministic.

use ahash::AHashMap;

use crate::error::{LayerError, LayerResult};
use crate::layer::GeoLayer;
use crate::pattern;

/// Registry of layers keyed by id
#[derive(Debug, Default)]
pub struct LayerRegistry {
    /// Layers stored by id
    layers: AHashMap<String, GeoLayer>,
    /// Ids in insertion order
    order: Vec<String>,
}

impl LayerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Add a layer
    ///
    /// A layer with the same id is replaced and returned. The replacement
    /// moves to the end of the listing order.
    pub fn add(&mut self, layer: GeoLayer) -> LayerResult<Option<GeoLayer>> {
        let id = layer.id().to_string();
        if id.trim().is_empty() || id.contains('*') {
            return Err(LayerError::InvalidId(id));
        }

        self.order.retain(|n| n != &id);
        self.order.push(id.clone());
        let previous = self.layers.insert(id.clone(), layer);
        if previous.is_some() {
            log::debug!("Replaced layer '{}'", id);
        }
        Ok(previous)
    }

    /// Remove a layer by id
    pub fn remove(&mut self, id: &str) -> Option<GeoLayer> {
        self.order.retain(|n| n != id);
        self.layers.remove(id)
    }

    /// Get a layer by id
    pub fn get(&self, id: &str) -> Option<&GeoLayer> {
        self.layers.get(id)
    }

    /// Get a layer by id or fail with `NotFound`
    pub fn require(&self, id: &str) -> LayerResult<&GeoLayer> {
        self.get(id)
            .ok_or_else(|| LayerError::NotFound(id.to_string()))
    }

    /// Get mutable access to a layer
    pub fn get_mut(&mut self, id: &str) -> Option<&mut GeoLayer> {
        self.layers.get_mut(id)
    }

    /// Check if a layer exists
    pub fn contains(&self, id: &str) -> bool {
        self.layers.contains_key(id)
    }

    /// Get all ids in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Get all layers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &GeoLayer> {
        self.order.iter().filter_map(|id| self.layers.get(id))
    }

    /// Get ids matching a `*` wildcard pattern, in insertion order
    pub fn matching(&self, pattern: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| pattern::matches(pattern, id))
            .cloned()
            .collect()
    }

    /// Copy a layer under a new id
    ///
    /// Fails if the source is missing or the target id is taken.
    pub fn copy(&mut self, id: &str, new_id: &str) -> LayerResult<()> {
        if self.contains(new_id) {
            return Err(LayerError::Exists(new_id.to_string()));
        }
        let copy = self.require(id)?.copy_as(new_id);
        self.add(copy)?;
        Ok(())
    }

    /// Rename a layer
    pub fn rename(&mut self, old_id: &str, new_id: &str) -> LayerResult<()> {
        if !self.layers.contains_key(old_id) {
            return Err(LayerError::NotFound(old_id.to_string()));
        }
        if self.layers.contains_key(new_id) {
            return Err(LayerError::Exists(new_id.to_string()));
        }

        if let Some(mut layer) = self.layers.remove(old_id) {
            layer.set_id(new_id.to_string());
            self.layers.insert(new_id.to_string(), layer);

            for id in &mut self.order {
                if id == old_id {
                    *id = new_id.to_string();
                }
            }
        }

        Ok(())
    }

    /// Remove all layers
    pub fn clear(&mut self) {
        self.layers.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Dataset, LayerKind};
    use std::any::Any;

    #[derive(Debug, Clone)]
    struct MockDataset;

    impl Dataset for MockDataset {
        fn format(&self) -> &str {
            "mock"
        }
        fn clone_box(&self) -> Box<dyn Dataset> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn layer(id: &str) -> GeoLayer {
        GeoLayer::new(id, LayerKind::Vector, Box::new(MockDataset))
    }

    #[test]
    fn test_add_and_get() {
        let mut registry = LayerRegistry::new();
        assert!(registry.add(layer("roads")).unwrap().is_none());
        assert!(registry.contains("roads"));
        assert_eq!(registry.get("roads").map(|l| l.id()), Some("roads"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_replaces() {
        let mut registry = LayerRegistry::new();
        registry.add(layer("a")).unwrap();
        registry.add(layer("b")).unwrap();
        assert!(registry.add(layer("a")).unwrap().is_some());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_invalid_id() {
        let mut registry = LayerRegistry::new();
        assert!(matches!(
            registry.add(layer("")),
            Err(LayerError::InvalidId(_))
        ));
        assert!(matches!(
            registry.add(layer("a*")),
            Err(LayerError::InvalidId(_))
        ));
    }

    #[test]
    fn test_remove() {
        let mut registry = LayerRegistry::new();
        registry.add(layer("a")).unwrap();
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.ids().count(), 0);
    }

    #[test]
    fn test_matching() {
        let mut registry = LayerRegistry::new();
        for id in ["county_a", "county_b", "roads"] {
            registry.add(layer(id)).unwrap();
        }
        assert_eq!(registry.matching("county_*"), vec!["county_a", "county_b"]);
        assert_eq!(registry.matching("*").len(), 3);
        assert_eq!(registry.matching("roads"), vec!["roads"]);
        assert!(registry.matching("rivers").is_empty());
    }

    #[test]
    fn test_copy() {
        let mut registry = LayerRegistry::new();
        registry.add(layer("a")).unwrap();
        registry.copy("a", "b").unwrap();
        assert_eq!(registry.get("b").map(|l| l.id()), Some("b"));
        assert!(matches!(registry.copy("a", "b"), Err(LayerError::Exists(_))));
        assert!(matches!(registry.copy("x", "c"), Err(LayerError::NotFound(_))));
    }

    #[test]
    fn test_rename() {
        let mut registry = LayerRegistry::new();
        registry.add(layer("a")).unwrap();
        registry.add(layer("b")).unwrap();

        registry.rename("a", "c").unwrap();
        assert!(!registry.contains("a"));
        assert_eq!(registry.get("c").map(|l| l.id()), Some("c"));
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["c", "b"]);

        assert!(matches!(registry.rename("x", "y"), Err(LayerError::NotFound(_))));
        assert!(matches!(registry.rename("c", "b"), Err(LayerError::Exists(_))));
    }

    #[test]
    fn test_clear() {
        let mut registry = LayerRegistry::new();
        registry.add(layer("a")).unwrap();
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.iter().count(), 0);
    }
}
