//! In-process toolkit for GeoJSON vector data
//!
//! Datasets are held as parsed JSON documents. This toolkit backs the
//! command-line tool and the test suites; richer formats belong to a toolkit
//! wrapping a native GIS library.

use std::any::Any;
use std::path::Path;

use serde_json::Value;

use crate::error::{ToolkitError, ToolkitResult};
use crate::layer::{Dataset, LayerKind};
use crate::toolkit::GisToolkit;

/// CRS assumed for GeoJSON without a `crs` member
pub const GEOJSON_DEFAULT_CRS: &str = "EPSG:4326";

/// A GeoJSON document
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDataset {
    document: Value,
}

impl JsonDataset {
    /// Wrap a parsed GeoJSON document
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    /// Create an empty feature collection
    pub fn empty_collection() -> Self {
        Self::from_features(Vec::new())
    }

    /// Create a feature collection from features
    pub fn from_features(features: Vec<Value>) -> Self {
        Self::new(serde_json::json!({
            "type": "FeatureCollection",
            "features": features,
        }))
    }

    /// Borrow the document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Features of a `FeatureCollection`, or the lone `Feature`
    pub fn features(&self) -> Option<&[Value]> {
        match self.document.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => self
                .document
                .get("features")
                .and_then(Value::as_array)
                .map(|v| v.as_slice()),
            Some("Feature") => Some(std::slice::from_ref(&self.document)),
            _ => None,
        }
    }
}

impl Dataset for JsonDataset {
    fn format(&self) -> &str {
        "GeoJSON"
    }

    fn crs(&self) -> Option<String> {
        let named = self
            .document
            .pointer("/crs/properties/name")
            .and_then(Value::as_str);
        Some(named.unwrap_or(GEOJSON_DEFAULT_CRS).to_string())
    }

    fn feature_count(&self) -> Option<usize> {
        self.features().map(|f| f.len())
    }

    fn clone_box(&self) -> Box<dyn Dataset> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// GeoJSON toolkit living entirely in memory
#[derive(Debug, Default)]
pub struct MemoryToolkit {
    initialized: bool,
}

impl MemoryToolkit {
    /// Create an uninitialized toolkit
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_initialized(&self) -> ToolkitResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(ToolkitError::NotInitialized(self.name().to_string()))
        }
    }

    fn as_json<'a>(&self, dataset: &'a dyn Dataset) -> ToolkitResult<&'a JsonDataset> {
        dataset
            .as_any()
            .downcast_ref::<JsonDataset>()
            .ok_or_else(|| ToolkitError::UnsupportedFormat(dataset.format().to_string()))
    }

    fn merge(&self, inputs: &[&dyn Dataset]) -> ToolkitResult<Box<dyn Dataset>> {
        if inputs.is_empty() {
            return Err(ToolkitError::dataset("merge requires at least one input"));
        }

        let mut features = Vec::new();
        for input in inputs {
            let json = self.as_json(*input)?;
            let input_features = json
                .features()
                .ok_or_else(|| ToolkitError::dataset("merge input is not a feature collection"))?;
            features.extend(input_features.iter().cloned());
        }

        let mut merged = JsonDataset::from_features(features);
        if let Some(crs) = self.as_json(inputs[0])?.document.get("crs") {
            merged.document["crs"] = crs.clone();
        }
        Ok(Box::new(merged))
    }

    /// Keep features whose property equals a value
    fn filter(
        &self,
        inputs: &[&dyn Dataset],
        parameters: &[(String, String)],
    ) -> ToolkitResult<Box<dyn Dataset>> {
        let [input] = inputs else {
            return Err(ToolkitError::dataset("filter requires exactly one input"));
        };
        let param = |key: &str| {
            parameters
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| ToolkitError::dataset(format!("filter requires parameter '{}'", key)))
        };
        let field = param("Attribute")?;
        let wanted = param("Value")?;

        let json = self.as_json(*input)?;
        let features = json
            .features()
            .ok_or_else(|| ToolkitError::dataset("filter input is not a feature collection"))?;

        let kept = features
            .iter()
            .filter(|f| {
                match f.pointer(&format!("/properties/{}", field)) {
                    Some(Value::String(s)) => s == wanted,
                    Some(other) => other.to_string() == wanted,
                    None => false,
                }
            })
            .cloned()
            .collect();
        Ok(Box::new(JsonDataset::from_features(kept)))
    }
}

impl GisToolkit for MemoryToolkit {
    fn name(&self) -> &str {
        "memory"
    }

    fn initialize(&mut self) -> ToolkitResult<()> {
        if !self.initialized {
            log::debug!("Initializing GIS toolkit '{}'", self.name());
            self.initialized = true;
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn load_dataset(&mut self, path: &Path, kind: LayerKind) -> ToolkitResult<Box<dyn Dataset>> {
        self.ensure_initialized()?;
        if kind == LayerKind::Raster {
            return Err(ToolkitError::UnsupportedFormat(
                "raster layers are not supported by the memory toolkit".to_string(),
            ));
        }

        let text = std::fs::read_to_string(path).map_err(|e| ToolkitError::io(path, e))?;
        let document: Value = serde_json::from_str(&text)
            .map_err(|e| ToolkitError::dataset(format!("{}: {}", path.display(), e)))?;

        let dataset = JsonDataset::new(document);
        if dataset.features().is_none() {
            return Err(ToolkitError::dataset(format!(
                "{}: not a GeoJSON Feature or FeatureCollection",
                path.display()
            )));
        }
        log::debug!(
            "Read {} features from {}",
            dataset.feature_count().unwrap_or(0),
            path.display()
        );
        Ok(Box::new(dataset))
    }

    fn execute(
        &mut self,
        operation: &str,
        inputs: &[&dyn Dataset],
        parameters: &[(String, String)],
    ) -> ToolkitResult<Box<dyn Dataset>> {
        self.ensure_initialized()?;
        match operation.to_lowercase().as_str() {
            "merge" => self.merge(inputs),
            "filter" => self.filter(inputs, parameters),
            _ => Err(ToolkitError::UnsupportedOperation(operation.to_string())),
        }
    }

    fn write_dataset(
        &mut self,
        dataset: &dyn Dataset,
        path: &Path,
        format: &str,
    ) -> ToolkitResult<()> {
        self.ensure_initialized()?;
        if !format.eq_ignore_ascii_case("geojson") {
            return Err(ToolkitError::UnsupportedFormat(format.to_string()));
        }

        let json = self.as_json(dataset)?;
        let text = serde_json::to_string_pretty(json.document())
            .map_err(|e| ToolkitError::dataset(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| ToolkitError::io(path, e))
    }

    fn shutdown(&mut self) -> ToolkitResult<()> {
        if self.initialized {
            log::debug!("Shutting down GIS toolkit '{}'", self.name());
            self.initialized = false;
        }
        Ok(())
    }
}
