//! Layer handles and the opaque dataset payload

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Layer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerKind {
    /// Features with geometry and attributes
    #[default]
    Vector,
    /// Gridded cell values
    Raster,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Vector => write!(f, "Vector"),
            LayerKind::Raster => write!(f, "Raster"),
        }
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vector" => Ok(LayerKind::Vector),
            "raster" => Ok(LayerKind::Raster),
            _ => Err(format!("unknown layer kind '{}' (expected Vector or Raster)", s)),
        }
    }
}

/// Dataset payload produced and consumed by a GIS toolkit
///
/// The engine treats the payload as opaque; only the toolkit that created it
/// knows its concrete type.
pub trait Dataset: Send + Sync + fmt::Debug {
    /// Format name, e.g. `GeoJSON`
    fn format(&self) -> &str;

    /// Coordinate reference system identifier, if known
    fn crs(&self) -> Option<String> {
        None
    }

    /// Number of features (vector) or cells (raster), if known
    fn feature_count(&self) -> Option<usize> {
        None
    }

    /// Deep copy of the payload
    fn clone_box(&self) -> Box<dyn Dataset>;

    /// Downcast support for the owning toolkit
    fn as_any(&self) -> &dyn Any;
}

/// A georeferenced dataset registered under an id
#[derive(Debug)]
pub struct GeoLayer {
    /// Registry id
    id: String,
    /// Layer type
    kind: LayerKind,
    /// Coordinate reference system
    crs: Option<String>,
    /// File the layer was read from
    source: Option<PathBuf>,
    /// Toolkit-owned payload
    dataset: Box<dyn Dataset>,
}

impl GeoLayer {
    /// Create a layer, taking the CRS from the dataset
    pub fn new(id: impl Into<String>, kind: LayerKind, dataset: Box<dyn Dataset>) -> Self {
        Self {
            id: id.into(),
            kind,
            crs: dataset.crs(),
            source: None,
            dataset,
        }
    }

    /// Record the file the layer was read from
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Override the coordinate reference system
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Get the layer id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the layer type
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Get the coordinate reference system
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// Get the source file
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Borrow the payload
    pub fn dataset(&self) -> &dyn Dataset {
        self.dataset.as_ref()
    }

    /// Replace the payload, keeping id and metadata
    pub fn replace_dataset(&mut self, dataset: Box<dyn Dataset>) -> Box<dyn Dataset> {
        std::mem::replace(&mut self.dataset, dataset)
    }

    /// Copy the layer under a new id
    pub fn copy_as(&self, id: impl Into<String>) -> GeoLayer {
        GeoLayer {
            id: id.into(),
            kind: self.kind,
            crs: self.crs.clone(),
            source: self.source.clone(),
            dataset: self.dataset.clone_box(),
        }
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Points(usize);

    impl Dataset for Points {
        fn format(&self) -> &str {
            "points"
        }
        fn crs(&self) -> Option<String> {
            Some("EPSG:26913".to_string())
        }
        fn feature_count(&self) -> Option<usize> {
            Some(self.0)
        }
        fn clone_box(&self) -> Box<dyn Dataset> {
            Box::new(self.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_layer_metadata() {
        let layer = GeoLayer::new("wells", LayerKind::Vector, Box::new(Points(3)))
            .with_source("/data/wells.geojson");
        assert_eq!(layer.id(), "wells");
        assert_eq!(layer.crs(), Some("EPSG:26913"));
        assert_eq!(layer.dataset().feature_count(), Some(3));
        assert_eq!(layer.source(), Some(Path::new("/data/wells.geojson")));
    }

    #[test]
    fn test_copy_as() {
        let layer = GeoLayer::new("a", LayerKind::Vector, Box::new(Points(2)));
        let copy = layer.copy_as("b");
        assert_eq!(copy.id(), "b");
        assert_eq!(copy.dataset().feature_count(), Some(2));
        assert_eq!(layer.id(), "a");
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("vector".parse::<LayerKind>(), Ok(LayerKind::Vector));
        assert_eq!("RASTER".parse::<LayerKind>(), Ok(LayerKind::Raster));
        assert!("mesh".parse::<LayerKind>().is_err());
    }
}
