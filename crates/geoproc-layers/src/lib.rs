//! GeoProc Layers
//!
//! Geographic datasets held by a running workflow, and the interface to the
//! GIS toolkit that reads, writes and processes them.
//!
//! - [`LayerRegistry`] stores [`GeoLayer`]s by id, in insertion order.
//! - [`GisToolkit`] is the seam to the external GIS library.
//! - [`MemoryToolkit`] is a GeoJSON-only toolkit for tests and the CLI.

mod error;
mod layer;
mod memory;
pub mod pattern;
mod registry;
mod toolkit;

pub use error::{LayerError, LayerResult, ToolkitError, ToolkitResult};
pub use layer::{Dataset, GeoLayer, LayerKind};
pub use memory::{JsonDataset, MemoryToolkit, GEOJSON_DEFAULT_CRS};
pub use registry::LayerRegistry;
pub use toolkit::GisToolkit;
