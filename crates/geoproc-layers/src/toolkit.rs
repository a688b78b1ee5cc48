//! GIS toolkit interface
//!
//! The engine never touches geometry itself. Reading, writing and
//! geoprocessing are delegated to a toolkit implementing [`GisToolkit`].
//! The toolkit is initialized once per engine session and shut down at exit.

use std::path::Path;

use crate::error::ToolkitResult;
use crate::layer::{Dataset, LayerKind};

/// Operations the engine delegates to an external GIS library
pub trait GisToolkit: Send {
    /// Toolkit name for diagnostics
    fn name(&self) -> &str;

    /// Prepare the toolkit for use
    ///
    /// Calling `initialize` on an initialized toolkit is a no-op.
    fn initialize(&mut self) -> ToolkitResult<()>;

    /// Check if `initialize` has been called
    fn is_initialized(&self) -> bool;

    /// Read a dataset from a file
    fn load_dataset(&mut self, path: &Path, kind: LayerKind) -> ToolkitResult<Box<dyn Dataset>>;

    /// Run a geoprocessing operation
    ///
    /// `parameters` are name/value pairs in the order given by the user.
    fn execute(
        &mut self,
        operation: &str,
        inputs: &[&dyn Dataset],
        parameters: &[(String, String)],
    ) -> ToolkitResult<Box<dyn Dataset>>;

    /// Write a dataset to a file in the named format
    fn write_dataset(&mut self, dataset: &dyn Dataset, path: &Path, format: &str)
        -> ToolkitResult<()>;

    /// Release toolkit resources
    fn shutdown(&mut self) -> ToolkitResult<()>;
}
