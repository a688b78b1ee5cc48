//! GeoProc Property Store
//!
//! Named, typed run-time values shared by every command of a workflow.
//!
//! # Overview
//!
//! - A fixed set of system properties (`WorkingDir`, `UserName`, ...) is
//!   defined when a session starts. Most are protected: user commands cannot
//!   overwrite them.
//! - User commands add and overwrite any other property.
//! - `${Name}` references in command parameters are expanded against the
//!   store at run time, in a single non-recursive pass.
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use geoproc_props::{PropertyStore, PropertyValue, names};
//!
//! let mut props = PropertyStore::with_system_properties(Path::new("/data"));
//! props.set("Region", "north").unwrap();
//! assert!(props.set(names::WORKING_DIR, "/tmp").is_err());
//!
//! let expanded = props.expand("${WorkingDir}/${Region}.geojson");
//! assert_eq!(expanded.text, "/data/north.geojson");
//! ```

mod error;
mod expand;
mod store;
mod system;
mod value;

pub use error::{PropertyError, PropertyResult};
pub use expand::{expand, has_reference, references, Expansion};
pub use store::{validate_name, PropertyStore};
pub use system::names;
pub use value::{parse_bool, split_list, ObjectRef, PropertyType, PropertyValue};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{names, PropertyError, PropertyStore, PropertyType, PropertyValue};
}
