//! Command implementations
//!
//! This module contains all built-in command implementations organized by category.

pub mod condition;
pub mod control;
pub mod general;
pub mod layers;
pub mod properties;

use crate::command::CommandRegistry;

/// Register all built-in commands with the registry
pub fn register_all(registry: &mut CommandRegistry) {
    // Message, Exit
    general::register(registry);

    // SetProperty, SetWorkingDir, WritePropertiesToFile
    properties::register(registry);

    // If/Else/EndIf, For/EndFor, Break, Continue
    control::register(registry);

    // Layer commands delegating to the GIS toolkit
    layers::register(registry);
}
