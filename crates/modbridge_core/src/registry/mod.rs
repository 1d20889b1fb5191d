//! Module registry, packages and session provider.

pub mod module_registry;
pub mod package;

pub use module_registry::{ModuleRegistry, RegistryError};
pub use package::{ModuleContext, ModulePackage, ModuleRegistryProvider};
