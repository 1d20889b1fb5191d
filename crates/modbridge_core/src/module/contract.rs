//! Exported module contract.
//!
//! # Responsibility
//! - Define what a native module must declare to be callable from script code.
//!
//! # Invariants
//! - `NAME` is stable and non-empty for the lifetime of the process.
//! - `methods()` describes every method `call_exported_method` can run.
//! - `from_snapshot(snapshot())` yields an independent instance with the same
//!   identity and configuration.

use crate::module::method_table::MethodTable;
use crate::registry::{ModuleRegistry, RegistryError};
use crate::value::ConstantsMap;
use std::fmt::{Display, Formatter};

/// Execution context an exported module requires for its invocations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MethodQueue {
    /// Host main/UI context, pumped by the embedding application.
    Main,
    /// Shared concurrent pool.
    #[default]
    Default,
    /// A queue registered in the dispatcher's queue set under this label.
    Named(String),
}

impl MethodQueue {
    pub fn named(label: impl Into<String>) -> Self {
        Self::Named(label.into())
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Main => MAIN_QUEUE_LABEL,
            Self::Default => DEFAULT_QUEUE_LABEL,
            Self::Named(label) => label.as_str(),
        }
    }
}

impl Display for MethodQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Reserved label of the main queue.
pub const MAIN_QUEUE_LABEL: &str = "main";
/// Reserved label of the shared default queue.
pub const DEFAULT_QUEUE_LABEL: &str = "default";

/// Capability surface of one native module.
///
/// Implementors keep mutable state behind interior mutability: invocations
/// receive `&self` and may run on a worker of the declared queue.
pub trait ExportedModule: Send + Sync + Sized + 'static {
    /// Registry lookup key.
    const NAME: &'static str;

    /// Configuration snapshot used to build an independent copy.
    type Config: Clone + Send + Sync + 'static;

    /// Typed handlers for every exported method.
    fn methods() -> MethodTable<Self>;

    fn snapshot(&self) -> Self::Config;

    fn from_snapshot(config: Self::Config) -> Result<Self, RegistryError>;

    fn constants(&self) -> ConstantsMap {
        ConstantsMap::new()
    }

    fn method_queue(&self) -> MethodQueue {
        MethodQueue::Default
    }

    /// Runs once the session registry is fully populated.
    fn on_create(&self, _registry: &ModuleRegistry) {}

    /// Runs at registry teardown.
    fn on_destroy(&self) {}
}
