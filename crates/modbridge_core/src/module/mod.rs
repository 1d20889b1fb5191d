//! Exported module contract and its type-erased host.

pub mod contract;
pub mod host;
pub mod method_table;

pub use contract::{ExportedModule, MethodQueue, DEFAULT_QUEUE_LABEL, MAIN_QUEUE_LABEL};
pub use host::{AnyModule, ModuleHost};
pub use method_table::{Arity, MethodDescriptor, MethodTable, MethodTableError};
