//! Native module bridge core.
//! Exported modules, their registry, queues and the script-facing dispatcher.

pub mod arguments;
pub mod bridge;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod module;
pub mod modules;
pub mod promise;
pub mod queue;
pub mod registry;
pub mod value;

pub use arguments::Arguments;
pub use bridge::{Bridge, BridgeCall, BridgeError, BridgeReply, CodecError, ReplyOutcome};
pub use config::{BridgeConfig, ConfigError};
pub use dispatcher::{Dispatcher, Invocation};
pub use error::{ErrorDescriptor, InvocationError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use module::{AnyModule, Arity, ExportedModule, MethodQueue, MethodTable, ModuleHost};
pub use modules::{builtin_package, BuiltinPackage};
pub use promise::{Outcome, Promise, PromiseHandle, PromiseSettler};
pub use queue::{QueueKind, QueueSet, QueueSpec};
pub use registry::{
    ModuleContext, ModulePackage, ModuleRegistry, ModuleRegistryProvider, RegistryError,
};
pub use value::{BridgeValue, ConstantsMap};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
