//! Type-erased module host used by the registry and the dispatcher.
//!
//! # Responsibility
//! - Own one module instance plus its validated method map.
//! - Route invocation requests to typed handlers and convert every failure,
//!   including panics, into a rejection.
//!
//! # Invariants
//! - `call_exported_method` never returns an error and never unwinds.
//! - A failed invocation leaves the module usable for later calls.

use crate::arguments::Arguments;
use crate::error::InvocationError;
use crate::logging::describe_panic;
use crate::module::contract::{ExportedModule, MethodQueue};
use crate::module::method_table::{Handler, MethodMap};
use crate::promise::Promise;
use crate::registry::{ModuleRegistry, RegistryError};
use crate::value::{BridgeValue, ConstantsMap};
use log::{debug, error};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Object-safe view of an exported module.
pub trait AnyModule: Send + Sync {
    fn name(&self) -> &'static str;

    fn constants(&self) -> ConstantsMap;

    /// Public method name to internal selector.
    fn exported_methods(&self) -> BTreeMap<String, String>;

    fn has_method(&self, method: &str) -> bool;

    /// Runs one method and settles `promise` exactly once.
    fn call_exported_method(&self, method: &str, arguments: Vec<BridgeValue>, promise: Promise);

    fn method_queue(&self) -> MethodQueue;

    /// Independent instance built from this instance's configuration snapshot.
    fn duplicate(&self) -> Result<Box<dyn AnyModule>, RegistryError>;

    fn on_create(&self, registry: &ModuleRegistry);

    fn on_destroy(&self);
}

/// Host wrapper pairing a module with its validated method map.
pub struct ModuleHost<M: ExportedModule> {
    module: Arc<M>,
    methods: Arc<MethodMap<M>>,
}

impl<M: ExportedModule> ModuleHost<M> {
    /// Wraps `module`, validating its method table.
    pub fn new(module: M) -> Result<Self, RegistryError> {
        let methods = M::methods()
            .build()
            .map_err(|source| RegistryError::InvalidMethodTable {
                module: M::NAME.to_string(),
                source,
            })?;
        Ok(Self {
            module: Arc::new(module),
            methods: Arc::new(methods),
        })
    }

    pub fn boxed(module: M) -> Result<Box<dyn AnyModule>, RegistryError> {
        Ok(Box::new(Self::new(module)?))
    }

    pub fn module(&self) -> &Arc<M> {
        &self.module
    }
}

impl<M: ExportedModule> AnyModule for ModuleHost<M> {
    fn name(&self) -> &'static str {
        M::NAME
    }

    fn constants(&self) -> ConstantsMap {
        self.module.constants()
    }

    fn exported_methods(&self) -> BTreeMap<String, String> {
        self.methods
            .iter()
            .map(|(name, descriptor)| (name.clone(), descriptor.selector().to_string()))
            .collect()
    }

    fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    fn call_exported_method(&self, method: &str, arguments: Vec<BridgeValue>, promise: Promise) {
        let Some(descriptor) = self.methods.get(method) else {
            promise.reject(InvocationError::UnknownMethod {
                module: M::NAME.to_string(),
                method: method.to_string(),
            });
            return;
        };

        if !descriptor.arity.accepts(arguments.len()) {
            promise.reject(InvocationError::invalid_arguments(
                method,
                format!(
                    "expected {} argument(s), got {}",
                    descriptor.arity,
                    arguments.len()
                ),
            ));
            return;
        }

        let arguments = Arguments::new(method, arguments);
        match &descriptor.handler {
            Handler::Sync(handler) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    handler(self.module.as_ref(), &arguments)
                }));
                match outcome {
                    Ok(result) => {
                        if let Err(err) = &result {
                            debug!(
                                "event=module_call module={} method={} status=error error_code={}",
                                M::NAME,
                                method,
                                err.code()
                            );
                        }
                        promise.settle(result);
                    }
                    Err(payload) => {
                        let message =
                            format!("`{method}` panicked: {}", describe_panic(&*payload));
                        error!(
                            "event=module_call module={} method={} status=error error_code=panic",
                            M::NAME,
                            method
                        );
                        promise.reject(InvocationError::ExecutionFault { message });
                    }
                }
            }
            Handler::Promise(handler) => {
                let settler = promise.settler();
                let module = Arc::clone(&self.module);
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| handler(module, arguments, promise)));
                if let Err(payload) = outcome {
                    let message = format!("`{method}` panicked: {}", describe_panic(&*payload));
                    error!(
                        "event=module_call module={} method={} status=error error_code=panic",
                        M::NAME,
                        method
                    );
                    // No-op when the unwind already rejected the promise on drop.
                    settler.reject(InvocationError::ExecutionFault { message });
                }
            }
        }
    }

    fn method_queue(&self) -> MethodQueue {
        self.module.method_queue()
    }

    fn duplicate(&self) -> Result<Box<dyn AnyModule>, RegistryError> {
        let copy = M::from_snapshot(self.module.snapshot())?;
        Ok(Box::new(Self {
            module: Arc::new(copy),
            methods: Arc::clone(&self.methods),
        }))
    }

    fn on_create(&self, registry: &ModuleRegistry) {
        self.module.on_create(registry);
    }

    fn on_destroy(&self) {
        self.module.on_destroy();
    }
}

impl<M: ExportedModule> Debug for ModuleHost<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("name", &M::NAME)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
