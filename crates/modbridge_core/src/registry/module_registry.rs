//! In-process module registry for one bridge session.

use crate::module::{AnyModule, ExportedModule, MethodTableError, ModuleHost};
use crate::value::ConstantsMap;
use log::{info, warn};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

type InternalService = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    modules: BTreeMap<String, Arc<dyn AnyModule>>,
    order: Vec<String>,
}

/// Exported modules indexed by name plus internal services indexed by type.
///
/// Lifecycle hooks always run without any registry lock held, so `on_create`
/// may look up other modules and services.
#[derive(Default)]
pub struct ModuleRegistry {
    state: RwLock<RegistryState>,
    internals: RwLock<HashMap<TypeId, InternalService>>,
    allow_overrides: bool,
    initialized: AtomicBool,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that accepts [`ModuleRegistry::register_override`].
    pub fn with_overrides(allow_overrides: bool) -> Self {
        Self {
            allow_overrides,
            ..Self::default()
        }
    }

    /// Wraps and registers one exported module.
    pub fn register<M: ExportedModule>(&self, module: M) -> Result<(), RegistryError> {
        self.register_exported(ModuleHost::boxed(module)?)
    }

    /// Registers one exported module; the name must not be taken.
    pub fn register_exported(&self, module: Box<dyn AnyModule>) -> Result<(), RegistryError> {
        let name = validate_module_name(module.name())?;
        let module: Arc<dyn AnyModule> = Arc::from(module);
        {
            let mut state = self.state.write();
            if state.modules.contains_key(name.as_str()) {
                return Err(RegistryError::DuplicateModuleName(name));
            }
            state.order.push(name.clone());
            state.modules.insert(name.clone(), Arc::clone(&module));
        }

        info!("event=module_register module=registry status=ok name={name}");
        if self.is_initialized() {
            module.on_create(self);
        }
        Ok(())
    }

    /// Registers one exported module, replacing a module of the same name.
    ///
    /// Returns `true` when an existing module was replaced. The replaced module
    /// receives `on_destroy` if the registry is already initialized.
    pub fn register_override(&self, module: Box<dyn AnyModule>) -> Result<bool, RegistryError> {
        let name = validate_module_name(module.name())?;
        if !self.allow_overrides {
            return Err(RegistryError::OverrideNotAllowed(name));
        }
        let module: Arc<dyn AnyModule> = Arc::from(module);
        let replaced = {
            let mut state = self.state.write();
            let replaced = state.modules.insert(name.clone(), Arc::clone(&module));
            if replaced.is_none() {
                state.order.push(name.clone());
            }
            replaced
        };

        if replaced.is_some() {
            warn!("event=module_register module=registry status=override name={name}");
        } else {
            info!("event=module_register module=registry status=ok name={name}");
        }
        if self.is_initialized() {
            if let Some(previous) = &replaced {
                previous.on_destroy();
            }
            module.on_create(self);
        }
        Ok(replaced.is_some())
    }

    /// Registers an internal service, replacing any service of the same type.
    pub fn register_internal<T: Any + Send + Sync>(&self, service: Arc<T>) -> bool {
        self.internals
            .write()
            .insert(TypeId::of::<T>(), service)
            .is_some()
    }

    /// Looks up an internal service by type.
    pub fn internal<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let service = self.internals.read().get(&TypeId::of::<T>()).cloned()?;
        service.downcast::<T>().ok()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AnyModule>> {
        self.state.read().modules.get(name.trim()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state.read().modules.contains_key(name.trim())
    }

    /// Returns sorted module names.
    pub fn module_names(&self) -> Vec<String> {
        self.state.read().modules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().modules.is_empty()
    }

    /// Constants of every module, keyed by module name.
    pub fn exported_constants(&self) -> BTreeMap<String, ConstantsMap> {
        self.snapshot_modules()
            .into_iter()
            .map(|module| (module.name().to_string(), module.constants()))
            .collect()
    }

    /// Method tables of every module, keyed by module name.
    pub fn exported_methods(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.snapshot_modules()
            .into_iter()
            .map(|module| (module.name().to_string(), module.exported_methods()))
            .collect()
    }

    /// Runs `on_create` for every module in registration order, once.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        let modules = self.snapshot_modules();
        for module in &modules {
            module.on_create(self);
        }
        info!(
            "event=registry_init module=registry status=ok modules={}",
            modules.len()
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Removes every module and service, running `on_destroy` in reverse
    /// registration order.
    pub fn teardown(&self) {
        let drained = {
            let mut state = self.state.write();
            let order = std::mem::take(&mut state.order);
            let mut modules = std::mem::take(&mut state.modules);
            order
                .into_iter()
                .filter_map(|name| modules.remove(&name))
                .collect::<Vec<_>>()
        };
        self.internals.write().clear();

        let was_initialized = self.initialized.swap(false, Ordering::SeqCst);
        if was_initialized {
            for module in drained.iter().rev() {
                module.on_destroy();
            }
        }
        info!(
            "event=registry_teardown module=registry status=ok modules={}",
            drained.len()
        );
    }

    /// Builds an uninitialized registry holding duplicates of every module and
    /// sharing this registry's internal services.
    pub fn fork(&self) -> Result<ModuleRegistry, RegistryError> {
        let forked = ModuleRegistry::with_overrides(self.allow_overrides);
        for module in self.snapshot_modules() {
            forked.register_exported(module.duplicate()?)?;
        }
        forked
            .internals
            .write()
            .extend(self.internals.read().iter().map(|(id, service)| (*id, Arc::clone(service))));
        Ok(forked)
    }

    fn snapshot_modules(&self) -> Vec<Arc<dyn AnyModule>> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|name| state.modules.get(name).cloned())
            .collect()
    }
}

impl Debug for ModuleRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_names())
            .field("internals", &self.internals.read().len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Module registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("module name is invalid: `{0}`")]
    InvalidModuleName(String),
    #[error("module name already registered: {0}")]
    DuplicateModuleName(String),
    #[error("registry does not accept overrides (module `{0}`)")]
    OverrideNotAllowed(String),
    #[error("module `{module}` declares an invalid method table: {source}")]
    InvalidMethodTable {
        module: String,
        #[source]
        source: MethodTableError,
    },
    #[error("module `{module}` could not be created: {reason}")]
    ModuleCreation { module: String, reason: String },
    #[error("package id is invalid: `{0}`")]
    InvalidPackageId(String),
    #[error("package id already added: {0}")]
    DuplicatePackageId(String),
}

fn validate_module_name(raw: &str) -> Result<String, RegistryError> {
    let name = raw.trim();
    if is_valid_module_name(name) {
        Ok(name.to_string())
    } else {
        Err(RegistryError::InvalidModuleName(raw.to_string()))
    }
}

fn is_valid_module_name(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
