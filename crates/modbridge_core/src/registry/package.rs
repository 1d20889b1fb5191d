//! Module packages and the per-session registry provider.
//!
//! # Responsibility
//! - Group module factories into packages.
//! - Build one populated, initialized registry per bridge session.
//!
//! # Invariants
//! - Internal services of every package are registered before any exported
//!   module, so `on_create` can resolve them.
//! - Package ids are unique within one provider.

use crate::module::AnyModule;
use crate::queue::QueueSpec;
use crate::registry::module_registry::{ModuleRegistry, RegistryError};
use crate::value::BridgeValue;
use log::info;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Session data handed to module factories.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleContext {
    session_id: Uuid,
    data_dir: Option<PathBuf>,
    properties: BTreeMap<String, BridgeValue>,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            data_dir: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<BridgeValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn property(&self, key: &str) -> Option<&BridgeValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &BTreeMap<String, BridgeValue> {
        &self.properties
    }
}

impl Default for ModuleContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory set contributing modules to a session registry.
pub trait ModulePackage: Send + Sync {
    /// Stable package id used in logs and duplicate checks.
    fn package_id(&self) -> &str;

    /// Registers services that exported modules resolve by type.
    fn create_internal_modules(
        &self,
        _context: &ModuleContext,
        _registry: &ModuleRegistry,
    ) -> Result<(), RegistryError> {
        Ok(())
    }

    /// Builds the exported modules of this package for one session.
    fn create_exported_modules(
        &self,
        context: &ModuleContext,
    ) -> Result<Vec<Box<dyn AnyModule>>, RegistryError>;

    /// Named queues the package's modules bind to.
    fn queue_specs(&self) -> Vec<QueueSpec> {
        Vec::new()
    }
}

/// Builds session registries from an ordered package list.
///
/// With overrides enabled, a module from a later package replaces an
/// earlier module of the same name; otherwise the collision fails the build.
#[derive(Default)]
pub struct ModuleRegistryProvider {
    packages: Vec<Arc<dyn ModulePackage>>,
    allow_overrides: bool,
}

impl ModuleRegistryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(allow_overrides: bool) -> Self {
        Self {
            packages: Vec::new(),
            allow_overrides,
        }
    }

    /// Appends one package; later packages win name collisions when
    /// overrides are enabled.
    pub fn add_package(&mut self, package: Arc<dyn ModulePackage>) -> Result<(), RegistryError> {
        let package_id = package.package_id().trim().to_string();
        if package_id.is_empty() {
            return Err(RegistryError::InvalidPackageId(package_id));
        }
        if self
            .packages
            .iter()
            .any(|existing| existing.package_id().trim() == package_id)
        {
            return Err(RegistryError::DuplicatePackageId(package_id));
        }
        self.packages.push(package);
        Ok(())
    }

    pub fn package_ids(&self) -> Vec<String> {
        self.packages
            .iter()
            .map(|package| package.package_id().to_string())
            .collect()
    }

    /// Queues required by every package, first declaration per name wins.
    pub fn queue_specs(&self) -> Vec<QueueSpec> {
        let mut specs: Vec<QueueSpec> = Vec::new();
        for spec in self.packages.iter().flat_map(|package| package.queue_specs()) {
            if !specs.iter().any(|existing| existing.name == spec.name) {
                specs.push(spec);
            }
        }
        specs
    }

    /// Creates, populates and initializes a fresh registry for one session.
    pub fn create_registry(&self, context: &ModuleContext) -> Result<ModuleRegistry, RegistryError> {
        let registry = ModuleRegistry::with_overrides(self.allow_overrides);

        for package in &self.packages {
            package.create_internal_modules(context, &registry)?;
        }
        for package in &self.packages {
            for module in package.create_exported_modules(context)? {
                if self.allow_overrides {
                    registry.register_override(module)?;
                } else {
                    registry.register_exported(module)?;
                }
            }
        }

        registry.initialize();
        info!(
            "event=registry_create module=registry status=ok session={} packages={} modules={}",
            context.session_id(),
            self.packages.len(),
            registry.len()
        );
        Ok(registry)
    }
}
