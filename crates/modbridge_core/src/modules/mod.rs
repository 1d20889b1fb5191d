//! Built-in native modules and the package that provides them.
//!
//! # Responsibility
//! - Ship the default module set: haptics, system UI, key-value storage.
//! - Declare the queues those modules bind to.

pub mod haptics;
pub mod key_value_store;
pub mod system_ui;
pub mod window_state;

use crate::module::{AnyModule, ExportedModule, ModuleHost};
use crate::queue::QueueSpec;
use crate::registry::{ModuleContext, ModulePackage, ModuleRegistry, RegistryError};
use crate::value::BridgeValue;
use std::path::PathBuf;
use std::sync::Arc;

pub use haptics::Haptics;
pub use key_value_store::KeyValueStore;
pub use system_ui::SystemUi;
pub use window_state::{Appearance, BarStyle, Rgb, WindowSnapshot, WindowState};

/// Serial queue backing storage modules.
pub const STORAGE_QUEUE: &str = "modbridge.storage";
/// Context property toggling navigation bar divider support.
pub const DIVIDER_SUPPORTED_PROPERTY: &str = "navigationBarDividerSupported";

const BUILTIN_PACKAGE_ID: &str = "builtin";
const KEY_VALUE_FILE: &str = "key_value.sqlite3";

#[derive(Debug, Clone, Default)]
pub struct BuiltinPackage {
    storage_path: Option<PathBuf>,
}

impl BuiltinPackage {
    /// `storage_path` overrides the key-value database location; otherwise it
    /// lives in the session data dir, or in memory when there is none.
    pub fn new(storage_path: Option<PathBuf>) -> Self {
        Self { storage_path }
    }

    fn storage_path(&self, context: &ModuleContext) -> Option<PathBuf> {
        self.storage_path
            .clone()
            .or_else(|| context.data_dir().map(|dir| dir.join(KEY_VALUE_FILE)))
    }
}

impl ModulePackage for BuiltinPackage {
    fn package_id(&self) -> &str {
        BUILTIN_PACKAGE_ID
    }

    fn create_internal_modules(
        &self,
        context: &ModuleContext,
        registry: &ModuleRegistry,
    ) -> Result<(), RegistryError> {
        let divider_supported = context
            .property(DIVIDER_SUPPORTED_PROPERTY)
            .and_then(BridgeValue::as_bool)
            .unwrap_or(true);
        registry.register_internal(Arc::new(WindowState::new(divider_supported)));
        Ok(())
    }

    fn create_exported_modules(
        &self,
        context: &ModuleContext,
    ) -> Result<Vec<Box<dyn AnyModule>>, RegistryError> {
        Ok(vec![
            ModuleHost::boxed(Haptics::default())?,
            ModuleHost::boxed(SystemUi::default())?,
            ModuleHost::boxed(KeyValueStore::from_snapshot(self.storage_path(context))?)?,
        ])
    }

    fn queue_specs(&self) -> Vec<QueueSpec> {
        vec![QueueSpec::serial(STORAGE_QUEUE)]
    }
}

/// Shared handle to the built-in package with default storage placement.
pub fn builtin_package() -> Arc<dyn ModulePackage> {
    Arc::new(BuiltinPackage::default())
}
