//! SQLite-backed string key-value store.
//!
//! # Invariants
//! - Bound to the serial storage queue, so statements never interleave.
//! - Keys are non-blank; values are strings.
//! - A duplicate opens its own connection to the same database path.

use crate::arguments::Arguments;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::error::InvocationError;
use crate::module::{Arity, ExportedModule, MethodQueue, MethodTable};
use crate::modules::STORAGE_QUEUE;
use crate::registry::RegistryError;
use crate::value::{BridgeValue, ConstantsMap};
use log::{error, info};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Rejection code for storage failures.
pub const STORAGE_FAILURE: &str = "storage-failure";

pub struct KeyValueStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl KeyValueStore {
    /// Opens the store at `path`, or an in-memory store when `None`.
    pub fn open(path: Option<PathBuf>) -> Result<Self, DbError> {
        let conn = match &path {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM kv_items WHERE key = ?1;",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.conn.lock().execute(
            "INSERT INTO kv_items (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;",
            params![key, value, now_ms()],
        )?;
        Ok(())
    }

    /// Returns `true` when a row was removed.
    pub fn remove_item(&self, key: &str) -> Result<bool, DbError> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM kv_items WHERE key = ?1;", params![key])?;
        Ok(removed > 0)
    }

    /// Returns keys in ascending order.
    pub fn all_keys(&self) -> Result<Vec<String>, DbError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM kv_items ORDER BY key ASC;")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Removes every entry; returns how many were removed.
    pub fn clear(&self) -> Result<usize, DbError> {
        Ok(self.conn.lock().execute("DELETE FROM kv_items;", [])?)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

fn key_at(args: &Arguments, index: usize) -> Result<&str, InvocationError> {
    let key = args.str_at(index)?;
    if key.trim().is_empty() {
        return Err(args.invalid(format!("argument {index}: key must not be blank")));
    }
    Ok(key)
}

fn storage_failure(method: &str, err: DbError) -> InvocationError {
    error!(
        "event=module_call module=key_value_store status=error method={} error_code={} error={}",
        method, STORAGE_FAILURE, err
    );
    InvocationError::rejected(STORAGE_FAILURE, err.to_string())
}

impl ExportedModule for KeyValueStore {
    const NAME: &'static str = "KeyValueStore";
    type Config = Option<PathBuf>;

    fn methods() -> MethodTable<Self> {
        MethodTable::<Self>::new()
            .sync("getItem", "getItem:", Arity::exactly(1), |store, args| {
                let key = key_at(args, 0)?;
                let value = store
                    .get_item(key)
                    .map_err(|err| storage_failure(args.method(), err))?;
                Ok(BridgeValue::from(value))
            })
            .sync("setItem", "setItem:value:", Arity::exactly(2), |store, args| {
                let key = key_at(args, 0)?;
                let value = args.str_at(1)?;
                store
                    .set_item(key, value)
                    .map_err(|err| storage_failure(args.method(), err))?;
                Ok(BridgeValue::Null)
            })
            .sync("removeItem", "removeItem:", Arity::exactly(1), |store, args| {
                let key = key_at(args, 0)?;
                let removed = store
                    .remove_item(key)
                    .map_err(|err| storage_failure(args.method(), err))?;
                Ok(BridgeValue::Bool(removed))
            })
            .sync("getAllKeys", "getAllKeys", Arity::exactly(0), |store, args| {
                let keys = store
                    .all_keys()
                    .map_err(|err| storage_failure(args.method(), err))?;
                Ok(BridgeValue::Array(keys.into_iter().map(BridgeValue::from).collect()))
            })
            .sync("clear", "clear", Arity::exactly(0), |store, args| {
                let removed = store
                    .clear()
                    .map_err(|err| storage_failure(args.method(), err))?;
                info!("event=kv_clear module=key_value_store status=ok removed={removed}");
                Ok(BridgeValue::Null)
            })
    }

    fn snapshot(&self) -> Self::Config {
        self.path.clone()
    }

    fn from_snapshot(path: Self::Config) -> Result<Self, RegistryError> {
        if let Some(parent) = path.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent).map_err(|err| RegistryError::ModuleCreation {
                module: Self::NAME.to_string(),
                reason: format!("failed to create `{}`: {err}", parent.display()),
            })?;
        }
        Self::open(path).map_err(|err| RegistryError::ModuleCreation {
            module: Self::NAME.to_string(),
            reason: err.to_string(),
        })
    }

    fn constants(&self) -> ConstantsMap {
        let mut constants = ConstantsMap::new();
        constants.insert("backend".to_string(), BridgeValue::from("sqlite"));
        constants.insert("persistent".to_string(), BridgeValue::Bool(self.path.is_some()));
        constants
    }

    fn method_queue(&self) -> MethodQueue {
        MethodQueue::named(STORAGE_QUEUE)
    }
}
