//! Exported method table: public method name to typed handler.
//!
//! # Responsibility
//! - Collect handler declarations from a module type.
//! - Validate the table once, when the module is wrapped for registration.
//!
//! # Invariants
//! - Method names and selectors are non-empty after trim.
//! - Method names are unique within one table.

use crate::arguments::Arguments;
use crate::error::InvocationError;
use crate::promise::Promise;
use crate::value::BridgeValue;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// Handler that produces its result before returning.
pub type SyncHandler<M> =
    dyn Fn(&M, &Arguments) -> Result<BridgeValue, InvocationError> + Send + Sync;

/// Handler that settles the promise itself, possibly later.
pub type PromiseHandler<M> = dyn Fn(Arc<M>, Arguments, Promise) + Send + Sync;

/// Accepted argument count for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: Option<usize>,
}

impl Arity {
    pub const fn exactly(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    pub const fn at_least(count: usize) -> Self {
        Self {
            min: count,
            max: None,
        }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn any() -> Self {
        Self::at_least(0)
    }

    pub fn accepts(self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "exactly {max}"),
            Some(max) => write!(f, "{}..={max}", self.min),
            None => write!(f, "at least {}", self.min),
        }
    }
}

pub(crate) enum Handler<M> {
    Sync(Arc<SyncHandler<M>>),
    Promise(Arc<PromiseHandler<M>>),
}

/// One validated table entry.
pub struct MethodDescriptor<M> {
    pub(crate) selector: String,
    pub(crate) arity: Arity,
    pub(crate) handler: Handler<M>,
}

impl<M> MethodDescriptor<M> {
    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }
}

impl<M> Debug for MethodDescriptor<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = match self.handler {
            Handler::Sync(_) => "sync",
            Handler::Promise(_) => "promise",
        };
        f.debug_struct("MethodDescriptor")
            .field("selector", &self.selector)
            .field("arity", &self.arity)
            .field("handler", &kind)
            .finish()
    }
}

/// Validated name-to-descriptor map owned by a module host.
pub type MethodMap<M> = BTreeMap<String, MethodDescriptor<M>>;

/// Builder for a module's exported methods.
pub struct MethodTable<M> {
    entries: Vec<(String, MethodDescriptor<M>)>,
}

impl<M> Default for MethodTable<M> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<M> MethodTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a method whose handler returns its result directly.
    pub fn sync<F>(mut self, name: &str, selector: &str, arity: Arity, handler: F) -> Self
    where
        F: Fn(&M, &Arguments) -> Result<BridgeValue, InvocationError> + Send + Sync + 'static,
    {
        self.entries.push((
            name.to_string(),
            MethodDescriptor {
                selector: selector.to_string(),
                arity,
                handler: Handler::Sync(Arc::new(handler)),
            },
        ));
        self
    }

    /// Declares a method whose handler owns the promise and settles it.
    pub fn with_promise<F>(mut self, name: &str, selector: &str, arity: Arity, handler: F) -> Self
    where
        F: Fn(Arc<M>, Arguments, Promise) + Send + Sync + 'static,
    {
        self.entries.push((
            name.to_string(),
            MethodDescriptor {
                selector: selector.to_string(),
                arity,
                handler: Handler::Promise(Arc::new(handler)),
            },
        ));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn build(self) -> Result<MethodMap<M>, MethodTableError> {
        let mut seen = BTreeSet::new();
        let mut methods = BTreeMap::new();
        for (name, descriptor) in self.entries {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(MethodTableError::EmptyMethodName);
            }
            if descriptor.selector.trim().is_empty() {
                return Err(MethodTableError::EmptySelector(name));
            }
            if !seen.insert(name.clone()) {
                return Err(MethodTableError::DuplicateMethod(name));
            }
            methods.insert(name, descriptor);
        }
        Ok(methods)
    }
}

impl<M> Debug for MethodTable<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Method table declaration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodTableError {
    #[error("method name must not be empty")]
    EmptyMethodName,
    #[error("method `{0}` has an empty selector")]
    EmptySelector(String),
    #[error("method `{0}` is declared more than once")]
    DuplicateMethod(String),
}
