//! Positional invocation arguments with typed accessors.

use crate::error::InvocationError;
use crate::value::BridgeValue;
use std::collections::BTreeMap;

/// Ordered argument list for one exported method call.
///
/// Accessors report mismatches as `InvocationError::InvalidArguments` naming
/// the method, the position and the expected/actual kinds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arguments {
    method: String,
    values: Vec<BridgeValue>,
}

impl Arguments {
    pub fn new(method: impl Into<String>, values: Vec<BridgeValue>) -> Self {
        Self {
            method: method.into(),
            values,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BridgeValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[BridgeValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<BridgeValue> {
        self.values
    }

    pub fn expect_len(&self, expected: usize) -> Result<(), InvocationError> {
        if self.values.len() == expected {
            return Ok(());
        }
        Err(self.invalid(format!(
            "expected {expected} argument(s), got {}",
            self.values.len()
        )))
    }

    pub fn expect_at_least(&self, minimum: usize) -> Result<(), InvocationError> {
        if self.values.len() >= minimum {
            return Ok(());
        }
        Err(self.invalid(format!(
            "expected at least {minimum} argument(s), got {}",
            self.values.len()
        )))
    }

    pub fn f64_at(&self, index: usize) -> Result<f64, InvocationError> {
        let value = self.required(index)?;
        value
            .as_f64()
            .filter(|number| number.is_finite())
            .ok_or_else(|| self.mismatch(index, "number", value))
    }

    pub fn i64_at(&self, index: usize) -> Result<i64, InvocationError> {
        let value = self.required(index)?;
        value
            .as_i64()
            .ok_or_else(|| self.mismatch(index, "integer", value))
    }

    pub fn bool_at(&self, index: usize) -> Result<bool, InvocationError> {
        let value = self.required(index)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(index, "bool", value))
    }

    pub fn str_at(&self, index: usize) -> Result<&str, InvocationError> {
        let value = self.required(index)?;
        value
            .as_str()
            .ok_or_else(|| self.mismatch(index, "string", value))
    }

    pub fn map_at(&self, index: usize) -> Result<&BTreeMap<String, BridgeValue>, InvocationError> {
        let value = self.required(index)?;
        value
            .as_map()
            .ok_or_else(|| self.mismatch(index, "map", value))
    }

    /// Missing and `null` arguments both read as `None`.
    pub fn optional_str_at(&self, index: usize) -> Result<Option<&str>, InvocationError> {
        match self.values.get(index) {
            None | Some(BridgeValue::Null) => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.mismatch(index, "string or null", value)),
        }
    }

    /// Builds an argument error attributed to this call's method.
    pub fn invalid(&self, reason: impl Into<String>) -> InvocationError {
        InvocationError::invalid_arguments(self.method.as_str(), reason)
    }

    fn required(&self, index: usize) -> Result<&BridgeValue, InvocationError> {
        self.values
            .get(index)
            .ok_or_else(|| self.invalid(format!("argument {index} is missing")))
    }

    fn mismatch(&self, index: usize, expected: &str, actual: &BridgeValue) -> InvocationError {
        self.invalid(format!(
            "argument {index}: expected {expected}, got {}",
            actual.type_name()
        ))
    }
}
