//! Invocation error taxonomy and the boundary error descriptor.
//!
//! # Invariants
//! - Every invocation failure maps to exactly one stable `code()`.
//! - Only `ErrorDescriptor` crosses the script boundary.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Module name is not present in the registry.
pub const E_UNKNOWN_MODULE: &str = "E_UNKNOWN_MODULE";
/// Method name is not present in the module method table.
pub const E_UNKNOWN_METHOD: &str = "E_UNKNOWN_METHOD";
/// Argument count or type mismatch.
pub const E_INVALID_ARGUMENTS: &str = "E_INVALID_ARGUMENTS";
/// Internal fault raised while running the method body.
pub const E_EXECUTION_FAULT: &str = "E_EXECUTION_FAULT";
/// Declared queue is missing or closed.
pub const E_QUEUE_UNAVAILABLE: &str = "E_QUEUE_UNAVAILABLE";
/// Promise went away without being settled.
pub const E_PROMISE_DROPPED: &str = "E_PROMISE_DROPPED";

/// Error shape delivered to the rejection continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub code: String,
    pub message: String,
}

impl ErrorDescriptor {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl Display for ErrorDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Failure of one invocation request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("module is not registered: {module}")]
    UnknownModule { module: String },
    #[error("method `{method}` is not exported by module `{module}`")]
    UnknownMethod { module: String, method: String },
    #[error("invalid arguments for `{method}`: {reason}")]
    InvalidArguments { method: String, reason: String },
    #[error("execution fault: {message}")]
    ExecutionFault { message: String },
    #[error("queue `{queue}` is unavailable")]
    QueueUnavailable { queue: String },
    #[error("promise was dropped before it was settled")]
    PromiseDropped,
    /// Module-defined rejection, e.g. `invalid-value` or `unavailable`.
    #[error("{message}")]
    Rejected { code: String, message: String },
}

impl InvocationError {
    pub fn invalid_arguments(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.into(),
            reason: reason.into(),
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Stable error code reported to script code.
    pub fn code(&self) -> &str {
        match self {
            Self::UnknownModule { .. } => E_UNKNOWN_MODULE,
            Self::UnknownMethod { .. } => E_UNKNOWN_METHOD,
            Self::InvalidArguments { .. } => E_INVALID_ARGUMENTS,
            Self::ExecutionFault { .. } => E_EXECUTION_FAULT,
            Self::QueueUnavailable { .. } => E_QUEUE_UNAVAILABLE,
            Self::PromiseDropped => E_PROMISE_DROPPED,
            Self::Rejected { code, .. } => code.as_str(),
        }
    }

    pub fn to_descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor::new(self.code(), self.to_string())
    }
}

impl From<InvocationError> for ErrorDescriptor {
    fn from(value: InvocationError) -> Self {
        value.to_descriptor()
    }
}

impl From<&InvocationError> for ErrorDescriptor {
    fn from(value: &InvocationError) -> Self {
        value.to_descriptor()
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorDescriptor, InvocationError, E_INVALID_ARGUMENTS, E_UNKNOWN_METHOD};

    #[test]
    fn maps_variants_to_stable_codes() {
        let unknown = InvocationError::UnknownMethod {
            module: "Haptics".to_string(),
            method: "buzz".to_string(),
        };
        assert_eq!(unknown.code(), E_UNKNOWN_METHOD);

        let invalid = InvocationError::invalid_arguments("vibrate", "argument 0 is missing");
        assert_eq!(invalid.code(), E_INVALID_ARGUMENTS);
    }

    #[test]
    fn module_defined_rejection_keeps_its_code() {
        let err = InvocationError::rejected("invalid-value", "bad style");
        let descriptor = ErrorDescriptor::from(err);
        assert_eq!(descriptor.code, "invalid-value");
        assert_eq!(descriptor.message, "bad style");
    }

    #[test]
    fn descriptor_message_names_method_and_module() {
        let descriptor = InvocationError::UnknownMethod {
            module: "Haptics".to_string(),
            method: "buzz".to_string(),
        }
        .to_descriptor();
        assert!(descriptor.message.contains("buzz"));
        assert!(descriptor.message.contains("Haptics"));
        assert_eq!(descriptor.to_string(), format!("E_UNKNOWN_METHOD: {}", descriptor.message));
    }
}
