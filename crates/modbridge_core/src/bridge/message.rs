//! JSON call/reply envelopes exchanged with script code.
//!
//! Wire shape:
//! - call: `{"callId":"1","module":"Haptics","method":"vibrate","arguments":[1]}`
//! - reply: `{"callId":"1","status":"resolved","value":null}` or
//!   `{"callId":"1","status":"rejected","error":{"code":"..","message":".."}}`

use crate::error::ErrorDescriptor;
use crate::promise::Outcome;
use crate::value::BridgeValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeCall {
    pub call_id: String,
    pub module: String,
    pub method: String,
    #[serde(default)]
    pub arguments: Vec<BridgeValue>,
}

impl BridgeCall {
    pub fn new(
        call_id: impl Into<String>,
        module: impl Into<String>,
        method: impl Into<String>,
        arguments: Vec<BridgeValue>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            module: module.into(),
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeReply {
    pub call_id: String,
    #[serde(flatten)]
    pub outcome: ReplyOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReplyOutcome {
    Resolved { value: BridgeValue },
    Rejected { error: ErrorDescriptor },
}

impl From<Outcome> for ReplyOutcome {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Ok(value) => Self::Resolved { value },
            Err(error) => Self::Rejected { error },
        }
    }
}

impl From<ReplyOutcome> for Outcome {
    fn from(outcome: ReplyOutcome) -> Self {
        match outcome {
            ReplyOutcome::Resolved { value } => Ok(value),
            ReplyOutcome::Rejected { error } => Err(error),
        }
    }
}

impl BridgeReply {
    pub fn new(call_id: impl Into<String>, outcome: impl Into<ReplyOutcome>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: outcome.into(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, ReplyOutcome::Resolved { .. })
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed bridge message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bridge message field `{0}` must not be empty")]
    EmptyField(&'static str),
}

/// Parses one call envelope; `callId`, `module` and `method` must be non-blank.
pub fn decode_call(raw: &str) -> Result<BridgeCall, CodecError> {
    let call: BridgeCall = serde_json::from_str(raw)?;
    for (field, value) in [
        ("callId", &call.call_id),
        ("module", &call.module),
        ("method", &call.method),
    ] {
        if value.trim().is_empty() {
            return Err(CodecError::EmptyField(field));
        }
    }
    Ok(call)
}

pub fn encode_reply(reply: &BridgeReply) -> Result<String, CodecError> {
    Ok(serde_json::to_string(reply)?)
}

pub fn decode_reply(raw: &str) -> Result<BridgeReply, CodecError> {
    Ok(serde_json::from_str(raw)?)
}
