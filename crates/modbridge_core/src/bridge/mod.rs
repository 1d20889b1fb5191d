//! Script boundary: JSON envelopes and the session host.

pub mod host;
pub mod message;

pub use host::{Bridge, BridgeError};
pub use message::{
    decode_call, decode_reply, encode_reply, BridgeCall, BridgeReply, CodecError, ReplyOutcome,
};
