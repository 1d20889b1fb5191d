//! Flutter-facing FFI surface of the module bridge.

pub mod api;
