//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the bridge session lifecycle to Dart via FRB.
//! - Carry call envelopes in and reply envelopes out as JSON strings.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - At most one bridge session is active per process.
//! - Replies are queued in settle order and drained by `bridge_poll_replies`.

use log::{info, warn};
use modbridge_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Bridge, BridgeConfig, ModuleContext,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;

struct Session {
    bridge: Bridge,
    replies: Arc<Mutex<Vec<String>>>,
}

static SESSION: Lazy<Mutex<Option<Session>>> = Lazy::new(|| Mutex::new(None));

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Starts the bridge session with the built-in module package.
///
/// Input semantics:
/// - `config_toml`: bridge config document; empty means defaults.
/// - `data_dir`: directory for persistent module data; empty means in-memory.
///
/// # FFI contract
/// - Sync call; builds the worker runtime and opens module storage.
/// - Fails when a session is already running.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn bridge_start(config_toml: String, data_dir: String) -> String {
    match start_session(config_toml.as_str(), data_dir.trim()) {
        Ok(()) => String::new(),
        Err(message) => message,
    }
}

/// Module names, constants and method tables of the active session as JSON.
///
/// Shape: `{"<module>": {"constants": {..}, "methods": {"<name>": "<selector>"}}}`.
/// Returns `{}` when no session is running.
#[flutter_rust_bridge::frb(sync)]
pub fn bridge_modules_json() -> String {
    let session = SESSION.lock();
    let Some(session) = session.as_ref() else {
        return "{}".to_string();
    };

    let registry = session.bridge.registry();
    let mut methods = registry.exported_methods();
    let modules = registry
        .exported_constants()
        .into_iter()
        .map(|(name, constants)| {
            let constants = constants
                .into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect::<Map<_, _>>();
            let entry = json!({
                "constants": constants,
                "methods": methods.remove(&name).unwrap_or_default(),
            });
            (name, entry)
        })
        .collect::<Map<_, _>>();
    Value::Object(modules).to_string()
}

/// Submits one call envelope.
///
/// # FFI contract
/// - Sync call, non-blocking; the reply is queued for `bridge_poll_replies`.
/// - Returns empty string when accepted and error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn bridge_submit(payload: String) -> String {
    let session = SESSION.lock();
    let Some(session) = session.as_ref() else {
        return "bridge_submit failed: bridge is not running".to_string();
    };

    let replies = Arc::clone(&session.replies);
    match session
        .bridge
        .submit_json(payload.as_str(), move |reply| replies.lock().push(reply))
    {
        Ok(_) => String::new(),
        Err(err) => {
            warn!("event=ffi_submit module=ffi status=error error={err}");
            format!("bridge_submit failed: {err}")
        }
    }
}

/// Drains reply envelopes settled since the previous poll.
#[flutter_rust_bridge::frb(sync)]
pub fn bridge_poll_replies() -> Vec<String> {
    let session = SESSION.lock();
    session
        .as_ref()
        .map(|session| std::mem::take(&mut *session.replies.lock()))
        .unwrap_or_default()
}

/// Runs queued main-queue work on the calling (UI) thread.
///
/// Returns the number of jobs that ran.
#[flutter_rust_bridge::frb(sync)]
pub fn bridge_pump_main() -> u32 {
    let main = {
        let session = SESSION.lock();
        session
            .as_ref()
            .map(|session| Arc::clone(session.bridge.dispatcher().queues().main()))
    };
    // Session lock is released before jobs run.
    main.map_or(0, |main| main.run_pending() as u32)
}

/// Stops the active session; returns `false` when none was running.
#[flutter_rust_bridge::frb(sync)]
pub fn bridge_shutdown() -> bool {
    let session = SESSION.lock().take();
    match session {
        Some(session) => {
            info!(
                "event=ffi_session_stop module=ffi status=ok session={}",
                session.bridge.session_id()
            );
            session.bridge.shutdown();
            true
        }
        None => false,
    }
}

fn start_session(config_toml: &str, data_dir: &str) -> Result<(), String> {
    let mut session = SESSION.lock();
    if session.is_some() {
        return Err("bridge_start failed: bridge is already running".to_string());
    }

    let config = BridgeConfig::from_toml_str(config_toml)
        .map_err(|err| format!("bridge_start failed: {err}"))?;
    if let Some(log_dir) = &config.logging.dir {
        init_logging_inner(config.logging.level.as_str(), &log_dir.to_string_lossy())
            .map_err(|err| format!("bridge_start failed: {err}"))?;
    }

    let mut context = ModuleContext::new();
    if !data_dir.is_empty() {
        context = context.with_data_dir(data_dir);
    }
    let bridge =
        Bridge::start_builtin(&config, context).map_err(|err| format!("bridge_start failed: {err}"))?;

    info!(
        "event=ffi_session_start module=ffi status=ok session={} modules={}",
        bridge.session_id(),
        bridge.registry().len()
    );
    *session = Some(Session {
        bridge,
        replies: Arc::new(Mutex::new(Vec::new())),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        bridge_modules_json, bridge_poll_replies, bridge_pump_main, bridge_shutdown, bridge_start,
        bridge_submit, core_version, init_logging, ping,
    };
    use serde_json::Value;
    use std::time::{Duration, Instant};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    // One test drives the whole process-wide session so parallel tests cannot
    // interleave start/shutdown.
    #[test]
    fn session_lifecycle_round_trip() {
        assert!(!bridge_shutdown());
        assert_eq!(bridge_modules_json(), "{}");
        assert!(!bridge_submit("{}".to_string()).is_empty());

        let bad_config = bridge_start("[registry]\nunknown = 1".to_string(), String::new());
        assert!(bad_config.contains("bridge_start failed"));

        let dir = tempfile::tempdir().expect("temp dir");
        let started = bridge_start(String::new(), dir.path().display().to_string());
        assert!(started.is_empty(), "{started}");
        assert!(!bridge_start(String::new(), String::new()).is_empty());

        let modules: Value = serde_json::from_str(&bridge_modules_json()).expect("modules json");
        assert_eq!(modules["Haptics"]["methods"]["vibrate"], "vibrateImpl");
        assert_eq!(modules["KeyValueStore"]["constants"]["persistent"], true);

        let accepted = bridge_submit(
            r#"{"callId":"h1","module":"Haptics","method":"vibrate","arguments":[10]}"#.to_string(),
        );
        assert!(accepted.is_empty(), "{accepted}");
        let accepted = bridge_submit(
            r#"{"callId":"ui1","module":"ExpoSystemUI","method":"getAppearance"}"#.to_string(),
        );
        assert!(accepted.is_empty(), "{accepted}");
        assert!(bridge_submit("{broken".to_string()).contains("bridge_submit failed"));

        let mut replies = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while replies.len() < 2 && Instant::now() < deadline {
            bridge_pump_main();
            replies.extend(bridge_poll_replies());
            std::thread::sleep(Duration::from_millis(5));
        }

        let replies = replies
            .iter()
            .map(|reply| serde_json::from_str::<Value>(reply).expect("reply json"))
            .collect::<Vec<_>>();
        let ui = replies
            .iter()
            .find(|reply| reply["callId"] == "ui1")
            .expect("system ui reply");
        assert_eq!(ui["status"], "resolved");
        assert_eq!(ui["value"], "unspecified");
        assert!(replies.iter().any(|reply| reply["callId"] == "h1"));

        assert!(bridge_shutdown());
        assert_eq!(bridge_pump_main(), 0);
        assert!(bridge_poll_replies().is_empty());
    }
}
