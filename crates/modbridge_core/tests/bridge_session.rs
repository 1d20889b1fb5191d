use modbridge_core::bridge::decode_reply;
use modbridge_core::error::E_QUEUE_UNAVAILABLE;
use modbridge_core::module::AnyModule;
use modbridge_core::modules::system_ui::INVALID_VALUE;
use modbridge_core::{
    Arity, Bridge, BridgeConfig, BridgeValue, ExportedModule, MethodQueue, MethodTable,
    ModuleContext, ModuleHost, ModulePackage, ModuleRegistryProvider, RegistryError,
    ReplyOutcome,
};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn key_value_store_persists_across_sessions() {
    let dir = tempfile::tempdir().unwrap();

    let first = Bridge::start_builtin(
        &BridgeConfig::default(),
        ModuleContext::new().with_data_dir(dir.path()),
    )
    .unwrap();
    first
        .call(
            "KeyValueStore",
            "setItem",
            vec![BridgeValue::from("locale"), BridgeValue::from("en-GB")],
        )
        .wait()
        .unwrap();
    first.shutdown();

    let second = Bridge::start_builtin(
        &BridgeConfig::default(),
        ModuleContext::new().with_data_dir(dir.path()),
    )
    .unwrap();
    let value = second
        .call("KeyValueStore", "getItem", vec![BridgeValue::from("locale")])
        .wait()
        .unwrap();
    assert_eq!(value, BridgeValue::from("en-GB"));
    assert_eq!(
        second.registry().exported_constants()["KeyValueStore"]["persistent"],
        BridgeValue::Bool(true)
    );
    second.shutdown();
}

#[test]
fn configured_storage_path_wins_over_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let storage = dir.path().join("custom").join("store.sqlite3");
    let config = BridgeConfig::from_toml_str(&format!(
        "[storage]\npath = \"{}\"\n",
        storage.display()
    ))
    .unwrap();

    let bridge = Bridge::start_builtin(
        &config,
        ModuleContext::new().with_data_dir(dir.path().join("unused")),
    )
    .unwrap();
    bridge
        .call(
            "KeyValueStore",
            "setItem",
            vec![BridgeValue::from("k"), BridgeValue::from("v")],
        )
        .wait()
        .unwrap();
    bridge.shutdown();

    assert!(storage.exists());
    assert!(!dir.path().join("unused").join("key_value.sqlite3").exists());
}

#[test]
fn system_ui_replies_only_after_main_queue_pump() {
    let bridge = Bridge::start_builtin(&BridgeConfig::default(), ModuleContext::new()).unwrap();
    let (reply_tx, reply_rx) = mpsc::channel();

    let set_tx = reply_tx.clone();
    bridge
        .submit_json(
            r##"{"callId":"set","module":"ExpoSystemUI","method":"setStatusBarBackgroundColor","arguments":["#336699"]}"##,
            move |reply| set_tx.send(reply).unwrap(),
        )
        .unwrap();
    bridge
        .submit_json(
            r#"{"callId":"get","module":"ExpoSystemUI","method":"getStatusBarBackgroundColor"}"#,
            move |reply| reply_tx.send(reply).unwrap(),
        )
        .unwrap();

    assert!(reply_rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert_eq!(bridge.pump_main(), 2);

    let set = decode_reply(&reply_rx.recv_timeout(REPLY_TIMEOUT).unwrap()).unwrap();
    let get = decode_reply(&reply_rx.recv_timeout(REPLY_TIMEOUT).unwrap()).unwrap();
    assert_eq!(set.call_id, "set");
    assert_eq!(
        get.outcome,
        ReplyOutcome::Resolved {
            value: BridgeValue::from("#336699")
        }
    );
    bridge.shutdown();
}

#[test]
fn system_ui_invalid_color_reply_carries_module_code() {
    let bridge = Bridge::start_builtin(&BridgeConfig::default(), ModuleContext::new()).unwrap();
    let (reply_tx, reply_rx) = mpsc::channel();

    bridge
        .submit_json(
            r#"{"callId":"c9","module":"ExpoSystemUI","method":"setAppearance","arguments":["sepia"]}"#,
            move |reply| reply_tx.send(reply).unwrap(),
        )
        .unwrap();
    bridge.pump_main();

    let reply = decode_reply(&reply_rx.recv_timeout(REPLY_TIMEOUT).unwrap()).unwrap();
    match reply.outcome {
        ReplyOutcome::Rejected { error } => assert_eq!(error.code, INVALID_VALUE),
        other => panic!("expected rejection, got {other:?}"),
    }
    bridge.shutdown();
}

struct Journal {
    entries: Arc<Mutex<Vec<i64>>>,
}

impl ExportedModule for Journal {
    const NAME: &'static str = "Journal";
    type Config = Arc<Mutex<Vec<i64>>>;

    fn methods() -> MethodTable<Self> {
        MethodTable::<Self>::new().sync("append", "append:", Arity::exactly(1), |journal, args| {
            let entry = args.i64_at(0)?;
            thread::sleep(Duration::from_millis((entry % 3) as u64));
            journal.entries.lock().unwrap().push(entry);
            Ok(BridgeValue::Null)
        })
    }

    fn snapshot(&self) -> Self::Config {
        Arc::clone(&self.entries)
    }

    fn from_snapshot(entries: Self::Config) -> Result<Self, RegistryError> {
        Ok(Self { entries })
    }

    fn method_queue(&self) -> MethodQueue {
        MethodQueue::named("journal")
    }
}

struct JournalPackage {
    entries: Arc<Mutex<Vec<i64>>>,
}

impl ModulePackage for JournalPackage {
    fn package_id(&self) -> &str {
        "journal"
    }

    fn create_exported_modules(
        &self,
        _context: &ModuleContext,
    ) -> Result<Vec<Box<dyn AnyModule>>, RegistryError> {
        Ok(vec![ModuleHost::boxed(Journal::from_snapshot(Arc::clone(
            &self.entries,
        ))?)?])
    }
}

#[test]
fn config_declared_serial_queue_keeps_call_order() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    let mut provider = ModuleRegistryProvider::new();
    provider
        .add_package(Arc::new(JournalPackage {
            entries: Arc::clone(&entries),
        }))
        .unwrap();
    let config = BridgeConfig::from_toml_str("[[queues]]\nname = \"journal\"\n").unwrap();

    let bridge = Bridge::start(&config, ModuleContext::new(), &provider).unwrap();
    let handles = (0..16)
        .map(|entry| bridge.call("Journal", "append", vec![BridgeValue::Int(entry)]))
        .collect::<Vec<_>>();
    for handle in handles {
        handle.wait().unwrap();
    }

    assert_eq!(*entries.lock().unwrap(), (0..16).collect::<Vec<_>>());
    bridge.shutdown();
}

#[test]
fn undeclared_named_queue_fails_every_call() {
    let entries = Arc::new(Mutex::new(Vec::new()));
    let mut provider = ModuleRegistryProvider::new();
    provider
        .add_package(Arc::new(JournalPackage {
            entries: Arc::clone(&entries),
        }))
        .unwrap();

    let bridge = Bridge::start(&BridgeConfig::default(), ModuleContext::new(), &provider).unwrap();
    let err = bridge
        .call("Journal", "append", vec![BridgeValue::Int(1)])
        .wait()
        .unwrap_err();

    assert_eq!(err.code, E_QUEUE_UNAVAILABLE);
    assert!(entries.lock().unwrap().is_empty());
    bridge.shutdown();
}
