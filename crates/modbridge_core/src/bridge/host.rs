//! Bridge session host.
//!
//! # Responsibility
//! - Own the runtime, queues, registry and dispatcher of one session.
//! - Accept JSON call envelopes and deliver JSON replies.
//!
//! # Invariants
//! - Package-declared queues exist unless the config already declares them.
//! - Shutdown closes queues before module teardown, so no new invocation
//!   starts against a destroyed module.
//! - `shutdown` and `Drop` must not run inside an async context.

use crate::bridge::message::{decode_call, encode_reply, CodecError};
use crate::config::{BridgeConfig, ConfigError};
use crate::dispatcher::Dispatcher;
use crate::modules::BuiltinPackage;
use crate::promise::{Promise, PromiseHandle};
use crate::queue::{build_runtime, QueueError, QueueSet};
use crate::registry::{ModuleContext, ModuleRegistry, ModuleRegistryProvider, RegistryError};
use crate::value::BridgeValue;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use uuid::Uuid;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub struct Bridge {
    session_id: Uuid,
    dispatcher: Arc<Dispatcher>,
    runtime: Option<Runtime>,
}

impl Bridge {
    /// Starts a session whose registry comes from `provider`.
    pub fn start(
        config: &BridgeConfig,
        context: ModuleContext,
        provider: &ModuleRegistryProvider,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let runtime = build_runtime(&config.runtime_config())?;

        let mut queues = QueueSet::from_specs(&config.queues, runtime.handle())?;
        for spec in provider.queue_specs() {
            if !queues.contains(spec.name.trim()) {
                queues.add(&spec, runtime.handle())?;
            }
        }

        let registry = provider.create_registry(&context)?;
        let dispatcher = Dispatcher::new(Arc::new(registry), queues);
        info!(
            "event=bridge_start module=bridge status=ok session={} modules={} queues={}",
            context.session_id(),
            dispatcher.registry().len(),
            dispatcher.queues().labels().join(",")
        );

        Ok(Self {
            session_id: context.session_id(),
            dispatcher: Arc::new(dispatcher),
            runtime: Some(runtime),
        })
    }

    /// Starts a session with the built-in module package.
    pub fn start_builtin(config: &BridgeConfig, context: ModuleContext) -> Result<Self, BridgeError> {
        let mut provider = ModuleRegistryProvider::with_overrides(config.registry.allow_overrides);
        provider.add_package(Arc::new(BuiltinPackage::new(config.storage.path.clone())))?;
        Self::start(config, context, &provider)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        self.dispatcher.registry()
    }

    pub fn call(&self, module: &str, method: &str, arguments: Vec<BridgeValue>) -> PromiseHandle {
        self.dispatcher.call_pending(module, method, arguments)
    }

    pub fn call_with(&self, module: &str, method: &str, arguments: Vec<BridgeValue>, promise: Promise) {
        self.dispatcher.call(module, method, arguments, promise);
    }

    /// Decodes one call envelope and dispatches it; `on_reply` receives the
    /// encoded reply. Returns the envelope's call id.
    pub fn submit_json(
        &self,
        payload: &str,
        on_reply: impl FnOnce(String) + Send + 'static,
    ) -> Result<String, BridgeError> {
        let call = decode_call(payload)?;
        let call_id = call.call_id.clone();
        self.dispatcher.handle_call(call, move |reply| match encode_reply(&reply) {
            Ok(encoded) => on_reply(encoded),
            Err(err) => error!(
                "event=bridge_reply module=bridge status=error call_id={} error={}",
                reply.call_id, err
            ),
        });
        Ok(call_id)
    }

    /// Runs main-queue work queued so far on the calling thread.
    pub fn pump_main(&self) -> usize {
        self.dispatcher.queues().main().run_pending()
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Closes queues, tears the registry down, and stops the runtime.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        self.dispatcher.queues().close_all();
        self.dispatcher.registry().teardown();
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        info!(
            "event=bridge_stop module=bridge status=ok session={}",
            self.session_id
        );
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::Bridge;
    use crate::bridge::message::decode_reply;
    use crate::config::BridgeConfig;
    use crate::registry::ModuleContext;
    use crate::value::BridgeValue;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn submit_json_replies_with_encoded_envelope() {
        let bridge = Bridge::start_builtin(&BridgeConfig::default(), ModuleContext::new())
            .expect("bridge");
        let (reply_tx, reply_rx) = mpsc::channel();

        let call_id = bridge
            .submit_json(
                r#"{"callId":"c1","module":"Haptics","method":"vibrate","arguments":[1]}"#,
                move |reply| {
                    let _ = reply_tx.send(reply);
                },
            )
            .expect("submit");
        assert_eq!(call_id, "c1");

        let reply = reply_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("reply delivered");
        let reply = decode_reply(&reply).expect("decode reply");
        assert_eq!(reply.call_id, "c1");
        assert!(reply.is_resolved());
        bridge.shutdown();
    }

    #[test]
    fn malformed_payload_is_reported_to_caller() {
        let bridge = Bridge::start_builtin(&BridgeConfig::default(), ModuleContext::new())
            .expect("bridge");
        assert!(bridge.submit_json("{not json", |_| {}).is_err());
    }

    #[test]
    fn shutdown_tears_registry_down() {
        let bridge = Bridge::start_builtin(&BridgeConfig::default(), ModuleContext::new())
            .expect("bridge");
        let registry = std::sync::Arc::clone(bridge.registry());
        assert!(registry.contains("KeyValueStore"));
        assert!(bridge.is_running());

        bridge.shutdown();
        assert!(registry.is_empty());
    }

    #[test]
    fn calls_after_queue_close_reject() {
        let bridge = Bridge::start_builtin(&BridgeConfig::default(), ModuleContext::new())
            .expect("bridge");
        bridge.dispatcher().queues().close_all();

        let err = bridge
            .call("Haptics", "vibrate", vec![BridgeValue::Int(1)])
            .wait()
            .expect_err("closed queues");
        assert_eq!(err.code, crate::error::E_QUEUE_UNAVAILABLE);
    }
}
