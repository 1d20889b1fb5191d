//! Haptic feedback module.
//!
//! `vibrate(durationMs)` records one pulse in the pattern history. The
//! history stands in for the platform vibrator and lets hosts observe
//! requested pulses.

use crate::error::InvocationError;
use crate::module::{Arity, ExportedModule, MethodTable};
use crate::registry::RegistryError;
use crate::value::{BridgeValue, ConstantsMap};
use log::debug;
use parking_lot::Mutex;

/// Upper bound for a single pulse.
pub const MAX_DURATION_MS: u64 = 5_000;
const MAX_HISTORY: usize = 64;

pub struct Haptics {
    max_duration_ms: u64,
    history: Mutex<Vec<u64>>,
}

impl Haptics {
    pub fn new(max_duration_ms: u64) -> Self {
        Self {
            max_duration_ms,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Requested pulse durations, oldest first; keeps the most recent entries.
    pub fn history(&self) -> Vec<u64> {
        self.history.lock().clone()
    }

    fn vibrate(&self, duration_ms: f64, method: &str) -> Result<BridgeValue, InvocationError> {
        if duration_ms < 0.0 || duration_ms > self.max_duration_ms as f64 {
            return Err(InvocationError::invalid_arguments(
                method,
                format!(
                    "duration must be within 0..={} ms, got {duration_ms}",
                    self.max_duration_ms
                ),
            ));
        }
        let duration_ms = duration_ms.round() as u64;

        let mut history = self.history.lock();
        if history.len() == MAX_HISTORY {
            history.remove(0);
        }
        history.push(duration_ms);
        debug!("event=haptics_vibrate module=haptics status=ok duration_ms={duration_ms}");
        Ok(BridgeValue::Null)
    }
}

impl Default for Haptics {
    fn default() -> Self {
        Self::new(MAX_DURATION_MS)
    }
}

impl ExportedModule for Haptics {
    const NAME: &'static str = "Haptics";
    type Config = u64;

    fn methods() -> MethodTable<Self> {
        MethodTable::<Self>::new().sync("vibrate", "vibrateImpl", Arity::exactly(1), |module, args| {
            module.vibrate(args.f64_at(0)?, args.method())
        })
    }

    fn snapshot(&self) -> Self::Config {
        self.max_duration_ms
    }

    fn from_snapshot(max_duration_ms: Self::Config) -> Result<Self, RegistryError> {
        Ok(Self::new(max_duration_ms))
    }

    fn constants(&self) -> ConstantsMap {
        let mut constants = ConstantsMap::new();
        constants.insert(
            "maxDurationMs".to_string(),
            BridgeValue::Int(self.max_duration_ms as i64),
        );
        constants
    }
}
