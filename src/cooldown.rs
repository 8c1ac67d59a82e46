use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::ConfigError;
use crate::gesture::GestureLabel;

/// Per-gesture rate limiter. One global cooldown duration applies to every
/// label; each label keeps its own last-fire timestamp, created on first fire.
#[derive(Clone)]
pub struct CooldownGate {
    inner: Arc<Mutex<GateState>>,
}

struct GateState {
    cooldown: Duration,
    last_fired: HashMap<GestureLabel, Instant>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GateState {
                cooldown,
                last_fired: HashMap::new(),
            })),
        }
    }

    /// Returns true iff `label` never fired, or at least the cooldown has
    /// elapsed since its last fire. A passing check records `now` in the same
    /// locked section, so two rapid detections cannot both pass.
    pub fn should_fire(&self, label: GestureLabel, now: Instant) -> bool {
        let mut state = self.inner.lock().expect("cooldown gate lock poisoned");
        match state.last_fired.get(&label) {
            Some(&last) if now.duration_since(last) < state.cooldown => false,
            _ => {
                state.last_fired.insert(label, now);
                true
            }
        }
    }

    /// Takes effect on the next check, uniformly for all gestures.
    pub fn set_cooldown(&self, cooldown: Duration) -> Result<(), ConfigError> {
        if cooldown.is_zero() {
            return Err(ConfigError::InvalidCooldown(0.0));
        }
        self.inner.lock().expect("cooldown gate lock poisoned").cooldown = cooldown;
        Ok(())
    }

    /// Front door for the UI's seconds field. Rejects NaN, infinity, zero and
    /// negatives before they can reach `Duration`.
    pub fn set_cooldown_secs(&self, secs: f64) -> Result<(), ConfigError> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ConfigError::InvalidCooldown(secs));
        }
        self.set_cooldown(Duration::from_secs_f64(secs))
    }

    pub fn cooldown(&self) -> Duration {
        self.inner.lock().expect("cooldown gate lock poisoned").cooldown
    }
}
