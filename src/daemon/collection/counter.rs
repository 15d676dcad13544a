use std::{collections::HashMap, time::Instant};

use anyhow::Result;
use parking_lot::Mutex;

use crate::window_api::IdleSource;

use super::keys::normalize_key;

/// Input accumulated since the previous drain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainedInput {
    pub clicks: u64,
    pub keystrokes: u64,
    pub per_key: HashMap<String, u64>,
}

impl DrainedInput {
    pub fn is_empty(&self) -> bool {
        self.clicks == 0 && self.keystrokes == 0
    }
}

/// Counters still accumulating. Only meant for live display.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LiveCounts {
    pub clicks: u64,
    pub keystrokes: u64,
}

struct CounterState {
    pending: DrainedInput,
    last_input: Instant,
}

/// Thread-safe accumulator written by the input hook thread and drained by the sampler. The lock
/// is only held for a single increment or swap, never across I/O.
pub struct EventCounter {
    state: Mutex<CounterState>,
}

impl Default for EventCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCounter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CounterState {
                pending: DrainedInput::default(),
                last_input: Instant::now(),
            }),
        }
    }

    pub fn on_click(&self) {
        let mut state = self.state.lock();
        state.pending.clicks += 1;
        state.last_input = Instant::now();
    }

    pub fn on_key_press(&self, raw_key: &str) {
        let key = normalize_key(raw_key);
        let mut state = self.state.lock();
        state.pending.keystrokes += 1;
        *state.pending.per_key.entry(key).or_insert(0) += 1;
        state.last_input = Instant::now();
    }

    /// Returns everything counted so far and starts over from zero. Each event is returned by
    /// exactly one call.
    pub fn take_and_reset(&self) -> DrainedInput {
        std::mem::take(&mut self.state.lock().pending)
    }

    pub fn peek(&self) -> LiveCounts {
        let state = self.state.lock();
        LiveCounts {
            clicks: state.pending.clicks,
            keystrokes: state.pending.keystrokes,
        }
    }

    /// Seconds since this counter last saw an input event, or since it was created.
    pub fn idle_seconds(&self) -> f64 {
        self.state.lock().last_input.elapsed().as_secs_f64()
    }
}

/// Lets the counter stand in for the OS idle timer when no platform backend is available. It only
/// reflects events this process received.
impl IdleSource for EventCounter {
    fn seconds_since_last_input(&self) -> Result<f64> {
        Ok(self.idle_seconds())
    }
}
