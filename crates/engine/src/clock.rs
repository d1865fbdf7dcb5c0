use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Start time of the most recent audio block, in seconds since the stream started.
///
/// Written by the audio thread once per callback, read by the control thread.
#[derive(Debug, Clone, Default)]
pub struct AudioClock {
    bits: Arc<AtomicU64>,
}

impl AudioClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, time: f64) {
        self.bits.store(time.to_bits(), Ordering::Release);
    }

    pub fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
