//! Host Clock Estimate
//!
//! Maps local milliseconds onto the host's simulation timeline. Each
//! accepted snapshot stamps a host time (`tick * interp_ms`); the offset to
//! local time is taken from the first sample and then nudged toward each new
//! sample by a fixed correction rate, which filters delivery jitter.

use crate::network::snapshot::Snapshot;

/// Host timestamp a snapshot describes.
pub fn snapshot_host_time(snapshot: &Snapshot) -> f64 {
    f64::from(snapshot.tick) * f64::from(snapshot.interp_ms)
}

/// Smoothed host-minus-local offset.
#[derive(Debug, Clone)]
pub struct HostClock {
    offset_ms: Option<f64>,
    correction_rate: f64,
}

impl HostClock {
    /// `correction_rate` in `(0, 1]`; 1 follows every sample exactly.
    pub fn new(correction_rate: f64) -> Self {
        Self { offset_ms: None, correction_rate: correction_rate.clamp(f64::EPSILON, 1.0) }
    }

    /// Feed one (host time, local arrival time) sample.
    pub fn observe(&mut self, host_ms: f64, local_ms: u64) {
        let sample = host_ms - local_ms as f64;
        self.offset_ms = Some(match self.offset_ms {
            None => sample,
            Some(offset) => offset + (sample - offset) * self.correction_rate,
        });
    }

    /// Estimated host time at `local_ms`; `None` before the first sample.
    pub fn to_host(&self, local_ms: u64) -> Option<f64> {
        self.offset_ms.map(|offset| local_ms as f64 + offset)
    }

    /// Current offset.
    pub fn offset_ms(&self) -> Option<f64> {
        self.offset_ms
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        self.offset_ms = None;
    }
}
