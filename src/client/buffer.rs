//! Snapshot Buffer
//!
//! Bounded, tick-ordered store of accepted snapshots. Rendering asks for the
//! pair of snapshots that brackets a host time.

use std::collections::VecDeque;

use crate::client::host_clock::snapshot_host_time;
use crate::network::snapshot::Snapshot;

/// Snapshots around a render time.
#[derive(Debug, Clone, Copy)]
pub struct Bracket<'a> {
    /// Older snapshot; `None` when rendering before the first one
    pub from: Option<&'a Snapshot>,
    /// Newer snapshot
    pub to: &'a Snapshot,
    /// Progress from `from` to `to`, in `[0, 1]`
    pub t: f32,
}

/// Ring of accepted snapshots, oldest first.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    entries: VecDeque<Snapshot>,
    capacity: usize,
}

impl SnapshotBuffer {
    /// Buffer holding at most `capacity` snapshots (minimum 2).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append a snapshot newer than everything buffered. Returns false otherwise.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        if let Some(last) = self.entries.back() {
            if snapshot.tick <= last.tick {
                return false;
            }
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
        true
    }

    /// Snapshots bracketing `host_ms`.
    ///
    /// Past the newest snapshot the newest one is held (`t == 1`). Before the
    /// oldest one, `t` runs across that snapshot's own tick, so its pre-move
    /// segments are the source.
    pub fn bracket(&self, host_ms: f64) -> Option<Bracket<'_>> {
        let last = self.entries.back()?;
        if host_ms >= snapshot_host_time(last) {
            let from = self.entries.len().checked_sub(2).and_then(|i| self.entries.get(i));
            return Some(Bracket { from, to: last, t: 1.0 });
        }

        let idx = self
            .entries
            .iter()
            .position(|s| snapshot_host_time(s) > host_ms)
            .unwrap_or(self.entries.len() - 1);
        let to = &self.entries[idx];
        let to_ms = snapshot_host_time(to);

        if idx == 0 {
            let span = f64::from(to.interp_ms.max(1));
            let t = 1.0 - (to_ms - host_ms) / span;
            return Some(Bracket { from: None, to, t: t.clamp(0.0, 1.0) as f32 });
        }

        let from = &self.entries[idx - 1];
        let from_ms = snapshot_host_time(from);
        let span = (to_ms - from_ms).max(1.0);
        let t = (host_ms - from_ms) / span;
        Some(Bracket { from: Some(from), to, t: t.clamp(0.0, 1.0) as f32 })
    }

    /// Newest snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    /// Buffered count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
