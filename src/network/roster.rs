//! Session Roster
//!
//! Membership, ready flags, slots and scores. Slots are a pure function of
//! sorted identity order, so host and clients derive the same assignment
//! without negotiation.

use std::collections::BTreeMap;

use crate::game::state::PlayerId;
use crate::network::protocol::RosterPlayer;

/// One roster member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Player id
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Ready flag
    pub ready: bool,
    /// Slot index
    pub slot: u8,
    /// Score (mirrors the engine while running)
    pub score: u32,
    /// Session host
    pub is_host: bool,
    /// Arrival order; ranking tie-break
    pub join_order: u32,
}

/// Ordered set of session members.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: BTreeMap<PlayerId, RosterEntry>,
    next_join_order: u32,
}

impl Roster {
    /// Empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, or rename an existing one. Returns true if the member is new.
    pub fn join(&mut self, id: PlayerId, name: impl Into<String>, is_host: bool) -> bool {
        let name = name.into();
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.name = name;
            return false;
        }
        let join_order = self.next_join_order;
        self.next_join_order += 1;
        self.entries.insert(
            id,
            RosterEntry { id, name, ready: false, slot: 0, score: 0, is_host, join_order },
        );
        self.reassign_slots();
        true
    }

    /// Remove a member.
    pub fn leave(&mut self, id: &PlayerId) -> Option<RosterEntry> {
        let removed = self.entries.remove(id);
        if removed.is_some() {
            self.reassign_slots();
        }
        removed
    }

    /// Slot = index in sorted identity order.
    fn reassign_slots(&mut self) {
        for (slot, entry) in self.entries.values_mut().enumerate() {
            entry.slot = slot as u8;
        }
    }

    /// Set a member's ready flag. Returns false for unknown members.
    pub fn set_ready(&mut self, id: &PlayerId, ready: bool) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.ready = ready;
                true
            }
            None => false,
        }
    }

    /// Set a member's score.
    pub fn set_score(&mut self, id: &PlayerId, score: u32) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.score = score;
        }
    }

    /// Clear every ready flag.
    pub fn clear_ready(&mut self) {
        for entry in self.entries.values_mut() {
            entry.ready = false;
        }
    }

    /// Zero every score.
    pub fn reset_scores(&mut self) {
        for entry in self.entries.values_mut() {
            entry.score = 0;
        }
    }

    /// Non-empty and everyone ready.
    pub fn all_ready(&self) -> bool {
        !self.entries.is_empty() && self.entries.values().all(|e| e.ready)
    }

    /// Member lookup.
    pub fn get(&self, id: &PlayerId) -> Option<&RosterEntry> {
        self.entries.get(id)
    }

    /// Membership test.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.entries.contains_key(id)
    }

    /// Members in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries.values()
    }

    /// Members in arrival order.
    pub fn in_join_order(&self) -> Vec<&RosterEntry> {
        let mut entries: Vec<&RosterEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.join_order);
        entries
    }

    /// Member count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everyone.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Wire form, in slot order.
    pub fn to_payload(&self) -> Vec<RosterPlayer> {
        self.entries
            .values()
            .map(|e| RosterPlayer {
                id: e.id,
                name: e.name.clone(),
                ready: e.ready,
                score: e.score,
                slot: e.slot,
                is_host: e.is_host,
            })
            .collect()
    }

    /// Replace the roster with the host's view. Slots are recomputed locally
    /// and must agree with the host's. Known members keep their arrival order.
    pub fn replace_from(&mut self, players: &[RosterPlayer]) {
        let mut entries = BTreeMap::new();
        for p in players {
            let join_order = match self.entries.get(&p.id) {
                Some(existing) => existing.join_order,
                None => {
                    let order = self.next_join_order;
                    self.next_join_order += 1;
                    order
                }
            };
            entries.insert(
                p.id,
                RosterEntry {
                    id: p.id,
                    name: p.name.clone(),
                    ready: p.ready,
                    slot: p.slot,
                    score: p.score,
                    is_host: p.is_host,
                    join_order,
                },
            );
        }
        self.entries = entries;
        self.reassign_slots();
    }
}
