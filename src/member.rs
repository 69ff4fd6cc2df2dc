//! Members (agents) and the per-queue member table
//!
//! A [`Member`] is scoped to exactly one [`crate::queue::Queue`] and
//! references a shared [`Device`] (spec §3). [`MemberSet`] is the
//! queue-scoped table keyed by interface, with provenance-aware insert
//! semantics (spec §4.2).

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::device::Device;
use crate::error::{QueueEngineError, Result};

/// How a member's registration entered the table.
///
/// Precedence for conflicting registrations: Static > Realtime > Dynamic.
/// Static always overwrites; Realtime overwrites Dynamic; Dynamic never
/// overwrites an existing entry of either other kind (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Provenance {
    Dynamic = 0,
    Realtime = 1,
    Static = 2,
}

/// A queue-scoped agent record.
#[derive(Clone)]
pub struct Member {
    pub interface: String,
    pub display_name: String,
    pub penalty: i32,
    pub calls: u64,
    pub last_call_end: Option<Instant>,
    pub last_wrapup_seconds: u64,
    pub paused: bool,
    pub call_in_use: bool,
    pub provenance: Provenance,
    pub dead: bool,
    pub realtime_uid: Option<String>,
    pub device: Arc<Device>,
}

impl Member {
    pub fn new(interface: impl Into<String>, state_key: impl Into<String>, device: Arc<Device>, provenance: Provenance) -> Self {
        Self {
            interface: interface.into(),
            display_name: String::new(),
            penalty: 0,
            calls: 0,
            last_call_end: None,
            last_wrapup_seconds: 0,
            paused: false,
            call_in_use: true,
            provenance,
            dead: false,
            realtime_uid: None,
            device,
        }
    }

    /// Whether the member's wrapup window has elapsed (spec §4.4 `ring_entry`
    /// precondition (c): `now > last_call_end + last_wrapup_seconds`).
    pub fn wrapup_elapsed(&self, now: Instant) -> bool {
        match self.last_call_end {
            None => true,
            Some(end) => now > end + std::time::Duration::from_secs(self.last_wrapup_seconds),
        }
    }
}

/// Queue-scoped set of members, keyed by interface, preserving insertion
/// order (Linear/RROrdered strategies walk members in this order, spec §4.3).
#[derive(Default)]
pub struct MemberSet {
    members: IndexMap<String, Member>,
}

impl MemberSet {
    pub fn new() -> Self {
        Self { members: IndexMap::new() }
    }

    /// Insert or update a member, honoring provenance precedence.
    ///
    /// Returns `Ok(true)` if the member was newly added, `Ok(false)` if an
    /// existing entry was updated or the insert was suppressed by
    /// precedence.
    pub fn insert(&mut self, member: Member) -> Result<bool> {
        if member.interface.is_empty() {
            return Err(QueueEngineError::EmptyInterface);
        }
        match self.members.get(&member.interface) {
            None => {
                info!(interface = %member.interface, paused = member.paused, "ADDMEMBER");
                self.members.insert(member.interface.clone(), member);
                Ok(true)
            }
            Some(existing) => {
                if member.provenance >= existing.provenance {
                    // Dynamic (0) vs Dynamic is allowed to update itself;
                    // Dynamic never overwrites a Static/Realtime entry.
                    if member.provenance == Provenance::Dynamic && existing.provenance != Provenance::Dynamic {
                        return Ok(false);
                    }
                    let interface = member.interface.clone();
                    self.members.insert(interface, member);
                    Ok(false)
                } else {
                    Ok(false)
                }
            }
        }
    }

    pub fn remove(&mut self, interface: &str) -> Option<Member> {
        let removed = self.members.shift_remove(interface);
        if removed.is_some() {
            info!(interface, "REMOVEMEMBER");
        }
        removed
    }

    pub fn get(&self, interface: &str) -> Option<&Member> {
        self.members.get(interface)
    }

    pub fn get_mut(&mut self, interface: &str) -> Option<&mut Member> {
        self.members.get_mut(interface)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Member> {
        self.members.values_mut()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Insertion-order index of a member, used by Linear/RROrdered metrics.
    pub fn position_of(&self, interface: &str) -> Option<usize> {
        self.members.get_index_of(interface)
    }

    pub fn at_index(&self, index: usize) -> Option<&Member> {
        self.members.get_index(index).map(|(_, m)| m)
    }

    /// Mark every member dead ahead of a realtime reload (spec §4.2).
    pub fn mark_all_dead(&mut self) {
        for member in self.members.values_mut() {
            if member.provenance == Provenance::Realtime {
                member.dead = true;
            }
        }
    }

    /// Remove members still marked dead after a realtime reload finished
    /// re-adding the members present in the new snapshot.
    pub fn sweep_dead(&mut self) -> Vec<Member> {
        let dead_interfaces: Vec<String> = self
            .members
            .iter()
            .filter(|(_, m)| m.dead && m.provenance == Provenance::Realtime)
            .map(|(k, _)| k.clone())
            .collect();
        let mut removed = Vec::with_capacity(dead_interfaces.len());
        for interface in dead_interfaces {
            if let Some(m) = self.remove(&interface) {
                removed.push(m);
            }
        }
        removed
    }
}
