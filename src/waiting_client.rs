//! Waiting callers and the ordered waiting list
//!
//! [`WaitingClient`] is an in-queue caller's state (spec §3). The invariant
//! that must hold at all times the list lock is held: `position` equals the
//! 1-based index of the caller in the waiting list (spec §3, tested by
//! property 1 in spec §8).

use std::time::Instant;

use crate::attempt::AttemptSet;

/// Flags carried by a waiting caller, independent of queue strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientFlags {
    /// Hang up losing attempts as "answered elsewhere" (dial option `C`).
    pub cancel_elsewhere: bool,
    /// Stop MOH and indicate ringing to the caller when an attempt rings.
    pub ring_when_ringing: bool,
    /// Caller may accept an honored call-forward from an outbound attempt.
    pub allow_forwarding: bool,
    /// Caller has the `*` disconnect option.
    pub allow_disconnect: bool,
    /// Remaining-timeout resets on every attempt transition ("restart on ring").
    pub restart_timeout_on_ring: bool,
}

/// One caller's state while it waits in a queue (spec §3).
pub struct WaitingClient {
    pub id: u64,
    pub queue_name: String,
    pub priority: i32,
    pub position: usize,
    pub original_position: usize,
    pub start: Instant,
    /// `None` means no expiry.
    pub expire: Option<Instant>,
    pub digits: String,
    pub flags: ClientFlags,
    /// Linear-strategy cursor for this caller.
    pub linear_cursor: usize,
    pub linear_wrapped: bool,
    pub min_penalty: i32,
    pub max_penalty: i32,
    /// Index into the active rule set's ordered rules; `None` before the
    /// first rule has been applied.
    pub rule_cursor: Option<usize>,
    /// When the join-empty announce was last played (spec §4.4 step 3's
    /// "announce schedule").
    pub last_announce: Option<Instant>,
    /// When a periodic-announce prompt was last played, and which entry of
    /// the queue's `periodic_announce_list` plays next (spec §3).
    pub last_periodic_announce: Option<Instant>,
    pub periodic_announce_index: usize,
    pub attempts: AttemptSet,
    /// Interfaces already attempted by this caller across the whole call
    /// (including through forwards), to prevent call-forward loops
    /// (spec §9's "dial-forward loop prevention" design note). Modeled as a
    /// flat list owned by the `WaitingClient` rather than a channel-attached
    /// datastore, since there is no separate channel abstraction here.
    pub dialed_interfaces: Vec<String>,
}

impl WaitingClient {
    pub fn new(id: u64, queue_name: impl Into<String>, priority: i32, now: Instant, timeout: Option<std::time::Duration>) -> Self {
        Self {
            id,
            queue_name: queue_name.into(),
            priority,
            position: 0,
            original_position: 0,
            start: now,
            expire: timeout.map(|d| now + d),
            digits: String::new(),
            flags: ClientFlags::default(),
            linear_cursor: 0,
            linear_wrapped: false,
            min_penalty: 0,
            max_penalty: 0,
            rule_cursor: None,
            last_announce: None,
            last_periodic_announce: None,
            periodic_announce_index: 0,
            attempts: AttemptSet::new(),
            dialed_interfaces: Vec::new(),
        }
    }

    pub fn elapsed(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.start)
    }

    pub fn has_expired(&self, now: Instant) -> bool {
        matches!(self.expire, Some(t) if now >= t)
    }

    pub fn record_dialed(&mut self, interface: &str) {
        if !self.dialed_interfaces.iter().any(|i| i == interface) {
            self.dialed_interfaces.push(interface.to_string());
        }
    }

    pub fn has_dialed(&self, interface: &str) -> bool {
        self.dialed_interfaces.iter().any(|i| i == interface)
    }
}

/// The ordered per-queue waiting list.
///
/// Insertion and removal renumber every entry so that `position` always
/// equals `1 + (callers ahead in the list)` (spec §3 invariant, spec §8
/// property 1).
#[derive(Default)]
pub struct WaitingList {
    entries: Vec<WaitingClient>,
}

impl WaitingList {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a caller, honoring priority ordering and an optional requested
    /// position (spec §4.4 step 2).
    ///
    /// Rule: walk the list and insert before the first existing entry with
    /// strictly lower priority. If `requested_position` is given and is
    /// reachable without violating priority order (i.e. it does not place
    /// the caller ahead of a strictly-higher-priority entry), insert there
    /// instead; otherwise append at the tail of the caller's priority band.
    pub fn insert(&mut self, mut client: WaitingClient, requested_position: Option<usize>) -> usize {
        let priority_floor = self
            .entries
            .iter()
            .position(|e| e.priority < client.priority)
            .unwrap_or(self.entries.len());

        let index = match requested_position {
            Some(pos) => {
                // Requested position is 1-based; never before a
                // strictly-higher-priority entry.
                let requested_index = pos.saturating_sub(1).min(self.entries.len());
                requested_index.max(priority_floor)
            }
            None => priority_floor,
        };

        client.position = index + 1;
        client.original_position = client.position;
        self.entries.insert(index, client);
        self.renumber();
        index + 1
    }

    pub fn remove_by_id(&mut self, id: u64) -> Option<WaitingClient> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        let removed = self.entries.remove(idx);
        self.renumber();
        Some(removed)
    }

    fn renumber(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.position = i + 1;
        }
    }

    pub fn get(&self, id: u64) -> Option<&WaitingClient> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut WaitingClient> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn head(&self) -> Option<&WaitingClient> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WaitingClient> {
        self.entries.iter()
    }

    /// Whether the caller at `id` is within the first `available` entries,
    /// i.e. `is_our_turn()` from spec §4.4 step 3 (the autofill/position-1
    /// distinction is left to the caller of this helper).
    pub fn within_front(&self, id: u64, available: usize) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(idx) => idx < available,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn client(id: u64, prio: i32) -> WaitingClient {
        WaitingClient::new(id, "q", prio, Instant::now(), None)
    }

    #[test]
    fn position_monotonicity_after_inserts_and_removes() {
        let mut list = WaitingList::new();
        list.insert(client(1, 0), None);
        list.insert(client(2, 0), None);
        list.insert(client(3, 0), None);

        for (i, e) in list.iter().enumerate() {
            assert_eq!(e.position, i + 1);
        }

        list.remove_by_id(2);
        for (i, e) in list.iter().enumerate() {
            assert_eq!(e.position, i + 1);
        }
    }

    #[test]
    fn priority_ordering_holds_after_insertion() {
        let mut list = WaitingList::new();
        list.insert(client(1, 5), None);
        list.insert(client(2, 10), None); // higher priority, should go first
        list.insert(client(3, 1), None); // lower priority, should go last

        let prios: Vec<i32> = list.iter().map(|e| e.priority).collect();
        assert_eq!(prios, vec![10, 5, 1]);
        for w in prios.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn requested_position_never_precedes_higher_priority() {
        let mut list = WaitingList::new();
        list.insert(client(1, 10), None);
        // Request position 1 but with lower priority than the head.
        list.insert(client(2, 1), Some(1));

        let ids: Vec<u64> = list.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn within_front_checks_position() {
        let mut list = WaitingList::new();
        list.insert(client(1, 0), None);
        list.insert(client(2, 0), None);
        assert!(list.within_front(1, 1));
        assert!(!list.within_front(2, 1));
        assert!(list.within_front(2, 2));
    }
}
