//! Outbound attempts and per-caller attempt sets
//!
//! One [`Attempt`] models a single outbound ring toward one member on behalf
//! of a waiting caller (spec §3). [`AttemptSet`] collects the attempts for
//! one caller's current ring round, indexed by member interface, and
//! guarantees release of every device contribution on every exit path
//! (success, failure, forwarding, hangup, bridge end) via `Drop` — this is
//! the property spec §5 calls test-critical.

use std::collections::HashMap;
use std::sync::Arc;

use crate::device::Device;
use crate::transport::{AocRateEntry, ConnectedLineInfo, OutboundChannel, RedirectingInfo};

/// One outbound ring within a caller's [`AttemptSet`].
pub struct Attempt {
    pub member_interface: String,
    pub device: Arc<Device>,
    pub channel: Option<OutboundChannel>,
    pub metric: i64,
    pub still_going: bool,
    pub reserved: bool,
    pub active: bool,
    pub watching: bool,
    pub pending_connected_update: Option<ConnectedLineInfo>,
    pub pending_redirecting_update: Option<RedirectingInfo>,
    pub dial_callerid_absent: bool,
    pub aoc_rates: Vec<AocRateEntry>,
}

impl Attempt {
    pub fn new(member_interface: impl Into<String>, device: Arc<Device>, metric: i64) -> Self {
        Self {
            member_interface: member_interface.into(),
            device,
            channel: None,
            metric,
            still_going: true,
            reserved: false,
            active: false,
            watching: false,
            pending_connected_update: None,
            pending_redirecting_update: None,
            dial_callerid_absent: false,
            aoc_rates: Vec::new(),
        }
    }

    /// Claim the device's `reserved` counter, idempotently (spec §3 invariant:
    /// at most one contribution per attempt).
    pub fn reserve_device(&mut self) {
        if !self.reserved {
            self.device.add_reserved();
            self.reserved = true;
        }
    }

    pub fn release_reservation(&mut self) {
        if self.reserved {
            self.device.release_reserved();
            self.reserved = false;
        }
    }

    /// Transition to the won attempt: claim `active`, release `reserved`
    /// (an attempt is never both at once once it wins, spec §3).
    pub fn mark_won(&mut self) {
        self.release_reservation();
        if !self.active {
            self.device.add_active();
            self.active = true;
        }
    }

    pub fn release_active(&mut self) {
        if self.active {
            self.device.release_active();
            self.active = false;
        }
    }

    /// Retire this attempt (busy/congestion/request failure/forward
    /// disallowed): stop ringing it and release every device contribution
    /// (spec §4.4's "Failure semantics of an individual attempt").
    pub fn retire(&mut self) {
        self.still_going = false;
        self.release_reservation();
        self.release_active();
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        self.release_reservation();
        self.release_active();
    }
}

/// All in-flight attempts for one caller's current ring round, indexed by
/// member interface (spec §3).
#[derive(Default)]
pub struct AttemptSet {
    attempts: HashMap<String, Attempt>,
}

impl AttemptSet {
    pub fn new() -> Self {
        Self { attempts: HashMap::new() }
    }

    pub fn insert(&mut self, attempt: Attempt) {
        self.attempts.insert(attempt.member_interface.clone(), attempt);
    }

    pub fn get(&self, interface: &str) -> Option<&Attempt> {
        self.attempts.get(interface)
    }

    pub fn get_mut(&mut self, interface: &str) -> Option<&mut Attempt> {
        self.attempts.get_mut(interface)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attempt> {
        self.attempts.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Attempt> {
        self.attempts.values_mut()
    }

    pub fn still_going(&self) -> impl Iterator<Item = &Attempt> {
        self.attempts.values().filter(|a| a.still_going)
    }

    /// At-most-one-winner check (spec §8 property 4): no more than one
    /// attempt in this set may be `active` at a time.
    pub fn active_count(&self) -> usize {
        self.attempts.values().filter(|a| a.active).count()
    }

    /// Retire every still-going attempt other than `winner_interface`,
    /// releasing their device contributions. Returns the interfaces retired
    /// so the caller can hang up their channels (spec §4.4 step 5: "Bridge").
    pub fn retire_losers(&mut self, winner_interface: &str) -> Vec<String> {
        let mut retired = Vec::new();
        for (iface, attempt) in self.attempts.iter_mut() {
            if iface != winner_interface && attempt.still_going {
                attempt.retire();
                retired.push(iface.clone());
            }
        }
        retired
    }

    pub fn clear(&mut self) {
        self.attempts.clear();
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceRegistry;

    fn dev() -> Arc<Device> {
        let (reg, _rx) = DeviceRegistry::new();
        reg.acquire("SIP/1")
    }

    #[test]
    fn reserve_then_release_balances_counter() {
        let device = dev();
        let mut attempt = Attempt::new("SIP/1", device.clone(), 0);
        attempt.reserve_device();
        assert_eq!(device.reserved(), 1);
        attempt.release_reservation();
        assert_eq!(device.reserved(), 0);
    }

    #[test]
    fn drop_releases_outstanding_contributions() {
        let device = dev();
        {
            let mut attempt = Attempt::new("SIP/1", device.clone(), 0);
            attempt.reserve_device();
            assert_eq!(device.reserved(), 1);
        }
        assert_eq!(device.reserved(), 0);
    }

    #[test]
    fn at_most_one_winner_per_attempt_set() {
        let device = dev();
        let mut set = AttemptSet::new();
        let mut a = Attempt::new("SIP/1", device.clone(), 0);
        a.mark_won();
        set.insert(a);
        let b = Attempt::new("SIP/2", device.clone(), 1);
        set.insert(b);

        assert_eq!(set.active_count(), 1);
    }

    #[test]
    fn retire_losers_releases_devices_and_keeps_winner() {
        let device = dev();
        let mut set = AttemptSet::new();
        let mut winner = Attempt::new("SIP/1", device.clone(), 0);
        winner.reserve_device();
        winner.mark_won();
        set.insert(winner);

        let mut loser = Attempt::new("SIP/2", device.clone(), 1);
        loser.reserve_device();
        set.insert(loser);

        assert_eq!(device.reserved(), 1); // loser's
        assert_eq!(device.active(), 1); // winner's

        let retired = set.retire_losers("SIP/1");
        assert_eq!(retired, vec!["SIP/2".to_string()]);
        assert_eq!(device.reserved(), 0);
        assert_eq!(device.active(), 1);
    }
}
