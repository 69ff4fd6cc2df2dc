//! Device state shared across queues
//!
//! A [`Device`] backs one or more [`crate::member::Member`]s — possibly in
//! different queues — through a shared state key (spec §3, §4.1). The
//! registry hands out ref-counted handles and fans status changes out to
//! every interested queue through a dedicated single-consumer task so that a
//! storm of driver events cannot starve caller processing (spec §4.1, §5).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Raw status reported by the channel driver for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    Unknown,
    NotInUse,
    InUse,
    Busy,
    Invalid,
    Unavailable,
    Ringing,
    RingInUse,
    OnHold,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        DeviceStatus::Unknown
    }
}

/// Shared, process-wide device record.
///
/// `reserved`/`active` are the only counters shared across unrelated callers
/// (spec §5); they are updated with short-held `parking_lot` locks, never
/// across an `.await`.
pub struct Device {
    pub key: String,
    status: parking_lot::Mutex<DeviceStatus>,
    reserved: AtomicI64,
    active: AtomicI64,
    refcount: AtomicI64,
}

impl Device {
    fn new(key: String) -> Self {
        Self {
            key,
            status: parking_lot::Mutex::new(DeviceStatus::Unknown),
            reserved: AtomicI64::new(0),
            active: AtomicI64::new(0),
            refcount: AtomicI64::new(0),
        }
    }

    pub fn status(&self) -> DeviceStatus {
        *self.status.lock()
    }

    pub fn reserved(&self) -> i64 {
        self.reserved.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Increment `reserved`. Pairs with [`Device::release_reserved`].
    pub fn add_reserved(&self) {
        self.reserved.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement `reserved`, floored at 0 so a double-release can't go negative.
    pub fn release_reserved(&self) {
        let prev = self.reserved.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            Some((v - 1).max(0))
        });
        let _ = prev;
    }

    pub fn add_active(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn release_active(&self) {
        let _ = self.active.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
            Some((v - 1).max(0))
        });
    }

    /// Effective status seen by a member, reconciling the driver's raw status
    /// with the engine's own outstanding commitments (spec §4.1).
    ///
    /// `call_in_use` is the member's own flag: whether it may be dialed while
    /// its device is already in use.
    pub fn effective_status(&self, call_in_use: bool) -> DeviceStatus {
        let raw = self.status();
        let reserved = self.reserved();
        let active = self.active();

        match raw {
            DeviceStatus::InUse | DeviceStatus::Ringing | DeviceStatus::RingInUse | DeviceStatus::OnHold => {
                if (reserved > 0 || active > 0) && !call_in_use {
                    DeviceStatus::Busy
                } else {
                    raw
                }
            }
            DeviceStatus::NotInUse | DeviceStatus::Unknown => {
                if active > 0 {
                    if call_in_use { DeviceStatus::InUse } else { DeviceStatus::Busy }
                } else if reserved > 0 {
                    if call_in_use { DeviceStatus::Ringing } else { DeviceStatus::Busy }
                } else {
                    raw
                }
            }
            other => other,
        }
    }
}

/// A status transition fanned out to every queue referencing a device.
#[derive(Debug, Clone)]
pub struct DeviceStatusEvent {
    pub key: String,
    pub status: DeviceStatus,
}

/// Process-wide map from state key to shared [`Device`].
///
/// Devices are created lazily on first reference and destroyed when the last
/// referencing member releases them (spec §3). Fan-out to members runs on a
/// dedicated single-consumer task so a burst of driver events cannot starve
/// caller processing (spec §4.1).
pub struct DeviceRegistry {
    devices: DashMap<String, Arc<Device>>,
    fanout_tx: mpsc::UnboundedSender<DeviceStatusEvent>,
}

impl DeviceRegistry {
    /// Build a registry plus the receiving half of its fan-out channel.
    ///
    /// The caller is expected to spawn a task that drains the receiver and
    /// applies [`DeviceStatusEvent`]s to member-status subscribers (queues
    /// register their own sinks via [`crate::queue::QueueManager`]).
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeviceStatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                devices: DashMap::new(),
                fanout_tx: tx,
            },
            rx,
        )
    }

    /// Acquire a device handle, creating it if absent and bumping its refcount.
    pub fn acquire(&self, key: &str) -> Arc<Device> {
        let entry = self
            .devices
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Device::new(key.to_string())));
        entry.refcount.fetch_add(1, Ordering::SeqCst);
        entry.clone()
    }

    /// Release a previously-acquired handle; unlinks the device once the
    /// refcount returns to what the registry itself holds (i.e. no more
    /// members reference it).
    pub fn release(&self, device: &Arc<Device>) {
        let remaining = device.refcount.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining <= 0 {
            // Only remove if nobody re-acquired it concurrently.
            self.devices.remove_if(&device.key, |_, v| Arc::ptr_eq(v, device));
        }
    }

    /// Update a device's raw status and enqueue a fan-out event.
    ///
    /// Ordering within a single device key is preserved because the fan-out
    /// channel is a single FIFO consumed by one task.
    pub fn set_status(&self, key: &str, status: DeviceStatus) {
        if let Some(device) = self.devices.get(key) {
            *device.status.lock() = status;
            trace!(device = key, ?status, "device status updated");
        }
        let _ = self.fanout_tx.send(DeviceStatusEvent {
            key: key.to_string(),
            status,
        });
    }

    pub fn get(&self, key: &str) -> Option<Arc<Device>> {
        self.devices.get(key).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_status_reconciles_reservation() {
        let (registry, _rx) = DeviceRegistry::new();
        let device = registry.acquire("SIP/100");
        registry.set_status("SIP/100", DeviceStatus::NotInUse);

        assert_eq!(device.effective_status(true), DeviceStatus::NotInUse);

        device.add_reserved();
        assert_eq!(device.effective_status(true), DeviceStatus::Ringing);
        assert_eq!(device.effective_status(false), DeviceStatus::Busy);

        device.release_reserved();
        device.add_active();
        assert_eq!(device.effective_status(true), DeviceStatus::InUse);
        assert_eq!(device.effective_status(false), DeviceStatus::Busy);
    }

    #[test]
    fn refcount_release_removes_last_reference() {
        let (registry, _rx) = DeviceRegistry::new();
        let device = registry.acquire("SIP/200");
        assert_eq!(registry.len(), 1);
        registry.release(&device);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn reserved_release_floors_at_zero() {
        let (registry, _rx) = DeviceRegistry::new();
        let device = registry.acquire("SIP/300");
        device.release_reserved();
        device.release_reserved();
        assert_eq!(device.reserved(), 0);
    }
}
