//! Queue identity/configuration, per-queue mutable state, and the queue registry
//!
//! [`Queue`] is immutable once constructed; [`QueueData`] is the mutable half
//! (waiting list, member set, moving-average stats). Splitting them this way
//! is what makes a configuration reload atomic without stalling in-flight
//! callers (spec §9's reload-atomicity design note): a reload replaces the
//! `Queue` value in the registry while the existing `Arc<Mutex<QueueData>>`
//! is kept and shared with the new value, so live stats and the waiting list
//! survive the swap.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::audit::{AuditLog, AuditRecord, AuditTag};
use crate::device::{Device, DeviceRegistry, DeviceStatusEvent};
use crate::error::{QueueEngineError, Result};
use crate::events::{Event, EventBus, EventKind};
use crate::member::{Member, Provenance};
use crate::strategy::{EmptyCondition, RingStrategy};
use crate::waiting_client::WaitingList;

/// Cross-queue autopause policy (spec §8 property 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutopauseMode {
    Off,
    /// Pause only in the queue where the no-answer occurred.
    Yes,
    /// Pause the member in every queue it belongs to.
    All,
}

/// Number of completions over which the moving-average stats saturate
/// (spec §8 property 8: "fixed point of the specified exponential filter").
/// Once `completed` exceeds this, the average behaves as a true EMA with
/// smoothing factor `1/QUEUE_STATS_WINDOW`.
pub const QUEUE_STATS_WINDOW: u64 = 50;

/// Immutable identity and configuration for one named queue (spec §3).
#[derive(Debug, Clone)]
pub struct Queue {
    pub name: String,
    pub strategy: RingStrategy,
    pub ring_timeout: Duration,
    pub retry_interval: Duration,
    pub wrapup_default: Duration,
    pub member_delay: Duration,
    pub service_level: Duration,
    pub weight: i32,
    pub announce_frequency: Duration,
    pub periodic_announce_frequency: Duration,
    pub join_empty: EmptyCondition,
    pub leave_empty: EmptyCondition,
    pub autopause: AutopauseMode,
    pub holdtime_rounding_seconds: u64,
    pub default_rule_name: String,
    /// 0 means unlimited.
    pub maxlen: usize,
    /// Whether a member with `call_in_use` may be dialed while already in use.
    pub ringinuse: bool,
    /// `L` in spec §4.3's `usepenalty = 1 iff M > L`.
    pub penalty_members_limit: i32,
    /// Prompt played on the join-empty announce schedule (spec §4.4 step 3's
    /// "announce schedule"); `None` falls back to a position/hold-time
    /// generic prompt name.
    pub announce_file: Option<String>,
    /// Cycled in order by [`crate::dispatcher::Dispatcher`] on the periodic
    /// announce schedule (spec §3's "periodic-announce list and frequency").
    pub periodic_announce_list: Vec<String>,
    /// Suppresses `QueueMemberStatus` fan-out for this queue (spec §4.1:
    /// "unless that Queue has masked status events").
    pub mask_member_status_events: bool,
}

impl Queue {
    pub fn new(name: impl Into<String>, strategy: RingStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            ring_timeout: Duration::from_secs(15),
            retry_interval: Duration::from_secs(5),
            wrapup_default: Duration::from_secs(0),
            member_delay: Duration::from_secs(0),
            service_level: Duration::from_secs(60),
            weight: 0,
            announce_frequency: Duration::from_secs(0),
            periodic_announce_frequency: Duration::from_secs(0),
            join_empty: EmptyCondition::default(),
            leave_empty: EmptyCondition::empty(),
            autopause: AutopauseMode::Off,
            holdtime_rounding_seconds: 0,
            default_rule_name: String::new(),
            maxlen: 0,
            ringinuse: true,
            penalty_members_limit: 0,
            announce_file: None,
            periodic_announce_list: Vec::new(),
            mask_member_status_events: false,
        }
    }

    /// `usepenalty` from spec §4.3: `1` iff the member count exceeds the
    /// configured penalty-members limit, else `0`. A limit of `0` means the
    /// gate never applies regardless of sign (E3 resolution 2).
    pub fn usepenalty(&self, member_count: usize) -> bool {
        if self.penalty_members_limit == 0 {
            return false;
        }
        member_count as i32 > self.penalty_members_limit
    }
}

/// Per-queue mutable state: waiting list, member table, moving-average
/// stats, and round-robin cursor (spec §3).
#[derive(Default)]
pub struct QueueData {
    pub waiting: WaitingList,
    pub members: crate::member::MemberSet,
    pub count: usize,
    pub holdtime: f64,
    pub talktime: f64,
    pub completed: u64,
    pub completed_in_sl: u64,
    pub abandoned: u64,
    pub rr_pos: usize,
    pub rr_wrapped: bool,
}

impl QueueData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one completed call's hold time into the moving average
    /// (spec §8 property 8).
    pub fn record_completion(&mut self, hold_secs: u64, talk_secs: u64, in_sl: bool) {
        self.completed += 1;
        let n = self.completed.min(QUEUE_STATS_WINDOW) as f64;
        self.holdtime += (hold_secs as f64 - self.holdtime) / n;
        self.talktime += (talk_secs as f64 - self.talktime) / n;
        if in_sl {
            self.completed_in_sl += 1;
        }
    }

    pub fn record_abandon(&mut self) {
        self.abandoned += 1;
    }

    pub fn reset_stats(&mut self) {
        self.holdtime = 0.0;
        self.talktime = 0.0;
        self.completed = 0;
        self.completed_in_sl = 0;
        self.abandoned = 0;
    }

    /// Number of members not excluded by their own availability (paused,
    /// dead) — used by `is_our_turn()` in the wait-turn loop (spec §4.4 step 3).
    pub fn available_member_count(&self) -> usize {
        self.members.iter().filter(|m| !m.paused && !m.dead).count()
    }
}

/// A queue's immutable identity paired with its shared mutable half.
#[derive(Clone)]
pub struct QueueHandle {
    pub queue: Arc<Queue>,
    pub data: Arc<Mutex<QueueData>>,
}

/// Process-wide registry of queues, keyed by name.
pub struct QueueManager {
    queues: DashMap<String, QueueHandle>,
    devices: Arc<DeviceRegistry>,
    events: Arc<dyn EventBus>,
    audit: Arc<dyn AuditLog>,
}

impl QueueManager {
    pub fn new(devices: Arc<DeviceRegistry>, events: Arc<dyn EventBus>, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            queues: DashMap::new(),
            devices,
            events,
            audit,
        }
    }

    pub fn create_queue(&self, queue: Queue) -> Result<QueueHandle> {
        if self.queues.contains_key(&queue.name) {
            return Err(QueueEngineError::QueueAlreadyExists(queue.name));
        }
        let handle = QueueHandle {
            queue: Arc::new(queue),
            data: Arc::new(Mutex::new(QueueData::new())),
        };
        self.queues.insert(handle.queue.name.clone(), handle.clone());
        info!(queue = %handle.queue.name, "queue created");
        Ok(handle)
    }

    pub fn get(&self, name: &str) -> Option<QueueHandle> {
        self.queues.get(name).map(|e| e.clone())
    }

    pub fn remove_queue(&self, name: &str) -> Option<QueueHandle> {
        self.queues.remove(name).map(|(_, h)| h)
    }

    /// Replace a queue's configuration while preserving its live `QueueData`
    /// (spec §9's reload-atomicity design note).
    pub fn reload(&self, name: &str, new_queue: Queue) -> Result<QueueHandle> {
        let existing = self
            .queues
            .get(name)
            .ok_or_else(|| QueueEngineError::queue_not_found(name))?
            .clone();
        let handle = QueueHandle {
            queue: Arc::new(new_queue),
            data: existing.data.clone(),
        };
        self.queues.insert(name.to_string(), handle.clone());
        info!(queue = name, "queue reloaded, stats and waiting list preserved");
        Ok(handle)
    }

    pub fn names(&self) -> Vec<String> {
        self.queues.iter().map(|e| e.key().clone()).collect()
    }

    /// Management-surface equivalent of "add member" (spec §6).
    pub async fn add_member(
        &self,
        queue_name: &str,
        interface: &str,
        state_key: &str,
        penalty: i32,
        display_name: &str,
        paused: bool,
        call_in_use: bool,
        provenance: Provenance,
    ) -> Result<()> {
        if interface.is_empty() {
            return Err(QueueEngineError::EmptyInterface);
        }
        let handle = self.get(queue_name).ok_or_else(|| QueueEngineError::queue_not_found(queue_name))?;
        let device = self.devices.acquire(state_key);
        let mut member = Member::new(interface, state_key, device, provenance);
        member.penalty = penalty;
        member.display_name = display_name.to_string();
        member.paused = paused;
        member.call_in_use = call_in_use;

        let mut data = handle.data.lock().await;
        let inserted = data.members.insert(member)?;
        drop(data);

        if inserted {
            self.audit
                .log(
                    AuditRecord::new(queue_name, "", AuditTag::AddMember)
                        .agent(interface)
                        .extra(if paused { "PAUSED".to_string() } else { String::new() }),
                )
                .await;
            self.events
                .emit(Event::new(EventKind::QueueMemberAdded).with("queue", queue_name).with("interface", interface))
                .await;
        }
        Ok(())
    }

    /// Management-surface equivalent of "remove member" (spec §6).
    pub async fn remove_member(&self, queue_name: &str, interface: &str) -> Result<()> {
        let handle = self.get(queue_name).ok_or_else(|| QueueEngineError::queue_not_found(queue_name))?;
        let mut data = handle.data.lock().await;
        let removed = data.members.remove(interface);
        let device = removed.as_ref().map(|m| m.device.clone());
        drop(data);

        if let Some(device) = device {
            self.devices.release(&device);
            self.audit
                .log(AuditRecord::new(queue_name, "", AuditTag::RemoveMember).agent(interface))
                .await;
            self.events
                .emit(Event::new(EventKind::QueueMemberRemoved).with("queue", queue_name).with("interface", interface))
                .await;
            Ok(())
        } else {
            Err(QueueEngineError::member_not_found(interface, queue_name))
        }
    }

    /// Management-surface equivalent of pause/unpause (spec §6, §8 property 10).
    ///
    /// When `all_queues` is set the caller is expected to have already
    /// resolved every queue the interface belongs to and call this once per
    /// queue; this method itself only touches `queue_name`; cross-queue
    /// fan-out (autopause=all) lives in [`crate::event_mux`] where the set of
    /// queues a member belongs to is known.
    pub async fn set_paused(&self, queue_name: &str, interface: &str, paused: bool) -> Result<()> {
        let handle = self.get(queue_name).ok_or_else(|| QueueEngineError::queue_not_found(queue_name))?;
        let mut data = handle.data.lock().await;
        let member = data
            .members
            .get_mut(interface)
            .ok_or_else(|| QueueEngineError::member_not_found(interface, queue_name))?;
        member.paused = paused;
        drop(data);

        let tag = if paused { AuditTag::Pause } else { AuditTag::Unpause };
        self.audit.log(AuditRecord::new(queue_name, "", tag).agent(interface)).await;
        self.events
            .emit(Event::new(EventKind::QueueMemberPaused).with("queue", queue_name).with("interface", interface).with("paused", paused))
            .await;
        Ok(())
    }

    pub async fn set_penalty(&self, queue_name: &str, interface: &str, penalty: i32) -> Result<()> {
        let handle = self.get(queue_name).ok_or_else(|| QueueEngineError::queue_not_found(queue_name))?;
        let mut data = handle.data.lock().await;
        let member = data
            .members
            .get_mut(interface)
            .ok_or_else(|| QueueEngineError::member_not_found(interface, queue_name))?;
        member.penalty = penalty;
        drop(data);

        self.audit.log(AuditRecord::new(queue_name, "", AuditTag::Penalty).agent(interface).extra(penalty.to_string())).await;
        self.events
            .emit(Event::new(EventKind::QueueMemberPenalty).with("queue", queue_name).with("interface", interface).with("penalty", penalty))
            .await;
        Ok(())
    }

    /// Reconcile a queue's realtime members against a freshly-loaded snapshot
    /// (spec §4.2, scenario S6): mark all realtime members dead, re-insert
    /// every member present in `snapshot`, then sweep whatever is still dead.
    pub async fn reload_members(&self, queue_name: &str, snapshot: Vec<Member>) -> Result<()> {
        let handle = self.get(queue_name).ok_or_else(|| QueueEngineError::queue_not_found(queue_name))?;
        let mut data = handle.data.lock().await;
        data.members.mark_all_dead();
        for mut member in snapshot {
            member.dead = false;
            data.members.insert(member)?;
        }
        let removed = data.members.sweep_dead();
        drop(data);

        for member in &removed {
            self.devices.release(&member.device);
            self.audit.log(AuditRecord::new(queue_name, "", AuditTag::RemoveMember).agent(&member.interface)).await;
        }
        Ok(())
    }

    pub async fn reset_stats(&self, queue_name: &str) -> Result<()> {
        let handle = self.get(queue_name).ok_or_else(|| QueueEngineError::queue_not_found(queue_name))?;
        handle.data.lock().await.reset_stats();
        Ok(())
    }

    /// Pause/unpause `interface` in every queue it belongs to (spec §6's
    /// `PAUSEALL`/`UNPAUSEALL` tags; spec §8 property 10's `autopause=all`
    /// scope, invoked directly rather than only from the ring loop).
    pub async fn set_paused_all(&self, interface: &str, paused: bool) -> Result<usize> {
        let mut touched = 0;
        for name in self.names() {
            let Some(handle) = self.get(&name) else { continue };
            let belongs = handle.data.lock().await.members.get(interface).is_some();
            if belongs {
                self.set_paused(&name, interface, paused).await?;
                touched += 1;
            }
        }
        let tag = if paused { AuditTag::PauseAll } else { AuditTag::UnpauseAll };
        self.audit.log(AuditRecord::new("", "", tag).agent(interface)).await;
        Ok(touched)
    }

    /// Emit an operator-supplied custom event (spec §6's "log custom event"
    /// management command) without inventing a new fixed audit tag for it.
    pub async fn log_custom_event(&self, queue_name: &str, caller_uid: &str, tag: AuditTag, extra: impl Into<String>) {
        self.audit.log(AuditRecord::new(queue_name, caller_uid, tag).extra(extra.into())).await;
    }

    /// Point-in-time snapshot for the "show queue" management command
    /// (spec §6). Cheap: one `QueueData` lock, no cross-queue coordination.
    pub async fn snapshot(&self, queue_name: &str) -> Result<QueueSnapshot> {
        let handle = self.get(queue_name).ok_or_else(|| QueueEngineError::queue_not_found(queue_name))?;
        let data = handle.data.lock().await;
        Ok(QueueSnapshot {
            name: handle.queue.name.clone(),
            strategy: handle.queue.strategy,
            waiting: data.waiting.len(),
            holdtime: data.holdtime,
            talktime: data.talktime,
            completed: data.completed,
            completed_in_sl: data.completed_in_sl,
            abandoned: data.abandoned,
            members: data.members.iter().map(MemberSnapshot::from).collect(),
        })
    }

    /// Drain `rx` forever, reconciling each [`DeviceStatusEvent`] against
    /// every queue's member table and emitting `QueueMemberStatus` for every
    /// matching, unmasked member (spec §4.1). Scans queues rather than
    /// maintaining a device->member back-pointer graph (spec §9's design
    /// note on avoiding a cyclic membership graph); acceptable because this
    /// runs on the registry's own single-consumer fan-out task, never on a
    /// caller's hot path.
    pub async fn run_status_fanout(self: Arc<Self>, mut rx: tokio::sync::mpsc::UnboundedReceiver<DeviceStatusEvent>) {
        while let Some(event) = rx.recv().await {
            for name in self.names() {
                let Some(handle) = self.get(&name) else { continue };
                if handle.queue.mask_member_status_events {
                    continue;
                }
                let data = handle.data.lock().await;
                let matches: Vec<(String, bool)> = data
                    .members
                    .iter()
                    .filter(|m| m.device.key == event.key)
                    .map(|m| (m.interface.clone(), m.call_in_use))
                    .collect();
                drop(data);
                for (interface, call_in_use) in matches {
                    let effective = {
                        let Some(device) = self.devices.get(&event.key) else { continue };
                        device.effective_status(call_in_use)
                    };
                    self.events
                        .emit(
                            Event::new(EventKind::QueueMemberStatus)
                                .with("queue", &name)
                                .with("interface", &interface)
                                .with("status", format!("{effective:?}")),
                        )
                        .await;
                }
            }
        }
    }
}

/// Per-member slice of a [`QueueSnapshot`].
#[derive(Debug, Clone)]
pub struct MemberSnapshot {
    pub interface: String,
    pub penalty: i32,
    pub paused: bool,
    pub calls: u64,
    pub provenance: Provenance,
}

impl From<&Member> for MemberSnapshot {
    fn from(m: &Member) -> Self {
        Self {
            interface: m.interface.clone(),
            penalty: m.penalty,
            paused: m.paused,
            calls: m.calls,
            provenance: m.provenance,
        }
    }
}

/// Point-in-time view returned by the "show queue" management command
/// (spec §6), assembled from [`Queue`] identity and [`QueueData`] stats.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub name: String,
    pub strategy: RingStrategy,
    pub waiting: usize,
    pub holdtime: f64,
    pub talktime: f64,
    pub completed: u64,
    pub completed_in_sl: u64,
    pub abandoned: u64,
    pub members: Vec<MemberSnapshot>,
}
