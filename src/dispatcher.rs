//! Main per-caller orchestration loop (spec §4.4)
//!
//! `Dispatcher::run` drives one caller end-to-end: resolve the queue, insert
//! into its waiting list, wait for its turn, ring members, race the
//! outcome, and bridge. The caller's own async task is the sole mutator of
//! its `WaitingClient` for the lifetime of the call (spec §5); the entry is
//! briefly taken out of the shared waiting list while the head caller is
//! actively ringing, so the long-lived transport awaits in
//! [`crate::event_mux::race`] never hold `QueueData`'s lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::attempt::Attempt;
use crate::audit::{AuditLog, AuditRecord, AuditTag};
use crate::config::EngineConfig;
use crate::device::DeviceStatus;
use crate::error::{QueueEngineError, Result};
use crate::event_mux::{self, MuxOutcome, NextCandidateSource};
use crate::events::{Event, EventBus, EventKind};
use crate::member::Member;
use crate::queue::{AutopauseMode, QueueData, QueueHandle, QueueManager};
use crate::result::ExitResult;
use crate::ring_selector::{self, Candidate};
use crate::rules::RuleRegistry;
use crate::strategy::{EmptyCondition, RingStrategy};
use crate::transport::{OutboundChannel, PostConnectHook, PromptPlayer, Transport};
use crate::waiting_client::{ClientFlags, WaitingClient};

/// Per-call options accepted by [`Dispatcher::run`] (spec §4.4's `run`
/// signature, minus the channel/queue-name/hook which are separate params).
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub caller_uid: String,
    pub priority: i32,
    pub requested_position: Option<usize>,
    pub max_wait: Option<Duration>,
    pub rule_override: Option<String>,
    pub autofill: bool,
    pub flags: ClientFlags,
    /// Overrides `Queue::announce_file` for this one caller (spec §4.4's
    /// `run` signature's `announce_override` parameter).
    pub announce_override: Option<String>,
}

/// Drives callers through one or more named queues.
pub struct Dispatcher {
    queues: Arc<QueueManager>,
    rules: Arc<RuleRegistry>,
    transport: Arc<dyn Transport>,
    prompts: Arc<dyn PromptPlayer>,
    events: Arc<dyn EventBus>,
    audit: Arc<dyn AuditLog>,
    config: EngineConfig,
    next_client_id: AtomicU64,
}

const WAIT_TURN_POLL_INTERVAL: Duration = Duration::from_millis(250);

impl Dispatcher {
    pub fn new(
        queues: Arc<QueueManager>,
        rules: Arc<RuleRegistry>,
        transport: Arc<dyn Transport>,
        prompts: Arc<dyn PromptPlayer>,
        events: Arc<dyn EventBus>,
        audit: Arc<dyn AuditLog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            queues,
            rules,
            transport,
            prompts,
            events,
            audit,
            config,
            next_client_id: AtomicU64::new(1),
        }
    }

    /// Run one caller through `queue_name` end to end (spec §4.4).
    pub async fn run(
        &self,
        caller_channel: OutboundChannel,
        queue_name: &str,
        options: DispatchOptions,
        post_connect_hook: Option<&dyn PostConnectHook>,
    ) -> Result<ExitResult> {
        let handle = self.queues.get(queue_name).ok_or_else(|| QueueEngineError::queue_not_found(queue_name))?;

        // --- 1. Resolve ---
        {
            let data = handle.data.lock().await;
            if handle.queue.maxlen != 0 && data.waiting.len() >= handle.queue.maxlen {
                return Ok(ExitResult::Full);
            }
            let classification = empty_classification(&data, handle.queue.join_empty);
            drop(data);
            match classification {
                Some(Emptiness::Unavail) => {
                    self.audit.log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::ExitEmpty)).await;
                    return Ok(ExitResult::JoinUnavail);
                }
                Some(Emptiness::Predicate) => {
                    self.audit.log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::ExitEmpty)).await;
                    return Ok(ExitResult::JoinEmpty);
                }
                None => {}
            }
        }

        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let mut client = WaitingClient::new(id, queue_name, options.priority, now, options.max_wait);
        client.flags = options.flags;

        // --- 2. Insert ---
        let position = {
            let mut data = handle.data.lock().await;
            let position = data.waiting.insert(client, options.requested_position);
            data.count = data.waiting.len();
            position
        };
        debug!(queue = queue_name, caller_id = id, position, "caller joined");
        self.events.emit(Event::new(EventKind::Join).with("queue", queue_name).with("position", position)).await;
        self.audit
            .log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::EnterQueue).extra(position.to_string()))
            .await;

        let rule_name = options.rule_override.clone().unwrap_or_else(|| handle.queue.default_rule_name.clone());

        // --- 3. Wait-turn loop ---
        loop {
            let (is_our_turn, emptiness, expired, announce_file, periodic_file) = {
                let mut data = handle.data.lock().await;
                self.apply_rule_cursor(&mut data, id, &rule_name);
                let now = Instant::now();
                let available = data.available_member_count();
                let is_head = data.waiting.within_front(id, 1);
                let is_our_turn = if options.autofill {
                    data.waiting.within_front(id, available.max(1))
                } else {
                    is_head
                };
                let emptiness = empty_classification(&data, handle.queue.leave_empty);
                let expired = data.waiting.get(id).map(|c| c.has_expired(now)).unwrap_or(true);
                let (announce_file, periodic_file) = self.due_announces(&handle, &mut data, id, &options, now);
                (is_our_turn, emptiness, expired, announce_file, periodic_file)
            };

            if let Some(kind) = emptiness {
                self.leave(&handle, id).await;
                self.audit.log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::ExitEmpty)).await;
                return Ok(match kind {
                    Emptiness::Unavail => ExitResult::LeaveUnavail,
                    Emptiness::Predicate => ExitResult::LeaveEmpty,
                });
            }
            if expired {
                self.leave(&handle, id).await;
                return Ok(ExitResult::Timeout);
            }

            // Announce schedule (spec §4.4 step 3): played outside the data
            // lock since prompt playback blocks the caller task.
            for file in announce_file.into_iter().chain(periodic_file) {
                if let Some(digit) = self.prompts.play_file(&caller_channel, &file).await {
                    self.leave(&handle, id).await;
                    self.audit
                        .log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::ExitWithKey).extra(digit.to_string()))
                        .await;
                    return Ok(ExitResult::Continue);
                }
            }

            if is_our_turn {
                break;
            }

            let (ready, _remaining) = self.transport.wait_for_events(&[caller_channel.clone()], WAIT_TURN_POLL_INTERVAL).await;
            if ready.is_some() {
                match self.transport.read(&caller_channel).await {
                    None => {
                        self.abandon(&handle, id, &options.caller_uid).await;
                        return Ok(ExitResult::Unknown);
                    }
                    Some(crate::transport::Frame::Dtmf(digit)) => {
                        self.leave(&handle, id).await;
                        self.audit
                            .log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::ExitWithKey).extra(digit.to_string()))
                            .await;
                        return Ok(ExitResult::Continue);
                    }
                    _ => {}
                }
            }
        }

        // --- 4/5. Ring loop + Bridge ---
        let Some(mut client) = ({
            let mut data = handle.data.lock().await;
            data.waiting.remove_by_id(id)
        }) else {
            return Err(QueueEngineError::orchestration("caller vanished from waiting list at head"));
        };

        let ring_timeout = handle.queue.ring_timeout;
        let mut remaining = ring_timeout;
        let result = loop {
            self.ring_one(&handle, &mut client).await;

            {
                let mut data = handle.data.lock().await;
                self.apply_rule_cursor_on(&mut data, &mut client, &rule_name);
                if let Some(kind) = empty_classification(&data, handle.queue.leave_empty) {
                    data.waiting.insert(client, None);
                    drop(data);
                    self.audit.log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::ExitEmpty)).await;
                    return Ok(match kind {
                        Emptiness::Unavail => ExitResult::LeaveUnavail,
                        Emptiness::Predicate => ExitResult::LeaveEmpty,
                    });
                }
            }

            let adapter = RingNextAdapter { dispatcher: self, handle: &handle };
            let mux = event_mux::race(
                self.transport.as_ref(),
                &caller_channel,
                &mut client,
                handle.queue.strategy,
                Some(&adapter),
                ring_timeout,
                remaining,
            )
            .await;
            remaining = mux.remaining;

            for retirement in &mux.retirements {
                self.audit
                    .log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::RingNoAnswer).agent(&retirement.interface))
                    .await;
                self.events
                    .emit(Event::new(EventKind::AgentRingNoAnswer).with("queue", queue_name).with("interface", &retirement.interface))
                    .await;
                self.maybe_autopause(&handle, &retirement.interface).await;
            }

            match mux.outcome {
                MuxOutcome::Answered(interface) => break BridgeOutcomeKind::Answered(interface),
                MuxOutcome::CallerHangup => break BridgeOutcomeKind::Abandoned,
                MuxOutcome::CallerDisconnect => break BridgeOutcomeKind::Disconnected,
                MuxOutcome::CallerDigit(digit) => break BridgeOutcomeKind::ExitKey(digit),
                MuxOutcome::TimedOut => {
                    if remaining.is_zero() {
                        break BridgeOutcomeKind::TimedOut;
                    }
                    // Sleep the retry interval, interruptible by caller DTMF.
                    let (woke, _) = self
                        .transport
                        .wait_for_events(&[caller_channel.clone()], handle.queue.retry_interval.min(remaining))
                        .await;
                    remaining = remaining.saturating_sub(handle.queue.retry_interval);
                    if woke.is_some() {
                        if matches!(self.transport.read(&caller_channel).await, None) {
                            break BridgeOutcomeKind::Abandoned;
                        }
                    }
                }
            }
        };

        match result {
            BridgeOutcomeKind::Answered(interface) => {
                let retired = client.attempts.retire_losers(&interface);
                for loser in retired {
                    if let Some(attempt) = client.attempts.get(&loser) {
                        if let Some(channel) = &attempt.channel {
                            self.transport.hangup(channel, client.flags.cancel_elsewhere).await;
                        }
                    }
                }

                let winner_channel = client.attempts.get(&interface).and_then(|a| a.channel.clone());
                if let Some(channel) = &winner_channel {
                    if let Some(hook) = post_connect_hook {
                        let _ = hook.run(&interface, channel).await;
                    }
                }

                info!(queue = queue_name, caller_id = id, interface = %interface, "caller connected");
                self.audit.log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::Connect).agent(&interface)).await;
                self.events.emit(Event::new(EventKind::AgentConnect).with("queue", queue_name).with("interface", &interface)).await;

                let hold_secs = client.elapsed(Instant::now()).as_secs();
                let bridge_start = Instant::now();
                if let Some(channel) = winner_channel {
                    self.transport.bridge(&caller_channel, &channel, Default::default()).await;
                }
                let talk_secs = bridge_start.elapsed().as_secs();

                {
                    let mut data = handle.data.lock().await;
                    let in_sl = Duration::from_secs(hold_secs) < handle.queue.service_level;
                    data.record_completion(round_holdtime(hold_secs, handle.queue.holdtime_rounding_seconds), talk_secs, in_sl);
                    if let Some(member) = data.members.get_mut(&interface) {
                        member.calls += 1;
                        member.last_call_end = Some(Instant::now());
                    }
                }
                self.audit.log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::CompleteCaller).agent(&interface)).await;
                self.audit.log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::CompleteAgent).agent(&interface)).await;
                self.events.emit(Event::new(EventKind::AgentComplete).with("queue", queue_name).with("interface", &interface)).await;
                Ok(ExitResult::Continue)
            }
            BridgeOutcomeKind::Abandoned => {
                self.hangup_all_attempts(&mut client).await;
                let mut data = handle.data.lock().await;
                data.record_abandon();
                drop(data);
                self.audit
                    .log(
                        AuditRecord::new(queue_name, &options.caller_uid, AuditTag::Abandon)
                            .extra(client.position.to_string())
                            .extra(client.original_position.to_string()),
                    )
                    .await;
                self.events.emit(Event::new(EventKind::QueueCallerAbandon).with("queue", queue_name)).await;
                Ok(ExitResult::Unknown)
            }
            BridgeOutcomeKind::Disconnected => {
                self.hangup_all_attempts(&mut client).await;
                Ok(ExitResult::Continue)
            }
            BridgeOutcomeKind::ExitKey(digit) => {
                self.hangup_all_attempts(&mut client).await;
                self.audit
                    .log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::ExitWithKey).extra(digit.to_string()))
                    .await;
                Ok(ExitResult::Continue)
            }
            BridgeOutcomeKind::TimedOut => {
                self.hangup_all_attempts(&mut client).await;
                warn!(queue = queue_name, caller_id = id, "caller timed out unanswered");
                self.audit.log(AuditRecord::new(queue_name, &options.caller_uid, AuditTag::ExitWithTimeout)).await;
                Ok(ExitResult::Timeout)
            }
        }
    }

    async fn leave(&self, handle: &QueueHandle, id: u64) {
        let mut data = handle.data.lock().await;
        data.waiting.remove_by_id(id);
        data.count = data.waiting.len();
        drop(data);
        self.events.emit(Event::new(EventKind::Leave).with("queue", &handle.queue.name)).await;
    }

    async fn abandon(&self, handle: &QueueHandle, id: u64, caller_uid: &str) {
        let mut data = handle.data.lock().await;
        if data.waiting.remove_by_id(id).is_some() {
            data.record_abandon();
        }
        drop(data);
        self.audit.log(AuditRecord::new(&handle.queue.name, caller_uid, AuditTag::Abandon)).await;
    }

    /// Which announce prompt(s), if any, are due this tick (spec §4.4 step
    /// 3's "announce schedule" and "periodic announce schedule"). Returns
    /// `(join_announce, periodic_announce)` file names; advances the
    /// client's cursors as a side effect so a prompt fires at most once per
    /// configured frequency.
    fn due_announces(
        &self,
        handle: &QueueHandle,
        data: &mut QueueData,
        id: u64,
        options: &DispatchOptions,
        now: Instant,
    ) -> (Option<String>, Option<String>) {
        let Some(client) = data.waiting.get_mut(id) else {
            return (None, None);
        };

        let mut announce = None;
        if !handle.queue.announce_frequency.is_zero() {
            let due = match client.last_announce {
                None => true,
                Some(last) => now.saturating_duration_since(last) >= handle.queue.announce_frequency,
            };
            if due {
                client.last_announce = Some(now);
                announce = Some(
                    options
                        .announce_override
                        .clone()
                        .or_else(|| handle.queue.announce_file.clone())
                        .unwrap_or_else(|| "queue-thereare".to_string()),
                );
            }
        }

        let mut periodic = None;
        if !handle.queue.periodic_announce_frequency.is_zero() && !handle.queue.periodic_announce_list.is_empty() {
            let due = match client.last_periodic_announce {
                None => true,
                Some(last) => now.saturating_duration_since(last) >= handle.queue.periodic_announce_frequency,
            };
            if due {
                client.last_periodic_announce = Some(now);
                let list = &handle.queue.periodic_announce_list;
                let idx = client.periodic_announce_index % list.len();
                periodic = Some(list[idx].clone());
                client.periodic_announce_index = (idx + 1) % list.len();
            }
        }

        (announce, periodic)
    }

    fn apply_rule_cursor(&self, data: &mut QueueData, id: u64, rule_name: &str) {
        if let Some(client) = data.waiting.get_mut(id) {
            self.apply_rule_cursor_on_client(client, rule_name);
        }
    }

    fn apply_rule_cursor_on(&self, _data: &mut QueueData, client: &mut WaitingClient, rule_name: &str) {
        self.apply_rule_cursor_on_client(client, rule_name);
    }

    fn apply_rule_cursor_on_client(&self, client: &mut WaitingClient, rule_name: &str) {
        let Some(rule_set) = self.rules.get(rule_name) else { return };
        let elapsed = client.elapsed(Instant::now()).as_secs();
        if let Some((idx, rule)) = rule_set.best_rule_after(elapsed) {
            if client.rule_cursor != Some(idx) {
                let (min, max) = rule.apply(client.min_penalty, client.max_penalty);
                client.min_penalty = min;
                client.max_penalty = max;
                client.rule_cursor = Some(idx);
            }
        }
    }

    async fn hangup_all_attempts(&self, client: &mut WaitingClient) {
        let interfaces: Vec<String> = client.attempts.still_going().map(|a| a.member_interface.clone()).collect();
        for interface in interfaces {
            if let Some(attempt) = client.attempts.get_mut(&interface) {
                if let Some(channel) = attempt.channel.clone() {
                    self.transport.hangup(&channel, client.flags.cancel_elsewhere).await;
                }
                attempt.retire();
            }
        }
    }

    async fn maybe_autopause(&self, handle: &QueueHandle, interface: &str) {
        match handle.queue.autopause {
            AutopauseMode::Off => {}
            AutopauseMode::Yes => {
                let _ = self.queues.set_paused(&handle.queue.name, interface, true).await;
            }
            AutopauseMode::All => {
                for name in self.queues.names() {
                    if let Some(other) = self.queues.get(&name) {
                        let belongs = other.data.lock().await.members.get(interface).is_some();
                        if belongs {
                            let _ = self.queues.set_paused(&name, interface, true).await;
                        }
                    }
                }
            }
        }
    }

    /// One ring round: build candidates, select per strategy, attempt each,
    /// update cursors (spec §4.3, §4.4's `ring_one`).
    async fn ring_one(&self, handle: &QueueHandle, client: &mut WaitingClient) {
        let now = Instant::now();
        let mut rng = rand::thread_rng();
        let candidates = {
            let data = handle.data.lock().await;
            ring_selector::compute_candidates(&handle.queue, &data, client, &mut rng, now)
        };
        let selected: Vec<Candidate> = ring_selector::select_round(handle.queue.strategy, &candidates).into_iter().cloned().collect();

        let mut started = 0usize;
        for candidate in &selected {
            if self.ring_entry(handle, client, candidate).await {
                started += 1;
            }
        }
        let result = match selected.first() {
            Some(candidate) if started > 0 => ring_selector::RoundResult::Started(candidate),
            Some(candidate) => ring_selector::RoundResult::RequestFailed(candidate),
            None => ring_selector::RoundResult::NoCandidates,
        };
        self.advance_cursors(handle, client, result).await;
    }

    async fn advance_cursors(&self, handle: &QueueHandle, client: &mut WaitingClient, result: ring_selector::RoundResult<'_>) {
        match handle.queue.strategy {
            RingStrategy::Linear => {
                let update = ring_selector::advance_cursor(client.linear_cursor, client.linear_wrapped, result);
                client.linear_cursor = update.new_cursor;
                client.linear_wrapped = update.wrapped;
            }
            RingStrategy::RRMemory | RingStrategy::RROrdered => {
                let mut data = handle.data.lock().await;
                let update = ring_selector::advance_cursor(data.rr_pos, data.rr_wrapped, result);
                data.rr_pos = update.new_cursor;
                data.rr_wrapped = update.wrapped;
            }
            _ => {}
        }
    }

    /// `ring_entry` precondition checks + device reservation + transport
    /// request/call (spec §4.4).
    async fn ring_entry(&self, handle: &QueueHandle, client: &mut WaitingClient, candidate: &Candidate) -> bool {
        if self.weight_preempted(handle, &candidate.interface).await {
            return false;
        }

        let now = Instant::now();
        let precheck = {
            let data = handle.data.lock().await;
            data.members.get(&candidate.interface).map(|m| (m.paused, m.wrapup_elapsed(now), m.call_in_use))
        };
        let Some((paused, wrapup_ok, call_in_use)) = precheck else { return false };
        if paused || !wrapup_ok {
            return false;
        }

        let status = candidate.device.effective_status(call_in_use);
        let device_ok = matches!(status, DeviceStatus::NotInUse | DeviceStatus::Unknown)
            || (handle.queue.ringinuse
                && call_in_use
                && matches!(status, DeviceStatus::InUse | DeviceStatus::Ringing | DeviceStatus::RingInUse | DeviceStatus::OnHold));
        if !device_ok {
            return false;
        }

        let mut attempt = Attempt::new(candidate.interface.clone(), candidate.device.clone(), candidate.metric);
        attempt.reserve_device();

        match self.transport.request("", &candidate.interface, &[], None).await {
            Ok(channel) => {
                if self.transport.call(&channel, &candidate.interface).await.is_ok() {
                    attempt.channel = Some(channel);
                    client.record_dialed(&candidate.interface);
                    client.attempts.insert(attempt);
                    self.events
                        .emit(Event::new(EventKind::AgentCalled).with("queue", &handle.queue.name).with("interface", &candidate.interface))
                        .await;
                    true
                } else {
                    self.transport.hangup(&channel, false).await;
                    false
                }
            }
            Err(_status) => false,
        }
    }

    async fn weight_preempted(&self, handle: &QueueHandle, interface: &str) -> bool {
        for name in self.queues.names() {
            if name == handle.queue.name {
                continue;
            }
            let Some(other) = self.queues.get(&name) else { continue };
            if other.queue.weight <= handle.queue.weight {
                continue;
            }
            let data = other.data.lock().await;
            if data.members.get(interface).is_some() && data.waiting.len() >= data.available_member_count() {
                return true;
            }
        }
        false
    }

    /// Ring a single fresh candidate mid-round (spec §4.5's immediate
    /// redial on busy/congestion with time remaining).
    async fn ring_next_candidate(&self, handle: &QueueHandle, client: &mut WaitingClient) -> Option<String> {
        let now = Instant::now();
        let mut rng = rand::thread_rng();
        let mut candidates = {
            let data = handle.data.lock().await;
            ring_selector::compute_candidates(&handle.queue, &data, client, &mut rng, now)
        };
        candidates.retain(|c| client.attempts.get(&c.interface).is_none());
        let chosen = ring_selector::select_round(handle.queue.strategy, &candidates).first().cloned().cloned()?;
        if self.ring_entry(handle, client, &chosen).await {
            Some(chosen.interface)
        } else {
            None
        }
    }
}

struct RingNextAdapter<'a> {
    dispatcher: &'a Dispatcher,
    handle: &'a QueueHandle,
}

#[async_trait]
impl<'a> NextCandidateSource for RingNextAdapter<'a> {
    async fn ring_next(&self, client: &mut WaitingClient) -> Option<String> {
        self.dispatcher.ring_next_candidate(self.handle, client).await
    }
}

enum BridgeOutcomeKind {
    Answered(String),
    Abandoned,
    Disconnected,
    ExitKey(char),
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emptiness {
    /// No members at all (or none reachable): `*Unavail` results.
    Unavail,
    /// Members exist but every one matches the configured empty-condition
    /// mask: `*Empty` results.
    Predicate,
}

fn empty_classification(data: &QueueData, condition: EmptyCondition) -> Option<Emptiness> {
    if data.members.is_empty() {
        return Some(Emptiness::Unavail);
    }
    if condition.is_empty() {
        return None;
    }
    if data.members.iter().all(|m| member_matches_empty_condition(m, condition)) {
        Some(Emptiness::Predicate)
    } else {
        None
    }
}

fn member_matches_empty_condition(member: &Member, condition: EmptyCondition) -> bool {
    if condition.contains(EmptyCondition::PAUSED) && member.paused {
        return true;
    }
    if condition.contains(EmptyCondition::PENALTY) && member.penalty < 0 {
        return true;
    }
    let status = member.device.status();
    if condition.contains(EmptyCondition::INUSE) && member.call_in_use && matches!(status, DeviceStatus::InUse) {
        return true;
    }
    if condition.contains(EmptyCondition::RINGING) && matches!(status, DeviceStatus::Ringing | DeviceStatus::RingInUse) {
        return true;
    }
    if condition.contains(EmptyCondition::UNAVAILABLE) && matches!(status, DeviceStatus::Unavailable) {
        return true;
    }
    if condition.contains(EmptyCondition::INVALID) && matches!(status, DeviceStatus::Invalid) {
        return true;
    }
    if condition.contains(EmptyCondition::UNKNOWN) && matches!(status, DeviceStatus::Unknown) {
        return true;
    }
    if condition.contains(EmptyCondition::WRAPUP) && !member.wrapup_elapsed(Instant::now()) {
        return true;
    }
    false
}

fn round_holdtime(secs: u64, rounding: u64) -> u64 {
    if rounding == 0 {
        secs
    } else {
        (secs / rounding) * rounding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_classification_distinguishes_unavail_from_predicate() {
        let data = QueueData::new();
        assert_eq!(empty_classification(&data, EmptyCondition::default()), Some(Emptiness::Unavail));
    }

    #[test]
    fn holdtime_rounding_floors_to_nearest_bucket() {
        assert_eq!(round_holdtime(47, 10), 40);
        assert_eq!(round_holdtime(47, 0), 47);
    }
}
