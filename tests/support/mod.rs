//! A scripted [`Transport`] double for the scenario tests in
//! `tests/integration_tests.rs` (spec §8's S1-S6, plus the weight-preemption
//! and realtime-reconcile properties). Not part of the library — a real
//! channel driver is an external collaborator (spec §1).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use callqueue_engine::audit::{AuditLog, AuditRecord};
use callqueue_engine::error::Result;
use callqueue_engine::events::{Event, EventBus};
use callqueue_engine::transport::{
    AocRateEntry, BridgeOptions, BridgeOutcome, ConnectedLineInfo, ControlEvent, Frame,
    IndicateKind, OutboundChannel, PromptPlayer, RedirectingInfo, RequestStatus, Transport,
};

/// Name given to the caller's own channel across every scenario test, so the
/// double can special-case it without threading an extra parameter through.
pub const CALLER: &str = "CALLER";

#[derive(Clone, Copy)]
pub enum Outcome {
    AnswerAfter(Duration),
    BusyAfter(Duration),
    CongestionAfter(Duration),
    NeverAnswers,
}

/// A deterministic, scripted outbound-channel driver.
///
/// Each interface gets one scripted [`Outcome`] applied `after` a relative
/// delay measured from when that interface was first `request`ed. The
/// caller channel can optionally hang up after a fixed delay from
/// construction.
pub struct SimulatedTransport {
    script: Mutex<HashMap<String, Outcome>>,
    started: Mutex<HashMap<String, Instant>>,
    requested: Mutex<Vec<String>>,
    hangups: Mutex<Vec<(String, bool)>>,
    bridged: Mutex<Option<String>>,
    caller_hangs_up_after: Option<Duration>,
    built_at: Instant,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            started: Mutex::new(HashMap::new()),
            requested: Mutex::new(Vec::new()),
            hangups: Mutex::new(Vec::new()),
            bridged: Mutex::new(None),
            caller_hangs_up_after: None,
            built_at: Instant::now(),
        }
    }

    pub fn script(self, interface: &str, outcome: Outcome) -> Self {
        self.script.lock().unwrap().insert(interface.to_string(), outcome);
        self
    }

    pub fn caller_hangs_up_after(mut self, delay: Duration) -> Self {
        self.caller_hangs_up_after = Some(delay);
        self
    }

    pub fn requested_interfaces(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn hangups(&self) -> Vec<(String, bool)> {
        self.hangups.lock().unwrap().clone()
    }

    pub fn bridged_to(&self) -> Option<String> {
        self.bridged.lock().unwrap().clone()
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn request(
        &self,
        _tech: &str,
        location: &str,
        _formats: &[String],
        _originator: Option<&str>,
    ) -> std::result::Result<OutboundChannel, RequestStatus> {
        self.requested.lock().unwrap().push(location.to_string());
        self.started.lock().unwrap().entry(location.to_string()).or_insert_with(Instant::now);
        Ok(OutboundChannel(location.to_string()))
    }

    async fn call(&self, _channel: &OutboundChannel, _address: &str) -> Result<()> {
        Ok(())
    }

    async fn hangup(&self, channel: &OutboundChannel, answered_elsewhere: bool) {
        self.hangups.lock().unwrap().push((channel.0.clone(), answered_elsewhere));
    }

    async fn wait_for_events(&self, channels: &[OutboundChannel], timeout: Duration) -> (Option<OutboundChannel>, Duration) {
        tokio::time::sleep(Duration::from_millis(15)).await;
        let remaining = timeout.saturating_sub(Duration::from_millis(15));

        if let Some(hangup_after) = self.caller_hangs_up_after {
            if self.built_at.elapsed() >= hangup_after {
                if let Some(caller) = channels.iter().find(|c| c.0 == CALLER) {
                    return (Some(caller.clone()), remaining);
                }
            }
        }

        let started = self.started.lock().unwrap();
        let script = self.script.lock().unwrap();
        for channel in channels {
            if channel.0 == CALLER {
                continue;
            }
            if let (Some(outcome), Some(start)) = (script.get(&channel.0), started.get(&channel.0)) {
                let due = match outcome {
                    Outcome::AnswerAfter(d) | Outcome::BusyAfter(d) | Outcome::CongestionAfter(d) => start.elapsed() >= *d,
                    Outcome::NeverAnswers => false,
                };
                if due {
                    return (Some(channel.clone()), remaining);
                }
            }
        }
        (None, remaining)
    }

    async fn read(&self, channel: &OutboundChannel) -> Option<Frame> {
        if channel.0 == CALLER {
            return Some(Frame::Control(ControlEvent::Hangup("caller".to_string())));
        }
        let script = self.script.lock().unwrap();
        match script.get(&channel.0) {
            Some(Outcome::AnswerAfter(_)) => Some(Frame::Control(ControlEvent::Answer)),
            Some(Outcome::BusyAfter(_)) => Some(Frame::Control(ControlEvent::Busy)),
            Some(Outcome::CongestionAfter(_)) => Some(Frame::Control(ControlEvent::Congestion)),
            _ => None,
        }
    }

    async fn indicate(&self, _channel: &OutboundChannel, _kind: IndicateKind) {}

    async fn bridge(&self, _caller: &OutboundChannel, peer: &OutboundChannel, _options: BridgeOptions) -> BridgeOutcome {
        *self.bridged.lock().unwrap() = Some(peer.0.clone());
        BridgeOutcome::Normal
    }

    async fn apply_connected_line(&self, _caller: &OutboundChannel, _info: ConnectedLineInfo) {}
    async fn apply_redirecting(&self, _caller: &OutboundChannel, _info: RedirectingInfo) {}
    async fn present_aoc(&self, _caller: &OutboundChannel, _rates: &[AocRateEntry]) {}
}

/// A prompt player that never has anything queued to play; every scenario
/// test disables announce frequencies, so this is never actually invoked.
pub struct SilentPromptPlayer;

#[async_trait]
impl PromptPlayer for SilentPromptPlayer {
    async fn play_file(&self, _channel: &OutboundChannel, _name: &str) -> Option<char> {
        None
    }
}

/// Captures every [`AuditRecord`] logged during a test, so assertions can
/// check which tags fired (and in what order) without parsing a log stream.
#[derive(Default)]
pub struct RecordingAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(&self) -> Vec<String> {
        self.records.lock().unwrap().iter().map(|r| r.tag.as_str().to_string()).collect()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn log(&self, record: AuditRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Captures every [`Event`] emitted during a test.
#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| format!("{:?}", e.kind)).collect()
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
