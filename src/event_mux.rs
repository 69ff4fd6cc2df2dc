//! Multiplexes the caller channel and outbound attempt channels (spec §4.5)
//!
//! One [`race`] call services every ready channel in the watch set per wake,
//! applies the multiplex semantics spec §4.5 describes (forward honoring,
//! pending-vs-immediate connected-line/redirecting updates, AOC accrual,
//! autopause-worthy retirements), and returns either a winning attempt or a
//! caller-side event.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::AttemptFailure;
use crate::strategy::RingStrategy;
use crate::transport::{ControlEvent, Frame, IndicateKind, OutboundChannel, Transport};
use crate::waiting_client::WaitingClient;

/// Terminal outcome of one [`race`] invocation.
#[derive(Debug, Clone)]
pub enum MuxOutcome {
    /// An attempt answered; carries its member interface.
    Answered(String),
    /// The caller hung up.
    CallerHangup,
    /// The caller pressed the disconnect digit (`*`, when permitted).
    CallerDisconnect,
    /// The caller pressed a digit that should be treated as an exit key.
    CallerDigit(char),
    /// The remaining timeout elapsed with nobody answering.
    TimedOut,
}

/// One attempt's retirement, surfaced so the Dispatcher can decide on
/// autopause policy and emit `RINGNOANSWER`/busy audit records (spec §4.5,
/// §8 property 10) without `EventMux` itself needing the queue registry.
#[derive(Debug, Clone)]
pub struct Retirement {
    pub interface: String,
    pub reason: AttemptFailure,
}

#[derive(Debug)]
pub struct MuxResult {
    pub outcome: MuxOutcome,
    pub retirements: Vec<Retirement>,
    pub remaining: Duration,
}

/// Hook back into the Dispatcher's `ring_entry` so `EventMux` can honor
/// "if the strategy is not RingAll and > 500 ms remain, immediately ring the
/// next best candidate" (spec §4.5) without owning the member table, device
/// registry, or `RingSelector` itself.
#[async_trait]
pub trait NextCandidateSource: Send + Sync {
    async fn ring_next(&self, client: &mut WaitingClient) -> Option<String>;
}

/// Below this much remaining timeout, a busy/congestion retirement does not
/// trigger an immediate next-candidate ring (spec §4.5).
const IMMEDIATE_REDIAL_THRESHOLD: Duration = Duration::from_millis(500);

/// Race the caller's channel against every still-going attempt in
/// `client.attempts` until one answers, the caller exits, or `ring_timeout`
/// elapses.
pub async fn race(
    transport: &dyn Transport,
    caller_channel: &OutboundChannel,
    client: &mut WaitingClient,
    strategy: RingStrategy,
    next_candidate: Option<&dyn NextCandidateSource>,
    ring_timeout: Duration,
    mut remaining: Duration,
) -> MuxResult {
    let mut retirements = Vec::new();

    loop {
        let watch: Vec<OutboundChannel> = client.attempts.still_going().filter_map(|a| a.channel.clone()).collect();
        if watch.is_empty() {
            return MuxResult { outcome: MuxOutcome::TimedOut, retirements, remaining };
        }
        let mut all = watch.clone();
        all.push(caller_channel.clone());

        let (ready, after) = transport.wait_for_events(&all, remaining).await;
        remaining = after;
        let Some(ready_channel) = ready else {
            return MuxResult { outcome: MuxOutcome::TimedOut, retirements, remaining };
        };

        if ready_channel == *caller_channel {
            match transport.read(caller_channel).await {
                None => return MuxResult { outcome: MuxOutcome::CallerHangup, retirements, remaining },
                Some(Frame::Control(ControlEvent::Hangup(_))) => {
                    return MuxResult { outcome: MuxOutcome::CallerHangup, retirements, remaining };
                }
                Some(Frame::Dtmf('*')) if client.flags.allow_disconnect => {
                    return MuxResult { outcome: MuxOutcome::CallerDisconnect, retirements, remaining };
                }
                Some(Frame::Dtmf(digit)) => {
                    return MuxResult { outcome: MuxOutcome::CallerDigit(digit), retirements, remaining };
                }
                _ => continue,
            }
        }

        let Some(interface) = client
            .attempts
            .iter()
            .find(|a| a.channel.as_ref() == Some(&ready_channel))
            .map(|a| a.member_interface.clone())
        else {
            continue;
        };

        let frame = transport.read(&ready_channel).await;
        let mut retired_this_wake = false;

        match frame {
            Some(Frame::Control(ControlEvent::Answer)) => {
                if let Some(attempt) = client.attempts.get_mut(&interface) {
                    attempt.mark_won();
                    if let Some(info) = attempt.pending_connected_update.take() {
                        transport.apply_connected_line(caller_channel, info).await;
                    }
                    if let Some(info) = attempt.pending_redirecting_update.take() {
                        transport.apply_redirecting(caller_channel, info).await;
                    }
                    if !attempt.aoc_rates.is_empty() {
                        transport.present_aoc(caller_channel, &attempt.aoc_rates).await;
                    }
                }
                return MuxResult { outcome: MuxOutcome::Answered(interface), retirements, remaining };
            }
            Some(Frame::Control(ControlEvent::Busy)) | Some(Frame::Control(ControlEvent::Congestion)) => {
                let reason = if matches!(frame, Some(Frame::Control(ControlEvent::Congestion))) {
                    AttemptFailure::Congestion
                } else {
                    AttemptFailure::Busy
                };
                if let Some(attempt) = client.attempts.get_mut(&interface) {
                    attempt.retire();
                }
                retirements.push(Retirement { interface: interface.clone(), reason });
                retired_this_wake = true;
                debug!(interface = %interface, ?reason, "attempt retired");

                if strategy != RingStrategy::RingAll && remaining > IMMEDIATE_REDIAL_THRESHOLD {
                    if let Some(source) = next_candidate {
                        if let Some(new_interface) = source.ring_next(client).await {
                            trace!(interface = %new_interface, "immediately rang next candidate");
                        }
                    }
                }
            }
            Some(Frame::Control(ControlEvent::Ringing)) => {
                if client.flags.ring_when_ringing {
                    transport.indicate(caller_channel, IndicateKind::StopRinging).await;
                    transport.indicate(caller_channel, IndicateKind::Ringing).await;
                }
            }
            Some(Frame::Control(ControlEvent::CallForward(destination))) => {
                if client.flags.allow_forwarding && !client.has_dialed(&destination) {
                    honor_forward(transport, client, &interface, &destination).await;
                } else {
                    if let Some(attempt) = client.attempts.get_mut(&interface) {
                        attempt.retire();
                    }
                    retirements.push(Retirement { interface: interface.clone(), reason: AttemptFailure::ForwardDisallowed });
                    retired_this_wake = true;
                }
            }
            Some(Frame::Control(ControlEvent::ConnectedLineUpdate(info))) => {
                if strategy == RingStrategy::RingAll {
                    if let Some(attempt) = client.attempts.get_mut(&interface) {
                        attempt.pending_connected_update = Some(info);
                    }
                } else {
                    transport.apply_connected_line(caller_channel, info).await;
                }
            }
            Some(Frame::Control(ControlEvent::Redirecting(info))) => {
                if strategy == RingStrategy::RingAll {
                    if let Some(attempt) = client.attempts.get_mut(&interface) {
                        attempt.pending_redirecting_update = Some(info);
                    }
                } else {
                    transport.apply_redirecting(caller_channel, info).await;
                }
            }
            Some(Frame::Control(ControlEvent::Aoc(rates))) => {
                if let Some(attempt) = client.attempts.get_mut(&interface) {
                    attempt.aoc_rates.extend(rates);
                }
            }
            Some(Frame::Control(ControlEvent::Hangup(_))) => {
                if let Some(attempt) = client.attempts.get_mut(&interface) {
                    attempt.retire();
                }
                retirements.push(Retirement { interface: interface.clone(), reason: AttemptFailure::RequestFailed });
                retired_this_wake = true;
            }
            Some(Frame::Control(ControlEvent::OffHook)) | Some(Frame::Voice) | Some(Frame::Dtmf(_)) | None => {}
        }

        if retired_this_wake && client.flags.restart_timeout_on_ring {
            remaining = ring_timeout;
        }
    }
}

/// Honor a call-forward: request+call the forwarded destination, inheriting
/// dialed-interface tracking so repeated forwards can't loop (spec §4.4
/// step 4, spec §9's dial-forward loop prevention design note).
async fn honor_forward(transport: &dyn Transport, client: &mut WaitingClient, losing_interface: &str, destination: &str) {
    client.record_dialed(destination);
    let (tech, location) = destination.split_once('/').unwrap_or(("Local", destination));
    match transport.request(tech, location, &[], None).await {
        Ok(channel) => {
            if transport.call(&channel, destination).await.is_ok() {
                if let Some(attempt) = client.attempts.get_mut(losing_interface) {
                    attempt.channel = Some(channel);
                    attempt.still_going = true;
                }
            } else {
                transport.hangup(&channel, false).await;
            }
        }
        Err(_status) => {
            // Forward target unreachable; the original attempt stays retired.
        }
    }
}
