//! Standalone demonstration of one caller flowing through the dispatch
//! core: join a `RingAll` queue with two members, have one answer, and
//! print the stats the engine recorded along the way.
//!
//! This binary supplies a toy [`Transport`]/[`PromptPlayer`] pair so the
//! crate can be exercised without a real SIP stack — production embedders
//! provide their own (spec §6's external-collaborator contracts).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use callqueue_engine::prelude::*;
use callqueue_engine::transport::{
    AocRateEntry, BridgeOptions, BridgeOutcome, ConnectedLineInfo, ControlEvent, Frame,
    IndicateKind, OutboundChannel, RedirectingInfo, RequestStatus,
};

/// A transport that answers exactly one scripted member interface on its
/// first poll and otherwise reports "still ringing" forever.
struct ScriptedTransport {
    winner: String,
    answered: AtomicBool,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        _tech: &str,
        location: &str,
        _formats: &[String],
        _originator: Option<&str>,
    ) -> std::result::Result<OutboundChannel, RequestStatus> {
        Ok(OutboundChannel(location.to_string()))
    }

    async fn call(&self, _channel: &OutboundChannel, _address: &str) -> callqueue_engine::error::Result<()> {
        Ok(())
    }

    async fn hangup(&self, channel: &OutboundChannel, answered_elsewhere: bool) {
        println!("  \u{1F4DE} hangup {} (answered_elsewhere={answered_elsewhere})", channel.0);
    }

    async fn wait_for_events(
        &self,
        channels: &[OutboundChannel],
        timeout: Duration,
    ) -> (Option<OutboundChannel>, Duration) {
        tokio::time::sleep(Duration::from_millis(30)).await;
        if !self.answered.swap(true, Ordering::SeqCst) {
            if let Some(winner) = channels.iter().find(|c| c.0 == self.winner) {
                return (Some(winner.clone()), timeout.saturating_sub(Duration::from_millis(30)));
            }
        }
        (None, timeout.saturating_sub(Duration::from_millis(30)))
    }

    async fn read(&self, channel: &OutboundChannel) -> Option<Frame> {
        if channel.0 == self.winner {
            Some(Frame::Control(ControlEvent::Answer))
        } else {
            None
        }
    }

    async fn indicate(&self, _channel: &OutboundChannel, _kind: IndicateKind) {}

    async fn bridge(&self, _caller: &OutboundChannel, peer: &OutboundChannel, _options: BridgeOptions) -> BridgeOutcome {
        println!("  \u{1F50C} bridged to {}", peer.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        BridgeOutcome::Normal
    }

    async fn apply_connected_line(&self, _caller: &OutboundChannel, _info: ConnectedLineInfo) {}
    async fn apply_redirecting(&self, _caller: &OutboundChannel, _info: RedirectingInfo) {}
    async fn present_aoc(&self, _caller: &OutboundChannel, _rates: &[AocRateEntry]) {}
}

struct SilentPromptPlayer;

#[async_trait]
impl PromptPlayer for SilentPromptPlayer {
    async fn play_file(&self, _channel: &OutboundChannel, _name: &str) -> Option<char> {
        None
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info,callqueue_engine=debug").init();

    println!("\u{1F680} Call-queue dispatch engine demo\n");

    let transport = Arc::new(ScriptedTransport { winner: "SIP/bob".to_string(), answered: AtomicBool::new(false) });
    let prompts = Arc::new(SilentPromptPlayer);
    let engine = QueueEngine::new(transport, prompts, None, None, EngineConfig::default());

    println!("\u{2699}\u{FE0F} Creating queue \"support\" (RingAll)...");
    let mut queue = Queue::new("support", RingStrategy::RingAll);
    queue.ring_timeout = Duration::from_secs(5);
    queue.retry_interval = Duration::from_secs(1);
    engine.add_queue(queue)?;
    println!("\u{2705} Queue ready\n");

    println!("\u{1F465} Adding members alice and bob...");
    engine
        .queues
        .add_member("support", "SIP/alice", "SIP/alice", 0, "Alice", false, true, Provenance::Static)
        .await?;
    engine
        .queues
        .add_member("support", "SIP/bob", "SIP/bob", 0, "Bob", false, true, Provenance::Static)
        .await?;
    println!("\u{2705} Members added\n");

    println!("\u{1F4DE} Caller C1 joins and is dispatched...");
    let caller_channel = OutboundChannel("SIP/caller-1".to_string());
    let options = DispatchOptions {
        caller_uid: "C1".to_string(),
        autofill: true,
        ..Default::default()
    };
    let outcome = engine.dispatcher.run(caller_channel, "support", options, None).await?;
    println!("\u{2705} Dispatch result: {outcome:?}\n");

    let snapshot = engine.queues.snapshot("support").await?;
    println!("\u{1F4CA} Queue stats: completed={} abandoned={} holdtime={:.1}s", snapshot.completed, snapshot.abandoned, snapshot.holdtime);
    for member in &snapshot.members {
        println!("   - {} calls={} paused={}", member.interface, member.calls, member.paused);
    }

    Ok(())
}
