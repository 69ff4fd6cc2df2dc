//! External collaborator contracts: channel driver, prompt player, KV store
//!
//! These traits are the narrow interfaces the dispatch core consumes (spec
//! §6). Implementations — the real SIP/channel driver, audio player, and
//! persistent store — are external collaborators and are deliberately not
//! part of this crate (spec §1). A test double implementing [`Transport`]
//! lives under `tests/support` for the scenario tests in spec §8.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Opaque handle to an outbound channel allocated by [`Transport::request`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutboundChannel(pub String);

/// Connected-line party data carried on a `ConnectedLineUpdate` control event.
#[derive(Debug, Clone, Default)]
pub struct ConnectedLineInfo {
    pub number: Option<String>,
    pub name: Option<String>,
}

/// Redirecting-party data carried on a `Redirecting` control event.
#[derive(Debug, Clone, Default)]
pub struct RedirectingInfo {
    pub reason: Option<String>,
    pub from_number: Option<String>,
}

/// One Advice-of-Charge "S-type" rate entry.
#[derive(Debug, Clone)]
pub struct AocRateEntry {
    pub currency: String,
    pub amount: f64,
    pub multiplier: f64,
}

/// Status returned by a failed [`Transport::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Failed,
    Congested,
    Invalid,
}

/// One control-plane event delivered over a channel (spec §6's Control kinds).
#[derive(Debug, Clone)]
pub enum ControlEvent {
    Answer,
    Busy,
    Congestion,
    Ringing,
    Hangup(String),
    OffHook,
    ConnectedLineUpdate(ConnectedLineInfo),
    Redirecting(RedirectingInfo),
    CallForward(String),
    Aoc(Vec<AocRateEntry>),
}

/// One frame read from a channel (spec §6).
#[derive(Debug, Clone)]
pub enum Frame {
    Voice,
    Dtmf(char),
    Control(ControlEvent),
}

/// What to indicate on a channel (spec §6's `indicate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicateKind {
    Ringing,
    StopRinging,
    Hold,
    Unhold,
}

/// Options passed to [`Transport::bridge`].
#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    pub record: bool,
}

/// Outcome of a completed bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    Normal,
    CallerHangup,
    PeerHangup,
    TransferredAway,
}

/// The channel-driver interface the dispatch core consumes (spec §6).
///
/// Implementations perform the actual SIP/PSTN/whatever signaling; this
/// crate only calls through the trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Allocate an outbound channel without placing the call.
    async fn request(
        &self,
        tech: &str,
        location: &str,
        formats: &[String],
        originator: Option<&str>,
    ) -> std::result::Result<OutboundChannel, RequestStatus>;

    /// Place the call on a previously-requested channel.
    async fn call(&self, channel: &OutboundChannel, address: &str) -> Result<()>;

    /// Hang up a channel, optionally flagged as answered elsewhere.
    async fn hangup(&self, channel: &OutboundChannel, answered_elsewhere: bool);

    /// Wait for any of `channels` (plus, conceptually, the caller's own
    /// channel if included) to have a ready event, up to `timeout`. Returns
    /// the channel that became ready (`None` on timeout) and the timeout
    /// remaining after the wait.
    async fn wait_for_events(
        &self,
        channels: &[OutboundChannel],
        timeout: Duration,
    ) -> (Option<OutboundChannel>, Duration);

    /// Read the next ready frame from a channel.
    async fn read(&self, channel: &OutboundChannel) -> Option<Frame>;

    /// Indicate ringing/hold state on a channel.
    async fn indicate(&self, channel: &OutboundChannel, kind: IndicateKind);

    /// Bridge the caller's channel to the winning peer; blocks until the
    /// bridge ends.
    async fn bridge(
        &self,
        caller: &OutboundChannel,
        peer: &OutboundChannel,
        options: BridgeOptions,
    ) -> BridgeOutcome;

    /// Apply a connected-line update to the caller's channel immediately
    /// (spec §4.5: applied right away outside RingAll, or once an attempt
    /// wins under RingAll).
    async fn apply_connected_line(&self, caller: &OutboundChannel, info: ConnectedLineInfo);

    /// Apply a redirecting-party update to the caller's channel (spec §4.5).
    async fn apply_redirecting(&self, caller: &OutboundChannel, info: RedirectingInfo);

    /// Present accumulated AOC rate entries to the caller's channel
    /// (spec §4.5: "replay them to the caller when that attempt wins").
    async fn present_aoc(&self, caller: &OutboundChannel, rates: &[AocRateEntry]);
}

/// The audio-prompt player interface (spec §6).
#[async_trait]
pub trait PromptPlayer: Send + Sync {
    /// Play a named prompt on `channel`; returns a DTMF digit if one was
    /// pressed during playback.
    async fn play_file(&self, channel: &OutboundChannel, name: &str) -> Option<char>;
}

/// The persistent key/value store interface (spec §6), used by
/// [`crate::persistence`] to dump/load dynamic members.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn put(&self, family: &str, key: &str, value: String) -> Result<()>;
    async fn get(&self, family: &str, key: &str) -> Result<Option<String>>;
    async fn delete(&self, family: &str, key: &str) -> Result<()>;
}

/// A post-connect hook — a dial-plan macro/gosub invoked on the bridged
/// member's channel before the bridge proper begins (spec §4.4 step 5).
/// The engine never evaluates dial-plan expressions itself.
#[async_trait]
pub trait PostConnectHook: Send + Sync {
    async fn run(&self, member_interface: &str, channel: &OutboundChannel) -> Result<()>;
}

/// In-memory [`KvStore`] used by tests and for standalone operation when no
/// external store is wired in. Not a substitute for a real persistent store.
#[derive(Default)]
pub struct MemoryKvStore {
    inner: dashmap::DashMap<(String, String), String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn put(&self, family: &str, key: &str, value: String) -> Result<()> {
        self.inner.insert((family.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn get(&self, family: &str, key: &str) -> Result<Option<String>> {
        Ok(self.inner.get(&(family.to_string(), key.to_string())).map(|v| v.clone()))
    }

    async fn delete(&self, family: &str, key: &str) -> Result<()> {
        self.inner.remove(&(family.to_string(), key.to_string()));
        Ok(())
    }
}
