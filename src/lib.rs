//! Ring-strategy call-queue dispatch engine.
//!
//! This crate implements the core of an ACD (automatic call distribution)
//! system: named queues of waiting callers, a penalty-aware member table,
//! eight ring strategies, and the per-caller orchestration loop that ties
//! them together. It does not perform SIP/PSTN signaling, play audio, or
//! parse a configuration file format — those are external collaborators
//! reached through the traits in [`transport`] (see each module's docs for
//! the corresponding section of the design this crate implements).
//!
//! ## Module map
//!
//! - [`error`] — the crate-wide `Result`/error types and attempt-local failures
//! - [`config`] — process-wide engine configuration
//! - [`device`] — shared device state and status fan-out
//! - [`member`] — per-queue agent records and the member table
//! - [`rules`] — penalty rules applied as a caller waits
//! - [`strategy`] — ring strategies and join/leave empty-condition masks
//! - [`waiting_client`] — waiting callers and the ordered waiting list
//! - [`attempt`] — outbound ring attempts and their device-reservation bookkeeping
//! - [`transport`] — the channel-driver, prompt-player, and KV-store traits
//! - [`result`] — terminal outcomes of a caller's time in a queue
//! - [`events`] — the manager-event bus contract
//! - [`audit`] — the line-oriented audit log contract
//! - [`queue`] — queue identity/configuration, mutable state, and the registry
//! - [`ring_selector`] — pure ring-strategy metric computation
//! - [`persistence`] — dynamic-member dump/load against a `KvStore`
//! - [`event_mux`] — multiplexing the caller and outbound attempt channels
//! - [`dispatcher`] — the main per-caller orchestration loop
//! - [`engine`] — top-level handle bundling the registries and dispatcher

pub mod attempt;
pub mod audit;
pub mod config;
pub mod device;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod event_mux;
pub mod events;
pub mod member;
pub mod persistence;
pub mod queue;
pub mod result;
pub mod ring_selector;
pub mod rules;
pub mod strategy;
pub mod transport;
pub mod waiting_client;

/// Common imports for embedding applications.
pub mod prelude {
    pub use crate::audit::{AuditLog, AuditRecord, AuditTag, NullAuditLog};
    pub use crate::config::{DebugConfig, EngineConfig, GeneralConfig};
    pub use crate::device::{Device, DeviceRegistry, DeviceStatus};
    pub use crate::dispatcher::{DispatchOptions, Dispatcher};
    pub use crate::engine::{QueueEngine, ReloadScope};
    pub use crate::error::{AttemptFailure, QueueEngineError, Result};
    pub use crate::events::{Event, EventBus, EventKind, NullEventBus};
    pub use crate::member::{Member, Provenance};
    pub use crate::queue::{AutopauseMode, MemberSnapshot, Queue, QueueHandle, QueueManager, QueueSnapshot};
    pub use crate::result::ExitResult;
    pub use crate::rules::{PenaltyRule, RuleRegistry, RuleSet};
    pub use crate::strategy::{EmptyCondition, RingStrategy};
    pub use crate::transport::{
        BridgeOptions, BridgeOutcome, ControlEvent, Frame, IndicateKind, KvStore, MemoryKvStore,
        OutboundChannel, PostConnectHook, PromptPlayer, RequestStatus, Transport,
    };
    pub use crate::waiting_client::{ClientFlags, WaitingClient};
}
