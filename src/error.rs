//! Error types for the queue dispatch engine
//!
//! Follows the propagation policy in spec §7: attempt-level errors never
//! surface above the ring loop (they are captured as [`AttemptFailure`] and
//! handled locally), caller-terminal conditions surface as a [`QueueEngineError`]
//! or a normal [`crate::result::ExitResult`], and structural/config errors
//! surface to the caller of the mutating operation.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, QueueEngineError>;

/// Errors surfaced across the engine's public boundary.
#[derive(Error, Debug, Clone)]
pub enum QueueEngineError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error("queue already exists: {0}")]
    QueueAlreadyExists(String),

    #[error("member not found: {0} in queue {1}")]
    MemberNotFound(String, String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("invalid penalty: {0}")]
    InvalidPenalty(i32),

    #[error("empty interface string")]
    EmptyInterface,

    #[error("missing state key for member {0}")]
    MissingStateKey(String),

    #[error("duplicate realtime uniqueid: {0}")]
    DuplicateRealtimeUid(String),

    #[error("queue is full: {0}")]
    Full(String),

    #[error("join rejected by empty predicate: {0}")]
    JoinEmpty(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("orchestration error: {0}")]
    Orchestration(String),
}

impl QueueEngineError {
    pub fn queue_not_found(name: impl Into<String>) -> Self {
        Self::QueueNotFound(name.into())
    }

    pub fn member_not_found(interface: impl Into<String>, queue: impl Into<String>) -> Self {
        Self::MemberNotFound(interface.into(), queue.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn orchestration(msg: impl Into<String>) -> Self {
        Self::Orchestration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Local, non-fatal failure of a single outbound attempt.
///
/// Never escapes the ring loop (spec §7): the attempt is retired, its device
/// contributions released, and the round continues with the next candidate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("transport failed to allocate an outbound channel")]
    RequestFailed,

    #[error("transport failed to place the call")]
    CallFailed,

    #[error("forwarding was offered but not permitted")]
    ForwardDisallowed,

    #[error("peer reported busy")]
    Busy,

    #[error("peer reported congestion")]
    Congestion,

    #[error("member is in post-call wrapup")]
    Wrapup,

    #[error("member is paused")]
    Paused,

    #[error("member is excluded by the penalty window")]
    PenaltyExcluded,

    #[error("preempted by a higher-weight queue")]
    WeightPreempted,

    #[error("device is busy per reservation/active counters")]
    DeviceBusy,
}
