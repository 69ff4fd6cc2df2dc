//! Manager-event bus contract
//!
//! Narrow one-way emit interface (spec §6); the concrete bus (an AMI-style
//! event stream, a message queue, whatever the embedding platform uses) is an
//! external collaborator.

use async_trait::async_trait;

/// Fixed set of event kinds the core emits (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Join,
    Leave,
    QueueCallerAbandon,
    QueueMemberAdded,
    QueueMemberRemoved,
    QueueMemberStatus,
    QueueMemberPaused,
    QueueMemberPenalty,
    AgentCalled,
    AgentConnect,
    AgentComplete,
    AgentRingNoAnswer,
    AgentDump,
    QueueSummary,
}

/// One emitted event: a kind plus typed key/value fields (spec §6).
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub fields: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self { kind, fields: Vec::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn emit(&self, event: Event);
}

/// Discards every event. Default when no bus is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventBus;

#[async_trait]
impl EventBus for NullEventBus {
    async fn emit(&self, _event: Event) {}
}
