//! Line-oriented audit log contract (spec §6)

use async_trait::async_trait;

/// Fixed set of audit tags the core emits (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditTag {
    EnterQueue,
    AddMember,
    RemoveMember,
    Pause,
    Unpause,
    PauseAll,
    UnpauseAll,
    Penalty,
    RingNoAnswer,
    Connect,
    CompleteCaller,
    CompleteAgent,
    Transfer,
    Abandon,
    AgentDump,
    SysCompat,
    ExitEmpty,
    ExitWithTimeout,
    ExitWithKey,
    Pickup,
}

impl AuditTag {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditTag::EnterQueue => "ENTERQUEUE",
            AuditTag::AddMember => "ADDMEMBER",
            AuditTag::RemoveMember => "REMOVEMEMBER",
            AuditTag::Pause => "PAUSE",
            AuditTag::Unpause => "UNPAUSE",
            AuditTag::PauseAll => "PAUSEALL",
            AuditTag::UnpauseAll => "UNPAUSEALL",
            AuditTag::Penalty => "PENALTY",
            AuditTag::RingNoAnswer => "RINGNOANSWER",
            AuditTag::Connect => "CONNECT",
            AuditTag::CompleteCaller => "COMPLETECALLER",
            AuditTag::CompleteAgent => "COMPLETEAGENT",
            AuditTag::Transfer => "TRANSFER",
            AuditTag::Abandon => "ABANDON",
            AuditTag::AgentDump => "AGENTDUMP",
            AuditTag::SysCompat => "SYSCOMPAT",
            AuditTag::ExitEmpty => "EXITEMPTY",
            AuditTag::ExitWithTimeout => "EXITWITHTIMEOUT",
            AuditTag::ExitWithKey => "EXITWITHKEY",
            AuditTag::Pickup => "PICKUP",
        }
    }
}

/// One audit record: queue, caller uid, agent identity, tag, pipe-separated extras.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub queue: String,
    pub caller_uid: String,
    pub agent: String,
    pub tag: AuditTag,
    pub extras: Vec<String>,
}

impl AuditRecord {
    pub fn new(queue: impl Into<String>, caller_uid: impl Into<String>, tag: AuditTag) -> Self {
        Self {
            queue: queue.into(),
            caller_uid: caller_uid.into(),
            agent: String::new(),
            tag,
            extras: Vec::new(),
        }
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extras.push(extra.into());
        self
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn log(&self, record: AuditRecord);
}

/// Discards every record. Default when no audit sink is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditLog;

#[async_trait]
impl AuditLog for NullAuditLog {
    async fn log(&self, _record: AuditRecord) {}
}
