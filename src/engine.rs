//! Top-level engine handle bundling the registries, dispatcher, and
//! external collaborators into one constructible unit.
//!
//! Nothing in [`crate::dispatcher::Dispatcher`] or [`crate::queue::QueueManager`]
//! requires this struct — they're usable standalone by an embedding
//! application that already owns its own wiring — but most callers want the
//! whole stack assembled once, the device-status fan-out task spawned, and a
//! single place to call the management-surface "reload" operations from
//! (spec §6).

use std::sync::Arc;

use crate::audit::{AuditLog, NullAuditLog};
use crate::config::EngineConfig;
use crate::device::DeviceRegistry;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::events::{EventBus, NullEventBus};
use crate::member::Member;
use crate::queue::{Queue, QueueManager};
use crate::rules::{RuleRegistry, RuleSet};
use crate::transport::{PromptPlayer, Transport};

/// Which part(s) of a queue's configuration to reload (spec §6's
/// "reload (parameters | members | rules | all)" management command).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadScope {
    Parameters,
    Members,
    Rules,
    All,
}

/// Owns the process-wide registries and the dispatcher that ties them
/// together. Construct once per process; clone the `Arc`s it exposes into
/// as many caller tasks as needed.
pub struct QueueEngine {
    pub devices: Arc<DeviceRegistry>,
    pub queues: Arc<QueueManager>,
    pub rules: Arc<RuleRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}

impl QueueEngine {
    /// Build the full stack: a fresh [`DeviceRegistry`] (spawning its
    /// status fan-out consumer onto the current Tokio runtime), an empty
    /// [`QueueManager`]/[`RuleRegistry`], and a [`Dispatcher`] wired to the
    /// given `transport`/`prompts` collaborators.
    pub fn new(
        transport: Arc<dyn Transport>,
        prompts: Arc<dyn PromptPlayer>,
        events: Option<Arc<dyn EventBus>>,
        audit: Option<Arc<dyn AuditLog>>,
        config: EngineConfig,
    ) -> Self {
        let events = events.unwrap_or_else(|| Arc::new(NullEventBus));
        let audit = audit.unwrap_or_else(|| Arc::new(NullAuditLog));

        let (devices, fanout_rx) = DeviceRegistry::new();
        let devices = Arc::new(devices);
        let queues = Arc::new(QueueManager::new(devices.clone(), events.clone(), audit.clone()));
        let rules = Arc::new(RuleRegistry::new());

        tokio::spawn(queues.clone().run_status_fanout(fanout_rx));

        let dispatcher = Arc::new(Dispatcher::new(
            queues.clone(),
            rules.clone(),
            transport,
            prompts,
            events,
            audit,
            config,
        ));

        Self { devices, queues, rules, dispatcher }
    }

    /// Register a new queue.
    pub fn add_queue(&self, queue: Queue) -> Result<()> {
        self.queues.create_queue(queue)?;
        Ok(())
    }

    /// Register a named penalty rule set, replacing any existing set of the
    /// same name.
    pub fn add_rule_set(&self, rule_set: RuleSet) {
        self.rules.insert(rule_set);
    }

    /// Management-surface "reload" (spec §6): `Parameters` swaps a queue's
    /// immutable config while keeping its live `QueueData`; `Members`
    /// reconciles realtime members against a freshly-loaded snapshot;
    /// `Rules` replaces the whole rule registry; `All` does all three that
    /// apply to the given arguments.
    pub async fn reload(
        &self,
        scope: ReloadScope,
        queue_name: &str,
        new_queue: Option<Queue>,
        member_snapshot: Option<Vec<Member>>,
        rule_sets: Option<Vec<RuleSet>>,
    ) -> Result<()> {
        if matches!(scope, ReloadScope::Parameters | ReloadScope::All) {
            if let Some(queue) = new_queue {
                self.queues.reload(queue_name, queue)?;
            }
        }
        if matches!(scope, ReloadScope::Members | ReloadScope::All) {
            if let Some(snapshot) = member_snapshot {
                self.queues.reload_members(queue_name, snapshot).await?;
            }
        }
        if matches!(scope, ReloadScope::Rules | ReloadScope::All) {
            if let Some(sets) = rule_sets {
                self.rules.replace_all(sets);
            }
        }
        Ok(())
    }
}
