//! End-to-end scenario tests driving the dispatcher against a scripted
//! transport. Covers the scenarios a ring-strategy dispatch engine has to
//! get right: first-answer wins under RingAll, caller hangup mid-ring,
//! weight-based cross-queue preemption, and realtime member reconciliation.

mod support;

use std::sync::Arc;
use std::time::Duration;

use callqueue_engine::prelude::*;
use support::{Outcome, RecordingAuditLog, RecordingEventBus, SilentPromptPlayer, SimulatedTransport, CALLER};

fn caller_channel() -> OutboundChannel {
    OutboundChannel(CALLER.to_string())
}

#[tokio::test]
async fn scenario_ringall_first_answer_wins_and_hangs_up_the_loser() {
    let transport = Arc::new(
        SimulatedTransport::new()
            .script("SIP/alice", Outcome::NeverAnswers)
            .script("SIP/bob", Outcome::AnswerAfter(Duration::from_millis(30))),
    );
    let prompts = Arc::new(SilentPromptPlayer);
    let events = Arc::new(RecordingEventBus::new());
    let audit = Arc::new(RecordingAuditLog::new());
    let engine = QueueEngine::new(transport.clone(), prompts, Some(events.clone()), Some(audit.clone()), EngineConfig::default());

    let mut queue = Queue::new("support", RingStrategy::RingAll);
    queue.ring_timeout = Duration::from_secs(2);
    queue.retry_interval = Duration::from_millis(200);
    engine.add_queue(queue).unwrap();

    engine.queues.add_member("support", "SIP/alice", "SIP/alice", 0, "Alice", false, true, Provenance::Static).await.unwrap();
    engine.queues.add_member("support", "SIP/bob", "SIP/bob", 0, "Bob", false, true, Provenance::Static).await.unwrap();

    let options = DispatchOptions {
        caller_uid: "C1".to_string(),
        flags: ClientFlags { cancel_elsewhere: true, ..Default::default() },
        ..Default::default()
    };
    let outcome = engine.dispatcher.run(caller_channel(), "support", options, None).await.unwrap();

    assert!(matches!(outcome, ExitResult::Continue));
    assert_eq!(transport.bridged_to(), Some("SIP/bob".to_string()));
    assert!(transport.hangups().contains(&("SIP/alice".to_string(), true)));

    let snapshot = engine.queues.snapshot("support").await.unwrap();
    assert_eq!(snapshot.completed, 1);
    assert!(audit.tags().contains(&"CONNECT".to_string()));
    assert!(events.kinds().contains(&"AgentConnect".to_string()));
}

#[tokio::test]
async fn scenario_caller_hangup_during_ring_retires_every_attempt() {
    let transport = Arc::new(
        SimulatedTransport::new()
            .script("SIP/alice", Outcome::NeverAnswers)
            .script("SIP/bob", Outcome::NeverAnswers)
            .caller_hangs_up_after(Duration::from_millis(40)),
    );
    let prompts = Arc::new(SilentPromptPlayer);
    let audit = Arc::new(RecordingAuditLog::new());
    let engine = QueueEngine::new(transport.clone(), prompts, None, Some(audit.clone()), EngineConfig::default());

    let mut queue = Queue::new("support", RingStrategy::RingAll);
    queue.ring_timeout = Duration::from_secs(5);
    queue.retry_interval = Duration::from_millis(500);
    engine.add_queue(queue).unwrap();

    engine.queues.add_member("support", "SIP/alice", "SIP/alice", 0, "Alice", false, true, Provenance::Static).await.unwrap();
    engine.queues.add_member("support", "SIP/bob", "SIP/bob", 0, "Bob", false, true, Provenance::Static).await.unwrap();

    let options = DispatchOptions { caller_uid: "C2".to_string(), ..Default::default() };
    let outcome = engine.dispatcher.run(caller_channel(), "support", options, None).await.unwrap();

    assert!(matches!(outcome, ExitResult::Unknown));
    let hung_up: Vec<String> = transport.hangups().into_iter().map(|(iface, _)| iface).collect();
    assert!(hung_up.contains(&"SIP/alice".to_string()));
    assert!(hung_up.contains(&"SIP/bob".to_string()));

    let snapshot = engine.queues.snapshot("support").await.unwrap();
    assert_eq!(snapshot.abandoned, 1);
    assert!(audit.tags().contains(&"ABANDON".to_string()));
}

#[tokio::test]
async fn scenario_weight_preemption_blocks_lower_priority_queue() {
    let transport = Arc::new(SimulatedTransport::new());
    let prompts = Arc::new(SilentPromptPlayer);
    let engine = QueueEngine::new(transport.clone(), prompts, None, None, EngineConfig::default());

    let mut high = Queue::new("H", RingStrategy::RingAll);
    high.weight = 10;
    let mut low = Queue::new("L", RingStrategy::RingAll);
    low.weight = 0;
    low.ring_timeout = Duration::from_millis(150);
    low.retry_interval = Duration::from_millis(40);
    engine.add_queue(high).unwrap();
    engine.add_queue(low).unwrap();

    engine.queues.add_member("H", "SIP/shared", "SIP/shared", 0, "Shared", false, true, Provenance::Static).await.unwrap();
    engine.queues.add_member("L", "SIP/shared", "SIP/shared", 0, "Shared", false, true, Provenance::Static).await.unwrap();

    // Simulate H already having an unserved waiting caller: its single
    // member is fully "spoken for" since waiting count >= available count.
    {
        let h = engine.queues.get("H").unwrap();
        let mut data = h.data.lock().await;
        data.waiting.insert(WaitingClient::new(900, "H", 0, std::time::Instant::now(), None), None);
    }

    let options = DispatchOptions { caller_uid: "C3".to_string(), ..Default::default() };
    let outcome = engine.dispatcher.run(caller_channel(), "L", options, None).await.unwrap();

    assert!(matches!(outcome, ExitResult::Timeout));
    assert!(!transport.requested_interfaces().contains(&"SIP/shared".to_string()));
}

#[tokio::test]
async fn scenario_realtime_reload_removes_stale_members_and_keeps_survivors() {
    let transport = Arc::new(SimulatedTransport::new());
    let prompts = Arc::new(SilentPromptPlayer);
    let audit = Arc::new(RecordingAuditLog::new());
    let engine = QueueEngine::new(transport, prompts, None, Some(audit.clone()), EngineConfig::default());

    engine.add_queue(Queue::new("q", RingStrategy::RingAll)).unwrap();
    for iface in ["x", "y", "z"] {
        engine.queues.add_member("q", iface, iface, 0, iface, false, true, Provenance::Realtime).await.unwrap();
    }

    let devices = &engine.devices;
    let snapshot = vec![
        {
            let mut m = Member::new("y", "y", devices.acquire("y"), Provenance::Realtime);
            m.dead = false;
            m
        },
        {
            let mut m = Member::new("w", "w", devices.acquire("w"), Provenance::Realtime);
            m.dead = false;
            m
        },
    ];
    engine.queues.reload_members("q", snapshot).await.unwrap();

    let snap = engine.queues.snapshot("q").await.unwrap();
    let interfaces: Vec<String> = snap.members.iter().map(|m| m.interface.clone()).collect();
    assert!(interfaces.contains(&"y".to_string()));
    assert!(interfaces.contains(&"w".to_string()));
    assert!(!interfaces.contains(&"x".to_string()));
    assert!(!interfaces.contains(&"z".to_string()));

    let remove_count = audit.tags().iter().filter(|t| *t == "REMOVEMEMBER").count();
    assert_eq!(remove_count, 2);
}

#[test]
fn scenario_penalty_rule_widens_window_as_caller_waits() {
    use callqueue_engine::device::DeviceRegistry;
    use callqueue_engine::ring_selector::compute_candidates;

    let mut rs = RuleSet::new("default");
    rs.add_rule(PenaltyRule { time: 0, max_value: 5, min_value: 0, max_relative: false, min_relative: false });
    rs.add_rule(PenaltyRule { time: 30, max_value: 100, min_value: 0, max_relative: false, min_relative: false });

    let mut queue = Queue::new("q", RingStrategy::RingAll);
    queue.penalty_members_limit = 1;

    let (registry, _rx) = DeviceRegistry::new();
    let mut data = callqueue_engine::queue::QueueData::new();
    let mut a = Member::new("A", "A", registry.acquire("A"), Provenance::Static);
    a.penalty = 0;
    let mut b = Member::new("B", "B", registry.acquire("B"), Provenance::Static);
    b.penalty = 10;
    data.members.insert(a).unwrap();
    data.members.insert(b).unwrap();

    let mut client = WaitingClient::new(1, "q", 0, std::time::Instant::now(), None);
    let mut rng = rand::thread_rng();

    // At t=0 the first rule narrows the window to [0, 5], excluding B.
    let (idx, rule) = rs.best_rule_after(0).unwrap();
    let (min, max) = rule.apply(client.min_penalty, client.max_penalty);
    client.min_penalty = min;
    client.max_penalty = max;
    client.rule_cursor = Some(idx);

    let candidates = compute_candidates(&queue, &data, &client, &mut rng, std::time::Instant::now());
    let ifaces: Vec<String> = candidates.iter().map(|c| c.interface.clone()).collect();
    assert_eq!(ifaces, vec!["A".to_string()]);

    // At t=30 the second rule widens the window to [0, 100], admitting B.
    let (idx, rule) = rs.best_rule_after(30).unwrap();
    let (min, max) = rule.apply(client.min_penalty, client.max_penalty);
    client.min_penalty = min;
    client.max_penalty = max;
    client.rule_cursor = Some(idx);

    let candidates = compute_candidates(&queue, &data, &client, &mut rng, std::time::Instant::now());
    let mut ifaces: Vec<String> = candidates.iter().map(|c| c.interface.clone()).collect();
    ifaces.sort();
    assert_eq!(ifaces, vec!["A".to_string(), "B".to_string()]);
}
