//! Benchmarks for the ring-strategy metric computation and the waiting-list
//! insertion — the two hot paths every caller and every ring round touch.
//!
//! ## Benchmark breakdown
//!
//! 1. **candidate_computation**: `ring_selector::compute_candidates` over a
//!    100-member queue, one benchmark per strategy. This is the per-round
//!    cost paid on every `ring_one` call (spec §4.3, §4.4).
//! 2. **round_selection**: `ring_selector::select_round` given a
//!    precomputed candidate set — isolates the `min_by_key`/tie-band scan
//!    from the metric math above it.
//! 3. **waiting_list_insert**: `WaitingList::insert` at increasing list
//!    sizes, to characterize the renumbering cost spec §3's position
//!    invariant requires on every insertion.

use std::time::Instant;

use callqueue_engine::device::DeviceRegistry;
use callqueue_engine::member::{Member, Provenance};
use callqueue_engine::queue::{Queue, QueueData};
use callqueue_engine::ring_selector::{compute_candidates, select_round};
use callqueue_engine::strategy::RingStrategy;
use callqueue_engine::waiting_client::{WaitingClient, WaitingList};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn member_set(n: usize) -> QueueData {
    let mut data = QueueData::new();
    let (registry, _rx) = DeviceRegistry::new();
    for i in 0..n {
        let interface = format!("SIP/agent-{i}");
        let device = registry.acquire(&interface);
        let mut m = Member::new(interface.clone(), interface, device, Provenance::Static);
        m.calls = (i % 7) as u64;
        m.penalty = (i % 3) as i32;
        data.members.insert(m).unwrap();
    }
    data
}

fn bench_candidate_computation(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate_computation");
    let strategies = [
        RingStrategy::RingAll,
        RingStrategy::Linear,
        RingStrategy::RRMemory,
        RingStrategy::Random,
        RingStrategy::WeightedRandom,
        RingStrategy::FewestCalls,
        RingStrategy::LeastRecent,
    ];
    let data = member_set(100);
    let client = WaitingClient::new(1, "bench", 0, Instant::now(), None);
    let mut rng = rand::thread_rng();

    for strategy in strategies {
        let queue = Queue::new("bench", strategy);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{strategy:?}")), &strategy, |b, _| {
            b.iter(|| {
                let candidates = compute_candidates(&queue, &data, &client, &mut rng, Instant::now());
                black_box(candidates);
            });
        });
    }
    group.finish();
}

fn bench_round_selection(c: &mut Criterion) {
    let data = member_set(100);
    let client = WaitingClient::new(1, "bench", 0, Instant::now(), None);
    let queue = Queue::new("bench", RingStrategy::RingAll);
    let mut rng = rand::thread_rng();
    let candidates = compute_candidates(&queue, &data, &client, &mut rng, Instant::now());

    c.bench_function("round_selection_ringall_100_members", |b| {
        b.iter(|| {
            let selected = select_round(RingStrategy::RingAll, black_box(&candidates));
            black_box(selected);
        });
    });
}

fn bench_waiting_list_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("waiting_list_insert");
    for size in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let mut list = WaitingList::new();
                    for i in 0..size {
                        list.insert(WaitingClient::new(i as u64, "bench", 0, Instant::now(), None), None);
                    }
                    list
                },
                |mut list| {
                    list.insert(WaitingClient::new(9_999, "bench", 0, Instant::now(), None), None);
                    black_box(list);
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_candidate_computation, bench_round_selection, bench_waiting_list_insert);
criterion_main!(benches);
