//! Ring-strategy metric computation and candidate selection (spec §4.3)
//!
//! Pure, stateless functions: the caller (the Dispatcher's ring loop) owns
//! the actual cursor state (the waiting client's linear cursor, the queue's
//! `rr_pos`/`rr_wrapped`) and applies [`advance_cursor`]'s result after each
//! round. Keeping this module free of interior mutability makes the
//! per-strategy metric formulas independently unit-testable and keeps
//! strategy stability (spec §8 property 5) a property of pure functions.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;

use crate::device::Device;
use crate::member::Member;
use crate::queue::{Queue, QueueData};
use crate::strategy::RingStrategy;
use crate::waiting_client::WaitingClient;

/// Penalty contribution to a metric, per spec §4.3's "penalty band":
/// `penalty * 1_000_000`, gated by `usepenalty`.
fn penalty_band(penalty: i32, usepenalty: bool) -> i64 {
    if usepenalty {
        i64::from(penalty) * 1_000_000
    } else {
        0
    }
}

/// Whether `penalty` falls inside `[min, max]`, treating `0` as "no bound"
/// independently per side (spec §4.3's penalty window gate).
fn within_penalty_window(penalty: i32, min: i32, max: i32) -> bool {
    let lower_ok = min == 0 || penalty >= min;
    let upper_ok = max == 0 || penalty <= max;
    lower_ok && upper_ok
}

/// One eligible member with its computed metric for this round.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub interface: String,
    pub device: Arc<Device>,
    pub metric: i64,
    /// Insertion-order index, carried through for Linear/RROrdered wrap
    /// detection and cursor writeback.
    pub position: usize,
}

/// Compute the eligible candidate set with metrics for one ring round.
///
/// `now` is used by `LeastRecent`. The penalty window gate uses
/// `client.min_penalty`/`client.max_penalty`. Members already excluded by
/// `ring_entry` preconditions (paused, wrapup, device status, weight
/// preemption) must be filtered by the caller before/after this — this
/// function only implements the strategy metric and the penalty gate, both
/// of which are defined purely in terms of the member table (spec §4.3).
pub fn compute_candidates(
    queue: &Queue,
    data: &QueueData,
    client: &WaitingClient,
    rng: &mut impl Rng,
    now: Instant,
) -> Vec<Candidate> {
    let usepenalty = queue.usepenalty(data.members.len());
    let mut out = Vec::new();

    for (position, member) in data.members.iter().enumerate() {
        if usepenalty && !within_penalty_window(member.penalty, client.min_penalty, client.max_penalty) {
            continue;
        }
        let band = if queue.strategy == RingStrategy::WeightedRandom {
            0
        } else {
            penalty_band(member.penalty, usepenalty)
        };
        let metric = strategy_metric(queue.strategy, member, position, client, data, rng, now) + band;
        out.push(Candidate {
            interface: member.interface.clone(),
            device: member.device.clone(),
            metric,
            position,
        });
    }
    out
}

fn strategy_metric(
    strategy: RingStrategy,
    member: &Member,
    position: usize,
    client: &WaitingClient,
    data: &QueueData,
    rng: &mut impl Rng,
    now: Instant,
) -> i64 {
    match strategy {
        RingStrategy::RingAll => 0,
        RingStrategy::Linear => linear_metric(position, client.linear_cursor),
        RingStrategy::RRMemory | RingStrategy::RROrdered => linear_metric(position, data.rr_pos),
        RingStrategy::Random => rng.gen_range(0..1000),
        RingStrategy::WeightedRandom => rng.gen_range(0..(1000 * (1 + member.penalty.max(0) as i64)).max(1)),
        RingStrategy::FewestCalls => member.calls as i64,
        RingStrategy::LeastRecent => match member.last_call_end {
            None => 0,
            Some(last) => {
                let secs = now.saturating_duration_since(last).as_secs() as i64;
                1_000_000 - secs
            }
        },
    }
}

/// Shared Linear/RRMemory/RROrdered metric: `1000 + pos` if `pos < cursor`
/// (ranks after the cursor band), else `pos`.
fn linear_metric(pos: usize, cursor: usize) -> i64 {
    if pos < cursor {
        1000 + pos as i64
    } else {
        pos as i64
    }
}

/// Whether this candidate's position is past the cursor, meaning the round
/// should flag "wrapped" so the next round knows later members still exist.
fn wraps(pos: usize, cursor: usize) -> bool {
    pos > cursor
}

/// Select this round's attempt target(s): the candidate(s) with the smallest
/// metric. RingAll rings every candidate tied with the best metric; every
/// other strategy rings only the single best (spec §4.3).
pub fn select_round<'a>(strategy: RingStrategy, candidates: &'a [Candidate]) -> Vec<&'a Candidate> {
    let Some(best) = candidates.iter().min_by_key(|c| c.metric) else {
        return Vec::new();
    };
    match strategy {
        RingStrategy::RingAll => candidates.iter().filter(|c| c.metric <= best.metric).collect(),
        _ => vec![best],
    }
}

/// Outcome of advancing a round's cursor, applied by the caller to either the
/// waiting client (Linear) or the queue data (RRMemory/RROrdered).
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorUpdate {
    pub new_cursor: usize,
    pub wrapped: bool,
}

/// What happened to this round's selected candidate, for cursor advancement
/// purposes (spec §4.3's writeback rule vs. spec §4.4's distinct "on request
/// failure, advance the cursor" rule).
pub enum RoundResult<'a> {
    /// The candidate was successfully rung (device reserved, channel placed).
    Started(&'a Candidate),
    /// A candidate was selected but `ring_entry` failed it (transport
    /// request/call failure, spec §4.4: "on request failure, advance the
    /// cursor (rr_pos++, linpos++)").
    RequestFailed(&'a Candidate),
    /// No eligible candidate existed this round.
    NoCandidates,
}

/// Update the round's cursor.
///
/// - [`RoundResult::Started`]: write back `metric mod 1000` (stripping the
///   penalty band) per spec §4.3, and set `wrapped` if the selected position
///   is past the prior cursor.
/// - [`RoundResult::RequestFailed`]: increment the prior cursor by one (spec
///   §4.4's distinct request-failure rule), rather than writing back the
///   failed candidate's own metric.
/// - [`RoundResult::NoCandidates`]: reset to 0 regardless of the prior
///   wrapped flag (E3 resolution 3), rather than incrementing further.
pub fn advance_cursor(prior_cursor: usize, prior_wrapped: bool, result: RoundResult) -> CursorUpdate {
    match result {
        RoundResult::Started(candidate) => CursorUpdate {
            new_cursor: (candidate.metric.rem_euclid(1000)) as usize,
            wrapped: prior_wrapped || wraps(candidate.position, prior_cursor),
        },
        RoundResult::RequestFailed(candidate) => CursorUpdate {
            new_cursor: prior_cursor + 1,
            wrapped: prior_wrapped || wraps(candidate.position, prior_cursor),
        },
        RoundResult::NoCandidates => CursorUpdate { new_cursor: 0, wrapped: false },
    }
}
