//! Ring strategies and join/leave empty-condition masks

/// Ring strategy governing how [`crate::ring_selector::RingSelector`]
/// computes per-member metrics (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingStrategy {
    RingAll,
    LeastRecent,
    FewestCalls,
    Random,
    RRMemory,
    Linear,
    WeightedRandom,
    RROrdered,
}

bitflags::bitflags! {
    /// Disjunction over member-state flags used to decide whether a caller
    /// may join a queue or must leave it (spec's Glossary: "Empty predicate").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EmptyCondition: u16 {
        const PAUSED       = 0b0000_0001;
        const PENALTY      = 0b0000_0010;
        const INUSE        = 0b0000_0100;
        const RINGING      = 0b0000_1000;
        const UNAVAILABLE  = 0b0001_0000;
        const INVALID      = 0b0010_0000;
        const UNKNOWN      = 0b0100_0000;
        const WRAPUP       = 0b1000_0000;
    }
}

impl Default for EmptyCondition {
    fn default() -> Self {
        EmptyCondition::PENALTY | EmptyCondition::INVALID
    }
}
