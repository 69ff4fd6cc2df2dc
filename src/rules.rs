//! Penalty rules and rule sets
//!
//! A [`RuleSet`] is a named, ordered collection of [`PenaltyRule`]s keyed by
//! elapsed-wait time (spec §3, §4.2). A caller's penalty window widens or
//! narrows as rules apply while it waits (spec §3's semantics, exercised by
//! scenario S3 in spec §8).

use std::collections::HashMap;

/// One time-triggered adjustment to a caller's penalty acceptance window.
#[derive(Debug, Clone, Copy)]
pub struct PenaltyRule {
    /// Seconds since caller start at which this rule applies.
    pub time: u64,
    pub max_value: i32,
    pub min_value: i32,
    pub max_relative: bool,
    pub min_relative: bool,
}

impl PenaltyRule {
    /// Apply this rule to an existing `(min, max)` window, per spec §3:
    /// `max = old_max + v` if relative else `v` (symmetric for min), then
    /// floor both at 0 and ensure `min <= max`.
    pub fn apply(&self, min: i32, max: i32) -> (i32, i32) {
        let mut new_max = if self.max_relative { max + self.max_value } else { self.max_value };
        let mut new_min = if self.min_relative { min + self.min_value } else { self.min_value };
        new_max = new_max.max(0);
        new_min = new_min.max(0);
        if new_min > new_max {
            new_min = new_max;
        }
        (new_min, new_max)
    }
}

/// A named, ordered collection of [`PenaltyRule`]s.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub name: String,
    rules: Vec<PenaltyRule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), rules: Vec::new() }
    }

    /// Add a rule, keeping the internal list sorted by `time` so
    /// `best_rule_after` can scan in order.
    pub fn add_rule(&mut self, rule: PenaltyRule) {
        let idx = self.rules.partition_point(|r| r.time <= rule.time);
        self.rules.insert(idx, rule);
    }

    /// The rule with the smallest `time` that is `>= elapsed`, or `None`
    /// (spec §4.2). Cursor advancement is monotone: callers hold the index of
    /// the last-applied rule and request the next one as time elapses.
    pub fn best_rule_after(&self, elapsed: u64) -> Option<(usize, PenaltyRule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, r)| r.time >= elapsed)
            .map(|(i, r)| (i, *r))
    }

    /// Rule at a specific cursor index, used after a rule has already been
    /// applied to find the one that follows it.
    pub fn rule_at(&self, index: usize) -> Option<PenaltyRule> {
        self.rules.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Process-wide registry of named rule sets, looked up by
/// [`crate::queue::Queue::default_rule_name`].
///
/// Interior mutability (a short-held `parking_lot::RwLock`, spec §5's
/// registry-level lock tier) so an `Arc<RuleRegistry>` shared with the
/// dispatcher can still accept runtime inserts/reloads from the management
/// surface without a separate owning task.
#[derive(Default)]
pub struct RuleRegistry {
    sets: parking_lot::RwLock<HashMap<String, RuleSet>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self { sets: parking_lot::RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, rule_set: RuleSet) {
        self.sets.write().insert(rule_set.name.clone(), rule_set);
    }

    pub fn get(&self, name: &str) -> Option<RuleSet> {
        self.sets.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.sets.read().keys().cloned().collect()
    }

    /// Management-surface equivalent of "reload rules" (spec §6): atomically
    /// swap the whole registry contents for a freshly-parsed set. The config
    /// file parser that produces `sets` is an external collaborator
    /// (spec §1); this just performs the swap.
    pub fn replace_all(&self, sets: Vec<RuleSet>) {
        *self.sets.write() = sets.into_iter().map(|rs| (rs.name.clone(), rs)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_rule_after_picks_smallest_time_ge_elapsed() {
        let mut rs = RuleSet::new("default");
        rs.add_rule(PenaltyRule { time: 30, max_value: 10, min_value: 0, max_relative: true, min_relative: false });
        rs.add_rule(PenaltyRule { time: 10, max_value: 5, min_value: 0, max_relative: true, min_relative: false });

        let (idx, rule) = rs.best_rule_after(5).unwrap();
        assert_eq!(rule.time, 10);
        assert_eq!(idx, 0);

        let (idx, rule) = rs.best_rule_after(10).unwrap();
        assert_eq!(rule.time, 10);
        assert_eq!(idx, 0);

        let (idx, rule) = rs.best_rule_after(11).unwrap();
        assert_eq!(rule.time, 30);
        assert_eq!(idx, 1);

        assert!(rs.best_rule_after(31).is_none());
    }

    #[test]
    fn apply_widens_window_and_floors_at_zero() {
        let rule = PenaltyRule { time: 10, max_value: 5, min_value: -10, max_relative: true, min_relative: true };
        let (min, max) = rule.apply(0, 0);
        assert_eq!(max, 5);
        assert_eq!(min, 0); // floored
    }

    #[test]
    fn apply_ensures_min_le_max() {
        let rule = PenaltyRule { time: 10, max_value: 2, min_value: 9, max_relative: false, min_relative: false };
        let (min, max) = rule.apply(0, 0);
        assert_eq!(max, 2);
        assert_eq!(min, 2); // clamped down to max
    }

    #[test]
    fn idempotent_reapplication_with_same_elapsed() {
        let mut rs = RuleSet::new("default");
        rs.add_rule(PenaltyRule { time: 10, max_value: 5, min_value: 0, max_relative: true, min_relative: false });

        let (idx, rule) = rs.best_rule_after(10).unwrap();
        let (min, max) = rule.apply(0, 0);
        // Advancing the cursor past index 0 with no further rule ready yields None,
        // so a second call with the same elapsed time produces no further mutation.
        assert!(rs.rule_at(idx + 1).is_none());
        assert_eq!((min, max), (0, 5));
    }
}
