//! Terminal outcomes of a caller's time in a queue

/// How a caller's time in a queue ended (spec §4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitResult {
    /// Ring timeout / max wait elapsed with no answer.
    Timeout,
    /// Queue was full at join time.
    Full,
    /// Join rejected: the empty-join predicate matched.
    JoinEmpty,
    /// Caller left because the empty-leave predicate started matching.
    LeaveEmpty,
    /// Join rejected: no member is in a state the join predicate allows.
    JoinUnavail,
    /// Caller left because every member became unavailable.
    LeaveUnavail,
    /// Caller pressed a digit that exits the queue.
    Continue,
    /// Caller hung up, or any condition not otherwise classified.
    Unknown,
}
