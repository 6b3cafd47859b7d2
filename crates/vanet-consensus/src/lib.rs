//! Quorum-Validated Cost Sharing
//!
//! No agent trusts a single report. Every reported segment cost enters a
//! per-segment vote and only becomes the agent's belief once enough distinct
//! reporters back it.
//!
//! # Core Insight
//!
//! Costs are noisy, so reports are grouped into **fuzzy buckets**: a cost
//! joins the first bucket whose key is within 40% of the key. A bucket wins
//! when its stamp count reaches the voting threshold.
//!
//! # Adaptive Threshold
//!
//! - starts at 2 (two independent reporters)
//! - +1 on every accepted increase, up to 7
//! - -1 on every accepted decrease, down to 2
//!
//! Repeated inflation of a segment's cost must clear an ever higher bar,
//! while a cost falling back to normal gets cheaper to confirm.
//!
//! # Staleness
//!
//! A report that neither moves the cost materially nor brings a new stamp is
//! *outdated*; it is echoed back so the sender stops spreading it.

mod adversary;
mod knowledge;
mod threshold;
mod vote;

pub use adversary::{
    classify_report, Personality, ReportClass, DECREASED_VALUE, INCREASED_VALUE,
    REPORT_MULTIPLICATION_FACTOR,
};
pub use knowledge::{CostBatch, CostKnowledgeBase, IngestOutcome, KnowledgeConfig, ReplanRequest};
pub use threshold::{
    is_material_change, is_same_cost, lower_threshold, raise_threshold, MAX_VOTING_THRESHOLD,
    MIN_CRUISE_SPEED, MIN_DWELL_TIME, MIN_TRACE_FRACTION, MIN_VOTING_THRESHOLD, SPEED_MARGIN,
    UPDATE_THRESHOLD,
};
pub use vote::{Candidate, CostVote, ReporterId, VoteSnapshot};

const _: () = assert!(MIN_VOTING_THRESHOLD <= MAX_VOTING_THRESHOLD);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_walks_the_full_range() {
        assert_eq!(raise_threshold(MIN_VOTING_THRESHOLD), 3);
        assert_eq!(raise_threshold(6), MAX_VOTING_THRESHOLD);
        assert_eq!(raise_threshold(MAX_VOTING_THRESHOLD), MAX_VOTING_THRESHOLD);
        assert_eq!(lower_threshold(MAX_VOTING_THRESHOLD), 6);
        assert_eq!(lower_threshold(MIN_VOTING_THRESHOLD), MIN_VOTING_THRESHOLD);
    }

    #[test]
    fn two_reporters_make_a_quorum() {
        let mut vote = CostVote::new(30.0, 1);
        assert!(!vote.try_accept());
        vote.add_stamp(32.0, 2);
        assert!(vote.try_accept());
        assert_eq!(vote.accepted_cost(), 30.0);
    }
}
