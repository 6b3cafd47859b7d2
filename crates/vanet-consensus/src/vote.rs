//! Per-segment quorum vote.
//!
//! A [`CostVote`] groups reports for one road segment into candidate buckets.
//! A bucket is keyed by the cost of its first report; later reports join the
//! first bucket (in insertion order) whose key they fuzzily match. Each
//! bucket carries the set of reporters ("stamps") backing it, and a reporter
//! backs at most one bucket: re-reporting a different cost moves its stamp.
//!
//! # Acceptance
//!
//! - While `first_session` holds, any bucket with at least `threshold`
//!   stamps is accepted.
//! - Afterwards the currently accepted bucket is skipped; an accepted
//!   increase raises the threshold, an accepted decrease lowers it.
//!
//! Only the *accepted cost* and the bucket list travel on the wire (as a
//! [`VoteSnapshot`]); the threshold and session flag are always local.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::threshold::{is_same_cost, lower_threshold, raise_threshold, MIN_VOTING_THRESHOLD};

/// Identity of an agent vouching for a cost.
pub type ReporterId = i64;

/// One candidate cost and the reporters backing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Bucket key (the first reported cost)
    pub cost: f64,
    /// Reporters backing this bucket
    pub stamps: BTreeSet<ReporterId>,
}

impl Candidate {
    pub fn new(cost: f64, reporter: ReporterId) -> Self {
        Self {
            cost,
            stamps: BTreeSet::from([reporter]),
        }
    }

    fn matches(&self, cost: f64) -> bool {
        self.cost == cost || is_same_cost(self.cost, cost)
    }
}

/// The gossiped form of a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteSnapshot {
    /// Cost the sender currently holds as accepted
    pub accepted_cost: f64,
    /// Candidate buckets in insertion order
    pub candidates: Vec<Candidate>,
}

impl VoteSnapshot {
    /// A fresh one-reporter snapshot.
    pub fn single(cost: f64, reporter: ReporterId) -> Self {
        Self {
            accepted_cost: cost,
            candidates: vec![Candidate::new(cost, reporter)],
        }
    }

    /// The bucket backing the accepted cost: exact key first, else the first fuzzy match.
    pub fn accepted_candidate(&self) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|c| c.cost == self.accepted_cost)
            .or_else(|| self.candidates.iter().find(|c| c.matches(self.accepted_cost)))
    }

    /// Total stamps over all buckets.
    pub fn stamp_count(&self) -> usize {
        self.candidates.iter().map(|c| c.stamps.len()).sum()
    }
}

/// Quorum vote on the cost of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct CostVote {
    accepted_cost: f64,
    candidates: Vec<Candidate>,
    voting_threshold: usize,
    first_session: bool,
}

impl CostVote {
    /// Start a vote with a single report.
    pub fn new(cost: f64, reporter: ReporterId) -> Self {
        Self {
            accepted_cost: cost,
            candidates: vec![Candidate::new(cost, reporter)],
            voting_threshold: MIN_VOTING_THRESHOLD,
            first_session: true,
        }
    }

    /// Rebuild a local vote from a received snapshot.
    ///
    /// The threshold starts at the minimum and the session is fresh. Stamps
    /// are re-added one by one so a reporter listed in several buckets ends
    /// up backing only the last one.
    pub fn from_snapshot(snapshot: &VoteSnapshot) -> Self {
        let mut vote = Self {
            accepted_cost: snapshot.accepted_cost,
            candidates: Vec::with_capacity(snapshot.candidates.len()),
            voting_threshold: MIN_VOTING_THRESHOLD,
            first_session: true,
        };
        vote.merge_stamps(snapshot);
        vote
    }

    pub fn accepted_cost(&self) -> f64 {
        self.accepted_cost
    }

    pub fn voting_threshold(&self) -> usize {
        self.voting_threshold
    }

    pub fn is_first_session(&self) -> bool {
        self.first_session
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    fn position_of(&self, cost: f64) -> Option<usize> {
        self.candidates.iter().position(|c| c.matches(cost))
    }

    /// The first bucket fuzzily matching `cost`.
    pub fn candidate_for(&self, cost: f64) -> Option<&Candidate> {
        self.position_of(cost).map(|i| &self.candidates[i])
    }

    /// Record that `reporter` vouches for `cost`.
    ///
    /// Joins the first matching bucket or opens a new one. Any stamp the
    /// reporter held on another bucket is withdrawn first.
    pub fn add_stamp(&mut self, cost: f64, reporter: ReporterId) {
        if let Some(i) = self.position_of(cost) {
            if self.candidates[i].stamps.contains(&reporter) {
                return;
            }
        }

        self.withdraw(reporter);

        match self.position_of(cost) {
            Some(i) => {
                self.candidates[i].stamps.insert(reporter);
            }
            None => self.candidates.push(Candidate::new(cost, reporter)),
        }
    }

    fn withdraw(&mut self, reporter: ReporterId) {
        let accepted = self.accepted_cost;
        for candidate in &mut self.candidates {
            candidate.stamps.remove(&reporter);
        }
        // The accepted bucket survives even when emptied
        self.candidates
            .retain(|c| !c.stamps.is_empty() || c.cost == accepted);
    }

    /// Whether `other` knows a reporter for its accepted cost that we don't.
    ///
    /// Compares `other`'s accepted bucket against our first bucket that
    /// fuzzily matches `other.accepted_cost`. With no such bucket on our side
    /// there is nothing to compare against and the answer is `false`.
    pub fn has_new_stamps(&self, other: &VoteSnapshot) -> bool {
        let Some(ours) = self.candidate_for(other.accepted_cost) else {
            return false;
        };
        let Some(theirs) = other.accepted_candidate() else {
            return false;
        };
        theirs.stamps.iter().any(|s| !ours.stamps.contains(s))
    }

    /// Union every bucket of `other` into ours.
    ///
    /// Goes through [`add_stamp`](Self::add_stamp), so a reporter we hold on
    /// one bucket is moved to the bucket `other` lists it under, even when
    /// that bucket is older than ours.
    pub fn merge_stamps(&mut self, other: &VoteSnapshot) {
        for candidate in &other.candidates {
            for &reporter in &candidate.stamps {
                self.add_stamp(candidate.cost, reporter);
            }
        }
    }

    /// Try to reach a new decision. Returns `true` when a bucket was accepted.
    pub fn try_accept(&mut self) -> bool {
        let accepted = self.accepted_cost;
        let first = self.first_session;
        let threshold = self.voting_threshold;

        let winner = self
            .candidates
            .iter()
            .filter(|c| first || c.cost != accepted)
            .find(|c| c.stamps.len() >= threshold)
            .map(|c| c.cost);

        let Some(cost) = winner else {
            return false;
        };

        if first {
            self.first_session = false;
        } else if cost > accepted {
            self.voting_threshold = raise_threshold(threshold);
        } else {
            self.voting_threshold = lower_threshold(threshold);
        }
        self.accepted_cost = cost;
        true
    }

    /// Drop every bucket except the one keyed exactly by the accepted cost.
    pub fn clear_session(&mut self) {
        let accepted = self.accepted_cost;
        self.candidates.retain(|c| c.cost == accepted);
    }

    /// Wire form of this vote.
    pub fn snapshot(&self) -> VoteSnapshot {
        VoteSnapshot {
            accepted_cost: self.accepted_cost,
            candidates: self.candidates.clone(),
        }
    }
}
