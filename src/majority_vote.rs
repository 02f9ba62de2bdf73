// src/majority_vote.rs
// Peer-to-peer failover voting, invoked when the Reconciler cannot reach the
// origin (spec.md §4.8).
//
// No original-source counterpart — the Python edge server has no failover
// path at all; this is built purely from spec.md. Ballot tallying is
// canonicalized (sorted, deduped) before comparison per the explicit
// redesign note in SPEC_FULL.md §9, rather than the raw-bytes equality the
// spec flags as a bug in the source it was distilled from.

use serde_json;
use std::collections::HashMap;

pub enum RoundState {
    Idle,
    Collecting(Vec<Vec<u8>>),
}

pub struct MajorityVoteCoordinator {
    state: RoundState,
}

pub enum TallyOutcome {
    /// No ballots arrived; the allow-list is unchanged.
    NoVotes,
    /// A plurality winner was chosen.
    Installed(Vec<String>),
}

impl MajorityVoteCoordinator {
    pub fn new() -> Self {
        Self {
            state: RoundState::Idle,
        }
    }

    pub(crate) fn is_collecting(&self) -> bool {
        matches!(self.state, RoundState::Collecting(_))
    }

    /// Begin a new round. A no-op (returns `false`) if one is already in
    /// flight — "only one round may be in flight per edge" (spec.md §4.8).
    pub fn start_round(&mut self) -> bool {
        if self.is_collecting() {
            return false;
        }
        self.state = RoundState::Collecting(Vec::new());
        true
    }

    /// Record one peer's raw `/vote_response` payload. Ignored if no round
    /// is in flight.
    pub fn submit_ballot(&mut self, payload: Vec<u8>) {
        if let RoundState::Collecting(ballots) = &mut self.state {
            ballots.push(payload);
        }
    }

    /// Tally the round at `VOTE_TIMEOUT` and return to `Idle`.
    pub fn finish_round(&mut self) -> TallyOutcome {
        let ballots = match std::mem::replace(&mut self.state, RoundState::Idle) {
            RoundState::Collecting(ballots) => ballots,
            RoundState::Idle => Vec::new(),
        };

        if ballots.is_empty() {
            return TallyOutcome::NoVotes;
        }

        tally(&ballots)
    }
}

impl Default for MajorityVoteCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonicalize a raw ballot payload: JSON-decode as a uid array, sort,
/// dedupe. Malformed ballots canonicalize to an empty list rather than
/// being discarded, so they can still participate in (and lose) the tally.
fn canonicalize(raw: &[u8]) -> Vec<String> {
    let mut uids: Vec<String> = serde_json::from_slice(raw).unwrap_or_default();
    uids.sort();
    uids.dedup();
    uids
}

fn tally(ballots: &[Vec<u8>]) -> TallyOutcome {
    let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
    let mut first_arrival: HashMap<Vec<String>, usize> = HashMap::new();

    for (index, raw) in ballots.iter().enumerate() {
        let canonical = canonicalize(raw);
        *counts.entry(canonical.clone()).or_insert(0) += 1;
        first_arrival.entry(canonical).or_insert(index);
    }

    let winner = counts
        .into_iter()
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| first_arrival[&b.0].cmp(&first_arrival[&a.0]))
        })
        .map(|(uids, _)| uids)
        .unwrap_or_default();

    TallyOutcome::Installed(winner)
}
