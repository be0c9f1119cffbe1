#![allow(dead_code)]

extern crate std;

use crate::lifecycle::is_valid_transition;
use crate::types::{Proposal, ProposalStatus};

/// INV-1: Requested amount is never negative.
pub fn assert_amount_non_negative(proposal: &Proposal) {
    assert!(
        proposal.requested_amount >= 0,
        "INV-1 violated: proposal {} has negative amount ({})",
        proposal.id,
        proposal.requested_amount
    );
}

/// INV-2: `funds_released` is true exactly when the status is `Released`.
pub fn assert_released_flag_matches_status(proposal: &Proposal) {
    assert_eq!(
        proposal.funds_released,
        proposal.status == ProposalStatus::Released,
        "INV-2 violated: proposal {} has funds_released={} with status {:?}",
        proposal.id,
        proposal.funds_released,
        proposal.status
    );
}

/// INV-3: Proposal IDs are sequential starting from 1.
pub fn assert_sequential_ids(proposals: &[Proposal]) {
    for (i, proposal) in proposals.iter().enumerate() {
        assert_eq!(
            proposal.id,
            i as u64 + 1,
            "INV-3 violated: expected id {}, got {}",
            i + 1,
            proposal.id
        );
    }
}

/// INV-4: Status transitions are forward-only. Staying put is always allowed.
pub fn assert_valid_status_change(from: ProposalStatus, to: ProposalStatus) {
    assert!(
        from == to || is_valid_transition(from, to),
        "INV-4 violated: invalid status transition from {:?} to {:?}",
        from,
        to
    );
}

/// INV-5: Fields fixed at creation never change.
pub fn assert_immutable_fields(original: &Proposal, current: &Proposal) {
    assert_eq!(original.id, current.id, "INV-5 violated: id changed");
    assert_eq!(
        original.proposer, current.proposer,
        "INV-5 violated: proposer changed"
    );
    assert_eq!(original.name, current.name, "INV-5 violated: name changed");
    assert_eq!(
        original.category, current.category,
        "INV-5 violated: category changed"
    );
    assert_eq!(
        original.description, current.description,
        "INV-5 violated: description changed"
    );
    assert_eq!(
        original.requested_amount, current.requested_amount,
        "INV-5 violated: requested_amount changed"
    );
    assert_eq!(original.jobs, current.jobs, "INV-5 violated: jobs changed");
    assert_eq!(
        original.deadline, current.deadline,
        "INV-5 violated: deadline changed"
    );
}

/// INV-6: Vote tallies never decrease.
pub fn assert_tallies_monotonic(before: &Proposal, after: &Proposal) {
    assert!(
        after.yes_votes >= before.yes_votes && after.no_votes >= before.no_votes,
        "INV-6 violated: tallies decreased from {}/{} to {}/{}",
        before.yes_votes,
        before.no_votes,
        after.yes_votes,
        after.no_votes
    );
}

/// Run every invariant that relates two snapshots of the same proposal.
pub fn assert_progression(before: &Proposal, after: &Proposal) {
    assert_immutable_fields(before, after);
    assert_tallies_monotonic(before, after);
    assert_valid_status_change(before.status, after.status);
    assert_all_proposal_invariants(after);
}

/// Run all stateless proposal invariants.
pub fn assert_all_proposal_invariants(proposal: &Proposal) {
    assert_amount_non_negative(proposal);
    assert_released_flag_matches_status(proposal);
}
