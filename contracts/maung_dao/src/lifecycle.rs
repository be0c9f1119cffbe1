//! Lifecycle state machine: creation, finalization and fund release.
//!
//! ```text
//! create ──► Active ──finalize (≥ quorum)──► Approved ──release──► Released
//!               └─────finalize (< quorum)──► Rejected
//! ```

use soroban_sdk::{panic_with_error, Address, Env, String};

use crate::events;
use crate::storage;
use crate::treasury;
use crate::types::{ProposalConfig, ProposalState, ProposalStatus};
use crate::Error;

/// Voting stays open for this long after creation.
pub const VOTING_WINDOW_SECS: u64 = 3 * 24 * 60 * 60;

/// Minimum share of yes votes among cast votes, in percent.
pub const QUORUM_PERCENT: u64 = 50;

/// True if `yes / (yes + no) >= QUORUM_PERCENT`.
///
/// Zero cast votes count as a 0% approval rate and never meet quorum.
pub fn meets_quorum(yes_votes: u64, no_votes: u64) -> bool {
    let total = yes_votes as u128 + no_votes as u128;
    if total == 0 {
        return false;
    }
    yes_votes as u128 * 100 >= QUORUM_PERCENT as u128 * total
}

pub fn resolve_outcome(yes_votes: u64, no_votes: u64) -> ProposalStatus {
    if meets_quorum(yes_votes, no_votes) {
        ProposalStatus::Approved
    } else {
        ProposalStatus::Rejected
    }
}

/// The only transitions the contract can perform.
pub fn is_valid_transition(from: ProposalStatus, to: ProposalStatus) -> bool {
    matches!(
        (from, to),
        (ProposalStatus::Active, ProposalStatus::Approved)
            | (ProposalStatus::Active, ProposalStatus::Rejected)
            | (ProposalStatus::Approved, ProposalStatus::Released)
    )
}

pub fn create(
    env: &Env,
    proposer: Address,
    name: String,
    category: String,
    description: String,
    requested_amount: i128,
    jobs: u64,
) -> u64 {
    if requested_amount < 0 {
        panic_with_error!(env, Error::InvalidAmount);
    }

    let id = storage::next_proposal_id(env);
    let config = ProposalConfig {
        id,
        proposer,
        name,
        category,
        description,
        requested_amount,
        jobs,
        deadline: env.ledger().timestamp() + VOTING_WINDOW_SECS,
    };
    storage::save_proposal(env, &config, &ProposalState::new());

    events::emit_proposal_created(env, &config);
    id
}

/// Close voting on `id` and resolve it to `Approved` or `Rejected`.
pub fn finalize(env: &Env, id: u64) -> ProposalStatus {
    let (config, mut state) = load_or_panic(env, id);

    if env.ledger().timestamp() <= config.deadline {
        panic_with_error!(env, Error::TooEarly);
    }
    if state.status != ProposalStatus::Active {
        panic_with_error!(env, Error::AlreadyFinalized);
    }

    let outcome = resolve_outcome(state.yes_votes, state.no_votes);
    state.status = outcome;
    storage::save_proposal_state(env, id, &state);

    match outcome {
        ProposalStatus::Approved => events::emit_approved(env, id),
        _ => events::emit_rejected(env, id),
    }
    outcome
}

/// Pay the requested amount of an approved proposal to its proposer.
///
/// Exactly once: a released proposal is no longer `Approved`.
pub fn release(env: &Env, id: u64) -> i128 {
    let (config, mut state) = load_or_panic(env, id);

    match state.status {
        ProposalStatus::Approved => {}
        ProposalStatus::Released => panic_with_error!(env, Error::AlreadyReleased),
        ProposalStatus::Active | ProposalStatus::Rejected => {
            panic_with_error!(env, Error::NotApproved)
        }
    }

    state.status = ProposalStatus::Released;
    state.funds_released = true;
    storage::save_proposal_state(env, id, &state);

    treasury::pay_out(env, &config.proposer, config.requested_amount);

    events::emit_funds_released(env, id, config.requested_amount);
    config.requested_amount
}

fn load_or_panic(env: &Env, id: u64) -> (ProposalConfig, ProposalState) {
    match (
        storage::load_proposal_config(env, id),
        storage::load_proposal_state(env, id),
    ) {
        (Some(config), Some(state)) => (config, state),
        _ => panic_with_error!(env, Error::ProposalNotFound),
    }
}
