//! Voting engine: one vote per account per proposal, never changeable.

use soroban_sdk::{panic_with_error, Address, Env};

use crate::events;
use crate::storage;
use crate::types::{ProposalState, ProposalStatus};
use crate::Error;

/// Record `voter`'s vote on proposal `id` and return the updated state.
///
/// Voting is open while `now <= deadline` and the proposal is `Active`.
pub fn cast_vote(env: &Env, id: u64, voter: &Address, support: bool) -> ProposalState {
    if id == 0 || id > storage::proposal_count(env) {
        panic_with_error!(env, Error::InvalidProposal);
    }
    let (config, mut state) = match (
        storage::load_proposal_config(env, id),
        storage::load_proposal_state(env, id),
    ) {
        (Some(config), Some(state)) => (config, state),
        _ => panic_with_error!(env, Error::InvalidProposal),
    };

    if env.ledger().timestamp() > config.deadline || state.status != ProposalStatus::Active {
        panic_with_error!(env, Error::VotingClosed);
    }
    if storage::has_voted(env, id, voter) {
        panic_with_error!(env, Error::AlreadyVoted);
    }

    if support {
        state.yes_votes += 1;
    } else {
        state.no_votes += 1;
    }
    storage::record_vote(env, id, voter, support);
    storage::save_proposal_state(env, id, &state);

    events::emit_voted(env, id, voter, support);
    state
}
