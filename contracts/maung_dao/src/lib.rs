//! # MaungBiz DAO Contract
//!
//! Community-funding governance for a single treasury asset. The contract
//! `MaungDao` covers the full proposal lifecycle:
//!
//! | Phase        | Entry Point(s)                                   |
//! |--------------|--------------------------------------------------|
//! | Bootstrap    | `__constructor` (runs once, at deployment)       |
//! | Treasury     | [`MaungDao::deposit`], `get_treasury_balance`    |
//! | Proposals    | [`MaungDao::create_funding_proposal`]            |
//! | Voting       | [`MaungDao::vote`]                               |
//! | Resolution   | [`MaungDao::finalize_proposal`], `release_funds` |
//! | Queries      | `proposal_count`, `get_proposal`, `has_voted`    |
//!
//! ## Architecture
//!
//! Storage access is delegated to `storage`, the voting rules to `voting`,
//! the state machine to `lifecycle` and token movements to `treasury`.
//! This file contains only the public entry points.
//!
//! Every state-changing call runs as one atomic host invocation, so no
//! caller can observe a half-applied vote, finalization or release.

#![no_std]

use soroban_sdk::{contract, contracterror, contractimpl, panic_with_error, Address, Env, String};

mod events;
mod lifecycle;
mod storage;
mod treasury;
mod types;
mod voting;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_events;

pub use events::{
    FundsReleased, ProposalApproved, ProposalCreated, ProposalDetails, ProposalRejected,
    TreasuryDeposit, Voted,
};
pub use lifecycle::{is_valid_transition, meets_quorum, QUORUM_PERCENT, VOTING_WINDOW_SECS};
pub use types::{Proposal, ProposalStatus};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    ProposalNotFound     = 1,
    InvalidProposal      = 2,
    VotingClosed         = 3,
    AlreadyVoted         = 4,
    TooEarly             = 5,
    AlreadyFinalized     = 6,
    NotApproved          = 7,
    AlreadyReleased      = 8,
    InsufficientTreasury = 9,
    InvalidAmount        = 10,
    /// No longer raised: the token is set by the constructor. Kept so codes
    /// stay stable for clients.
    AlreadyInitialized   = 11,
    NotInitialized       = 12,
}

#[contract]
pub struct MaungDao;

#[contractimpl]
impl MaungDao {
    // ─────────────────────────────────────────────────────────
    // Bootstrap
    // ─────────────────────────────────────────────────────────

    /// Set the asset held by the treasury.
    ///
    /// Runs atomically with deployment, so no other caller can pick the token.
    pub fn __constructor(env: Env, token: Address) {
        storage::set_token(&env, &token);
    }

    // ─────────────────────────────────────────────────────────
    // Treasury
    // ─────────────────────────────────────────────────────────

    /// Fund the treasury with `amount` of the treasury token.
    pub fn deposit(env: Env, from: Address, amount: i128) {
        from.require_auth();
        treasury::deposit(&env, &from, amount);
    }

    /// Balance currently held by the contract.
    pub fn get_treasury_balance(env: Env) -> i128 {
        treasury::balance(&env)
    }

    // ─────────────────────────────────────────────────────────
    // Proposals
    // ─────────────────────────────────────────────────────────

    /// Open a new funding proposal for voting and return its id.
    ///
    /// The deadline is fixed at creation: now + [`VOTING_WINDOW_SECS`].
    pub fn create_funding_proposal(
        env: Env,
        proposer: Address,
        name: String,
        category: String,
        description: String,
        requested_amount: i128,
        jobs: u64,
    ) -> u64 {
        proposer.require_auth();
        lifecycle::create(
            &env,
            proposer,
            name,
            category,
            description,
            requested_amount,
            jobs,
        )
    }

    pub fn proposal_count(env: Env) -> u64 {
        storage::proposal_count(&env)
    }

    /// Retrieve a proposal by its ID.
    pub fn get_proposal(env: Env, id: u64) -> Proposal {
        match storage::load_proposal(&env, id) {
            Some(proposal) => proposal,
            None => panic_with_error!(&env, Error::ProposalNotFound),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Voting
    // ─────────────────────────────────────────────────────────

    /// Cast `voter`'s single, irrevocable vote on proposal `id`.
    pub fn vote(env: Env, id: u64, voter: Address, support: bool) {
        voter.require_auth();
        voting::cast_vote(&env, id, &voter, support);
    }

    pub fn has_voted(env: Env, id: u64, voter: Address) -> bool {
        storage::has_voted(&env, id, &voter)
    }

    // ─────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────

    /// Resolve an expired `Active` proposal against the quorum.
    ///
    /// Anyone may call this once the deadline has passed.
    pub fn finalize_proposal(env: Env, id: u64) -> ProposalStatus {
        lifecycle::finalize(&env, id)
    }

    /// Transfer the requested amount of an `Approved` proposal to its proposer.
    pub fn release_funds(env: Env, id: u64) {
        lifecycle::release(&env, id);
    }
}
