//! # Storage
//!
//! Provides typed helpers over Soroban's two storage tiers used by the DAO:
//!
//! ## Instance storage (contract-lifetime TTL)
//!
//! | Key              | Type      | Description                          |
//! |------------------|-----------|--------------------------------------|
//! | `ProposalCount`  | `u64`     | Number of proposals ever created     |
//! | `Token`          | `Address` | Asset held by the treasury           |
//!
//! Instance TTL is bumped by **7 days** whenever it falls below 1 day remaining.
//!
//! ## Persistent storage (per-entry TTL)
//!
//! | Key                | Type             | Description                     |
//! |--------------------|------------------|---------------------------------|
//! | `PropConfig(id)`   | `ProposalConfig` | Immutable proposal metadata     |
//! | `PropState(id)`    | `ProposalState`  | Tallies and lifecycle status    |
//! | `Vote(id, voter)`  | `bool`           | Support flag, written once      |
//!
//! Persistent TTL is bumped by **30 days** whenever it falls below 7 days remaining.
//!
//! Loaders return `Option` and leave the choice of error to the caller, since
//! an unknown id means `ProposalNotFound` for reads but `InvalidProposal`
//! for votes.

use soroban_sdk::{contracttype, Address, Env};

use crate::types::{Proposal, ProposalConfig, ProposalState};

// ── TTL Constants ────────────────────────────────────────────────────

/// Approximate ledgers per day (~5 seconds per ledger).
const DAY_IN_LEDGERS: u32 = 17_280;

const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
const INSTANCE_LIFETIME_THRESHOLD: u32 = DAY_IN_LEDGERS;

const PERSISTENT_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = 7 * DAY_IN_LEDGERS;

// ── Storage Keys ─────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    /// Count of proposals ever created; also the last assigned id (Instance).
    ProposalCount,
    /// Treasury asset contract (Instance).
    Token,
    /// Immutable proposal configuration keyed by ID (Persistent).
    PropConfig(u64),
    /// Mutable proposal state keyed by ID (Persistent).
    PropState(u64),
    /// Vote cast by an account on a proposal (Persistent).
    Vote(u64, Address),
}

// ── Instance Storage Helpers ─────────────────────────────────────────

fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

/// Number of proposals ever created. Ids `1..=count` are all valid.
pub fn proposal_count(env: &Env) -> u64 {
    bump_instance(env);
    env.storage()
        .instance()
        .get(&DataKey::ProposalCount)
        .unwrap_or(0)
}

/// Increments the proposal counter and returns the id for the new proposal.
/// Ids start at 1.
pub fn next_proposal_id(env: &Env) -> u64 {
    let next = proposal_count(env) + 1;
    env.storage()
        .instance()
        .set(&DataKey::ProposalCount, &next);
    next
}

pub fn set_token(env: &Env, token: &Address) {
    env.storage().instance().set(&DataKey::Token, token);
    bump_instance(env);
}

pub fn get_token(env: &Env) -> Option<Address> {
    bump_instance(env);
    env.storage().instance().get(&DataKey::Token)
}

// ── Persistent Storage Helpers ───────────────────────────────────────

fn bump_persistent(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

/// Save the immutable config and initial state of a new proposal.
pub fn save_proposal(env: &Env, config: &ProposalConfig, state: &ProposalState) {
    let config_key = DataKey::PropConfig(config.id);
    env.storage().persistent().set(&config_key, config);
    bump_persistent(env, &config_key);
    save_proposal_state(env, config.id, state);
}

/// Load the full `Proposal` by combining config and state.
pub fn load_proposal(env: &Env, id: u64) -> Option<Proposal> {
    let config = load_proposal_config(env, id)?;
    let state = load_proposal_state(env, id)?;
    Some(Proposal::from_parts(config, state))
}

pub fn load_proposal_config(env: &Env, id: u64) -> Option<ProposalConfig> {
    let key = DataKey::PropConfig(id);
    let config: ProposalConfig = env.storage().persistent().get(&key)?;
    bump_persistent(env, &key);
    Some(config)
}

pub fn load_proposal_state(env: &Env, id: u64) -> Option<ProposalState> {
    let key = DataKey::PropState(id);
    let state: ProposalState = env.storage().persistent().get(&key)?;
    bump_persistent(env, &key);
    Some(state)
}

/// Save only the mutable proposal state.
pub fn save_proposal_state(env: &Env, id: u64, state: &ProposalState) {
    let key = DataKey::PropState(id);
    env.storage().persistent().set(&key, state);
    bump_persistent(env, &key);
}

pub fn has_voted(env: &Env, id: u64, voter: &Address) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::Vote(id, voter.clone()))
}

pub fn record_vote(env: &Env, id: u64, voter: &Address, support: bool) {
    let key = DataKey::Vote(id, voter.clone());
    env.storage().persistent().set(&key, &support);
    bump_persistent(env, &key);
}
