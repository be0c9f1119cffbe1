//! Contract events.
//!
//! Every event is published with a short symbol as the first topic and,
//! except for treasury deposits, the proposal id as the second topic. The
//! data is one of the structs below so off-chain consumers get named fields.

use soroban_sdk::{contracttype, symbol_short, Address, Env, String};

use crate::types::ProposalConfig;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalCreated {
    pub id: u64,
    pub proposer: Address,
    pub requested_amount: i128,
}

/// Descriptive fields of a new proposal, published right after
/// [`ProposalCreated`].
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalDetails {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub jobs: u64,
    pub deadline: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Voted {
    pub id: u64,
    pub voter: Address,
    pub support: bool,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalApproved {
    pub id: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalRejected {
    pub id: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FundsReleased {
    pub id: u64,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreasuryDeposit {
    pub from: Address,
    pub amount: i128,
}

pub fn emit_proposal_created(env: &Env, config: &ProposalConfig) {
    env.events().publish(
        (symbol_short!("created"), config.id),
        ProposalCreated {
            id: config.id,
            proposer: config.proposer.clone(),
            requested_amount: config.requested_amount,
        },
    );
    env.events().publish(
        (symbol_short!("details"), config.id),
        ProposalDetails {
            id: config.id,
            name: config.name.clone(),
            category: config.category.clone(),
            description: config.description.clone(),
            jobs: config.jobs,
            deadline: config.deadline,
        },
    );
}

pub fn emit_voted(env: &Env, id: u64, voter: &Address, support: bool) {
    env.events().publish(
        (symbol_short!("voted"), id),
        Voted {
            id,
            voter: voter.clone(),
            support,
        },
    );
}

pub fn emit_approved(env: &Env, id: u64) {
    env.events()
        .publish((symbol_short!("approved"), id), ProposalApproved { id });
}

pub fn emit_rejected(env: &Env, id: u64) {
    env.events()
        .publish((symbol_short!("rejected"), id), ProposalRejected { id });
}

pub fn emit_funds_released(env: &Env, id: u64, amount: i128) {
    env.events()
        .publish((symbol_short!("released"), id), FundsReleased { id, amount });
}

pub fn emit_deposit(env: &Env, from: &Address, amount: i128) {
    env.events().publish(
        (symbol_short!("deposit"),),
        TreasuryDeposit {
            from: from.clone(),
            amount,
        },
    );
}
