//! # Types
//!
//! Shared data structures used across all modules of the MaungBiz DAO.
//!
//! ## Design decisions
//!
//! ### Config / State split
//!
//! A `Proposal` is internally stored as two separate ledger entries:
//!
//! - [`ProposalConfig`]: written once at creation; never mutated.
//! - [`ProposalState`]: written on every vote, on finalization and on release.
//!
//! The public API exposes the reconstructed [`Proposal`] struct, whose field
//! order matches the `getProposal` tuple consumed by the dashboard.
//!
//! ### Status as a Finite-State Machine
//!
//! [`ProposalStatus`] enforces a strict forward-only lifecycle:
//!
//! ```text
//! Active ──► Approved ──► Released
//!    └─────► Rejected
//! ```
//!
//! `Rejected` and `Released` are terminal. The ordinals are part of the ABI:
//! consumers decode the raw `u32` value.

use soroban_sdk::{contracttype, Address, String};

/// Lifecycle status of a proposal.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ProposalStatus {
    /// Open for voting until the deadline.
    Active = 0,
    /// Finalized with approval at or above quorum.
    Approved = 1,
    /// Finalized below quorum (including zero votes).
    Rejected = 2,
    /// Requested amount paid out to the proposer.
    Released = 3,
}

/// Immutable proposal configuration, written once at creation.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalConfig {
    pub id: u64,
    pub proposer: Address,
    pub name: String,
    pub category: String,
    pub description: String,
    pub requested_amount: i128,
    pub jobs: u64,
    pub deadline: u64,
}

/// Mutable proposal state, updated by votes, finalization and release.
///
/// Kept small so that the frequent vote writes stay cheap.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalState {
    pub yes_votes: u64,
    pub no_votes: u64,
    pub status: ProposalStatus,
    pub funds_released: bool,
}

impl ProposalState {
    pub fn new() -> Self {
        Self {
            yes_votes: 0,
            no_votes: 0,
            status: ProposalStatus::Active,
            funds_released: false,
        }
    }
}

/// Full on-chain representation of a funding proposal.
///
/// Used as the public API return type; reconstructed internally from
/// the split `ProposalConfig` + `ProposalState` storage entries.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Proposal {
    /// Sequential identifier, starting at 1.
    pub id: u64,
    /// Account that created the proposal and receives released funds.
    pub proposer: Address,
    /// Business name.
    pub name: String,
    /// Business category.
    pub category: String,
    /// Free-text description.
    pub description: String,
    /// Amount requested, in the treasury token's smallest unit.
    pub requested_amount: i128,
    /// Estimated jobs created (impact metric).
    pub jobs: u64,
    pub yes_votes: u64,
    pub no_votes: u64,
    /// Ledger timestamp after which voting is closed.
    pub deadline: u64,
    /// Current lifecycle status.
    pub status: ProposalStatus,
    /// True once, and only once, the proposal reaches `Released`.
    pub funds_released: bool,
}

impl Proposal {
    pub fn from_parts(config: ProposalConfig, state: ProposalState) -> Self {
        Self {
            id: config.id,
            proposer: config.proposer,
            name: config.name,
            category: config.category,
            description: config.description,
            requested_amount: config.requested_amount,
            jobs: config.jobs,
            yes_votes: state.yes_votes,
            no_votes: state.no_votes,
            deadline: config.deadline,
            status: state.status,
            funds_released: state.funds_released,
        }
    }
}
