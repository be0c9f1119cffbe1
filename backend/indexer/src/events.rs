//! Canonical event types emitted by the DAO contract.
//!
//! These mirror the Soroban contract events defined in
//! `contracts/maung_dao/src/events.rs`.

use serde::{Deserialize, Serialize};

/// All recognised event kinds from the DAO contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A funding proposal was created (`created` topic).
    ProposalCreated,
    /// Descriptive fields of a new proposal (`details` topic).
    ProposalDetails,
    /// A vote was cast (`voted` topic).
    Voted,
    /// Finalized at or above quorum (`approved` topic).
    ProposalApproved,
    /// Finalized below quorum (`rejected` topic).
    ProposalRejected,
    /// Requested amount paid to the proposer (`released` topic).
    FundsReleased,
    /// Treasury was funded (`deposit` topic).
    TreasuryDeposit,
    /// An event from this contract that we don't recognise yet.
    Unknown,
}

impl EventKind {
    /// Every kind that changes proposal or treasury state.
    pub const STATE_CHANGING: [EventKind; 7] = [
        Self::ProposalCreated,
        Self::ProposalDetails,
        Self::Voted,
        Self::ProposalApproved,
        Self::ProposalRejected,
        Self::FundsReleased,
        Self::TreasuryDeposit,
    ];

    /// Parse the leading topic symbol string produced by Soroban into an [`EventKind`].
    pub fn from_topic(topic: &str) -> Self {
        match topic {
            "created" => Self::ProposalCreated,
            "details" => Self::ProposalDetails,
            "voted" => Self::Voted,
            "approved" => Self::ProposalApproved,
            "rejected" => Self::ProposalRejected,
            "released" => Self::FundsReleased,
            "deposit" => Self::TreasuryDeposit,
            _ => Self::Unknown,
        }
    }

    /// Return a short identifier string suitable for storage in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProposalCreated => "proposal_created",
            Self::ProposalDetails => "proposal_details",
            Self::Voted => "voted",
            Self::ProposalApproved => "proposal_approved",
            Self::ProposalRejected => "proposal_rejected",
            Self::FundsReleased => "funds_released",
            Self::TreasuryDeposit => "treasury_deposit",
            Self::Unknown => "unknown",
        }
    }

    /// Inverse of [`EventKind::as_str`].
    pub fn from_db_str(s: &str) -> Self {
        Self::STATE_CHANGING
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .unwrap_or(Self::Unknown)
    }
}

/// Descriptive proposal fields carried by the `details` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDetails {
    pub name: String,
    pub category: String,
    pub description: String,
    pub jobs: u64,
    pub deadline: i64,
}

/// A fully decoded DAO event, ready to be stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaoEvent {
    pub kind: EventKind,
    /// RPC-assigned event id, unique per event.
    pub event_id: Option<String>,
    pub proposal_id: Option<u64>,
    /// Proposer, voter or depositor, depending on the kind.
    pub actor: Option<String>,
    /// Requested, released or deposited amount, as a decimal string.
    pub amount: Option<String>,
    pub support: Option<bool>,
    pub details: Option<ProposalDetails>,
    pub ledger: i64,
    pub timestamp: i64,
    pub contract_id: String,
    pub tx_hash: Option<String>,
}

/// A raw event record as stored in / read from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub event_id: Option<String>,
    pub event_type: String,
    pub proposal_id: Option<String>,
    pub actor: Option<String>,
    pub amount: Option<String>,
    pub support: Option<bool>,
    pub payload: Option<String>,
    pub ledger: i64,
    pub timestamp: i64,
    pub contract_id: String,
    pub tx_hash: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_str_round_trips_for_known_kinds() {
        for kind in EventKind::STATE_CHANGING {
            assert_eq!(EventKind::from_db_str(kind.as_str()), kind);
        }
        assert_eq!(EventKind::from_db_str("role_set"), EventKind::Unknown);
    }
}
