//! Client-side view of a proposal: the last snapshot built from indexed
//! events. The contract stays the source of truth; a snapshot may lag it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::IndexerError;

/// Proposal status as encoded on-chain: 0=Active, 1=Approved, 2=Rejected, 3=Released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Active,
    Approved,
    Rejected,
    Released,
}

impl ProposalStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Active),
            1 => Some(Self::Approved),
            2 => Some(Self::Rejected),
            3 => Some(Self::Released),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Active => 0,
            Self::Approved => 1,
            Self::Rejected => 2,
            Self::Released => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Released => "Released",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProposalStatus {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "released" => Ok(Self::Released),
            other => Err(IndexerError::Decode(format!("unknown status \"{other}\""))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSnapshot {
    pub id: u64,
    pub proposer: Option<String>,
    /// Smallest token units.
    pub requested_amount: i128,
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub jobs: u64,
    /// Unknown until the `details` event has been indexed.
    pub deadline: Option<i64>,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub status: ProposalStatus,
    pub funds_released: bool,
    pub created_ledger: i64,
    pub updated_ledger: i64,
}

impl ProposalSnapshot {
    pub fn total_votes(&self) -> u64 {
        self.yes_votes + self.no_votes
    }
}

/// Row shape of the `proposals` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProposalRow {
    pub id: i64,
    pub proposer: Option<String>,
    pub requested_amount: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Decimal text; see the `proposals` migration.
    pub jobs: Option<String>,
    pub deadline: Option<i64>,
    pub yes_votes: i64,
    pub no_votes: i64,
    pub status: i64,
    pub funds_released: bool,
    pub created_ledger: i64,
    pub updated_ledger: i64,
}

impl TryFrom<ProposalRow> for ProposalSnapshot {
    type Error = IndexerError;

    fn try_from(row: ProposalRow) -> Result<Self, Self::Error> {
        let status = ProposalStatus::from_code(row.status).ok_or_else(|| {
            IndexerError::Decode(format!("proposal {} has status code {}", row.id, row.status))
        })?;
        let requested_amount = match row.requested_amount.as_deref() {
            Some(raw) => parse_amount(raw)?,
            None => 0,
        };
        let jobs = match row.jobs.as_deref() {
            Some(raw) => raw.trim().parse().map_err(|_| {
                IndexerError::Decode(format!("proposal {} has jobs \"{raw}\"", row.id))
            })?,
            None => 0,
        };
        Ok(ProposalSnapshot {
            id: row.id as u64,
            proposer: row.proposer,
            requested_amount,
            name: row.name,
            category: row.category,
            description: row.description,
            jobs,
            deadline: row.deadline,
            yes_votes: row.yes_votes.max(0) as u64,
            no_votes: row.no_votes.max(0) as u64,
            status,
            funds_released: row.funds_released,
            created_ledger: row.created_ledger,
            updated_ledger: row.updated_ledger,
        })
    }
}

/// Parse a decimal integer amount as stored in events.
pub fn parse_amount(raw: &str) -> Result<i128, IndexerError> {
    raw.trim()
        .parse()
        .map_err(|_| IndexerError::Decode(format!("invalid amount \"{raw}\"")))
}
