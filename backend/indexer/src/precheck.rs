//! Preflight checks for vote / finalize / release.
//!
//! Mirrors the contract's preconditions against the last indexed snapshot so
//! the dashboard can stop a doomed action before the user signs it. A pass
//! here is advisory only: the snapshot may lag the chain. The treasury check
//! uses the live contract balance and is skipped when that can't be read.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;

use crate::db;
use crate::errors::{ConnectionError, ContractError, DashboardError};
use crate::proposal::{ProposalSnapshot, ProposalStatus};
use crate::treasury::TreasuryReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Vote { support: bool },
    Finalize,
    Release,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrecheckRequest {
    #[serde(flatten)]
    pub action: Action,
    pub account: Option<String>,
}

/// What the checks look at.
#[derive(Debug, Clone)]
pub struct Context<'a> {
    pub proposal: Option<&'a ProposalSnapshot>,
    pub already_voted: bool,
    /// `None` when the live balance is unknown.
    pub treasury_balance: Option<i128>,
    /// Unix seconds.
    pub now: i64,
}

pub fn check(
    action: Action,
    account: Option<&str>,
    ctx: &Context<'_>,
) -> Result<(), DashboardError> {
    if account.map(str::trim).filter(|a| !a.is_empty()).is_none() {
        return Err(ConnectionError::NoAccount.into());
    }

    match action {
        Action::Vote { .. } => {
            let p = ctx.proposal.ok_or(ContractError::InvalidProposal)?;
            if p.status != ProposalStatus::Active || deadline_passed(p, ctx.now) {
                return Err(ContractError::VotingClosed.into());
            }
            if ctx.already_voted {
                return Err(ContractError::AlreadyVoted.into());
            }
        }
        Action::Finalize => {
            let p = ctx.proposal.ok_or(ContractError::ProposalNotFound)?;
            // The contract reports an early call before a repeated one.
            if !deadline_passed(p, ctx.now) {
                return Err(ContractError::TooEarly.into());
            }
            if p.status != ProposalStatus::Active {
                return Err(ContractError::AlreadyFinalized.into());
            }
        }
        Action::Release => {
            let p = ctx.proposal.ok_or(ContractError::ProposalNotFound)?;
            match p.status {
                ProposalStatus::Released => return Err(ContractError::AlreadyReleased.into()),
                ProposalStatus::Approved => {}
                _ => return Err(ContractError::NotApproved.into()),
            }
            if ctx.treasury_balance.is_some_and(|balance| balance < p.requested_amount) {
                return Err(ContractError::InsufficientTreasury.into());
            }
        }
    }
    Ok(())
}

/// An unknown deadline (details not indexed yet) counts as still open.
fn deadline_passed(p: &ProposalSnapshot, now: i64) -> bool {
    p.deadline.is_some_and(|deadline| now > deadline)
}

/// Load the snapshot, vote record and treasury balance, then [`check`].
pub async fn run(
    pool: &SqlitePool,
    treasury: &TreasuryReader,
    id: u64,
    req: &PrecheckRequest,
    now: i64,
) -> Result<(), DashboardError> {
    let account = req.account.as_deref();
    let proposal = db::get_proposal(pool, id).await?;

    let already_voted = match (req.action, account) {
        (Action::Vote { .. }, Some(voter)) => db::get_vote(pool, id, voter).await?.is_some(),
        _ => false,
    };
    let treasury_balance = match req.action {
        Action::Release => match treasury.live().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("skipping treasury check for proposal {id}: {e}");
                None
            }
        },
        _ => None,
    };

    check(
        req.action,
        account,
        &Context {
            proposal: proposal.as_ref(),
            already_voted,
            treasury_balance,
            now,
        },
    )
}
