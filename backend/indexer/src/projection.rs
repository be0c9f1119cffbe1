//! Folds newly indexed events into the `proposals` and `votes` read models.
//!
//! Each event is applied exactly once, on the same transaction that first
//! stored it, so a failed projection also un-stores the event.
//! Status changes follow the contract's forward-only lifecycle; an event that
//! would move a proposal backwards is logged and skipped.

use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::db;
use crate::errors::Result;
use crate::events::{DaoEvent, EventKind};
use crate::proposal::ProposalStatus;

pub async fn apply(conn: &mut SqliteConnection, ev: &DaoEvent) -> Result<()> {
    let Some(id) = ev.proposal_id else {
        if ev.kind != EventKind::TreasuryDeposit && ev.kind != EventKind::Unknown {
            warn!("{} event without proposal id, skipping", ev.kind.as_str());
        }
        return Ok(());
    };

    match ev.kind {
        EventKind::ProposalCreated => {
            db::upsert_proposal_created(
                &mut *conn,
                id,
                ev.actor.as_deref(),
                ev.amount.as_deref(),
                ev.ledger,
            )
            .await?;
        }
        EventKind::ProposalDetails => {
            if let Some(details) = &ev.details {
                db::upsert_proposal_details(&mut *conn, id, details, ev.ledger).await?;
            }
        }
        EventKind::Voted => match (ev.actor.as_deref(), ev.support) {
            (Some(voter), Some(support)) => {
                if !db::record_vote(&mut *conn, id, voter, support, ev.ledger).await? {
                    debug!("vote by {voter} on proposal {id} already recorded");
                }
            }
            _ => warn!("voted event for proposal {id} is missing voter or support"),
        },
        EventKind::ProposalApproved => {
            transition(conn, id, ProposalStatus::Active, ProposalStatus::Approved, ev.ledger).await?
        }
        EventKind::ProposalRejected => {
            transition(conn, id, ProposalStatus::Active, ProposalStatus::Rejected, ev.ledger).await?
        }
        EventKind::FundsReleased => {
            transition(conn, id, ProposalStatus::Approved, ProposalStatus::Released, ev.ledger).await?
        }
        EventKind::TreasuryDeposit | EventKind::Unknown => {}
    }
    Ok(())
}

async fn transition(
    conn: &mut SqliteConnection,
    id: u64,
    from: ProposalStatus,
    to: ProposalStatus,
    ledger: i64,
) -> Result<()> {
    if !db::transition_status(conn, id, from, to, ledger).await? {
        warn!("proposal {id}: ignoring {to} event, stored status is not {from}");
    }
    Ok(())
}
