//! Derived figures for the treasury, impact and governance views.

use serde::Serialize;

use crate::errors::IndexerError;
use crate::proposal::{ProposalSnapshot, ProposalStatus};

/// Share of yes votes among cast votes that approves a proposal.
pub const QUORUM_PERCENT: u64 = 50;

/// How many proposals the dashboard previews.
pub const LATEST_PREVIEW_COUNT: usize = 3;

/// Yes votes as a percentage of all cast votes; 0 when nobody voted.
pub fn approval_rate_percent(yes_votes: u64, no_votes: u64) -> f64 {
    let total = yes_votes + no_votes;
    if total == 0 {
        return 0.0;
    }
    yes_votes as f64 * 100.0 / total as f64
}

/// Same rule as the contract, in exact integer arithmetic.
pub fn quorum_reached(yes_votes: u64, no_votes: u64) -> bool {
    let total = yes_votes as u128 + no_votes as u128;
    total > 0 && yes_votes as u128 * 100 >= QUORUM_PERCENT as u128 * total
}

/// `"Voting Ended"` once `now` has reached the deadline, otherwise `"{h}h {m}m {s}s"`.
pub fn time_left(deadline: i64, now: i64) -> String {
    let diff = deadline.saturating_sub(now);
    if diff <= 0 {
        return "Voting Ended".to_string();
    }
    let hours = diff / 3600;
    let minutes = (diff % 3600) / 60;
    let seconds = diff % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

/// Render an amount in smallest units as a decimal with `precision` fraction
/// digits (truncated).
pub fn format_units(amount: i128, decimals: u32, precision: u32) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let scale = 10u128.pow(decimals);
    let whole = abs / scale;
    if precision == 0 {
        return format!("{sign}{whole}");
    }
    let frac = abs % scale;
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    let mut shown: String = frac.chars().take(precision as usize).collect();
    while shown.len() < precision as usize {
        shown.push('0');
    }
    format!("{sign}{whole}.{shown}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalView {
    #[serde(flatten)]
    pub proposal: ProposalSnapshot,
    pub status_label: &'static str,
    pub total_votes: u64,
    pub approval_rate: f64,
    pub quorum_percent: u64,
    pub quorum_reached: bool,
    /// `None` until the deadline is known.
    pub time_left: Option<String>,
    pub voting_open: bool,
    pub requested_display: String,
}

impl ProposalView {
    pub fn new(proposal: ProposalSnapshot, now: i64, decimals: u32) -> Self {
        let voting_open = proposal.status == ProposalStatus::Active
            && proposal.deadline.map_or(true, |deadline| now <= deadline);
        Self {
            status_label: proposal.status.label(),
            total_votes: proposal.total_votes(),
            approval_rate: approval_rate_percent(proposal.yes_votes, proposal.no_votes),
            quorum_percent: QUORUM_PERCENT,
            quorum_reached: quorum_reached(proposal.yes_votes, proposal.no_votes),
            time_left: proposal.deadline.map(|deadline| time_left(deadline, now)),
            voting_open,
            requested_display: format_units(proposal.requested_amount, decimals, 2),
            proposal,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub active: usize,
    pub approved: usize,
    pub rejected: usize,
    pub released: usize,
}

impl StatusCounts {
    pub fn tally(proposals: &[ProposalSnapshot]) -> Self {
        let mut counts = Self::default();
        for p in proposals {
            match p.status {
                ProposalStatus::Active => counts.active += 1,
                ProposalStatus::Approved => counts.approved += 1,
                ProposalStatus::Rejected => counts.rejected += 1,
                ProposalStatus::Released => counts.released += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreasuryOverview {
    pub balance: String,
    pub balance_display: String,
    pub total_proposals: usize,
    pub approved: usize,
    pub released: usize,
}

impl TreasuryOverview {
    pub fn compute(balance: i128, proposals: &[ProposalSnapshot], decimals: u32) -> Self {
        let counts = StatusCounts::tally(proposals);
        Self {
            balance: balance.to_string(),
            balance_display: format_units(balance, decimals, 4),
            total_proposals: proposals.len(),
            approved: counts.approved,
            released: counts.released,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactOverview {
    pub total_requested: String,
    /// Capital of proposals approved but not yet released.
    pub total_approved: String,
    pub total_released: String,
    pub total_jobs: u128,
    pub approved_count: usize,
    pub rejected_count: usize,
}

impl ImpactOverview {
    /// Fails if a capital total leaves the `i128` range.
    pub fn compute(proposals: &[ProposalSnapshot]) -> Result<Self, IndexerError> {
        let mut requested: i128 = 0;
        let mut approved: i128 = 0;
        let mut released: i128 = 0;
        let mut jobs: u128 = 0;
        let mut approved_count = 0;
        let mut rejected_count = 0;

        for p in proposals {
            requested = add_capital(requested, p.requested_amount, "requested")?;
            jobs += u128::from(p.jobs);
            match p.status {
                ProposalStatus::Approved => {
                    approved = add_capital(approved, p.requested_amount, "approved")?;
                    approved_count += 1;
                }
                ProposalStatus::Rejected => rejected_count += 1,
                ProposalStatus::Released => {
                    released = add_capital(released, p.requested_amount, "released")?
                }
                ProposalStatus::Active => {}
            }
        }

        Ok(Self {
            total_requested: requested.to_string(),
            total_approved: approved.to_string(),
            total_released: released.to_string(),
            total_jobs: jobs,
            approved_count,
            rejected_count,
        })
    }
}

fn add_capital(total: i128, amount: i128, what: &str) -> Result<i128, IndexerError> {
    total
        .checked_add(amount)
        .ok_or_else(|| IndexerError::Decode(format!("total {what} capital overflows i128")))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub treasury_balance: String,
    pub treasury_display: String,
    pub proposal_count: usize,
    pub counts: StatusCounts,
    /// Newest proposals first.
    pub latest: Vec<ProposalSnapshot>,
}

impl DashboardSummary {
    pub fn compute(balance: i128, proposals: &[ProposalSnapshot], decimals: u32) -> Self {
        let mut latest: Vec<ProposalSnapshot> = proposals.to_vec();
        latest.sort_by(|a, b| b.id.cmp(&a.id));
        latest.truncate(LATEST_PREVIEW_COUNT);
        Self {
            treasury_balance: balance.to_string(),
            treasury_display: format_units(balance, decimals, 4),
            proposal_count: proposals.len(),
            counts: StatusCounts::tally(proposals),
            latest,
        }
    }
}
