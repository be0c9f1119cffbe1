//! Axum REST API handlers.
//!
//! Read endpoints never fail on a storage error: they log it and answer with
//! an empty payload flagged `degraded: true`. Treasury figures come from the
//! contract; if it can't be read the indexed figure is served, also flagged
//! `degraded`. Write-side endpoints (form
//! validation, preflight, transaction relay) answer with a typed error body.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{error, warn};

use crate::analytics::{DashboardSummary, ImpactOverview, ProposalView, TreasuryOverview};
use crate::cache::ViewCache;
use crate::config::Config;
use crate::db;
use crate::errors::{ContractError, DashboardError, IndexerError};
use crate::events::{EventKind, EventRecord};
use crate::precheck::{self, PrecheckRequest};
use crate::proposal::{ProposalSnapshot, ProposalStatus};
use crate::subscription::{EventBus, Subscription};
use crate::treasury::TreasuryReader;
use crate::tx::{self, RelaySettings, SubmitRequest, TxOutcome};
use crate::validation::{self, ApplicationForm, CreateProposalArgs, FormRules};

pub struct ApiState {
    pub pool: SqlitePool,
    pub config: Config,
    pub client: Client,
    pub bus: EventBus,
    pub treasury: TreasuryReader,
    /// Proposal list behind the dashboard, rebuilt after state-changing events.
    proposal_cache: ViewCache<Vec<ProposalSnapshot>>,
    proposal_sub: Subscription,
}

impl ApiState {
    pub fn new(pool: SqlitePool, config: Config, client: Client, bus: EventBus) -> Self {
        let proposal_cache = ViewCache::new();
        let invalidate = proposal_cache.clone();
        let sub = bus.subscribe(&EventKind::STATE_CHANGING, move || invalidate.invalidate());
        let treasury = TreasuryReader::new(client.clone(), &config);
        Self {
            pool,
            config,
            client,
            bus,
            treasury,
            proposal_cache,
            proposal_sub: sub,
        }
    }

    /// Stop background work owned by the API.
    pub fn close(&self) {
        self.proposal_sub.cancel();
    }

    fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            rpc_url: self.config.rpc_url.clone(),
            network_passphrase: self.config.network_passphrase.clone(),
            confirm_attempts: self.config.tx_confirm_attempts,
            confirm_interval: Duration::from_secs(self.config.tx_confirm_interval_secs),
        }
    }

    fn form_rules(&self) -> FormRules {
        FormRules {
            token_decimals: self.config.token_decimals,
            min_funding_request: self.config.min_funding_request.clone(),
        }
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events", get(get_all_events))
        .route("/proposals", get(list_proposals))
        .route("/proposals/:id", get(get_proposal))
        .route("/proposals/:id/events", get(get_proposal_events))
        .route("/proposals/:id/votes/:voter", get(get_vote))
        .route("/proposals/:id/precheck", post(precheck_action))
        .route("/treasury", get(treasury))
        .route("/impact", get(impact))
        .route("/dashboard", get(dashboard))
        .route("/applications/validate", post(validate_application))
        .route("/transactions", post(submit_transaction))
        .with_state(state)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

/// A read payload plus whether it was replaced by an empty fallback.
#[derive(Serialize)]
pub struct Degradable<T> {
    #[serde(flatten)]
    pub data: T,
    pub degraded: bool,
}

impl<T: Default> Degradable<T> {
    fn from_result(what: &str, res: Result<T, IndexerError>) -> Self {
        match res {
            Ok(data) => Self {
                data,
                degraded: false,
            },
            Err(e) => {
                warn!("serving empty {what}: {e}");
                Self {
                    data: T::default(),
                    degraded: true,
                }
            }
        }
    }

    /// Like [`Degradable::from_result`], with `Ok((data, fell_back))` marking
    /// data built on a fallback input as degraded too.
    fn with_fallback(what: &str, res: Result<(T, bool), IndexerError>) -> Self {
        match res {
            Ok((data, fell_back)) => Self {
                data,
                degraded: fell_back,
            },
            Err(e) => Self::from_result(what, Err(e)),
        }
    }
}

#[derive(Serialize, Default)]
pub struct EventsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<u64>,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize, Default)]
pub struct ProposalsResponse {
    pub count: usize,
    pub proposals: Vec<ProposalView>,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub proposal_id: u64,
    pub voter: String,
    pub has_voted: bool,
    pub support: Option<bool>,
}

#[derive(Serialize)]
pub struct PrecheckResponse {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub subscribers: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    /// On-chain error code when the contract would reject the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
}

/// HTTP face of a [`DashboardError`].
pub struct ApiError(pub DashboardError);

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        Self(err)
    }
}

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        Self(err.into())
    }
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        match &err {
            DashboardError::Internal(e) => error!("request failed: {e}"),
            DashboardError::Transaction(detail) => warn!("transaction failed: {detail}"),
            _ => {}
        }
        let code = match &err {
            DashboardError::ContractPrecondition(e) => Some(e.code()),
            _ => None,
        };
        (
            err.status_code(),
            Json(ErrorResponse {
                error: err.kind(),
                message: err.user_message(),
                code,
            }),
        )
            .into_response()
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        subscribers: state.bus.subscriber_count(),
    })
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Storage name of an event kind, e.g. `voted`.
    pub kind: Option<String>,
}

/// `GET /events?kind=`
///
/// Returns all indexed events, optionally of one kind.
pub async fn get_all_events(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let res = db::get_all_events(&state.pool).await.map(|events| {
        let events: Vec<EventRecord> = match query.kind.as_deref() {
            Some(kind) => {
                let kind = EventKind::from_db_str(kind);
                events
                    .into_iter()
                    .filter(|e| EventKind::from_db_str(&e.event_type) == kind)
                    .collect()
            }
            None => events,
        };
        EventsResponse {
            proposal_id: None,
            count: events.len(),
            events,
        }
    });
    Json(Degradable::from_result("events", res))
}

/// `GET /proposals/:id/events`
///
/// Returns all indexed events for the given proposal, oldest first.
pub async fn get_proposal_events(
    State(state): State<Arc<ApiState>>,
    Path(proposal_id): Path<u64>,
) -> impl IntoResponse {
    let res = db::get_events_for_proposal(&state.pool, &proposal_id.to_string())
        .await
        .map(|events| EventsResponse {
            proposal_id: Some(proposal_id),
            count: events.len(),
            events,
        });
    Json(Degradable::from_result("proposal events", res))
}

#[derive(Debug, Deserialize)]
pub struct ProposalsQuery {
    pub status: Option<String>,
}

/// `GET /proposals?status=`
pub async fn list_proposals(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ProposalsQuery>,
) -> Result<Json<Degradable<ProposalsResponse>>, ApiError> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<ProposalStatus>().map_err(|_| {
            DashboardError::Validation(format!("Unknown proposal status \"{raw}\"."))
        })?),
        None => None,
    };

    let now = now();
    let decimals = state.config.token_decimals;
    let res = db::list_proposals(&state.pool, status).await.map(|proposals| {
        let proposals: Vec<ProposalView> = proposals
            .into_iter()
            .map(|p| ProposalView::new(p, now, decimals))
            .collect();
        ProposalsResponse {
            count: proposals.len(),
            proposals,
        }
    });
    Ok(Json(Degradable::from_result("proposals", res)))
}

/// `GET /proposals/:id`
pub async fn get_proposal(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> Result<Json<ProposalView>, ApiError> {
    let proposal = db::get_proposal(&state.pool, id)
        .await?
        .ok_or(ContractError::ProposalNotFound)?;
    Ok(Json(ProposalView::new(proposal, now(), state.config.token_decimals)))
}

/// `GET /proposals/:id/votes/:voter`
pub async fn get_vote(
    State(state): State<Arc<ApiState>>,
    Path((proposal_id, voter)): Path<(u64, String)>,
) -> Result<Json<VoteResponse>, ApiError> {
    let support = db::get_vote(&state.pool, proposal_id, &voter).await?;
    Ok(Json(VoteResponse {
        proposal_id,
        voter,
        has_voted: support.is_some(),
        support,
    }))
}

/// `GET /treasury`
pub async fn treasury(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let decimals = state.config.token_decimals;
    let res = async {
        let reading = state.treasury.balance(&state.pool).await?;
        let proposals = db::list_proposals(&state.pool, None).await?;
        let overview = TreasuryOverview::compute(reading.balance, &proposals, decimals);
        Ok::<_, IndexerError>((overview, !reading.live))
    }
    .await;
    Json(Degradable::with_fallback("treasury overview", res))
}

/// `GET /impact`
pub async fn impact(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let res = db::list_proposals(&state.pool, None)
        .await
        .and_then(|proposals| ImpactOverview::compute(&proposals));
    Json(Degradable::from_result("impact overview", res))
}

async fn cached_proposals(state: &ApiState) -> Result<Vec<ProposalSnapshot>, IndexerError> {
    if let Some(proposals) = state.proposal_cache.get() {
        return Ok(proposals);
    }
    let generation = state.proposal_cache.generation();
    let proposals = db::list_proposals(&state.pool, None).await?;
    state.proposal_cache.put(generation, proposals.clone());
    Ok(proposals)
}

/// `GET /dashboard`
///
/// Proposals come from the view cache, rebuilt after any state-changing
/// event; the treasury balance is read on every request since plain token
/// transfers emit no DAO event.
pub async fn dashboard(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let decimals = state.config.token_decimals;
    let res = async {
        let reading = state.treasury.balance(&state.pool).await?;
        let proposals = cached_proposals(&state).await?;
        let summary = DashboardSummary::compute(reading.balance, &proposals, decimals);
        Ok::<_, IndexerError>((summary, !reading.live))
    }
    .await;
    Json(Degradable::with_fallback("dashboard", res))
}

/// `POST /applications/validate`
///
/// Checks the funding application form and returns the contract call
/// arguments for the wallet to sign.
pub async fn validate_application(
    State(state): State<Arc<ApiState>>,
    Json(form): Json<ApplicationForm>,
) -> Result<Json<CreateProposalArgs>, ApiError> {
    let args = validation::validate_application(&form, &state.form_rules())?;
    Ok(Json(args))
}

/// `POST /proposals/:id/precheck`
pub async fn precheck_action(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
    Json(req): Json<PrecheckRequest>,
) -> Result<Json<PrecheckResponse>, ApiError> {
    precheck::run(&state.pool, &state.treasury, id, &req, now()).await?;
    Ok(Json(PrecheckResponse { ok: true }))
}

/// `POST /transactions`
///
/// Relays a wallet-signed envelope; answers `confirmed` or `pending`.
pub async fn submit_transaction(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<TxOutcome>), ApiError> {
    let outcome = tx::submit(&state.client, &state.relay_settings(), &req).await?;
    let code = match outcome.status {
        tx::TxStatus::Confirmed => StatusCode::OK,
        tx::TxStatus::Pending => StatusCode::ACCEPTED,
    };
    Ok((code, Json(outcome)))
}
