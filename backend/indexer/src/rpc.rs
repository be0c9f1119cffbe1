//! Soroban RPC client: polls `getEvents`, decodes DAO events, simulates
//! contract calls and relays signed transactions.
//!
//! ## Resilience
//!
//! * Event polling applies exponential back-off when the RPC returns an error
//!   or rate-limit response, up to [`MAX_BACKOFF_SECS`] seconds.
//! * Transaction calls are never retried: a failed write is reported back to
//!   the user, who decides whether to submit again.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::{IndexerError, Result};
use crate::events::{DaoEvent, EventKind, ProposalDetails};

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsResult {
    pub events: Vec<RawEvent>,
    pub cursor: Option<String>,
    #[serde(rename = "latestLedger")]
    pub latest_ledger: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct RawEvent {
    /// XDR-encoded topic list
    pub topic: Vec<String>,
    /// XDR-encoded event value / data
    pub value: Value,
    #[serde(rename = "contractId")]
    pub contract_id: Option<String>,
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
    pub id: Option<String>,
    pub ledger: Option<u64>,
    #[serde(rename = "ledgerClosedAt")]
    pub ledger_closed_at: Option<String>,
    #[serde(rename = "inSuccessfulContractCall")]
    pub in_successful_contract_call: Option<bool>,
    #[serde(rename = "pagingToken")]
    pub paging_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResult {
    /// `PENDING`, `DUPLICATE`, `TRY_AGAIN_LATER` or `ERROR`.
    pub status: String,
    pub hash: String,
    pub latest_ledger: Option<u64>,
    pub error_result_xdr: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResult {
    /// `SUCCESS`, `NOT_FOUND` or `FAILED`.
    pub status: String,
    pub ledger: Option<u64>,
    pub result_xdr: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionResult {
    /// Host error text when the invocation would fail, e.g.
    /// `HostError: Error(Contract, #4)` followed by the diagnostic event log.
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<SimulateHostFunctionResult>,
    pub latest_ledger: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulateHostFunctionResult {
    /// Base64 `ScVal` returned by the contract function.
    pub xdr: String,
}

// ─────────────────────────────────────────────────────────
// Event polling
// ─────────────────────────────────────────────────────────

/// Fetch a page of events from the RPC.
///
/// * `start_ledger`: the ledger sequence to scan from (inclusive).
/// * `cursor`: optional opaque pagination cursor from a previous response.
/// * `limit`: maximum number of events to return.
///
/// Returns `(events, next_cursor, latest_ledger)`.
pub async fn fetch_events(
    client: &Client,
    rpc_url: &str,
    contract_id: &str,
    start_ledger: u32,
    cursor: Option<&str>,
    limit: u32,
) -> Result<(Vec<RawEvent>, Option<String>, Option<u64>)> {
    let mut backoff = INITIAL_BACKOFF_SECS;

    loop {
        let params = build_params(contract_id, start_ledger, cursor, limit);

        let response = client
            .post(rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "getEvents",
                "params": params,
            }))
            .send()
            .await;

        match response {
            Err(e) => {
                warn!("RPC request failed (will retry in {backoff}s): {e}");
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                continue;
            }
            Ok(resp) => {
                let status = resp.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    warn!("Rate-limited by RPC (will retry in {backoff}s)");
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                    continue;
                }

                let body: RpcResponse<EventsResult> = resp.json().await?;

                if let Some(err) = body.error {
                    // Code -32600 / -32601 are hard failures; everything else we retry
                    if err.code == -32600 || err.code == -32601 {
                        return Err(IndexerError::Rpc {
                            code: err.code,
                            message: err.message,
                        });
                    }
                    warn!(
                        "RPC soft error (will retry in {backoff}s): {} {}",
                        err.code, err.message
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                    continue;
                }

                let result = body.result.ok_or_else(|| {
                    IndexerError::EventParse("Empty result from getEvents".to_string())
                })?;

                debug!(
                    "Fetched {} events (latest_ledger={:?})",
                    result.events.len(),
                    result.latest_ledger
                );

                return Ok((result.events, result.cursor, result.latest_ledger));
            }
        }
    }
}

fn build_params(contract_id: &str, start_ledger: u32, cursor: Option<&str>, limit: u32) -> Value {
    let mut params = json!({
        "filters": [
            {
                "type": "contract",
                "contractIds": [contract_id]
            }
        ],
        "pagination": {
            "limit": limit
        }
    });

    if let Some(cur) = cursor {
        params["pagination"]["cursor"] = json!(cur);
    } else {
        params["startLedger"] = json!(start_ledger);
    }

    params
}

// ─────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────

/// Single JSON-RPC call, no retries.
async fn call<T: DeserializeOwned>(
    client: &Client,
    rpc_url: &str,
    method: &str,
    params: Value,
) -> Result<T> {
    let body: RpcResponse<T> = client
        .post(rpc_url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if let Some(err) = body.error {
        return Err(IndexerError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    body.result
        .ok_or_else(|| IndexerError::EventParse(format!("Empty result from {method}")))
}

/// Broadcast a signed transaction envelope (base64 XDR).
pub async fn send_transaction(
    client: &Client,
    rpc_url: &str,
    envelope_xdr: &str,
) -> Result<SendTransactionResult> {
    call(
        client,
        rpc_url,
        "sendTransaction",
        json!({ "transaction": envelope_xdr }),
    )
    .await
}

/// Dry-run a transaction envelope (base64 XDR) without submitting it.
pub async fn simulate_transaction(
    client: &Client,
    rpc_url: &str,
    envelope_xdr: &str,
) -> Result<SimulateTransactionResult> {
    call(
        client,
        rpc_url,
        "simulateTransaction",
        json!({ "transaction": envelope_xdr }),
    )
    .await
}

pub async fn get_transaction(
    client: &Client,
    rpc_url: &str,
    hash: &str,
) -> Result<GetTransactionResult> {
    call(client, rpc_url, "getTransaction", json!({ "hash": hash })).await
}

// ─────────────────────────────────────────────────────────
// Event decoding
// ─────────────────────────────────────────────────────────

/// Decode a list of raw RPC events into [`DaoEvent`] structs.
///
/// Events from failed contract calls are dropped.
pub fn decode_events(raw: &[RawEvent], contract_id: &str) -> Vec<DaoEvent> {
    raw.iter()
        .filter(|e| e.in_successful_contract_call != Some(false))
        .filter_map(|e| decode_single(e, contract_id))
        .collect()
}

fn decode_single(raw: &RawEvent, contract_id: &str) -> Option<DaoEvent> {
    // Extract leading topic symbol to determine event type.
    let first_topic = raw.topic.first()?;
    let kind = EventKind::from_topic(&extract_symbol(first_topic));

    let ledger = raw.ledger.unwrap_or(0) as i64;
    let timestamp = raw
        .ledger_closed_at
        .as_deref()
        .and_then(parse_iso_to_unix)
        .unwrap_or(0);

    let proposal_id = raw
        .topic
        .get(1)
        .and_then(|t| extract_u64(t))
        .or_else(|| extract_field(&raw.value, &["id"]).and_then(|s| s.parse().ok()));

    let mut event = DaoEvent {
        kind,
        event_id: raw.id.clone(),
        proposal_id,
        actor: None,
        amount: None,
        support: None,
        details: None,
        ledger,
        timestamp,
        contract_id: raw
            .contract_id
            .clone()
            .unwrap_or_else(|| contract_id.to_string()),
        tx_hash: raw.tx_hash.clone(),
    };
    decode_data(&raw.value, &mut event);
    Some(event)
}

/// Pull apart the JSON `value` blob that Soroban returns for event data.
/// The XDR is decoded by the RPC into a `{"field": …}` JSON object.
fn decode_data(value: &Value, event: &mut DaoEvent) {
    match event.kind {
        EventKind::ProposalCreated => {
            event.actor = extract_field(value, &["proposer"]).or_else(|| find_nested(value, "proposer"));
            event.amount = extract_field(value, &["requested_amount", "requestedAmount"]);
        }
        EventKind::ProposalDetails => {
            event.details = Some(ProposalDetails {
                name: extract_field(value, &["name"]).unwrap_or_default(),
                category: extract_field(value, &["category"]).unwrap_or_default(),
                description: extract_field(value, &["description"]).unwrap_or_default(),
                jobs: extract_field(value, &["jobs"])
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
                deadline: extract_field(value, &["deadline"])
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            });
        }
        EventKind::Voted => {
            event.actor = extract_field(value, &["voter"]);
            event.support = value.get("support").and_then(|v| match v {
                Value::Bool(b) => Some(*b),
                Value::String(s) => s.parse().ok(),
                _ => None,
            });
        }
        EventKind::FundsReleased => {
            event.amount = extract_field(value, &["amount"]);
        }
        EventKind::TreasuryDeposit => {
            event.actor = extract_field(value, &["from"]);
            event.amount = extract_field(value, &["amount"]);
        }
        EventKind::ProposalApproved | EventKind::ProposalRejected | EventKind::Unknown => {}
    }
}

fn extract_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = value.get(key) {
            let s = match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            };
            if s.is_some() {
                return s;
            }
        }
    }
    None
}

fn find_nested(value: &Value, key: &str) -> Option<String> {
    if let Value::Object(map) = value {
        for (k, v) in map {
            if k == key {
                return v.as_str().map(String::from);
            }
            if let Some(found) = find_nested(v, key) {
                return Some(found);
            }
        }
    }
    None
}

/// Extract a Soroban Symbol from the XDR-decoded topic string.
/// The RPC may return `{"type":"symbol","value":"created"}` or just the raw string.
fn extract_symbol(raw: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        if let Some(s) = v.get("value").and_then(|x| x.as_str()) {
            return s.to_string();
        }
    }
    raw.to_string()
}

/// Extract the proposal id from a topic entry that might be a JSON object or a raw number.
fn extract_u64(raw: &str) -> Option<u64> {
    if let Ok(v) = serde_json::from_str::<Value>(raw) {
        let inner = v.get("value").unwrap_or(&v);
        if let Some(n) = inner.as_u64() {
            return Some(n);
        }
        if let Some(s) = inner.as_str() {
            return s.parse().ok();
        }
    }
    raw.parse().ok()
}

/// Parse an ISO-8601 timestamp string into a Unix epoch (seconds).
fn parse_iso_to_unix(s: &str) -> Option<i64> {
    use chrono::DateTime;
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(topics: &[&str], value: Value) -> RawEvent {
        RawEvent {
            topic: topics.iter().map(|t| t.to_string()).collect(),
            value,
            contract_id: Some("CDAO".to_string()),
            tx_hash: Some("TX1".to_string()),
            id: Some("0000004294971392-0000000001".to_string()),
            ledger: Some(1000),
            ledger_closed_at: Some("2024-01-01T00:00:00Z".to_string()),
            in_successful_contract_call: Some(true),
            paging_token: None,
        }
    }

    #[test]
    fn event_kind_from_topic() {
        assert_eq!(EventKind::from_topic("created"), EventKind::ProposalCreated);
        assert_eq!(EventKind::from_topic("details"), EventKind::ProposalDetails);
        assert_eq!(EventKind::from_topic("voted"), EventKind::Voted);
        assert_eq!(EventKind::from_topic("approved"), EventKind::ProposalApproved);
        assert_eq!(EventKind::from_topic("rejected"), EventKind::ProposalRejected);
        assert_eq!(EventKind::from_topic("released"), EventKind::FundsReleased);
        assert_eq!(EventKind::from_topic("deposit"), EventKind::TreasuryDeposit);
        assert_eq!(EventKind::from_topic("something_else"), EventKind::Unknown);
    }

    #[test]
    fn extract_symbol_from_json() {
        let raw = r#"{"type":"symbol","value":"voted"}"#;
        assert_eq!(extract_symbol(raw), "voted");
    }

    #[test]
    fn extract_symbol_raw_fallback() {
        assert_eq!(extract_symbol("approved"), "approved");
    }

    #[test]
    fn extract_u64_variants() {
        assert_eq!(extract_u64(r#"{"type":"u64","value":"42"}"#), Some(42));
        assert_eq!(extract_u64(r#"{"type":"u64","value":7}"#), Some(7));
        assert_eq!(extract_u64("9"), Some(9));
        assert_eq!(extract_u64("not-a-number"), None);
    }

    #[test]
    fn decode_created_event() {
        let ev = raw(
            &[
                r#"{"type":"symbol","value":"created"}"#,
                r#"{"type":"u64","value":"3"}"#,
            ],
            json!({ "id": 3, "proposer": "GPROPOSER", "requested_amount": "250000000" }),
        );

        let events = decode_events(&[ev], "CDAO");
        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(ev.kind, EventKind::ProposalCreated);
        assert_eq!(ev.proposal_id, Some(3));
        assert_eq!(ev.actor.as_deref(), Some("GPROPOSER"));
        assert_eq!(ev.amount.as_deref(), Some("250000000"));
        assert_eq!(ev.ledger, 1000);
        assert_eq!(ev.timestamp, 1_704_067_200);
    }

    #[test]
    fn decode_details_event() {
        let ev = raw(
            &[r#"{"type":"symbol","value":"details"}"#, r#"{"type":"u64","value":"3"}"#],
            json!({
                "id": 3,
                "name": "Warung Kopi",
                "category": "Food & Beverage",
                "description": "Coffee stall",
                "jobs": "4",
                "deadline": 1704326400
            }),
        );

        let events = decode_events(&[ev], "CDAO");
        let details = events[0].details.clone().unwrap();
        assert_eq!(details.name, "Warung Kopi");
        assert_eq!(details.category, "Food & Beverage");
        assert_eq!(details.jobs, 4);
        assert_eq!(details.deadline, 1_704_326_400);
    }

    #[test]
    fn decode_voted_event() {
        let ev = raw(
            &[r#"{"type":"symbol","value":"voted"}"#, r#"{"type":"u64","value":"42"}"#],
            json!({ "id": 42, "voter": "GVOTER", "support": false }),
        );

        let events = decode_events(&[ev], "CDAO");
        assert_eq!(events[0].kind, EventKind::Voted);
        assert_eq!(events[0].proposal_id, Some(42));
        assert_eq!(events[0].actor.as_deref(), Some("GVOTER"));
        assert_eq!(events[0].support, Some(false));
    }

    #[test]
    fn decode_deposit_event_without_proposal() {
        let ev = raw(
            &[r#"{"type":"symbol","value":"deposit"}"#],
            json!({ "from": "GFUNDER", "amount": 5000 }),
        );

        let events = decode_events(&[ev], "CDAO");
        assert_eq!(events[0].kind, EventKind::TreasuryDeposit);
        assert_eq!(events[0].proposal_id, None);
        assert_eq!(events[0].actor.as_deref(), Some("GFUNDER"));
        assert_eq!(events[0].amount.as_deref(), Some("5000"));
    }

    #[test]
    fn failed_contract_calls_are_skipped() {
        let mut ev = raw(
            &[r#"{"type":"symbol","value":"voted"}"#, r#"{"type":"u64","value":"1"}"#],
            json!({ "id": 1, "voter": "GVOTER", "support": true }),
        );
        ev.in_successful_contract_call = Some(false);
        assert!(decode_events(&[ev], "CDAO").is_empty());
    }

    #[test]
    fn params_use_cursor_over_start_ledger() {
        let with_cursor = build_params("CDAO", 10, Some("abc"), 50);
        assert_eq!(with_cursor["pagination"]["cursor"], "abc");
        assert!(with_cursor.get("startLedger").is_none());

        let fresh = build_params("CDAO", 10, None, 50);
        assert_eq!(fresh["startLedger"], 10);
        assert_eq!(fresh["filters"][0]["contractIds"][0], "CDAO");
    }

    #[test]
    fn parse_iso_timestamp() {
        let ts = parse_iso_to_unix("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(ts, 1_704_067_200);
    }
}
