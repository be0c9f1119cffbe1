//! Relay for wallet-signed transactions.
//!
//! The dashboard never holds keys: the wallet signs, we check the envelope
//! targets our network, simulate it, broadcast it once and watch for the
//! result for a bounded time. A simulation that fails is reported without
//! sending; its host error names the contract code the call would trap with. A transaction still unconfirmed after that is reported as
//! pending rather than blocking the request.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{ConnectionError, ContractError, DashboardError, IndexerError};
use crate::rpc;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    /// Base64 `TransactionEnvelope` XDR, already signed.
    pub envelope_xdr: String,
    pub source_account: Option<String>,
    /// Passphrase of the network the wallet signed for.
    pub network_passphrase: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Confirmed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutcome {
    pub hash: String,
    pub status: TxStatus,
    pub ledger: Option<u64>,
    pub result_xdr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub rpc_url: String,
    pub network_passphrase: String,
    pub confirm_attempts: u32,
    pub confirm_interval: Duration,
}

/// Local checks before anything is sent. Returns the decoded envelope size.
pub fn check_request(req: &SubmitRequest, expected_network: &str) -> Result<usize, DashboardError> {
    if req
        .source_account
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .is_none()
    {
        return Err(ConnectionError::NoAccount.into());
    }

    let actual = req.network_passphrase.as_deref().unwrap_or_default();
    if actual != expected_network {
        return Err(ConnectionError::WrongNetwork {
            expected: expected_network.to_string(),
            actual: actual.to_string(),
        }
        .into());
    }

    let bytes = STANDARD
        .decode(req.envelope_xdr.trim())
        .map_err(|_| DashboardError::Validation("Transaction envelope is not valid base64.".to_string()))?;
    if bytes.is_empty() {
        return Err(DashboardError::Validation("Transaction envelope is empty.".to_string()));
    }
    Ok(bytes.len())
}

/// Map a failure detail to a contract precondition when it names one.
fn classify_failure(detail: String) -> DashboardError {
    match ContractError::from_host_message(&detail) {
        Some(err) => DashboardError::ContractPrecondition(err),
        None => DashboardError::Transaction(detail),
    }
}

fn rpc_failure(err: IndexerError) -> DashboardError {
    match err {
        IndexerError::Rpc { code, message } => {
            classify_failure(format!("RPC error {code}: {message}"))
        }
        IndexerError::Http(e) => DashboardError::Transaction(e.to_string()),
        other => DashboardError::Internal(other),
    }
}

/// A transaction hash is 32 bytes, hex encoded.
fn check_hash(hash: &str) -> Result<(), DashboardError> {
    match hex::decode(hash) {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => Err(DashboardError::Transaction(format!(
            "RPC returned malformed transaction hash \"{hash}\""
        ))),
    }
}

/// Validate, simulate, broadcast once, then poll for the outcome.
pub async fn submit(
    client: &Client,
    settings: &RelaySettings,
    req: &SubmitRequest,
) -> Result<TxOutcome, DashboardError> {
    let size = check_request(req, &settings.network_passphrase)?;

    let sim = rpc::simulate_transaction(client, &settings.rpc_url, req.envelope_xdr.trim())
        .await
        .map_err(rpc_failure)?;
    if let Some(detail) = sim.error {
        warn!("simulation rejected transaction at ledger {:?}", sim.latest_ledger);
        return Err(classify_failure(detail));
    }

    let sent = rpc::send_transaction(client, &settings.rpc_url, req.envelope_xdr.trim())
        .await
        .map_err(rpc_failure)?;
    info!(
        "sendTransaction {} -> {} ({size} bytes, latest ledger {:?})",
        sent.hash, sent.status, sent.latest_ledger
    );

    match sent.status.as_str() {
        "PENDING" | "DUPLICATE" => {}
        "TRY_AGAIN_LATER" => {
            return Err(DashboardError::Transaction(
                "network is busy, submit again later".to_string(),
            ))
        }
        other => {
            let detail = match sent.error_result_xdr.as_deref() {
                Some(xdr) => format!("{other}: {xdr}"),
                None => other.to_string(),
            };
            return Err(classify_failure(detail));
        }
    }

    check_hash(&sent.hash)?;
    confirm(client, settings, sent.hash).await
}

async fn confirm(
    client: &Client,
    settings: &RelaySettings,
    hash: String,
) -> Result<TxOutcome, DashboardError> {
    for attempt in 1..=settings.confirm_attempts {
        tokio::time::sleep(settings.confirm_interval).await;

        let res = match rpc::get_transaction(client, &settings.rpc_url, &hash).await {
            Ok(res) => res,
            Err(e) => {
                warn!("getTransaction {hash} attempt {attempt} failed: {e}");
                continue;
            }
        };

        match res.status.as_str() {
            "SUCCESS" => {
                info!("transaction {hash} confirmed in ledger {:?}", res.ledger);
                return Ok(TxOutcome {
                    hash,
                    status: TxStatus::Confirmed,
                    ledger: res.ledger,
                    result_xdr: res.result_xdr,
                });
            }
            "FAILED" => {
                let detail = res.result_xdr.unwrap_or_else(|| "FAILED".to_string());
                warn!("transaction {hash} failed: {detail}");
                return Err(classify_failure(detail));
            }
            _ => {}
        }
    }

    info!("transaction {hash} still pending after {} checks", settings.confirm_attempts);
    Ok(TxOutcome {
        hash,
        status: TxStatus::Pending,
        ledger: None,
        result_xdr: None,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;

    const NETWORK: &str = "Test SDF Network ; September 2015";
    const HASH: &str = "3389e9f0f1a65f19736cacf544c2e825313e8447f569233bb8db39aa607c8889";

    fn request() -> SubmitRequest {
        SubmitRequest {
            envelope_xdr: STANDARD.encode(b"signed-envelope"),
            source_account: Some("GSOURCE".to_string()),
            network_passphrase: Some(NETWORK.to_string()),
        }
    }

    #[test]
    fn missing_account_and_wrong_network_are_connection_errors() {
        let mut req = request();
        req.source_account = None;
        assert!(matches!(
            check_request(&req, NETWORK),
            Err(DashboardError::Connection(ConnectionError::NoAccount))
        ));

        let mut req = request();
        req.network_passphrase = Some("Public Global Stellar Network ; September 2015".to_string());
        assert!(matches!(
            check_request(&req, NETWORK),
            Err(DashboardError::Connection(ConnectionError::WrongNetwork { .. }))
        ));
    }

    #[test]
    fn envelope_must_be_base64() {
        let mut req = request();
        req.envelope_xdr = "not base64!".to_string();
        assert!(matches!(
            check_request(&req, NETWORK),
            Err(DashboardError::Validation(_))
        ));
        assert_eq!(check_request(&request(), NETWORK).unwrap(), 15);
    }

    #[test]
    fn hash_must_be_32_hex_bytes() {
        assert!(check_hash(HASH).is_ok());
        assert!(check_hash("abcd").is_err());
        assert!(check_hash(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn host_errors_become_preconditions() {
        let err = classify_failure("HostError: Error(Contract, #9)".to_string());
        assert!(matches!(
            err,
            DashboardError::ContractPrecondition(ContractError::InsufficientTreasury)
        ));
        let err = classify_failure("txBAD_SEQ".to_string());
        assert_eq!(err.user_message(), "Transaction failed.");
    }

    /// Host error text as Soroban RPC returns it from a failed simulation.
    const ALREADY_VOTED_SIMULATION: &str = "HostError: Error(Contract, #4)\n\n\
        Event log (newest first):\n   \
        0: [Diagnostic Event] contract:CCJZ5DGASBWQXR5MPFCJXMBI333XE5U3FSJTNQU7RIKE3P5GN2K2WYD5, \
        topics:[error, Error(Contract, #4)], \
        data:\"escalating Ok(ScErrorType::Contract) frame-exit to Err\"\n";

    #[derive(Default)]
    struct FakeRpc {
        polls: AtomicU32,
        sends: AtomicU32,
    }

    /// Minimal Soroban RPC stand-in: simulates (failing with `sim_error` if
    /// set), accepts the send, then reports `get_status` once `pending_polls`
    /// lookups have passed.
    async fn fake_rpc_with(
        sim_error: Option<&'static str>,
        get_status: &'static str,
        pending_polls: u32,
    ) -> (String, Arc<FakeRpc>) {
        let rpc = Arc::new(FakeRpc::default());
        let app = Router::new()
            .route(
                "/",
                post(move |State(rpc): State<Arc<FakeRpc>>, Json(body): Json<Value>| async move {
                    let result = match body["method"].as_str() {
                        Some("simulateTransaction") => match sim_error {
                            Some(error) => json!({ "error": error, "latestLedger": 99 }),
                            None => json!({
                                "results": [{ "auth": [], "xdr": "AAAAAQ==" }],
                                "latestLedger": 99,
                            }),
                        },
                        Some("sendTransaction") => {
                            rpc.sends.fetch_add(1, Ordering::SeqCst);
                            json!({
                                "status": "PENDING",
                                "hash": HASH,
                                "latestLedger": 100,
                            })
                        }
                        _ => {
                            let n = rpc.polls.fetch_add(1, Ordering::SeqCst);
                            if n < pending_polls {
                                json!({ "status": "NOT_FOUND" })
                            } else {
                                json!({ "status": get_status, "ledger": 101, "resultXdr": "AAAA" })
                            }
                        }
                    };
                    Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
                }),
            )
            .with_state(rpc.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/"), rpc)
    }

    async fn fake_rpc(get_status: &'static str, pending_polls: u32) -> String {
        fake_rpc_with(None, get_status, pending_polls).await.0
    }

    fn settings(rpc_url: String, attempts: u32) -> RelaySettings {
        RelaySettings {
            rpc_url,
            network_passphrase: NETWORK.to_string(),
            confirm_attempts: attempts,
            confirm_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn confirmed_after_polling() {
        let url = fake_rpc("SUCCESS", 2).await;
        let outcome = submit(&Client::new(), &settings(url, 5), &request()).await.unwrap();
        assert_eq!(outcome.status, TxStatus::Confirmed);
        assert_eq!(outcome.ledger, Some(101));
        assert_eq!(outcome.hash, HASH);
    }

    #[tokio::test]
    async fn still_pending_after_bounded_wait() {
        let url = fake_rpc("SUCCESS", 10).await;
        let outcome = submit(&Client::new(), &settings(url, 3), &request()).await.unwrap();
        assert_eq!(outcome.status, TxStatus::Pending);
    }

    #[tokio::test]
    async fn failed_transaction_is_reported() {
        let url = fake_rpc("FAILED", 0).await;
        let err = submit(&Client::new(), &settings(url, 3), &request()).await.unwrap_err();
        assert_eq!(err.kind(), "transaction");
    }

    #[tokio::test]
    async fn failed_simulation_is_a_precondition_and_nothing_is_sent() {
        let (url, rpc) = fake_rpc_with(Some(ALREADY_VOTED_SIMULATION), "SUCCESS", 0).await;
        let err = submit(&Client::new(), &settings(url, 3), &request()).await.unwrap_err();
        assert!(matches!(
            err,
            DashboardError::ContractPrecondition(ContractError::AlreadyVoted)
        ));
        assert_eq!(rpc.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_simulation_is_sent_once() {
        let (url, rpc) = fake_rpc_with(None, "SUCCESS", 0).await;
        submit(&Client::new(), &settings(url, 3), &request()).await.unwrap();
        assert_eq!(rpc.sends.load(Ordering::SeqCst), 1);
    }
}
