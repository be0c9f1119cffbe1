//! Live treasury balance.
//!
//! The contract's `get_treasury_balance` is simulated through the RPC, so the
//! figure includes plain token transfers to the DAO that emit no DAO event.
//! Nothing is signed or submitted. When the read fails, callers fall back to
//! the figure summed from indexed events.

use reqwest::Client;
use sqlx::SqlitePool;
use stellar_xdr::curr::{
    Hash, HostFunction, Int128Parts, InvokeContractArgs, InvokeHostFunctionOp, Limits, Memo,
    MuxedAccount, Operation, OperationBody, Preconditions, ReadXdr, ScAddress, ScSymbol, ScVal,
    SequenceNumber, Transaction, TransactionEnvelope, TransactionExt, TransactionV1Envelope,
    Uint256, VecM, WriteXdr,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::db;
use crate::errors::{IndexerError, Result};
use crate::rpc;

const BALANCE_FN: &str = "get_treasury_balance";

/// Simulation does not load the source account; any key will do.
const SIMULATION_SOURCE: [u8; 32] = [0; 32];

/// Unsigned envelope invoking `function` on `contract_id` with no arguments.
pub fn read_call_envelope(contract_id: &str, function: &str) -> Result<String> {
    let contract = stellar_strkey::Contract::from_string(contract_id).map_err(|_| {
        IndexerError::Config(format!("CONTRACT_ID \"{contract_id}\" is not a contract address"))
    })?;

    let invoke = InvokeHostFunctionOp {
        host_function: HostFunction::InvokeContract(InvokeContractArgs {
            contract_address: ScAddress::Contract(Hash(contract.0)),
            function_name: ScSymbol(function.try_into()?),
            args: VecM::default(),
        }),
        auth: VecM::default(),
    };
    let tx = Transaction {
        source_account: MuxedAccount::Ed25519(Uint256(SIMULATION_SOURCE)),
        fee: 100,
        seq_num: SequenceNumber(0),
        cond: Preconditions::None,
        memo: Memo::None,
        operations: vec![Operation {
            source_account: None,
            body: OperationBody::InvokeHostFunction(invoke),
        }]
        .try_into()?,
        ext: TransactionExt::V0,
    };
    let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::default(),
    });
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

/// Decode a base64 `ScVal` holding an `i128`.
pub fn decode_i128(xdr: &str) -> Result<i128> {
    match ScVal::from_xdr_base64(xdr, Limits::none())? {
        ScVal::I128(Int128Parts { hi, lo }) => Ok((i128::from(hi) << 64) | i128::from(lo)),
        other => Err(IndexerError::Decode(format!(
            "expected an i128 balance, got {:?}",
            other.discriminant()
        ))),
    }
}

/// The treasury balance the contract reports right now.
pub async fn live_balance(client: &Client, rpc_url: &str, contract_id: &str) -> Result<i128> {
    let envelope = read_call_envelope(contract_id, BALANCE_FN)?;
    let sim = rpc::simulate_transaction(client, rpc_url, &envelope).await?;
    if let Some(err) = sim.error {
        return Err(IndexerError::Simulation(err));
    }
    let result = sim
        .results
        .first()
        .ok_or_else(|| IndexerError::Simulation(format!("{BALANCE_FN} returned no result")))?;
    let balance = decode_i128(&result.xdr)?;
    debug!("live treasury balance {balance} at ledger {:?}", sim.latest_ledger);
    Ok(balance)
}

/// A treasury balance and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceReading {
    pub balance: i128,
    /// `false` when the indexed deposits-minus-releases figure was used.
    pub live: bool,
}

#[derive(Debug, Clone)]
pub struct TreasuryReader {
    client: Client,
    rpc_url: String,
    contract_id: String,
}

impl TreasuryReader {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            rpc_url: config.rpc_url.clone(),
            contract_id: config.contract_id.clone(),
        }
    }

    pub async fn live(&self) -> Result<i128> {
        live_balance(&self.client, &self.rpc_url, &self.contract_id).await
    }

    /// The live balance, or the indexed one when the contract can't be read.
    pub async fn balance(&self, pool: &SqlitePool) -> Result<BalanceReading> {
        match self.live().await {
            Ok(balance) => Ok(BalanceReading {
                balance,
                live: true,
            }),
            Err(e) => {
                warn!("live treasury read failed, using indexed balance: {e}");
                Ok(BalanceReading {
                    balance: db::treasury_balance(pool).await?,
                    live: false,
                })
            }
        }
    }
}
