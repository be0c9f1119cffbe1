//! Application-wide error types.
//!
//! [`IndexerError`] covers the service's own plumbing (storage, RPC, config).
//! [`DashboardError`] is what a dashboard user can run into when preparing or
//! submitting a write; every variant is recoverable and carries a message
//! fit for display.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event parse error: {0}")]
    EventParse(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    #[error("Simulation failed: {0}")]
    Simulation(String),
}

pub type Result<T> = std::result::Result<T, IndexerError>;

/// Rejections raised by the DAO contract, by their on-chain error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("Proposal not found.")]
    ProposalNotFound,
    #[error("Proposal does not exist.")]
    InvalidProposal,
    #[error("Voting is closed for this proposal.")]
    VotingClosed,
    #[error("You have already voted on this proposal.")]
    AlreadyVoted,
    #[error("Voting has not ended yet.")]
    TooEarly,
    #[error("Proposal has already been finalized.")]
    AlreadyFinalized,
    #[error("Proposal not approved yet.")]
    NotApproved,
    #[error("Funds have already been released.")]
    AlreadyReleased,
    #[error("Treasury balance is too low to release these funds.")]
    InsufficientTreasury,
    #[error("Amount must not be negative.")]
    InvalidAmount,
    #[error("Contract is already initialized.")]
    AlreadyInitialized,
    #[error("Contract is not initialized.")]
    NotInitialized,
}

impl ContractError {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::ProposalNotFound,
            2 => Self::InvalidProposal,
            3 => Self::VotingClosed,
            4 => Self::AlreadyVoted,
            5 => Self::TooEarly,
            6 => Self::AlreadyFinalized,
            7 => Self::NotApproved,
            8 => Self::AlreadyReleased,
            9 => Self::InsufficientTreasury,
            10 => Self::InvalidAmount,
            11 => Self::AlreadyInitialized,
            12 => Self::NotInitialized,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        match self {
            Self::ProposalNotFound => 1,
            Self::InvalidProposal => 2,
            Self::VotingClosed => 3,
            Self::AlreadyVoted => 4,
            Self::TooEarly => 5,
            Self::AlreadyFinalized => 6,
            Self::NotApproved => 7,
            Self::AlreadyReleased => 8,
            Self::InsufficientTreasury => 9,
            Self::InvalidAmount => 10,
            Self::AlreadyInitialized => 11,
            Self::NotInitialized => 12,
        }
    }

    /// Find a contract error code in host diagnostic text such as
    /// `HostError: Error(Contract, #4)`.
    pub fn from_host_message(message: &str) -> Option<Self> {
        const MARKER: &str = "Error(Contract, #";
        let start = message.find(MARKER)? + MARKER.len();
        let digits: String = message[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok().and_then(Self::from_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("No signing account is connected.")]
    NoAccount,
    #[error("Wrong network selected: expected \"{expected}\", got \"{actual}\".")]
    WrongNetwork { expected: String, actual: String },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    /// Form input failed local checks; fix the input and resubmit.
    #[error("{0}")]
    Validation(String),

    /// The wallet must reconnect or switch network before retrying.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Signing, broadcast or on-chain execution failed.
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// The contract's preconditions reject the call.
    #[error(transparent)]
    ContractPrecondition(#[from] ContractError),

    #[error(transparent)]
    Internal(#[from] IndexerError),
}

impl DashboardError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Connection(_) => "connection",
            Self::Transaction(_) => "transaction",
            Self::ContractPrecondition(_) => "contract_precondition",
            Self::Internal(_) => "internal",
        }
    }

    /// The message shown to the user. Transaction failures stay generic;
    /// the detail goes to the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Connection(ConnectionError::NoAccount) => {
                "Connect a wallet to continue.".to_string()
            }
            Self::Connection(ConnectionError::WrongNetwork { expected, .. }) => {
                format!("Switch your wallet to \"{expected}\" and try again.")
            }
            Self::Transaction(_) => "Transaction failed.".to_string(),
            Self::ContractPrecondition(err) => err.to_string(),
            Self::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Connection(_) => StatusCode::PRECONDITION_REQUIRED,
            Self::Transaction(_) => StatusCode::BAD_GATEWAY,
            Self::ContractPrecondition(ContractError::ProposalNotFound)
            | Self::ContractPrecondition(ContractError::InvalidProposal) => StatusCode::NOT_FOUND,
            Self::ContractPrecondition(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
