//! Errors surfaced by the bridge core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("not enough funds: {amount} + fee {fee} exceeds balance {balance}")]
    InsufficientFunds { balance: u64, amount: u64, fee: u64 },
    #[error("unable to create transaction: {0}")]
    TransactionBuildFailed(String),
    #[error("unable to sign transaction: {0}")]
    SigningFailed(String),
    #[error("malformed message: {0}")]
    DecodeFailure(String),
    #[error("image encoding failed: {0}")]
    EncodingFailed(String),
    #[error("invalid passphrase: {0}")]
    InvalidPassphrase(String),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("no wallet connected")]
    NotConnected,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure reported by a wallet or peer-manager engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self { Self(message.into()) }
}
