use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("chain is empty: genesis block has not been created")]
    EmptyChain,

    #[error("genesis block already exists")]
    GenesisExists,

    #[error("proof-of-work search was cancelled")]
    Cancelled,

    /// The chain advanced between taking the pending snapshot and committing.
    #[error("chain advanced during proof-of-work (expected tip {expected}, found {actual})")]
    StaleTip { expected: String, actual: String },

    #[error("hash {0} is not a valid proof of work for its block")]
    InvalidProofOfWork(String),

    #[error("block {index} is invalid: {reason}")]
    InvalidBlock { index: u64, reason: String },

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
