use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod constants;
pub mod error;
pub mod mine;
pub mod pow;

pub use chain::{Candidate, Ledger};
pub use error::{LedgerError, Result};
pub use mine::{Miner, Search};
pub use pow::{CancelFlag, Proof};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: i64,
    pub sender: String,
    pub recipient: String,
}

impl Transaction {
    pub fn new(amount: i64, sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            amount,
            sender: sender.into(),
            recipient: recipient.into(),
        }
    }
}

/// A committed unit of the chain. `index` is 1-based and equals the block's
/// position in the chain; `hash` covers `prev_hash`, `nonce` and `transactions`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    pub hash: String,
    pub prev_hash: String,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.index == 1
    }

    /// Recompute the hash from the block's contents.
    pub fn computed_hash(&self) -> String {
        pow::hash_block(self.nonce, &self.prev_hash, &self.transactions)
    }
}

/// Seconds since the Unix epoch, UTC, with sub-second precision.
pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
