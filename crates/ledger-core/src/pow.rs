//! Canonical hashing, the acceptance predicate and the proof-of-work search.
//!
//! A block hash is the uppercase hex SHA-256 of `prev_hash`, the decimal nonce
//! and the canonical JSON of the block's transactions, concatenated in that
//! order. A hash is accepted when the characters at positions 2, 3, 5 and 7 are
//! the digits `2`, `3`, `5` and `7`.

use crate::constants::{ACCEPT_POSITIONS, PARALLEL_BATCH};
use crate::Transaction;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A nonce together with the accepted hash it produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub nonce: u64,
    pub hash: String,
}

/// Shared stop signal checked by the search between nonces.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Canonical encoding of an ordered transaction list: compact JSON, fields in
/// declaration order (`amount`, `sender`, `recipient`).
pub fn serialize(transactions: &[Transaction]) -> String {
    serde_json::to_string(transactions).expect("transaction records always encode as JSON")
}

pub fn hash_block(nonce: u64, prev_hash: &str, transactions: &[Transaction]) -> String {
    hash_payload(nonce, prev_hash, &serialize(transactions))
}

fn hash_payload(nonce: u64, prev_hash: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode_upper(hasher.finalize())
}

/// Acceptance predicate. Strings too short to cover a position are rejected.
pub fn validate_hash(hash: &str) -> bool {
    let bytes = hash.as_bytes();
    ACCEPT_POSITIONS
        .iter()
        .all(|&pos| bytes.get(pos).copied() == Some(b'0' + pos as u8))
}

/// Search nonces upward from zero and return the first accepted one.
pub fn proof_of_work(prev_hash: &str, transactions: &[Transaction]) -> Proof {
    let payload = serialize(transactions);
    (0..=u64::MAX)
        .map(|nonce| Proof {
            nonce,
            hash: hash_payload(nonce, prev_hash, &payload),
        })
        .find(|proof| validate_hash(&proof.hash))
        .expect("nonce space exhausted (practically impossible)")
}

/// Same search as [`proof_of_work`], checking `cancel` before every nonce.
/// Returns `None` once the flag is raised.
pub fn proof_of_work_with_cancel(
    prev_hash: &str,
    transactions: &[Transaction],
    cancel: &CancelFlag,
) -> Option<Proof> {
    let payload = serialize(transactions);
    for nonce in 0..=u64::MAX {
        if cancel.is_cancelled() {
            debug!(nonce, "proof-of-work cancelled");
            return None;
        }
        let hash = hash_payload(nonce, prev_hash, &payload);
        if validate_hash(&hash) {
            return Some(Proof { nonce, hash });
        }
    }
    None
}

/// Parallel search over consecutive batches of nonces. Each batch is scanned
/// with `find_map_first`, so the result is the same minimal nonce the
/// sequential search returns. `cancel` is checked between batches.
pub fn proof_of_work_parallel(
    prev_hash: &str,
    transactions: &[Transaction],
    cancel: &CancelFlag,
) -> Option<Proof> {
    let payload = serialize(transactions);
    let mut start = 0u64;
    loop {
        if cancel.is_cancelled() {
            debug!(start, "parallel proof-of-work cancelled");
            return None;
        }
        let end = start.saturating_add(PARALLEL_BATCH);
        let found = (start..end).into_par_iter().find_map_first(|nonce| {
            let hash = hash_payload(nonce, prev_hash, &payload);
            validate_hash(&hash).then_some(Proof { nonce, hash })
        });
        if found.is_some() || end == u64::MAX {
            return found;
        }
        start = end;
    }
}
