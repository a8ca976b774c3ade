use crate::constants::{GENESIS_HASH, GENESIS_NONCE, GENESIS_PREV_HASH};
use crate::error::{LedgerError, Result};
use crate::pow::{self, Proof};
use crate::{now_secs, Block, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// The committed chain plus the queue of transactions waiting for a block.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

/// Everything the next block will hold except its proof. Taken from the
/// ledger under the lock, solved outside it, then handed back to
/// [`Ledger::commit_proof`].
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub index: u64,
    pub prev_hash: String,
    pub transactions: Vec<Transaction>,
    /// How many of `transactions` came from the pending queue.
    consumed: usize,
}

impl Ledger {
    /// An empty ledger with no genesis block.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_genesis() -> Self {
        let mut ledger = Self::new();
        ledger.commit_genesis();
        ledger
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Index the next committed block will receive.
    pub fn next_index(&self) -> u64 {
        self.chain.len() as u64 + 1
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Queue a transaction for the next block. Returns that block's index.
    pub fn append_transaction(&mut self, tx: Transaction) -> u64 {
        debug!(amount = tx.amount, sender = %tx.sender, recipient = %tx.recipient, "transaction queued");
        self.pending.push(tx);
        self.next_index()
    }

    /// Append a block holding every pending transaction. The proof is taken
    /// as given; the mining path goes through [`Ledger::commit_proof`].
    pub fn commit_block(
        &mut self,
        nonce: u64,
        hash: impl Into<String>,
        prev_hash: impl Into<String>,
    ) -> &Block {
        let block = Block {
            index: self.next_index(),
            timestamp: now_secs(),
            transactions: std::mem::take(&mut self.pending),
            nonce,
            hash: hash.into(),
            prev_hash: prev_hash.into(),
        };
        self.push(block)
    }

    pub fn create_genesis_block(&mut self) -> Result<&Block> {
        if !self.chain.is_empty() {
            return Err(LedgerError::GenesisExists);
        }
        Ok(self.commit_genesis())
    }

    fn commit_genesis(&mut self) -> &Block {
        info!("creating genesis block");
        self.commit_block(GENESIS_NONCE, GENESIS_HASH, GENESIS_PREV_HASH)
    }

    /// Snapshot the tip hash and the pending queue, with `reward` appended
    /// after the queued transactions. The ledger itself is not modified.
    pub fn candidate(&self, reward: Option<Transaction>) -> Result<Candidate> {
        let prev_hash = self
            .last_block()
            .ok_or(LedgerError::EmptyChain)?
            .hash
            .clone();
        let mut transactions = self.pending.clone();
        let consumed = transactions.len();
        transactions.extend(reward);
        Ok(Candidate {
            index: self.next_index(),
            prev_hash,
            transactions,
            consumed,
        })
    }

    /// Commit a solved candidate. Refuses the block when the chain advanced
    /// since the snapshot (tip hash, height or pending prefix changed) or when
    /// the proof does not cover the candidate. Only the
    /// snapshotted prefix of `pending` is consumed; transactions queued during
    /// the search stay pending.
    pub fn commit_proof(&mut self, candidate: Candidate, proof: Proof) -> Result<&Block> {
        let tip = self
            .last_block()
            .map(|b| b.hash.clone())
            .unwrap_or_default();
        if tip != candidate.prev_hash
            || candidate.index != self.next_index()
            || candidate.consumed > self.pending.len()
        {
            warn!(expected = %candidate.prev_hash, actual = %tip, "refusing block on stale tip");
            return Err(LedgerError::StaleTip {
                expected: candidate.prev_hash,
                actual: tip,
            });
        }
        if !pow::validate_hash(&proof.hash)
            || pow::hash_block(proof.nonce, &candidate.prev_hash, &candidate.transactions)
                != proof.hash
        {
            warn!(hash = %proof.hash, "refusing block with invalid proof of work");
            return Err(LedgerError::InvalidProofOfWork(proof.hash));
        }
        debug_assert_eq!(
            &self.pending[..candidate.consumed],
            &candidate.transactions[..candidate.consumed]
        );

        self.pending.drain(..candidate.consumed);
        let block = Block {
            index: self.next_index(),
            timestamp: now_secs(),
            transactions: candidate.transactions,
            nonce: proof.nonce,
            hash: proof.hash,
            prev_hash: candidate.prev_hash,
        };
        Ok(self.push(block))
    }

    fn push(&mut self, block: Block) -> &Block {
        info!(
            index = block.index,
            nonce = block.nonce,
            hash = %block.hash,
            txs = block.transactions.len(),
            "block committed"
        );
        self.chain.push(block);
        &self.chain[self.chain.len() - 1]
    }

    /// Check indices, linkage and proofs over the whole chain. Genesis is
    /// exempt from the proof check.
    pub fn verify(&self) -> Result<()> {
        for (pos, block) in self.chain.iter().enumerate() {
            let expected = pos as u64 + 1;
            if block.index != expected {
                return Err(invalid(block, format!("expected index {expected}")));
            }
            let Some(prev) = pos.checked_sub(1).map(|p| &self.chain[p]) else {
                continue;
            };
            if block.prev_hash != prev.hash {
                return Err(invalid(
                    block,
                    format!("prev_hash does not match hash of block {}", prev.index),
                ));
            }
            if !pow::validate_hash(&block.hash) {
                return Err(invalid(block, "hash fails the acceptance predicate".into()));
            }
            if block.computed_hash() != block.hash {
                return Err(invalid(block, "hash does not match block contents".into()));
            }
        }
        Ok(())
    }
}

fn invalid(block: &Block, reason: String) -> LedgerError {
    LedgerError::InvalidBlock {
        index: block.index,
        reason,
    }
}
