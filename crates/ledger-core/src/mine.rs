use crate::chain::{Candidate, Ledger};
use crate::constants::{REWARD_AMOUNT, REWARD_SENDER};
use crate::error::{LedgerError, Result};
use crate::pow::{self, CancelFlag, Proof};
use crate::{Block, Transaction};
use std::sync::{Mutex, RwLock};
use std::time::Instant;
use tracing::{info, warn};

/// How the nonce space is scanned. Both strategies return the same nonce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Search {
    #[default]
    Sequential,
    Parallel,
}

/// Runs the mining workflow for one node: snapshot the ledger, search for a
/// proof outside the lock, then commit. One search runs at a time.
#[derive(Debug)]
pub struct Miner {
    node_id: String,
    reward: i64,
    search: Search,
    busy: Mutex<()>,
}

impl Miner {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            reward: REWARD_AMOUNT,
            search: Search::default(),
            busy: Mutex::new(()),
        }
    }

    pub fn with_reward(mut self, amount: i64) -> Self {
        self.reward = amount;
        self
    }

    pub fn with_search(mut self, search: Search) -> Self {
        self.search = search;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn reward_transaction(&self) -> Transaction {
        Transaction::new(self.reward, REWARD_SENDER, self.node_id.clone())
    }

    pub fn solve(&self, candidate: &Candidate, cancel: &CancelFlag) -> Result<Proof> {
        let found = match self.search {
            Search::Sequential => pow::proof_of_work_with_cancel(
                &candidate.prev_hash,
                &candidate.transactions,
                cancel,
            ),
            Search::Parallel => {
                pow::proof_of_work_parallel(&candidate.prev_hash, &candidate.transactions, cancel)
            }
        };
        found.ok_or(LedgerError::Cancelled)
    }

    /// Mine one block paying the reward to this node. Blocks the calling
    /// thread for the whole search; run it off any async executor.
    pub fn mine(&self, ledger: &RwLock<Ledger>, cancel: &CancelFlag) -> Result<Block> {
        let _busy = self.busy.lock().map_err(|_| LedgerError::LockPoisoned)?;

        let candidate = ledger
            .read()
            .map_err(|_| LedgerError::LockPoisoned)?
            .candidate(Some(self.reward_transaction()))?;
        info!(
            index = candidate.index,
            txs = candidate.transactions.len(),
            search = ?self.search,
            "searching for proof of work"
        );

        let started = Instant::now();
        let proof = match self.solve(&candidate, cancel) {
            Ok(proof) => proof,
            Err(e) => {
                warn!(index = candidate.index, "mining abandoned: {e}");
                return Err(e);
            }
        };
        info!(
            index = candidate.index,
            nonce = proof.nonce,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "proof of work found"
        );

        let mut ledger = ledger.write().map_err(|_| LedgerError::LockPoisoned)?;
        // the caller may have given up while the commit waited for the lock
        if cancel.is_cancelled() {
            warn!(index = candidate.index, "proof found after cancellation; not committing");
            return Err(LedgerError::Cancelled);
        }
        let block = ledger.commit_proof(candidate, proof)?.clone();
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GENESIS_HASH;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn reward_transaction_example() {
        let miner = Miner::new("NODE1");
        assert_eq!(miner.node_id(), "NODE1");
        assert_eq!(
            miner.reward_transaction(),
            Transaction::new(1250, "00", "NODE1")
        );
        let miner = miner.with_reward(5);
        assert_eq!(miner.reward_transaction().amount, 5);
    }

    #[test]
    fn mine_end_to_end() {
        let ledger = RwLock::new(Ledger::new());
        ledger.write().unwrap().create_genesis_block().unwrap();
        let index = ledger
            .write()
            .unwrap()
            .append_transaction(Transaction::new(66, "ABC", "CDE"));
        assert_eq!(index, 2);

        let miner = Miner::new("NODE1");
        let block = miner.mine(&ledger, &CancelFlag::new()).unwrap();

        let ledger = ledger.read().unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(block.index, 2);
        assert_eq!(block.prev_hash, GENESIS_HASH);
        assert_eq!(block, ledger.chain()[1]);
        assert_eq!(
            block.transactions,
            vec![
                Transaction::new(66, "ABC", "CDE"),
                Transaction::new(1250, "00", "NODE1"),
            ]
        );
        assert!(ledger.pending().is_empty());
        assert!(pow::validate_hash(&block.hash));
        assert_eq!(block.computed_hash(), block.hash);
    }

    #[test]
    fn mine_before_genesis_fails() {
        let ledger = RwLock::new(Ledger::new());
        let err = Miner::new("N").mine(&ledger, &CancelFlag::new()).unwrap_err();
        assert_eq!(err, LedgerError::EmptyChain);
    }

    #[test]
    fn cancelled_mine_leaves_ledger_untouched() {
        let ledger = RwLock::new(Ledger::with_genesis());
        ledger
            .write()
            .unwrap()
            .append_transaction(Transaction::new(66, "ABC", "CDE"));
        let cancel = CancelFlag::new();
        cancel.cancel();

        for search in [Search::Sequential, Search::Parallel] {
            let miner = Miner::new("N").with_search(search);
            assert_eq!(
                miner.mine(&ledger, &cancel).unwrap_err(),
                LedgerError::Cancelled
            );
        }
        let ledger = ledger.read().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending(), &[Transaction::new(66, "ABC", "CDE")]);
    }

    #[test]
    fn cancel_while_commit_waits_for_lock_is_not_committed() {
        let ledger = Arc::new(RwLock::new(Ledger::with_genesis()));
        let tx = Transaction::new(66, "ABC", "CDE");
        ledger.write().unwrap().append_transaction(tx.clone());
        let cancel = CancelFlag::new();

        let reader = ledger.read().unwrap();
        let handle = {
            let ledger = Arc::clone(&ledger);
            let cancel = cancel.clone();
            thread::spawn(move || Miner::new("NODE").mine(&ledger, &cancel))
        };
        // nonce 84246 is found well within this; the miner then parks on the write lock
        thread::sleep(Duration::from_secs(3));
        cancel.cancel();
        drop(reader);

        assert_eq!(handle.join().unwrap().unwrap_err(), LedgerError::Cancelled);
        let ledger = ledger.read().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending(), &[tx]);
    }

    #[test]
    fn search_strategies_agree() {
        let mut ledger = Ledger::with_genesis();
        ledger.append_transaction(Transaction::new(3, "A", "B"));
        let candidate = ledger.candidate(None).unwrap();
        let cancel = CancelFlag::new();
        let sequential = Miner::new("N").solve(&candidate, &cancel).unwrap();
        let parallel = Miner::new("N")
            .with_search(Search::Parallel)
            .solve(&candidate, &cancel)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn transactions_submitted_during_mining_are_not_lost() {
        let ledger = Arc::new(RwLock::new(Ledger::with_genesis()));
        let miner = Miner::new("N");
        let submitted: Vec<Transaction> = (0..40)
            .map(|i| Transaction::new(i, format!("S{i}"), "R"))
            .collect();

        thread::scope(|s| {
            s.spawn(|| {
                for tx in &submitted {
                    ledger.write().unwrap().append_transaction(tx.clone());
                    thread::yield_now();
                }
            });
            s.spawn(|| {
                for _ in 0..2 {
                    miner.mine(&ledger, &CancelFlag::new()).unwrap();
                }
            });
        });

        let ledger = ledger.read().unwrap();
        assert_eq!(ledger.verify(), Ok(()));
        let seen: Vec<Transaction> = ledger
            .chain()
            .iter()
            .flat_map(|b| b.transactions.iter())
            .chain(ledger.pending().iter())
            .filter(|tx| tx.sender != "00")
            .cloned()
            .collect();
        assert_eq!(seen, submitted);
    }
}
