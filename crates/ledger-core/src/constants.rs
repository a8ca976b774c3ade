pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Hash positions that must carry their own index as a decimal digit.
pub const ACCEPT_POSITIONS: [usize; 4] = [2, 3, 5, 7];

pub const GENESIS_NONCE: u64 = 100;
pub const GENESIS_HASH: &str = "0000";
pub const GENESIS_PREV_HASH: &str = "00";

pub const REWARD_SENDER: &str = "00";
pub const REWARD_AMOUNT: i64 = 1250;

/// Nonces handed to rayon per round of the parallel search.
pub const PARALLEL_BATCH: u64 = 1 << 12;
