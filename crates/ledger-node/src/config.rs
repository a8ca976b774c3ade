use crate::constants::{DEFAULT_LISTEN, DEFAULT_LOG_LEVEL};
use clap::Parser;
use ledger_core::{constants::REWARD_AMOUNT, Search};
use std::{net::SocketAddr, time::Duration};
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Single-node proof-of-work ledger over HTTP")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:3001
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Identity credited with mining rewards (random when omitted)
    #[arg(long)]
    pub node_id: Option<String>,

    /// Amount paid to this node for each mined block
    #[arg(long, default_value_t = REWARD_AMOUNT)]
    pub reward: i64,

    /// Search nonces on all cores
    #[arg(long)]
    pub parallel: bool,

    /// Abandon a mine request after this many seconds
    #[arg(long)]
    pub mine_timeout_secs: Option<u64>,
}

impl Args {
    pub fn node_id(&self) -> String {
        self.node_id.clone().unwrap_or_else(generate_node_id)
    }

    pub fn search(&self) -> Search {
        if self.parallel {
            Search::Parallel
        } else {
            Search::Sequential
        }
    }

    pub fn mine_timeout(&self) -> Option<Duration> {
        self.mine_timeout_secs.map(Duration::from_secs)
    }
}

/// Random 32-character uppercase hex identity.
pub fn generate_node_id() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["ledger-node"]).unwrap();
        assert_eq!(args.listen, DEFAULT_LISTEN.parse::<SocketAddr>().unwrap());
        assert_eq!(args.log_level, "info");
        assert_eq!(args.reward, 1250);
        assert_eq!(args.search(), Search::Sequential);
        assert_eq!(args.mine_timeout(), None);
        assert!(args.node_id.is_none());
    }

    #[test]
    fn explicit_flags() {
        let args = Args::try_parse_from([
            "ledger-node",
            "--listen",
            "0.0.0.0:8080",
            "--node-id",
            "MINER",
            "--reward",
            "10",
            "--parallel",
            "--mine-timeout-secs",
            "30",
        ])
        .unwrap();
        assert_eq!(args.listen.port(), 8080);
        assert_eq!(args.node_id(), "MINER");
        assert_eq!(args.reward, 10);
        assert_eq!(args.search(), Search::Parallel);
        assert_eq!(args.mine_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn rejects_bad_listen_address() {
        assert!(Args::try_parse_from(["ledger-node", "--listen", "nowhere"]).is_err());
    }

    #[test]
    fn generated_node_id_format() {
        let id = generate_node_id();
        assert_eq!(id.len(), 32);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(id, generate_node_id());
    }
}
