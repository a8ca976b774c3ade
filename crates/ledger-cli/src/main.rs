use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ledger_core::{Block, Ledger};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_NODE: &str = "http://127.0.0.1:3001";

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL
    #[arg(long, global = true, default_value = DEFAULT_NODE)]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Submit a transaction
    Submit {
        /// Sender
        #[arg(long)]
        sender: String,
        /// Recipient
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
    },
    /// Mine the pending transactions into a new block
    Mine,
    /// Print the whole ledger
    Show,
}

#[derive(Serialize)]
struct Tx {
    amount: i64,
    sender: String,
    recipient: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/');
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Submit {
            sender,
            recipient,
            amount,
        } => {
            let tx = Tx {
                amount,
                sender,
                recipient,
            };
            let res = client
                .post(format!("{node}/transaction"))
                .json(&tx)
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await?;
            println!("status: {}", status);
            println!("{body}");
        }
        Command::Mine => {
            let res = client.get(format!("{node}/mine")).send().await?;
            let status = res.status();
            if !status.is_success() {
                bail!("mining failed ({status}): {}", res.text().await?);
            }
            let block: Block = res.json().await?;
            print_block(&block);
        }
        Command::Show => {
            let ledger: Ledger = client
                .get(format!("{node}/blockchain"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            debug!(blocks = ledger.len(), "ledger fetched");
            for block in ledger.chain() {
                print_block(block);
            }
            println!("pending: {}", ledger.pending().len());
            for tx in ledger.pending() {
                println!("  {} -> {}: {}", tx.sender, tx.recipient, tx.amount);
            }
        }
    }
    Ok(())
}

fn print_block(block: &Block) {
    println!(
        "block {} nonce={} hash={} prev={}",
        block.index, block.nonce, block.hash, block.prev_hash
    );
    for tx in &block.transactions {
        println!("  {} -> {}: {}", tx.sender, tx.recipient, tx.amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_submit() {
        let cli = Cli::try_parse_from([
            "ledger-cli",
            "submit",
            "--sender",
            "ABC",
            "--recipient",
            "CDE",
            "--amount",
            "-66",
        ])
        .unwrap();
        assert_eq!(cli.node, DEFAULT_NODE);
        assert_eq!(
            cli.cmd,
            Command::Submit {
                sender: "ABC".into(),
                recipient: "CDE".into(),
                amount: -66,
            }
        );
    }

    #[test]
    fn parse_mine_with_node() {
        let cli =
            Cli::try_parse_from(["ledger-cli", "mine", "--node", "http://10.0.0.1:9000"]).unwrap();
        assert_eq!(cli.node, "http://10.0.0.1:9000");
        assert_eq!(cli.cmd, Command::Mine);
    }

    #[test]
    fn submit_requires_fields() {
        assert!(Cli::try_parse_from(["ledger-cli", "submit", "--sender", "A"]).is_err());
    }
}
