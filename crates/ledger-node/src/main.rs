mod api;
mod config;
mod constants;

use clap::Parser;
use config::Args;
use ledger_core::{Ledger, Miner};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let node_id = args.node_id();
    info!(%node_id, search = ?args.search(), "node identity");

    let miner = Miner::new(node_id)
        .with_reward(args.reward)
        .with_search(args.search());
    let state = api::AppState::new(Ledger::with_genesis(), miner, args.mine_timeout());
    let app = api::router(state);

    info!("ledger-node listening on http://{}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
