use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{Block, CancelFlag, Ledger, LedgerError, Miner, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Shared by every handler. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<RwLock<Ledger>>,
    pub miner: Arc<Miner>,
    pub mine_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(ledger: Ledger, miner: Miner, mine_timeout: Option<Duration>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            miner: Arc::new(miner),
            mine_timeout,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Ledger>, ApiError> {
        self.ledger
            .read()
            .map_err(|_| LedgerError::LockPoisoned.into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Ledger>, ApiError> {
        self.ledger
            .write()
            .map_err(|_| LedgerError::LockPoisoned.into())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("mining did not finish within {0:?}")]
    Timeout(Duration),

    #[error("mining task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Ledger(LedgerError::EmptyChain | LedgerError::StaleTip { .. }) => {
                StatusCode::CONFLICT
            }
            ApiError::Ledger(LedgerError::Cancelled) | ApiError::Timeout(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Head {
    pub height: u64,
    pub hash: Option<String>,
}

#[derive(Deserialize)]
struct TxIn {
    amount: i64,
    sender: String,
    recipient: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct TxAccepted {
    pub index: u64,
    pub message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/blockchain", get(blockchain))
        .route("/chain/head", get(head))
        .route("/transaction", post(submit_transaction))
        .route("/mine", get(mine))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn blockchain(State(state): State<AppState>) -> Result<Json<Ledger>, ApiError> {
    let ledger = state.read()?.clone();
    Ok(Json(ledger))
}

async fn head(State(state): State<AppState>) -> Result<Json<Head>, ApiError> {
    let head = {
        let ledger = state.read()?;
        Head {
            height: ledger.len() as u64,
            hash: ledger.last_block().map(|b| b.hash.clone()),
        }
    };
    Ok(Json(head))
}

async fn submit_transaction(
    State(state): State<AppState>,
    Json(tx): Json<TxIn>,
) -> Result<Json<TxAccepted>, ApiError> {
    let tx = Transaction::new(tx.amount, tx.sender, tx.recipient);
    debug!(?tx, "transaction submitted");
    let index = state.write()?.append_transaction(tx);
    Ok(Json(TxAccepted {
        index,
        message: format!("Transaction will be added to block {index}"),
    }))
}

/// Runs the search on the blocking pool. On timeout the search is cancelled
/// and the ledger is left as it was.
async fn mine(State(state): State<AppState>) -> Result<Json<Block>, ApiError> {
    let cancel = CancelFlag::new();
    let task = {
        let ledger = Arc::clone(&state.ledger);
        let miner = Arc::clone(&state.miner);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || miner.mine(&ledger, &cancel))
    };

    let joined = match state.mine_timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                warn!(?limit, "mining timed out");
                return Err(ApiError::Timeout(limit));
            }
        },
        None => task.await,
    };

    let block = joined??;
    info!(index = block.index, hash = %block.hash, "mined block");
    Ok(Json(block))
}
