use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use aurora_backend::LedgerBackend;
use aurora_types::LedgerRange;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tracing::{info, warn};

use crate::messages::{
    Base64Ledger, LatestLedgerSequenceResponse, LedgerResponse, PrepareRangeResponse,
};

/// One in-flight or finished range preparation.
struct PendingPrepare {
    range: LedgerRange,
    start_time: u64,
    started: Instant,
    done: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

/// Shared state behind the HTTP handlers: exactly one captive backend,
/// serialized behind a mutex.
pub struct ServerState {
    backend: Mutex<Box<dyn LedgerBackend>>,
    prepare: Mutex<Option<PendingPrepare>>,
}

impl ServerState {
    pub fn new(backend: Box<dyn LedgerBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
            prepare: Mutex::new(None),
        }
    }
}

/// Remote-captive HTTP server wrapping one backend.
pub struct RemoteCaptiveServer {
    bind_addr: SocketAddr,
    state: Arc<ServerState>,
}

impl RemoteCaptiveServer {
    pub fn new(bind_addr: SocketAddr, backend: Box<dyn LedgerBackend>) -> Self {
        Self {
            bind_addr,
            state: Arc::new(ServerState::new(backend)),
        }
    }

    /// Serve until the process is stopped.
    pub async fn serve(self) -> std::io::Result<()> {
        let app = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        info!("remote captive core server listening on {}", self.bind_addr);
        axum::serve(listener, app).await
    }
}

/// Build the axum router over a server state.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/prepare-range", post(prepare_range_handler))
        .route("/ledger/:sequence", get(ledger_handler))
        .route("/latest-sequence", get(latest_sequence_handler))
        .with_state(state)
}

type HandlerError = (StatusCode, String);

fn internal(message: impl Into<String>) -> HandlerError {
    (StatusCode::INTERNAL_SERVER_ERROR, message.into())
}

/// Start preparing a range, or report the status of the preparation already
/// running for it. Clients poll until `ready`.
async fn prepare_range_handler(
    State(state): State<Arc<ServerState>>,
    Json(range): Json<LedgerRange>,
) -> Result<Json<PrepareRangeResponse>, HandlerError> {
    let mut guard = state.prepare.lock().expect("lock poisoned");

    if let Some(pending) = guard.as_ref() {
        if pending.range == range {
            let error_message = pending.error.lock().expect("lock poisoned").take();
            if let Some(message) = error_message {
                *guard = None;
                return Err(internal(message));
            }
            let ready = pending.done.load(Ordering::SeqCst);
            return Ok(Json(PrepareRangeResponse {
                ledger_range: range,
                start_time: pending.start_time,
                ready,
                ready_duration: if ready {
                    pending.started.elapsed().as_millis() as u64
                } else {
                    0
                },
            }));
        }
    }

    // New range: kick the preparation off on a worker thread so polls stay
    // responsive while the validator catches up.
    let pending = PendingPrepare {
        range,
        start_time: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        started: Instant::now(),
        done: Arc::new(AtomicBool::new(false)),
        error: Arc::new(Mutex::new(None)),
    };
    let done = Arc::clone(&pending.done);
    let error = Arc::clone(&pending.error);
    let worker_state = Arc::clone(&state);
    std::thread::spawn(move || {
        let result = worker_state
            .backend
            .lock()
            .expect("lock poisoned")
            .prepare_range(range);
        match result {
            Ok(()) => done.store(true, Ordering::SeqCst),
            Err(e) => {
                warn!(error = %e, "remote prepare-range failed");
                *error.lock().expect("lock poisoned") = Some(e.to_string());
            }
        }
    });
    let start_time = pending.start_time;
    *guard = Some(pending);

    Ok(Json(PrepareRangeResponse {
        ledger_range: range,
        start_time,
        ready: false,
        ready_duration: 0,
    }))
}

async fn ledger_handler(
    State(state): State<Arc<ServerState>>,
    Path(sequence): Path<u32>,
) -> Result<Json<LedgerResponse>, HandlerError> {
    let result = tokio::task::spawn_blocking(move || {
        state
            .backend
            .lock()
            .expect("lock poisoned")
            .get_ledger(sequence)
    })
    .await
    .map_err(|e| internal(e.to_string()))?;

    match result {
        Ok(meta) => Ok(Json(LedgerResponse {
            present: meta.is_some(),
            ledger: meta.map(Base64Ledger),
        })),
        Err(e) => Err(internal(e.to_string())),
    }
}

async fn latest_sequence_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<LatestLedgerSequenceResponse>, HandlerError> {
    let result = tokio::task::spawn_blocking(move || {
        state
            .backend
            .lock()
            .expect("lock poisoned")
            .latest_sequence()
    })
    .await
    .map_err(|e| internal(e.to_string()))?;

    match result {
        Ok(sequence) => Ok(Json(LatestLedgerSequenceResponse { sequence })),
        Err(e) => Err(internal(e.to_string())),
    }
}
