//! Combined health-check and optional admin JSON-RPC HTTP server.
//!
//! Provides:
//! - `GET /healthz`: liveness probe (always 200 while the process is alive)
//! - `GET /readyz`: readiness probe (200 once the service is initialised)
//! - `POST /`: admin JSON-RPC, only when admin is enabled
//!
//! Admin methods:
//! - `admin_startProposer` starts the driver loop
//! - `admin_stopProposer` stops the driver loop and waits for it to exit
//! - `admin_proposerRunning` reports whether the driver loop is running

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{DriverError, driver::ProposerDriverControl};

/// JSON-RPC code for unknown methods, and for admin calls when admin is disabled.
const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC code for a lifecycle call the driver rejected.
const SERVER_ERROR: i32 = -32000;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct ServerState {
    /// Set once the driver loop has started; cleared when shutdown begins.
    ready: Arc<AtomicBool>,
    /// Present only when admin methods are enabled.
    driver: Option<Arc<dyn ProposerDriverControl>>,
}

// ---------------------------------------------------------------------------
// Health endpoints
// ---------------------------------------------------------------------------

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness(State(state): State<ServerState>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC types
// ---------------------------------------------------------------------------

/// Admin request. Params are ignored since no admin method takes any.
#[derive(Deserialize)]
struct JsonRpcRequest {
    /// Method name.
    method: String,
    /// Caller-chosen request id, echoed back.
    #[serde(default)]
    id: Value,
}

/// Exactly one of `result` and `error` is set.
#[derive(Serialize)]
struct JsonRpcResponse {
    /// Always "2.0".
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    /// Request id.
    id: Value,
}

#[derive(Serialize)]
struct JsonRpcError {
    /// [`METHOD_NOT_FOUND`] or [`SERVER_ERROR`].
    code: i32,
    /// Human-readable reason, the driver error text for lifecycle failures.
    message: String,
}

impl JsonRpcResponse {
    const fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", result: Some(result), error: None, id }
    }

    const fn error(id: Value, code: i32, message: String) -> Self {
        Self { jsonrpc: "2.0", result: None, error: Some(JsonRpcError { code, message }), id }
    }

    fn from_lifecycle(id: Value, method: &str, result: Result<(), DriverError>) -> Self {
        match result {
            Ok(()) => Self::success(id, Value::Null),
            Err(e) => {
                warn!(method, error = %e, "Admin request rejected");
                Self::error(id, SERVER_ERROR, e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Admin JSON-RPC handler
// ---------------------------------------------------------------------------

async fn admin_rpc(
    State(state): State<ServerState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let Some(driver) = &state.driver else {
        return Json(JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            "admin methods are not enabled".into(),
        ));
    };

    let method = request.method.as_str();
    let response = match method {
        "admin_startProposer" => {
            JsonRpcResponse::from_lifecycle(request.id, method, driver.start_proposer().await)
        }
        "admin_stopProposer" => {
            JsonRpcResponse::from_lifecycle(request.id, method, driver.stop_proposer().await)
        }
        "admin_proposerRunning" => {
            JsonRpcResponse::success(request.id, Value::Bool(!driver.stopped()))
        }
        other => JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        ),
    };

    Json(response)
}

// ---------------------------------------------------------------------------
// Router and server
// ---------------------------------------------------------------------------

fn router(ready: Arc<AtomicBool>, driver: Option<Arc<dyn ProposerDriverControl>>) -> Router {
    let has_admin = driver.is_some();
    let app = Router::new().route("/healthz", get(liveness)).route("/readyz", get(readiness));
    let app = if has_admin { app.route("/", post(admin_rpc)) } else { app };
    app.with_state(ServerState { ready, driver })
}

/// Serves the health and admin endpoints on `addr` until `cancel` fires.
///
/// `/readyz` answers 200 while `ready` is set. Admin methods are mounted only
/// when `driver` is present.
///
/// # Errors
///
/// Returns an error if the listener cannot bind to `addr`.
pub async fn serve(
    addr: SocketAddr,
    ready: Arc<AtomicBool>,
    driver: Option<Arc<dyn ProposerDriverControl>>,
    cancel: CancellationToken,
) -> eyre::Result<()> {
    let has_admin = driver.is_some();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, admin = has_admin, "Health server started");

    axum::serve(listener, router(ready, driver))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("Health server stopped");
    Ok(())
}
