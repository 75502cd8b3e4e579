//! HTTP surface of a worker.
//!
//! # Responsibilities
//! - Build the Axum router every worker serves
//! - Wire up middleware (request ID, tracing)
//! - Run one RequestSession per call and write its outcome
//! - Record call metrics

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::observability::metrics;
use crate::rpc::{RequestSession, SessionContext};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionContext>,
}

/// Build the Axum router with all middleware layers.
///
/// Any path and any method reach the same handler; the call is identified
/// by its `method` parameter alone.
pub fn build_router(session: Arc<SessionContext>) -> Router {
    Router::new()
        .route("/", any(rpc_handler))
        .route("/{*path}", any(rpc_handler))
        .with_state(AppState { session })
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Run one call through a fresh session.
async fn rpc_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let mut session = RequestSession::new(addr.ip().to_string());
    tracing::debug!(
        request_id = %request_id,
        session_id = %session.id(),
        method = %request.method(),
        "Call received"
    );

    match session.run(request, &state.session).await {
        Ok(outcome) => {
            tracing::debug!(
                request_id = %request_id,
                outcome = outcome.label(),
                status = outcome.status().as_u16(),
                "Call resolved"
            );
            metrics::record_outcome(outcome.label(), start_time);
            outcome.into_response()
        }
        Err(fault) => {
            tracing::warn!(request_id = %request_id, error = %fault, "Call faulted");
            metrics::record_outcome("internal_fault", start_time);
            fault.into_response()
        }
    }
}
