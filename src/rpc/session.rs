//! Per-request session state machine.
//!
//! # States
//! ```text
//! Created → Parsing → Parsed → Dispatched → Resolved
//!              │          │
//!              └──────────┴──→ Resolved (protocol failure)
//! ```
//!
//! # Design Decisions
//! - One session per inbound request; sessions share nothing
//! - The operation alone decides the outcome once dispatched
//! - A deadline over the whole session turns a stuck operation into a fault
//! - Resolved is terminal: a session runs at most once

use std::time::Duration;

use axum::body::{self, Body};
use axum::http::{Method, Request};
use tokio::time::timeout;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::fetch::Fetcher;
use crate::rpc::operations::Operation;
use crate::rpc::outcome::{ErrorObject, Outcome, SessionFault};
use crate::rpc::params::{Call, DecodeError, Params};

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Parsing,
    Parsed,
    Dispatched,
    Resolved,
}

impl SessionState {
    fn can_advance_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Created, SessionState::Parsing)
                | (SessionState::Parsing, SessionState::Parsed)
                | (SessionState::Parsed, SessionState::Dispatched)
        ) || (self != SessionState::Resolved && next == SessionState::Resolved)
    }
}

/// Everything a session needs beyond the request itself. Shared by a worker.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub fetcher: Fetcher,
    pub deadline: Duration,
    pub max_request_body_bytes: usize,
}

impl SessionContext {
    pub fn new(config: &GatewayConfig, fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            deadline: Duration::from_secs(config.session.deadline_secs),
            max_request_body_bytes: config.session.max_request_body_bytes,
        }
    }
}

/// Handler for exactly one inbound call.
#[derive(Debug)]
pub struct RequestSession {
    id: Uuid,
    source: String,
    state: SessionState,
}

impl RequestSession {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            state: SessionState::Created,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Parse, dispatch and resolve `request`.
    ///
    /// `Ok` carries the single outcome to write; `Err` means no outcome was
    /// produced and the caller gets an empty 500.
    pub async fn run(
        &mut self,
        request: Request<Body>,
        ctx: &SessionContext,
    ) -> Result<Outcome, SessionFault> {
        if self.state != SessionState::Created {
            return Err(SessionFault::AlreadyResolved);
        }

        let span = tracing::info_span!("session", session_id = %self.id, source = %self.source);
        let result = timeout(ctx.deadline, self.drive(request, ctx))
            .instrument(span)
            .await;
        self.advance(SessionState::Resolved);

        match result {
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                tracing::warn!(
                    session_id = %self.id,
                    deadline_secs = ctx.deadline.as_secs(),
                    "Session produced no outcome before its deadline"
                );
                Err(SessionFault::DeadlineExceeded(ctx.deadline.as_secs()))
            }
        }
    }

    async fn drive(&mut self, request: Request<Body>, ctx: &SessionContext) -> Outcome {
        self.advance(SessionState::Parsing);
        let call = match decode_call(request, ctx.max_request_body_bytes).await {
            Ok(call) => call,
            Err(e) => {
                tracing::debug!(error = %e, "Request could not be decoded");
                return Outcome::ProtocolFailure(ErrorObject::INVALID_REQUEST);
            }
        };
        self.advance(SessionState::Parsed);

        let operation = match call.method().and_then(Operation::lookup) {
            Some(operation) => operation,
            None => {
                tracing::debug!(method = ?call.method(), "Unknown method");
                return Outcome::ProtocolFailure(ErrorObject::METHOD_NOT_FOUND);
            }
        };
        self.advance(SessionState::Dispatched);
        tracing::debug!(method = operation.name(), "Dispatching");

        operation.invoke(call.params(), &ctx.fetcher).await
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "Session transition");
        self.state = next;
    }
}

/// Write methods carry the call in their body; everything else in the query.
fn carries_body(method: &Method) -> bool {
    method == Method::POST || method == Method::PUT || method == Method::PATCH
}

async fn decode_call(request: Request<Body>, body_limit: usize) -> Result<Call, DecodeError> {
    let (parts, body) = request.into_parts();
    let params = if carries_body(&parts.method) {
        let raw = body::to_bytes(body, body_limit)
            .await
            .map_err(|e| DecodeError::Body(e.to_string()))?;
        Params::decode(&raw)?
    } else {
        Params::decode(parts.uri.query().unwrap_or_default().as_bytes())?
    };
    Ok(Call::from(params))
}
