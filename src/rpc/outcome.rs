//! Terminal results of a call and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Stable protocol error reported to callers with a 501.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorObject {
    pub error_code: u16,
    pub error_message: &'static str,
}

impl ErrorObject {
    pub const INVALID_REQUEST: ErrorObject = ErrorObject {
        error_code: 1,
        error_message: "An invalid request was received.  Please check the post body or query string.",
    };

    pub const METHOD_NOT_FOUND: ErrorObject = ErrorObject {
        error_code: 2,
        error_message: "The method was not found or no method was provided.",
    };

    pub const MISSING_PARAMETER: ErrorObject = ErrorObject {
        error_code: 3,
        error_message: "A required parameter was missing from the request.",
    };
}

/// Exactly one of these is produced per call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The operation completed. 200.
    Success(Value),
    /// The operation completed but its work failed, e.g. the fetch did. 202.
    ApplicationFailure(Value),
    /// The call itself was malformed or named no known operation. 501.
    ProtocolFailure(ErrorObject),
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Success(_) => StatusCode::OK,
            Outcome::ApplicationFailure(_) => StatusCode::ACCEPTED,
            Outcome::ProtocolFailure(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Metric/log label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::ApplicationFailure(_) => "application_failure",
            Outcome::ProtocolFailure(_) => "protocol_failure",
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Outcome::Success(payload) | Outcome::ApplicationFailure(payload) => {
                (status, Json(payload)).into_response()
            }
            Outcome::ProtocolFailure(error) => (status, Json(error)).into_response(),
        }
    }
}

/// A session that ended without an outcome. Rendered as an empty 500.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFault {
    #[error("no outcome within {0} seconds")]
    DeadlineExceeded(u64),

    #[error("session already resolved")]
    AlreadyResolved,
}

impl IntoResponse for SessionFault {
    fn into_response(self) -> Response {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}
