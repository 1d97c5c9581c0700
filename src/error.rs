//! Unified gateway error model and HTTP mapping helpers.
//! One enum covers the whole failure taxonomy: credential rejections stay
//! distinct from protocol anomalies and transport failures so no layer can
//! collapse an operational problem into a user-facing 401.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    /// The CAS server explicitly denied the ticket. User-facing, not logged as an error.
    #[error("authentication rejected by CAS")]
    Rejected,
    /// The CAS response was neither a recognized success nor a recognized failure shape.
    #[error("invalid CAS response: {reason}")]
    Protocol { reason: String, raw: String },
    /// Network failure or timeout reaching the CAS server.
    #[error("CAS transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    /// Invalid setup values. Raised from `CasSetup::build`, never at request time.
    #[error("configuration error: {0}")]
    Config(String),
    /// The inbound request is missing data the login flow needs (e.g. a host).
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl GateError {
    pub fn protocol<S: Into<String>>(reason: S, raw: S) -> Self {
        GateError::Protocol { reason: reason.into(), raw: raw.into() }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            GateError::Rejected => StatusCode::UNAUTHORIZED,
            GateError::Protocol { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = match &self {
            GateError::Rejected => json!({"status": "unauthorized"}),
            // Raw CAS responses stay in the logs, never in the client body
            GateError::Protocol { reason, .. } => json!({"status": "error", "error": reason}),
            other => json!({"status": "error", "error": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

pub type GateResult<T> = Result<T, GateError>;
