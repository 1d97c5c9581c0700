//!
//! casgate HTTP surface
//! --------------------
//! This module defines the Axum login/logout routes and the session cookie
//! plumbing that ties requests to stored identity attributes.
//!
//! Responsibilities:
//! - `GateState`: shared immutable configuration, session store handle and
//!   the outbound HTTP client, injected into all handlers.
//! - Login handler: redirect-to-CAS when no ticket is present, ticket
//!   exchange via the validator when one is, with the 401/500 split between
//!   credential rejections and protocol anomalies.
//! - Logout handler: idempotent session teardown.
//! - Cookie and query-string helpers shared with the gate middleware.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::CasConfig;
use crate::error::GateError;
use crate::identity::{new_session_id, IdentityAttributes, SessionRecord, SessionStore};
use crate::validator::{self, ValidationOutcome};

pub const SESSION_COOKIE: &str = "casgate_session";

/// Shared gateway state injected into all handlers and gate middleware.
#[derive(Clone)]
pub struct GateState {
    pub config: Arc<CasConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub http: reqwest::Client,
}

impl std::fmt::Debug for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateState")
            .field("config", &self.config)
            .field("http", &self.http)
            .finish_non_exhaustive()
    }
}

impl GateState {
    /// Router carrying the login and logout routes at their configured
    /// paths. Merge this into the application router.
    pub fn router(&self) -> Router {
        Router::new()
            .route(self.config.login_route.as_str(), get(login_handler))
            .route(self.config.logout_route.as_str(), get(logout_handler))
            .with_state(self.clone())
    }

    /// Identity attached to the request's session, if any.
    pub fn identity(&self, headers: &HeaderMap) -> Option<IdentityAttributes> {
        let sid = parse_cookie(headers, SESSION_COOKIE)?;
        self.sessions.get(&sid)?.identity
    }
}

/// A request's session, resolved from the cookie header. `fresh` means no
/// cookie was presented and the response must set one.
pub(crate) struct SessionCtx {
    pub sid: String,
    pub record: SessionRecord,
    pub fresh: bool,
}

pub(crate) fn load_session(state: &GateState, headers: &HeaderMap) -> SessionCtx {
    match parse_cookie(headers, SESSION_COOKIE) {
        Some(sid) => {
            let record = state.sessions.get(&sid).unwrap_or_default();
            SessionCtx { sid, record, fresh: false }
        }
        None => SessionCtx { sid: new_session_id(), record: SessionRecord::default(), fresh: true },
    }
}

async fn login_handler(State(state): State<GateState>, headers: HeaderMap, uri: Uri) -> Response {
    let ctx = load_session(&state, &headers);
    run_login(&state, &uri, &headers, ctx).await
}

/// The login flow shared by the login route and the gate middleware.
///
/// No ticket: persist the session (keeping any pending redirect target
/// alive across the CAS round trip) and bounce to the CAS login page.
/// Ticket: validate it and either store the identity and redirect, or map
/// the outcome to 401/500 without touching the session.
pub(crate) async fn run_login(
    state: &GateState,
    uri: &Uri,
    headers: &HeaderMap,
    mut ctx: SessionCtx,
) -> Response {
    let Some(service) = resolve_service(&state.config, headers, uri) else {
        warn!("login request lacks a resolvable scheme or host");
        return GateError::BadRequest("cannot resolve service URL".to_string()).into_response();
    };

    let Some(ticket) = query_param(uri, "ticket") else {
        let login_url = match state.config.cas_login_url(&service) {
            Ok(url) => url,
            Err(e) => {
                error!("failed to build CAS login URL: {e}");
                return e.into_response();
            }
        };
        state.sessions.set(&ctx.sid, ctx.record);
        return found(login_url.as_str(), ctx.fresh.then(|| set_session_cookie(&ctx.sid)));
    };

    match validator::validate(&state.http, &state.config, &ticket, &service, &[]).await {
        Ok(ValidationOutcome::Success(identity)) => {
            info!(user = %identity.user, "CAS authentication succeeded");
            let target = ctx
                .record
                .redirect_target
                .take()
                .unwrap_or_else(|| state.config.on_success.clone());
            state
                .sessions
                .set(&ctx.sid, SessionRecord { redirect_target: None, identity: Some(identity) });
            found(&target, ctx.fresh.then(|| set_session_cookie(&ctx.sid)))
        }
        Ok(ValidationOutcome::Rejected) => {
            info!(ticket = %ticket, "CAS rejected the ticket");
            (StatusCode::UNAUTHORIZED, Json(json!({"status": "unauthorized"}))).into_response()
        }
        Ok(ValidationOutcome::Malformed { reason, raw }) => {
            error!(reason = %reason, raw = %raw, "unrecognized CAS response");
            GateError::Protocol { reason, raw }.into_response()
        }
        Err(e) => {
            error!("CAS validation failed: {e}");
            e.into_response()
        }
    }
}

async fn logout_handler(State(state): State<GateState>, headers: HeaderMap) -> Response {
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        state.sessions.delete(&sid);
        info!(sid = %sid, "session cleared on logout");
    }
    found(&state.config.on_logout, Some(clear_session_cookie()))
}

/// The service URL CAS redirects back to: scheme + host + login route,
/// query-free. It must match between the initial redirect and the later
/// validation call, so both derive it from here.
fn resolve_service(config: &CasConfig, headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let host = uri
        .authority()
        .map(|a| a.to_string())
        .or_else(|| headers.get(header::HOST).and_then(|v| v.to_str().ok()).map(str::to_string))?;
    if host.is_empty() {
        return None;
    }
    // Origin-form requests carry no scheme; honor a TLS-terminating proxy
    let scheme = uri
        .scheme_str()
        .map(str::to_string)
        .or_else(|| {
            headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()).map(str::to_string)
        })
        .unwrap_or_else(|| "http".to_string());
    Some(format!("{}://{}{}", scheme, host, config.login_route))
}

pub(crate) fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    for pair in query.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some(kv) => kv,
            None => (pair, ""),
        };
        if key == name {
            return Some(
                urlencoding::decode(value).map(|v| v.into_owned()).unwrap_or_else(|_| value.to_string()),
            );
        }
    }
    None
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    // Lax, not Strict: the cookie must survive the top-level redirect back
    // from the CAS host
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE, sid)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

fn found(location: &str, cookie: Option<HeaderValue>) -> Response {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(location) {
        Ok(loc) => {
            headers.insert(header::LOCATION, loc);
        }
        Err(e) => {
            error!(location = %location, "invalid redirect location: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"status": "error"}))).into_response();
        }
    }
    if let Some(cookie) = cookie {
        headers.insert(header::SET_COOKIE, cookie);
    }
    (StatusCode::FOUND, headers).into_response()
}
