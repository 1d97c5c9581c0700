//! Access-control middleware for routes behind the CAS gate.
//!
//! Two tower layers compose around protected handlers: `RequireLoginLayer`
//! bounces unauthenticated requests through the CAS login flow (remembering
//! where the user was headed), and `RequireAttributesLayer` evaluates a
//! predicate over the stored identity attributes, denying with 403 when it
//! fails. Both fail closed: no identity never means allow.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower::{Layer, Service};
use tracing::info;

use crate::server::{load_session, run_login, GateState};

pub type AttrPredicate = Arc<dyn Fn(&HashMap<String, String>) -> bool + Send + Sync>;

/// Requires a logged-in session; otherwise starts the CAS login flow with
/// the current request path stored as the post-login redirect target.
#[derive(Clone)]
pub struct RequireLoginLayer {
    state: GateState,
}

impl RequireLoginLayer {
    pub fn new(state: GateState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RequireLoginLayer {
    type Service = RequireLoginService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireLoginService { inner, state: self.state.clone() }
    }
}

#[derive(Clone)]
pub struct RequireLoginService<S> {
    inner: S,
    state: GateState,
}

impl<S> Service<Request> for RequireLoginService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let state = self.state.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            let mut ctx = load_session(&state, request.headers());
            let logged_in =
                ctx.record.identity.as_ref().map(|i| !i.user.is_empty()).unwrap_or(false);
            if logged_in {
                return ready_inner.call(request).await;
            }

            // Remember where the user was headed, then bounce through the
            // login flow (no ticket on this pass, so it redirects to CAS)
            info!(path = %request.uri().path(), "unauthenticated request, starting CAS login");
            ctx.record.redirect_target = Some(request.uri().path().to_string());
            Ok(run_login(&state, request.uri(), request.headers(), ctx).await)
        })
    }
}

/// Evaluates `predicate` over the session's identity attributes. Meaningful
/// under `RequireLoginLayer`; applied alone it denies every request that has
/// no identity.
#[derive(Clone)]
pub struct RequireAttributesLayer {
    state: GateState,
    predicate: AttrPredicate,
}

impl RequireAttributesLayer {
    pub fn new<F>(state: GateState, predicate: F) -> Self
    where
        F: Fn(&HashMap<String, String>) -> bool + Send + Sync + 'static,
    {
        Self { state, predicate: Arc::new(predicate) }
    }
}

impl<S> Layer<S> for RequireAttributesLayer {
    type Service = RequireAttributesService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAttributesService {
            inner,
            state: self.state.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequireAttributesService<S> {
    inner: S,
    state: GateState,
    predicate: AttrPredicate,
}

impl<S> Service<Request> for RequireAttributesService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let state = self.state.clone();
        let predicate = self.predicate.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            let allowed = match state.identity(request.headers()) {
                Some(identity) => (predicate)(&identity.attributes),
                None => false,
            };
            if !allowed {
                info!(path = %request.uri().path(), "attribute filter denied request");
                return Ok(forbidden());
            }
            ready_inner.call(request).await
        })
    }
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"status": "forbidden"}))).into_response()
}
