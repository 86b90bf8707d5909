//! Request gate: authentication and role authorization for every inbound request.
//!
//! Each request is evaluated independently, in this order (first match wins):
//!
//! 0. **Rejected** - the path has dot segments or encoded separators: 400, before any matching
//! 1. **Bypass** - static assets and framework internals pass through untouched
//! 2. **Public** - login, logout, forbidden and health pages pass through, no session check
//! 3. **Unauthenticated** - no valid session: redirect to the login page with `?next=`
//! 4. **Forbidden** - valid session, role not allowed: redirect to the forbidden page with `?to=`
//! 5. **Allowed** - the resolved [`Identity`] is attached to the request extensions
//!
//! The gate wraps the whole router, so paths without a route are gated too.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, instrument, trace};
use url::form_urlencoded;

use crate::{
    AppState,
    auth::{
        policy::{AccessPolicy, is_normalized_path, matches_any},
        session::SessionService,
    },
    config::GateConfig,
    errors::Error,
    types::Identity,
};

/// Diagnostic header added to responses for requests the gate let through with a session.
pub const GATE_HEADER: HeaderName = HeaderName::from_static("x-auth-gate");

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Rejected,
    Bypass,
    Public,
    Unauthenticated { location: String },
    Forbidden { location: String, identity: Identity },
    Allowed(Identity),
}

#[derive(Debug, Clone)]
pub struct Gate {
    config: GateConfig,
    sessions: Arc<SessionService>,
    policy: Arc<AccessPolicy>,
}

fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

impl Gate {
    pub fn new(config: GateConfig, sessions: Arc<SessionService>, policy: Arc<AccessPolicy>) -> Self {
        Self { config, sessions, policy }
    }

    /// Decide what happens to a request for `path` (and optional `query`) with these headers.
    pub fn evaluate(&self, path: &str, query: Option<&str>, headers: &HeaderMap) -> GateDecision {
        if !is_normalized_path(path) {
            return GateDecision::Rejected;
        }

        if matches_any(path, &self.config.bypass_prefixes) {
            return GateDecision::Bypass;
        }

        if matches_any(path, &self.config.public_paths) {
            return GateDecision::Public;
        }

        let Some(identity) = self.sessions.resolve_headers(headers) else {
            let requested = match query {
                Some(q) if !q.is_empty() => format!("{path}?{q}"),
                _ => path.to_string(),
            };
            return GateDecision::Unauthenticated {
                location: format!("{}?next={}", self.config.login_path, encode_component(&requested)),
            };
        };

        if !self.policy.is_allowed(path, identity.role) {
            return GateDecision::Forbidden {
                location: format!("{}?to={}", self.config.forbidden_path, encode_component(path)),
                identity,
            };
        }

        GateDecision::Allowed(identity)
    }
}

/// Middleware applying [`Gate::evaluate`] before any route handler runs.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn gate_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let decision = state
        .gate
        .evaluate(request.uri().path(), request.uri().query(), request.headers());

    match decision {
        GateDecision::Rejected => Error::BadRequest {
            message: "Invalid request path".to_string(),
        }
        .into_response(),
        GateDecision::Bypass | GateDecision::Public => {
            trace!("Gate pass-through without session check");
            next.run(request).await
        }
        GateDecision::Unauthenticated { location } => {
            debug!("No valid session, redirecting to login");
            Redirect::temporary(&location).into_response()
        }
        GateDecision::Forbidden { location, identity } => {
            debug!(username = %identity.username, role = %identity.role, "Role not allowed, redirecting to forbidden page");
            Redirect::temporary(&location).into_response()
        }
        GateDecision::Allowed(identity) => {
            trace!(username = %identity.username, "Gate allowed request");
            request.extensions_mut().insert(identity);
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(GATE_HEADER, HeaderValue::from_static("allowed"));
            response
        }
    }
}
