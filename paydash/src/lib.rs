//! # paydash: session-authenticated gateway for a payroll dashboard
//!
//! `paydash` serves the frontend of an internal payroll and employee-records dashboard and
//! decides, for every inbound request, whether it may reach its destination. Users sign in with
//! a username and password from a static credential table, receive a signed session cookie, and
//! are then routed or redirected according to their role.
//!
//! ## Architecture
//!
//! ```text
//! request ─▶ gate ─▶ router ─┬─▶ /login, /logout, /api/me
//!              │              ├─▶ /api/payroll/preview[.csv]
//!              │              ├─▶ /api/backend/* ─▶ upstream data API
//!              ▼              └─▶ embedded pages (SPA fallback)
//!    307 /login?next=...
//!    307 /forbidden?to=...
//! ```
//!
//! - [`auth`]: credentials, session tokens, the access policy and the request gate
//! - [`api`]: HTTP handlers and their request/response models
//! - [`payroll`]: payroll run arithmetic
//! - [`backend`]: identity-forwarding proxy to the upstream data API
//! - [`config`]: YAML + environment configuration
//! - [`telemetry`]: logging and optional OTLP trace export
//!
//! Sessions are stateless: the whole application state is read-only after startup and is
//! shared by every request without locking.

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod errors;
mod openapi;
pub mod payroll;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
pub mod types;

use std::sync::Arc;

use axum::{
    Json, Router, ServiceExt,
    middleware::from_fn_with_state,
    routing::{any, get, post},
};
use bon::Builder;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};
use utoipa::OpenApi;

pub use config::Config;

use crate::{
    api::handlers::{auth as auth_handlers, pages, payroll as payroll_handlers},
    auth::{
        credentials::CredentialStore,
        middleware::{Gate, gate_middleware},
        policy::AccessPolicy,
        session::SessionService,
        token::TokenCodec,
    },
    backend::BackendClient,
    openapi::ApiDoc,
};

/// Application state shared across all request handlers.
#[derive(Debug, Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionService>,
    pub gate: Arc<Gate>,
    pub backend: Option<BackendClient>,
}

impl AppState {
    /// Build every shared component from a validated configuration.
    ///
    /// The signing secret is resolved exactly once here, so the session codec, the gate and
    /// the backend assertions all agree on it.
    pub fn from_config(config: Config) -> errors::Result<Self> {
        let secret = config.signing_secret()?;
        let credentials = CredentialStore::from_config(&config.users, config.password)?;
        let policy = Arc::new(AccessPolicy::from_config(&config.access_policy)?);
        info!(users = credentials.len(), "Loaded credential table");

        let codec = TokenCodec::new(secret.clone(), config.session.ttl);
        let sessions = Arc::new(SessionService::new(credentials, codec, config.cookie_secure()));
        let gate = Arc::new(Gate::new(config.gate.clone(), sessions.clone(), policy));
        let backend = config
            .backend
            .as_ref()
            .map(|backend| BackendClient::new(backend, &secret))
            .transpose()?;

        Ok(AppState::builder()
            .config(config)
            .sessions(sessions)
            .gate(gate)
            .maybe_backend(backend)
            .build())
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router. The gate is applied around it by [`Application`].
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(pages::login_page).post(auth_handlers::login))
        .route("/logout", post(auth_handlers::logout))
        .route("/forbidden", get(pages::forbidden_page))
        .route("/healthz", get(pages::healthz))
        .route("/api/me", get(auth_handlers::me))
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/payroll/preview", post(payroll_handlers::preview))
        .route("/api/payroll/preview.csv", post(payroll_handlers::preview_csv))
        .route("/api/backend", any(backend::proxy))
        .route("/api/backend/{*rest}", any(backend::proxy))
        .fallback(pages::serve_embedded_asset)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
}

impl Application {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        debug!(
            environment = ?config.environment,
            users = config.users.len(),
            backend = config.backend.as_ref().map(|b| b.url.as_str()),
            "Building application"
        );

        let app_state = AppState::from_config(config.clone())?;
        Ok(Self::from_state(app_state))
    }

    pub fn from_state(app_state: AppState) -> Self {
        let router = build_router(app_state.clone());
        let config = app_state.config.clone();
        Self {
            router,
            app_state,
            config,
        }
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        // Gate runs before path matching so unrouted paths are gated too
        let gate = from_fn_with_state(self.app_state, gate_middleware);
        let service = gate.layer(self.router).into_make_service();
        axum_test::TestServer::new(service).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "paydash listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        let gate = from_fn_with_state(self.app_state, gate_middleware);
        let service = gate.layer(self.router);

        axum::serve(listener, service.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{BackendConfig, Environment},
        test_utils::{create_test_app, create_test_config, login_cookie},
    };
    use axum::http::{StatusCode, header};
    use std::time::Duration;

    #[test]
    fn test_state_requires_secret_in_production() {
        let mut config = create_test_config();
        config.secret_key = None;
        config.environment = Environment::Production;

        assert!(matches!(AppState::from_config(config), Err(errors::Error::Config { .. })));
    }

    #[test]
    fn test_local_without_secret_uses_random_secret() {
        let mut config = create_test_config();
        config.secret_key = None;
        config.environment = Environment::Local;

        let first = AppState::from_config(config.clone()).unwrap();
        let second = AppState::from_config(config).unwrap();

        // Tokens from one process-secret are not accepted under another
        let token = first.sessions.login("admin", "admin").unwrap().token;
        assert!(first.sessions.resolve(&token).is_some());
        assert!(second.sessions.resolve(&token).is_none());
        assert!(!first.sessions.logout().secure);
    }

    #[test]
    fn test_backend_client_built_when_configured() {
        let mut config = create_test_config();
        assert!(AppState::from_config(config.clone()).unwrap().backend.is_none());

        config.backend = Some(BackendConfig {
            url: "http://backend.internal:8000".parse().unwrap(),
            timeout: Duration::from_secs(5),
            assertion_ttl: Duration::from_secs(60),
        });
        assert!(AppState::from_config(config).unwrap().backend.is_some());
    }

    #[tokio::test]
    async fn test_healthz_is_public() {
        let server = create_test_app();

        let response = server.get("/healthz").await;

        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_root_and_unrouted_paths_are_gated() {
        let server = create_test_app();

        let root = server.get("/").await;
        root.assert_status(StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(root.header(header::LOCATION), "/login?next=%2F");

        let unknown = server.get("/definitely/not/a/route").await;
        unknown.assert_status(StatusCode::TEMPORARY_REDIRECT);
    }

    #[tokio::test]
    async fn test_login_page_is_public_and_root_is_served_after_login() {
        let server = create_test_app();

        server.get("/login").await.assert_status_ok();

        let cookie = login_cookie(&server, "staff", "staff").await;
        let response = server.get("/").add_header(header::COOKIE, cookie).await;
        response.assert_status_ok();
        assert!(response.text().contains("<title>Paydash</title>"));
    }

    #[tokio::test]
    async fn test_prefix_boundary_is_respected() {
        let server = create_test_app();
        let cookie = login_cookie(&server, "staff", "staff").await;

        // "/payrollx" is not under "/payroll"
        let response = server.get("/payrollx").add_header(header::COOKIE, cookie).await;

        response.assert_status(StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.header(header::LOCATION), "/forbidden?to=%2Fpayrollx");
    }
}
