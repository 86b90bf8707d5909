//! Identity-forwarding proxy to the upstream data API.
//!
//! Requests under `/api/backend/...` that passed the gate are re-issued against the configured
//! backend with the `/api/backend` prefix stripped. The browser's cookie never leaves this
//! service. The upstream instead receives the caller's identity in three headers:
//!
//! - `x-paydash-user`: username
//! - `x-paydash-role`: role
//! - `x-paydash-assertion`: a short-lived token signed with the session secret, which the
//!   backend can verify to trust the other two. It is typed as an assertion and is never
//!   accepted as a session cookie.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    AppState,
    auth::{current_user::CurrentUser, token::TokenCodec},
    config::BackendConfig,
    errors::{Error, Result},
    types::Identity,
};

/// Mount point of the proxy.
pub const PROXY_PREFIX: &str = "/api/backend";

pub const USER_HEADER: HeaderName = HeaderName::from_static("x-paydash-user");
pub const ROLE_HEADER: HeaderName = HeaderName::from_static("x-paydash-role");
pub const ASSERTION_HEADER: HeaderName = HeaderName::from_static("x-paydash-assertion");

/// Install the process-wide rustls provider if nothing has yet. Safe to call repeatedly.
pub fn ensure_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
    assertions: TokenCodec,
}

impl BackendClient {
    pub fn new(config: &BackendConfig, secret: &[u8]) -> Result<Self> {
        ensure_crypto_provider();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build backend HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base: config.url.clone(),
            assertions: TokenCodec::assertions(secret, config.assertion_ttl),
        })
    }

    /// Codec the upstream can use to check `x-paydash-assertion`.
    pub fn assertions(&self) -> &TokenCodec {
        &self.assertions
    }

    /// Upstream URL for a proxied path (already stripped of [`PROXY_PREFIX`]).
    pub fn upstream_url(&self, rest: &str, query: Option<&str>) -> Url {
        let mut url = self.base.clone();
        let base_path = url.path().trim_end_matches('/');
        let rest = rest.trim_start_matches('/');
        let path = format!("{base_path}/{rest}");
        url.set_path(&path);
        url.set_query(query.filter(|q| !q.is_empty()));
        url
    }

    fn identity_headers(&self, identity: &Identity) -> Result<HeaderMap> {
        let (assertion, _) = self.assertions.issue(&identity.username, identity.role);
        let value = |v: &str| {
            HeaderValue::from_str(v).map_err(|e| Error::Internal {
                operation: format!("build identity header: {e}"),
            })
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, value(&identity.username)?);
        headers.insert(ROLE_HEADER, HeaderValue::from_static(identity.role.as_str()));
        headers.insert(ASSERTION_HEADER, value(&assertion)?);
        Ok(headers)
    }

    /// Re-issue a request upstream on behalf of `identity`.
    #[instrument(skip(self, identity, headers, body), fields(username = %identity.username), err)]
    pub async fn forward(
        &self,
        identity: &Identity,
        method: Method,
        rest: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response> {
        let url = self.upstream_url(rest, query);
        debug!(%method, %url, "Forwarding to backend");

        let mut request = self.http.request(method, url).headers(self.identity_headers(identity)?);
        for name in [header::CONTENT_TYPE, header::ACCEPT] {
            if let Some(value) = headers.get(&name) {
                request = request.header(name, value.clone());
            }
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let upstream = request.send().await.map_err(|e| {
            warn!("Backend request failed: {e}");
            Error::BadGateway {
                message: "Backend unavailable".to_string(),
            }
        })?;

        let status = upstream.status();
        let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
        let bytes = upstream.bytes().await.map_err(|e| {
            warn!("Failed to read backend response: {e}");
            Error::BadGateway {
                message: "Backend unavailable".to_string(),
            }
        })?;

        let mut response = (status, bytes).into_response();
        if let Some(content_type) = content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        Ok(response)
    }
}

/// Proxy any method under `/api/backend/` to the upstream data API.
#[utoipa::path(
    get,
    path = "/api/backend/{rest}",
    tag = "backend",
    params(("rest" = String, Path, description = "Upstream path")),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Upstream response, passed through"),
        (status = 502, description = "Backend not configured or unreachable", body = crate::api::models::auth::ErrorResponse),
    )
)]
#[instrument(skip_all, fields(path = %uri.path()))]
pub async fn proxy(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let Some(backend) = state.backend.as_ref() else {
        return Err(Error::BadGateway {
            message: "Backend not configured".to_string(),
        });
    };

    let rest = uri.path().strip_prefix(PROXY_PREFIX).unwrap_or_default();
    backend.forward(&identity, method, rest, uri.query(), &headers, body).await
}
