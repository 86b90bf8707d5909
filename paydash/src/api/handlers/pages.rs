//! Page shell: embedded frontend assets, the login and forbidden pages, and the health check.

use axum::{
    Json,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;
use tracing::{debug, instrument};

use crate::api::models::auth::OkResponse;

#[derive(RustEmbed)]
#[folder = "static/"]
pub struct Assets;

const INDEX_PAGE: &str = "index.html";

fn embedded(path: &str) -> Option<Response> {
    let content = Assets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    // Files under assets/ are fingerprinted by the frontend build
    let cache_control = if path.starts_with("assets/") {
        "public, max-age=31536000, immutable"
    } else {
        "no-cache"
    };

    Some(
        (
            [
                (header::CONTENT_TYPE, mime.as_ref().to_string()),
                (header::CACHE_CONTROL, cache_control.to_string()),
            ],
            content.data.into_owned(),
        )
            .into_response(),
    )
}

fn page(path: &str) -> Response {
    embedded(path).unwrap_or_else(|| StatusCode::NOT_FOUND.into_response())
}

/// Serve embedded static assets, falling back to `index.html` for client-side routes.
#[instrument(skip_all, fields(path = %uri.path()))]
pub async fn serve_embedded_asset(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    if path.is_empty() || path.ends_with('/') {
        return page(INDEX_PAGE);
    }

    if let Some(response) = embedded(path) {
        return response;
    }

    debug!("No embedded file, serving SPA shell");
    page(INDEX_PAGE)
}

#[instrument(skip_all)]
pub async fn login_page() -> Response {
    page("login.html")
}

#[instrument(skip_all)]
pub async fn forbidden_page() -> Response {
    page("forbidden.html")
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "system",
    responses((status = 200, description = "Service is up", body = OkResponse))
)]
pub async fn healthz() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}
