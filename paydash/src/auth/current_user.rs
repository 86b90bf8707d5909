use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

use crate::{
    AppState,
    errors::{Error, Result},
    types::Identity,
};

/// The authenticated identity for the current request.
///
/// Normally inserted by the gate middleware. When a handler is mounted without the gate
/// (as in unit tests), the session cookie is resolved directly instead.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            trace!(username = %identity.username, "Using identity attached by gate");
            return Ok(CurrentUser(identity.clone()));
        }

        state
            .sessions
            .resolve_headers(&parts.headers)
            .map(CurrentUser)
            .ok_or(Error::Unauthenticated)
    }
}
