//! API request/response models for login, logout and the current session.

use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{auth::session::SessionCookie, errors::Error, types::Role};

#[derive(Clone, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest").field("username", &self.username).finish_non_exhaustive()
    }
}

/// Login body accepted as JSON or as an urlencoded form.
#[derive(Debug)]
pub struct LoginPayload(pub LoginRequest);

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

impl<S: Send + Sync> FromRequest<S> for LoginPayload {
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request = if is_form(req.headers()) {
            Form::<LoginRequest>::from_request(req, state)
                .await
                .map(|Form(body)| body)
                .map_err(|e| Error::BadRequest { message: e.body_text() })?
        } else {
            Json::<LoginRequest>::from_request(req, state)
                .await
                .map(|Json(body)| body)
                .map_err(|e| Error::BadRequest { message: e.body_text() })?
        };
        Ok(LoginPayload(request))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct LoginSuccess {
    pub ok: bool,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SessionInfo {
    pub ok: bool,
    pub username: String,
    pub role: Role,
}

/// Successful login: JSON body plus the session cookie.
#[derive(Debug)]
pub struct LoginResponse {
    pub body: LoginSuccess,
    pub cookie: SessionCookie,
}

/// Logout: JSON body plus the clearing cookie.
#[derive(Debug)]
pub struct LogoutResponse {
    pub cookie: SessionCookie,
}

fn with_cookie(status: StatusCode, cookie: &SessionCookie, body: impl Serialize) -> Response {
    match cookie.to_header() {
        Ok(value) => (status, [(header::SET_COOKIE, value)], Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::OK, &self.cookie, self.body)
    }
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        with_cookie(StatusCode::OK, &self.cookie, OkResponse { ok: true })
    }
}
