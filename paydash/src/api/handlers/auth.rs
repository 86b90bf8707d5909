use axum::{Json, extract::State};
use tracing::info;

use crate::{
    AppState,
    api::models::auth::{ErrorResponse, LoginPayload, LoginRequest, LoginResponse, LoginSuccess, LogoutResponse, OkResponse, SessionInfo},
    auth::current_user::CurrentUser,
    errors::Error,
};

/// Login with username and password
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful; session cookie set", body = LoginSuccess),
        (status = 400, description = "Unreadable request body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, LoginPayload(request): LoginPayload) -> Result<LoginResponse, Error> {
    // Argon2 verification runs on a blocking thread to avoid stalling the async runtime
    let sessions = state.sessions.clone();
    let outcome = tokio::task::spawn_blocking(move || sessions.login(&request.username, &request.password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn credential verification task: {e}"),
        })??;

    info!(username = %outcome.username, role = %outcome.role, "Login successful");

    Ok(LoginResponse {
        body: LoginSuccess {
            ok: true,
            role: outcome.role,
        },
        cookie: outcome.cookie,
    })
}

/// Logout (clear session cookie)
#[utoipa::path(
    post,
    path = "/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful; session cookie cleared", body = OkResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> LogoutResponse {
    LogoutResponse {
        cookie: state.sessions.logout(),
    }
}

/// Current session
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "authentication",
    responses(
        (status = 200, description = "The signed-in user", body = SessionInfo),
        (status = 401, description = "No session", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn me(CurrentUser(identity): CurrentUser) -> Json<SessionInfo> {
    Json(SessionInfo {
        ok: true,
        username: identity.username,
        role: identity.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::session::SESSION_COOKIE_NAME,
        test_utils::{create_test_app, create_test_state},
        types::Role,
    };
    use axum::{
        Router,
        http::{StatusCode, header},
        routing::{get, post},
    };
    use axum_test::TestServer;
    use serde_json::{Value, json};

    fn auth_router() -> TestServer {
        let app = Router::new()
            .route("/login", post(login))
            .route("/logout", post(logout))
            .route("/api/me", get(me))
            .with_state(create_test_state());
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_login_success_sets_cookie() {
        let server = auth_router();

        let response = server
            .post("/login")
            .json(&json!({ "username": "admin", "password": "admin" }))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({ "ok": true, "role": "admin" }));

        let cookie = response.header(header::SET_COOKIE);
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE_NAME}=")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains(&format!("Max-Age={}", 7 * 24 * 3600)));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let server = auth_router();

        let response = server
            .post("/login")
            .json(&json!({ "username": "admin", "password": "wrong" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_json(&json!({ "ok": false, "error": "Invalid credentials" }));
        assert!(response.maybe_header(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_unknown_user_gets_identical_response() {
        let server = auth_router();

        let wrong_password = server
            .post("/login")
            .json(&json!({ "username": "admin", "password": "nope" }))
            .await;
        let unknown_user = server
            .post("/login")
            .json(&json!({ "username": "mallory", "password": "nope" }))
            .await;

        assert_eq!(wrong_password.status_code(), unknown_user.status_code());
        assert_eq!(wrong_password.json::<Value>(), unknown_user.json::<Value>());
    }

    #[tokio::test]
    async fn test_login_accepts_form_body() {
        let server = auth_router();

        let response = server
            .post("/login")
            .form(&[("username", "staff"), ("password", "staff")])
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({ "ok": true, "role": "staff" }));
    }

    #[tokio::test]
    async fn test_login_malformed_body_is_bad_request() {
        let server = auth_router();

        let response = server
            .post("/login")
            .content_type("application/json")
            .bytes("{not json".into())
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["ok"], json!(false));
    }

    #[tokio::test]
    async fn test_logout_clears_cookie_idempotently() {
        let server = auth_router();

        let first = server.post("/logout").await;
        let second = server.post("/logout").await;

        for response in [&first, &second] {
            response.assert_status_ok();
            response.assert_json(&json!({ "ok": true }));
            let cookie = response.header(header::SET_COOKIE);
            let cookie = cookie.to_str().unwrap();
            assert!(cookie.starts_with(&format!("{SESSION_COOKIE_NAME}=;")));
            assert!(cookie.contains("Max-Age=0"));
        }
        assert_eq!(first.header(header::SET_COOKIE), second.header(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn test_me_requires_session() {
        let server = auth_router();

        server.get("/api/me").await.assert_status(StatusCode::UNAUTHORIZED);

        let login = server
            .post("/login")
            .json(&json!({ "username": "staff", "password": "staff" }))
            .await;
        let cookie = login.header(header::SET_COOKIE);
        let pair = cookie.to_str().unwrap().split(';').next().unwrap().to_string();

        let response = server.get("/api/me").add_header(header::COOKIE, pair).await;
        response.assert_status_ok();
        let body: SessionInfo = response.json();
        assert_eq!(body.username, "staff");
        assert_eq!(body.role, Role::Staff);
    }

    #[tokio::test]
    async fn test_full_app_login_then_logout() {
        let server = create_test_app();

        let login = server
            .post("/login")
            .json(&json!({ "username": "admin", "password": "admin" }))
            .await;
        login.assert_status_ok();

        let logout = server.post("/logout").await;
        logout.assert_status_ok();
        logout.assert_json(&json!({ "ok": true }));
        assert!(
            logout
                .header(header::SET_COOKIE)
                .to_str()
                .unwrap()
                .contains("Max-Age=0")
        );
    }
}
