//! Shared constructors for unit and router tests.

use axum::http::header;
use axum_test::TestServer;

use crate::{
    AppState, Application,
    auth::{password::Argon2Params, session::SESSION_COOKIE_NAME},
    config::{BackendConfig, Config, Environment, UserConfig},
    types::Role,
};

/// Fixed so every state built by these helpers accepts the others' tokens.
pub const TEST_SECRET: &str = "paydash-test-signing-secret-0123456789";

/// Cheap Argon2 parameters; the defaults make each login take tens of milliseconds.
pub fn fast_argon2_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

fn user(username: &str, role: Role) -> UserConfig {
    UserConfig {
        username: username.to_string(),
        role,
        password_hash: None,
        password: Some(username.to_string()),
    }
}

/// Production-mode config with `admin/admin` and `staff/staff`.
pub fn create_test_config() -> Config {
    Config {
        environment: Environment::Production,
        secret_key: Some(TEST_SECRET.to_string()),
        users: vec![user("admin", Role::Admin), user("staff", Role::Staff)],
        password: fast_argon2_params(),
        ..Default::default()
    }
}

pub fn create_test_state() -> AppState {
    AppState::from_config(create_test_config()).expect("Failed to build test state")
}

/// Full application, gate included.
pub fn create_test_app() -> TestServer {
    Application::from_state(create_test_state()).into_test_server()
}

/// Full application proxying `/api/backend` to `backend`. Also returns the state for inspection.
pub fn create_test_app_with_backend(backend: BackendConfig) -> (TestServer, AppState) {
    let mut config = create_test_config();
    config.backend = Some(backend);
    let state = AppState::from_config(config).expect("Failed to build test state");
    (Application::from_state(state.clone()).into_test_server(), state)
}

/// Log in through `POST /login` and return a `Cookie` header value carrying the session.
pub async fn login_cookie(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/login")
        .json(&serde_json::json!({ "username": username, "password": password }))
        .await;
    response.assert_status_ok();

    let set_cookie = response.header(header::SET_COOKIE);
    let pair = set_cookie
        .to_str()
        .expect("Set-Cookie is not ASCII")
        .split(';')
        .next()
        .expect("empty Set-Cookie");
    assert!(pair.starts_with(&format!("{SESSION_COOKIE_NAME}=")));
    pair.to_string()
}
