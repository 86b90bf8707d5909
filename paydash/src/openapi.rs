//! OpenAPI document for the JSON surface, served at `/api/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{
    api::{self, models},
    auth::session::SESSION_COOKIE_NAME,
    backend, payroll,
    types::Role,
};

struct SessionCookieAddon;

impl Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "SessionCookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    SESSION_COOKIE_NAME,
                    "Session token set by `POST /login`. Cleared by `POST /logout`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Paydash",
        description = "Session-authenticated payroll and employee-records dashboard. \
            Every path outside the public set requires a session cookie and a role that \
            the access policy allows; otherwise the gate answers with a 307 redirect."
    ),
    modifiers(&SessionCookieAddon),
    security(("SessionCookie" = [])),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::pages::healthz,
        api::handlers::payroll::preview,
        api::handlers::payroll::preview_csv,
        backend::proxy,
    ),
    components(schemas(
        Role,
        models::auth::LoginRequest,
        models::auth::LoginSuccess,
        models::auth::OkResponse,
        models::auth::ErrorResponse,
        models::auth::SessionInfo,
        models::payroll::PayrollPreviewRequest,
        payroll::PayrollItem,
        payroll::CommissionRule,
        payroll::PayrollLine,
        payroll::PayrollTotals,
        payroll::CommissionSummary,
        payroll::PayrollRun,
    )),
    tags(
        (name = "authentication", description = "Login, logout and the current session"),
        (name = "payroll", description = "Payroll run previews"),
        (name = "backend", description = "Identity-forwarding proxy to the data API"),
        (name = "system", description = "Health"),
    )
)]
pub struct ApiDoc;
