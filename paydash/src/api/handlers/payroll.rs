use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::{
    api::models::{auth::ErrorResponse, payroll::PayrollPreviewRequest},
    auth::current_user::CurrentUser,
    errors::{Error, Result},
    payroll::{self, PayrollRun},
};

type PreviewPayload = std::result::Result<Json<PayrollPreviewRequest>, JsonRejection>;

fn compute(user: &CurrentUser, payload: PreviewPayload) -> Result<PayrollRun> {
    let Json(request) = payload.map_err(|e| Error::BadRequest { message: e.body_text() })?;
    let rules = request.rules();
    let run = payroll::compute_run(request.items, &rules)?;
    info!(
        username = %user.0.username,
        employees = run.totals.employees,
        check_total = %run.totals.check_total,
        "Computed payroll preview"
    );
    Ok(run)
}

/// Preview a payroll run
#[utoipa::path(
    post,
    path = "/api/payroll/preview",
    request_body = PayrollPreviewRequest,
    tag = "payroll",
    responses(
        (status = 200, description = "Computed run", body = PayrollRun),
        (status = 400, description = "Invalid items", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn preview(
    user: CurrentUser,
    payload: PreviewPayload,
) -> Result<Json<PayrollRun>> {
    compute(&user, payload).map(Json)
}

/// Preview a payroll run as CSV
#[utoipa::path(
    post,
    path = "/api/payroll/preview.csv",
    request_body = PayrollPreviewRequest,
    tag = "payroll",
    responses(
        (status = 200, description = "Computed run", content_type = "text/csv", body = String),
        (status = 400, description = "Invalid items", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn preview_csv(
    user: CurrentUser,
    payload: PreviewPayload,
) -> Result<Response> {
    let run = compute(&user, payload)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"payroll-preview.csv\""),
        ],
        payroll::to_csv(&run),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_test_app, login_cookie};
    use axum::http::{StatusCode, header};
    use serde_json::{Value, json};

    fn sample_body() -> Value {
        json!({
            "items": [
                {
                    "employee_id": "E-100",
                    "name": "Ana Ruiz",
                    "company": "SHINBO",
                    "location": "TEXAS",
                    "position": "Fitter",
                    "labor_rate": "25",
                    "week1_hours": 45,
                    "week2_hours": "38"
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_staff_can_preview_payroll() {
        let server = create_test_app();
        let cookie = login_cookie(&server, "staff", "staff").await;

        let response = server
            .post("/api/payroll/preview")
            .add_header(header::COOKIE, cookie)
            .json(&sample_body())
            .await;

        response.assert_status_ok();
        let run: Value = response.json();
        assert_eq!(run["lines"][0]["check_total"], json!("2137.50"));
        assert_eq!(run["totals"]["employees"], json!(1));
        assert_eq!(run["commission"]["beneficiary"], json!("danny"));
        assert_eq!(run["commission"]["total_commission"], json!("41.50"));
    }

    #[tokio::test]
    async fn test_preview_csv() {
        let server = create_test_app();
        let cookie = login_cookie(&server, "admin", "admin").await;

        let response = server
            .post("/api/payroll/preview.csv")
            .add_header(header::COOKIE, cookie)
            .json(&sample_body())
            .await;

        response.assert_status_ok();
        assert!(
            response
                .header(header::CONTENT_TYPE)
                .to_str()
                .unwrap()
                .starts_with("text/csv")
        );
        let text = response.text();
        let mut rows = text.lines();
        assert!(rows.next().unwrap().starts_with("employee_id,name"));
        assert!(rows.next().unwrap().starts_with("E-100,Ana Ruiz,,SHINBO"));
    }

    #[tokio::test]
    async fn test_negative_hours_is_bad_request() {
        let server = create_test_app();
        let cookie = login_cookie(&server, "staff", "staff").await;

        let response = server
            .post("/api/payroll/preview")
            .add_header(header::COOKIE, cookie)
            .json(&json!({ "items": [{ "employee_id": "E-1", "name": "X", "labor_rate": 10, "week1_hours": -2 }] }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["ok"], json!(false));
    }

    #[tokio::test]
    async fn test_overflowing_amounts_are_json_error() {
        let server = create_test_app();
        let cookie = login_cookie(&server, "staff", "staff").await;

        let response = server
            .post("/api/payroll/preview")
            .add_header(header::COOKIE, cookie)
            .json(&json!({ "items": [{
                "employee_id": "E-1",
                "name": "X",
                "labor_rate": "79228162514264337593543950335",
                "week1_hours": "50"
            }] }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["ok"], json!(false));
    }

    #[tokio::test]
    async fn test_unreadable_body_is_json_error() {
        let server = create_test_app();
        let cookie = login_cookie(&server, "staff", "staff").await;

        let response = server
            .post("/api/payroll/preview")
            .add_header(header::COOKIE, cookie)
            .json(&json!({ "rows": [] }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["ok"], json!(false));
    }

    #[tokio::test]
    async fn test_preview_requires_session() {
        let server = create_test_app();

        let response = server.post("/api/payroll/preview").json(&sample_body()).await;

        response.assert_status(StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.header(header::LOCATION), "/login?next=%2Fapi%2Fpayroll%2Fpreview");
    }
}
