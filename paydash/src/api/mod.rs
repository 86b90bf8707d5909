//! HTTP API: route handlers and the JSON models they exchange.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: request/response data structures
//!
//! # Routes
//!
//! - **Authentication**: `POST /login`, `POST /logout`, `GET /api/me`
//! - **Payroll**: `POST /api/payroll/preview`, `POST /api/payroll/preview.csv`
//! - **Pages**: `GET /login`, `GET /forbidden`, `GET /healthz`, and the SPA shell for everything else
//!
//! The proxy under `/api/backend/*` lives in [`crate::backend`]. The OpenAPI document is served
//! at `/api/openapi.json`.

pub mod handlers;
pub mod models;
