//! API request and response data models.
//!
//! These structures define the public JSON contract of the service. Every model is annotated
//! with `utoipa` so it appears in the generated OpenAPI document.
//!
//! - [`auth`]: login payloads, session info and the cookie-carrying responses
//! - [`payroll`]: payroll preview requests

pub mod auth;
pub mod payroll;
