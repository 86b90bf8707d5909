//! HTTP request handlers.
//!
//! - [`auth`]: login, logout and the current session
//! - [`pages`]: embedded frontend pages, the SPA fallback and the health check
//! - [`payroll`]: payroll run previews as JSON or CSV
//!
//! # Authentication
//!
//! Every handler runs behind the gate in [`crate::auth::middleware`], which has already
//! authenticated and authorized the request unless the path is public. Handlers that need the
//! caller take a [`crate::auth::current_user::CurrentUser`] argument.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which renders as `{"ok": false, "error": ...}` with
//! the matching status code.

pub mod auth;
pub mod pages;
pub mod payroll;
