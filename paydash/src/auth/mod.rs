//! Authentication and authorization.
//!
//! This module is the security boundary of the service:
//!
//! - [`credentials`]: the static credential table (`username -> (hash, role)`)
//! - [`password`]: Argon2id hashing and verification
//! - [`token`]: HMAC-SHA256 signed, stateless session tokens
//! - [`session`]: login / resolve / logout and the session cookie
//! - [`policy`]: role -> allowed route prefixes
//! - [`middleware`]: the request gate run before every route
//! - [`current_user`]: extractor for the identity the gate resolved
//!
//! # Request flow
//!
//! ```text
//! request -> gate (bypass? public? cookie -> token verify -> policy) -> handler
//! ```
//!
//! There is no server-side session table. A token stays valid until it expires, and logout
//! only clears the client's cookie.
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use paydash::auth::current_user::CurrentUser;
//!
//! async fn protected_handler(CurrentUser(identity): CurrentUser) -> String {
//!     format!("Hello, {}!", identity.username)
//! }
//! ```

pub mod credentials;
pub mod current_user;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod session;
pub mod token;
