//! Session lifecycle: login, per-request resolution and logout.
//!
//! Sessions are stateless. The cookie carries a signed token from [`TokenCodec`], and
//! resolving a session is a pure function of that token, the signing secret and the clock.

use axum::http::{HeaderMap, HeaderValue, header};
use tracing::{debug, instrument};

use crate::{
    auth::{credentials::CredentialStore, token::TokenCodec},
    errors::{Error, Result},
    types::{Identity, Role},
};

/// Name of the session cookie. The login handler writes it and the gate reads it;
/// both go through this constant.
pub const SESSION_COOKIE_NAME: &str = "paydash_session";

/// A `Set-Cookie` instruction for the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub value: String,
    pub max_age: u64,
    pub secure: bool,
}

impl SessionCookie {
    /// Render the `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE_NAME, self.value, self.max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn to_header(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.header_value()).map_err(|e| Error::Internal {
            operation: format!("build session cookie header: {e}"),
        })
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub username: String,
    pub role: Role,
    pub token: String,
    pub cookie: SessionCookie,
}

#[derive(Debug, Clone)]
pub struct SessionService {
    credentials: CredentialStore,
    codec: TokenCodec,
    cookie_secure: bool,
}

impl SessionService {
    pub fn new(credentials: CredentialStore, codec: TokenCodec, cookie_secure: bool) -> Self {
        Self {
            credentials,
            codec,
            cookie_secure,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Verify credentials and issue a fresh session token.
    ///
    /// Runs an Argon2 verification; call from a blocking task inside async handlers.
    #[instrument(skip_all)]
    pub fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let role = self.credentials.authenticate(username, password)?;
        let (token, _claims) = self.codec.issue(username, role);

        let cookie = SessionCookie {
            value: token.clone(),
            max_age: self.codec.ttl().as_secs(),
            secure: self.cookie_secure,
        };

        Ok(LoginOutcome {
            username: username.to_string(),
            role,
            token,
            cookie,
        })
    }

    /// Resolve a raw cookie value to an identity. Any invalid, expired or malformed token is
    /// simply "no session".
    pub fn resolve(&self, cookie_value: &str) -> Option<Identity> {
        match self.codec.verify(cookie_value) {
            Ok(claims) => Some(claims.identity()),
            Err(e) => {
                debug!("Ignoring session cookie: {e}");
                None
            }
        }
    }

    /// Resolve the session from request headers, trying every session cookie present.
    pub fn resolve_headers(&self, headers: &HeaderMap) -> Option<Identity> {
        session_cookie_values(headers).find_map(|value| self.resolve(value))
    }

    /// Cookie write that expires the session on the client immediately.
    pub fn logout(&self) -> SessionCookie {
        SessionCookie {
            value: String::new(),
            max_age: 0,
            secure: self.cookie_secure,
        }
    }
}

/// Every value of the session cookie in the request's `Cookie` headers.
pub fn session_cookie_values(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .filter(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value)
}
