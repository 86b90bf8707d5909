//! Signed session token creation and verification.
//!
//! A token is two base64url (unpadded) segments joined by a dot:
//!
//! ```text
//! base64url(json(claims)) "." base64url(hmac_sha256(secret, first_segment))
//! ```
//!
//! Neither segment can contain `.`, so splitting is unambiguous. The MAC covers the encoded
//! payload segment exactly as transmitted. Validity depends only on the signature, the claims
//! and the clock; nothing is stored server side.
//!
//! Session cookies and backend identity assertions share the secret, so every token carries a
//! [`TokenKind`] and a codec only accepts its own kind.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error as ThisError;
use uuid::Uuid;

use crate::types::{Identity, Role};

type HmacSha256 = Hmac<Sha256>;

const SEGMENT_DELIMITER: char = '.';

/// What a token may be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Assertion,
}

/// Session claims. Timestamps are Unix epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub typ: TokenKind,
    pub sub: String, // Subject (username)
    pub role: Role,
    pub iat: i64, // Issued at
    pub exp: i64, // Expiration time
    pub jti: Uuid, // Token id; makes every issued token distinct
}

impl SessionClaims {
    pub fn identity(&self) -> Identity {
        Identity {
            username: self.sub.clone(),
            role: self.role,
        }
    }
}

/// Why a token was rejected. Callers treat every variant as "no session".
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token is not valid for this use")]
    WrongKind,
}

/// Signs and verifies one kind of token with a process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    ttl: Duration,
    kind: TokenKind,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Codec for session cookies.
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self::with_kind(secret, ttl, TokenKind::Session)
    }

    /// Codec for backend identity assertions. Its tokens never resolve as sessions.
    pub fn assertions(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self::with_kind(secret, ttl, TokenKind::Assertion)
    }

    fn with_kind(secret: impl Into<Vec<u8>>, ttl: Duration, kind: TokenKind) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            kind,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_secs(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }

    /// Build claims for `subject` issued at `issued_at`, expiring one TTL later.
    pub fn claims_for(&self, subject: &str, role: Role, issued_at: i64) -> SessionClaims {
        SessionClaims {
            typ: self.kind,
            sub: subject.to_string(),
            role,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs()),
            jti: Uuid::new_v4(),
        }
    }

    /// Issue a fresh token for `subject` as of now.
    pub fn issue(&self, subject: &str, role: Role) -> (String, SessionClaims) {
        let claims = self.claims_for(subject, role, Utc::now().timestamp());
        (self.sign(&claims), claims)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"))
    }

    pub fn sign(&self, claims: &SessionClaims) -> String {
        // Serializing a struct of strings and integers cannot fail
        let json = serde_json::to_vec(claims).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{payload}{SEGMENT_DELIMITER}{signature}")
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as of `now` (Unix seconds).
    ///
    /// The signature is checked before the payload is decoded, and compared in constant time.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, TokenError> {
        let mut segments = token.split(SEGMENT_DELIMITER);
        let (Some(payload), Some(signature), None) = (segments.next(), segments.next(), segments.next()) else {
            return Err(TokenError::Malformed);
        };
        if payload.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: SessionClaims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;
        if claims.typ != self.kind {
            return Err(TokenError::WrongKind);
        }

        // A lifetime longer than the configured TTL counts as expired too, so shortening the
        // TTL takes effect for tokens already in circulation.
        if now >= claims.exp || claims.exp.saturating_sub(claims.iat) > self.ttl_secs() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
