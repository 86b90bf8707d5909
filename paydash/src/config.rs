//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `PAYDASH_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `PAYDASH_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `PAYDASH_SESSION__TTL=12h` sets the `session.ttl` field.
//!
//! The whole configuration is read once at startup and never mutated afterwards. The credential
//! table and the access policy built from it are shared read-only across every request.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Signing secret (required outside local development)
//! PAYDASH_SECRET_KEY="$(openssl rand -base64 48)"
//!
//! # Shorter sessions
//! PAYDASH_SESSION__TTL=12h
//!
//! # Local development over plain HTTP
//! PAYDASH_ENVIRONMENT=local
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use rand::prelude::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    time::Duration,
};
use url::Url;

use crate::auth::password::{self, Argon2Params};
use crate::errors::Error;
use crate::types::Role;

/// Minimum signing secret length accepted outside local development.
pub const MIN_SECRET_LEN: usize = 32;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PAYDASH_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Deployment environment. Controls the `Secure` cookie flag and whether a signing secret
/// may be omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development over plain HTTP
    Local,
    #[default]
    Production,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    pub environment: Environment,
    /// HMAC signing secret for session tokens (required outside local development)
    pub secret_key: Option<String>,
    pub session: SessionConfig,
    /// Static credential table
    pub users: Vec<UserConfig>,
    /// Argon2 parameters used when hashing plaintext passwords at startup
    pub password: Argon2Params,
    /// Role -> allowed route prefixes
    pub access_policy: BTreeMap<Role, Vec<String>>,
    pub gate: GateConfig,
    /// Upstream employee/payroll/document API. Optional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Session token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Token and cookie lifetime
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

/// A single credential record.
///
/// Exactly one of `password_hash` (Argon2 PHC string) or `password` (plaintext, hashed at
/// startup) must be set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub username: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// Request gate path lists.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Static assets and framework internals; never session-checked
    pub bypass_prefixes: Vec<String>,
    /// Reachable without a session
    pub public_paths: Vec<String>,
    pub login_path: String,
    pub forbidden_path: String,
}

/// Upstream data API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub url: Url,
    /// Per-request timeout
    #[serde(default = "default_backend_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Lifetime of the identity assertion attached to each forwarded request
    #[serde(default = "default_assertion_ttl", with = "humantime_serde")]
    pub assertion_ttl: Duration,
}

fn default_backend_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_assertion_ttl() -> Duration {
    Duration::from_secs(60)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
        }
    }
}

fn prefixes(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Default role -> prefix table. Admins see everything; staff do not see reports.
pub fn default_access_policy() -> BTreeMap<Role, Vec<String>> {
    BTreeMap::from([
        (
            Role::Admin,
            prefixes(&["/", "/dashboard", "/employees", "/payroll", "/documents", "/reports", "/api"]),
        ),
        (
            Role::Staff,
            prefixes(&[
                "/",
                "/dashboard",
                "/employees",
                "/payroll",
                "/documents",
                "/api/me",
                "/api/payroll",
                "/api/backend/employees",
                "/api/backend/documents",
                "/api/backend/payroll/runs",
            ]),
        ),
    ])
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bypass_prefixes: prefixes(&["/assets", "/favicon.ico", "/favicon.svg", "/robots.txt"]),
            public_paths: prefixes(&["/login", "/logout", "/forbidden", "/healthz"]),
            login_path: "/login".to_string(),
            forbidden_path: "/forbidden".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: Environment::default(),
            secret_key: None,
            session: SessionConfig::default(),
            users: vec![],
            password: Argon2Params::default(),
            access_policy: default_access_policy(),
            gate: GateConfig::default(),
            backend: None,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("PAYDASH_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether session cookies carry the `Secure` attribute.
    pub fn cookie_secure(&self) -> bool {
        self.environment != Environment::Local
    }

    /// Resolve the signing secret. Call once at startup and share the result.
    ///
    /// Outside local development a missing secret is fatal. In local development a random
    /// per-process secret is generated, so sessions do not survive a restart.
    pub fn signing_secret(&self) -> Result<Vec<u8>, Error> {
        match (&self.secret_key, self.environment) {
            (Some(secret), _) => Ok(secret.as_bytes().to_vec()),
            (None, Environment::Local) => {
                tracing::warn!("No secret_key configured; using a random per-process signing secret (local environment only)");
                let mut bytes = vec![0u8; MIN_SECRET_LEN];
                rng().fill(&mut bytes[..]);
                Ok(bytes)
            }
            (None, Environment::Production) => Err(Error::Config {
                message: "secret_key is required outside the local environment. \
                          Set PAYDASH_SECRET_KEY or add secret_key to the config file."
                    .to_string(),
            }),
        }
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let config_error = |message: String| Err(Error::Config { message });

        match (&self.secret_key, self.environment) {
            (None, Environment::Production) => {
                return config_error("secret_key is required outside the local environment".to_string());
            }
            (Some(secret), Environment::Production) if secret.len() < MIN_SECRET_LEN => {
                return config_error(format!("secret_key must be at least {MIN_SECRET_LEN} bytes"));
            }
            _ => {}
        }

        if self.session.ttl.is_zero() {
            return config_error("session.ttl must be greater than zero".to_string());
        }

        if self.users.is_empty() {
            return config_error("at least one entry in users is required".to_string());
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if !seen.insert(user.username.as_str()) {
                return config_error(format!("duplicate username '{}'", user.username));
            }
            match (&user.password_hash, &user.password) {
                (Some(_), Some(_)) | (None, None) => {
                    return config_error(format!(
                        "user '{}' must set exactly one of password_hash or password",
                        user.username
                    ));
                }
                (Some(hash), None) if !password::is_valid_hash(hash) => {
                    return config_error(format!("user '{}' has an unparseable password_hash", user.username));
                }
                _ => {}
            }
        }

        for role in Role::ALL {
            let Some(allowed) = self.access_policy.get(&role) else {
                return config_error(format!("access_policy has no entry for role '{role}'"));
            };
            if let Some(bad) = allowed.iter().find(|p| !p.starts_with('/')) {
                return config_error(format!("access_policy prefix '{bad}' for role '{role}' must start with '/'"));
            }
        }

        let gate = &self.gate;
        let path_lists = gate
            .bypass_prefixes
            .iter()
            .chain(&gate.public_paths)
            .chain([&gate.login_path, &gate.forbidden_path]);
        for path in path_lists {
            if !path.starts_with('/') {
                return config_error(format!("gate path '{path}' must start with '/'"));
            }
        }
        for required in [&gate.login_path, &gate.forbidden_path] {
            if !gate.public_paths.contains(required) {
                return config_error(format!("gate.public_paths must include '{required}'"));
            }
        }

        if let Some(backend) = &self.backend
            && !matches!(backend.url.scheme(), "http" | "https")
        {
            return config_error(format!("backend.url must be http or https, got '{}'", backend.url));
        }

        Ok(())
    }
}
