//! Static credential table: username -> (password hash, role).
//!
//! Built once at startup from [`crate::config::UserConfig`] entries and never mutated.
//! Plaintext passwords from the config file are hashed during construction, so only
//! Argon2 hashes are held in memory.

use std::collections::HashMap;

use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::password::{self, Argon2Params},
    config::UserConfig,
    errors::{Error, Result},
    types::Role,
};

#[derive(Debug, Clone)]
struct CredentialRecord {
    password_hash: String,
    role: Role,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    records: HashMap<String, CredentialRecord>,
    /// Hash checked for unknown usernames, so both failure paths cost one Argon2 verification.
    dummy_hash: String,
}

impl CredentialStore {
    pub fn from_config(users: &[UserConfig], params: Argon2Params) -> Result<Self> {
        let mut records = HashMap::with_capacity(users.len());

        for user in users {
            let password_hash = match (&user.password_hash, &user.password) {
                (Some(hash), None) => hash.clone(),
                (None, Some(plaintext)) => {
                    warn!(username = %user.username, "Plaintext password in configuration; hashing it at startup. Prefer password_hash.");
                    password::hash_string_with_params(plaintext, params)?
                }
                _ => {
                    return Err(Error::Config {
                        message: format!("user '{}' must set exactly one of password_hash or password", user.username),
                    });
                }
            };

            let record = CredentialRecord {
                password_hash,
                role: user.role,
            };
            if records.insert(user.username.clone(), record).is_some() {
                return Err(Error::Config {
                    message: format!("duplicate username '{}'", user.username),
                });
            }
        }

        let dummy_hash = password::hash_string_with_params(&Uuid::new_v4().to_string(), params)?;

        Ok(Self { records, dummy_hash })
    }

    /// Number of configured users, for the startup log.
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Check a username/password pair and return the configured role.
    ///
    /// Unknown usernames and wrong passwords yield the same [`Error::InvalidCredentials`].
    /// This is CPU-bound; call it from a blocking task inside async handlers.
    #[instrument(skip_all)]
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Role> {
        let record = self.records.get(username);
        let hash = record.map_or(self.dummy_hash.as_str(), |r| r.password_hash.as_str());

        let is_valid = password::verify_string(password, hash)?;

        match record {
            Some(record) if is_valid => Ok(record.role),
            _ => Err(Error::InvalidCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fast_argon2_params;

    fn user(username: &str, role: Role, password: &str) -> UserConfig {
        UserConfig {
            username: username.to_string(),
            role,
            password_hash: None,
            password: Some(password.to_string()),
        }
    }

    fn store() -> CredentialStore {
        let hashed = UserConfig {
            username: "carol".to_string(),
            role: Role::Staff,
            password_hash: Some(password::hash_string_with_params("carol-pw", fast_argon2_params()).unwrap()),
            password: None,
        };
        CredentialStore::from_config(
            &[user("admin", Role::Admin, "admin"), user("staff", Role::Staff, "staff"), hashed],
            fast_argon2_params(),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_pairs_return_configured_role() {
        let store = store();
        assert_eq!(store.len(), 3);
        assert_eq!(store.authenticate("admin", "admin").unwrap(), Role::Admin);
        assert_eq!(store.authenticate("staff", "staff").unwrap(), Role::Staff);
        assert_eq!(store.authenticate("carol", "carol-pw").unwrap(), Role::Staff);
    }

    #[test_log::test]
    fn test_failures_are_indistinguishable() {
        let store = store();
        let cases = [
            ("admin", "wrong"),
            ("nobody", "admin"),
            ("Admin", "admin"), // usernames are case sensitive
            ("", ""),
            ("admin", ""),
            ("staff", "admin"),
        ];

        for (username, password) in cases {
            let err = store.authenticate(username, password).unwrap_err();
            assert!(matches!(err, Error::InvalidCredentials), "{username}/{password}");
            assert_eq!(err.user_message(), "Invalid credentials");
        }
    }

    #[test_log::test]
    fn test_duplicate_usernames_rejected() {
        let result = CredentialStore::from_config(
            &[user("admin", Role::Admin, "a"), user("admin", Role::Staff, "b")],
            fast_argon2_params(),
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_plaintext_is_not_retained() {
        let store = store();
        let debug = format!("{store:?}");
        assert!(!debug.contains("password_hash: \"admin\""));
        assert!(debug.contains("$argon2id$"));
    }
}
