//! Role-based route authorization.
//!
//! The policy is a single table of role -> allowed route prefixes, loaded once from config.
//! Allow rules are a union: a path is allowed if any prefix for the role matches it. There
//! are no deny rules and no implicit allow.

use std::collections::{BTreeMap, HashMap};

use crate::{
    errors::{Error, Result},
    types::Role,
};

/// The one path-matching rule used everywhere: exact match, or `prefix` followed by `/`.
///
/// `/` therefore matches only the root path itself.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('/') && !prefix.ends_with('/'),
        None => false,
    }
}

/// True if `path` is already in the form the policy matches on: no `.` or `..` segments, raw
/// or percent-encoded, no encoded `/` and no backslash in any form.
///
/// Prefix matching only holds if nothing downstream rewrites the path, so anything an HTTP
/// client or URL parser would normalize is refused outright.
pub fn is_normalized_path(path: &str) -> bool {
    if path.contains('\\') {
        return false;
    }
    path.split('/').all(|segment| {
        let segment = segment.to_ascii_lowercase();
        if segment.contains("%2f") || segment.contains("%5c") {
            return false;
        }
        let decoded = segment.replace("%2e", ".");
        decoded != "." && decoded != ".."
    })
}

/// True if any prefix in `prefixes` matches `path`.
pub fn matches_any<S: AsRef<str>>(path: &str, prefixes: &[S]) -> bool {
    prefixes.iter().any(|prefix| matches_prefix(path, prefix.as_ref()))
}

/// Role -> allowed prefixes, matched with [`matches_prefix`].
///
/// Unlike a plain `starts_with(prefix + "/")` check, a `/` entry grants the root page only and
/// is not a catch-all default; every other section has to be listed.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed: HashMap<Role, Vec<String>>,
}

impl AccessPolicy {
    /// Build the policy. Every role must have an entry, even if it is empty.
    pub fn from_config(table: &BTreeMap<Role, Vec<String>>) -> Result<Self> {
        let mut allowed = HashMap::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            let prefixes = table.get(&role).ok_or_else(|| Error::Config {
                message: format!("access_policy has no entry for role '{role}'"),
            })?;
            allowed.insert(role, prefixes.clone());
        }
        Ok(Self { allowed })
    }

    pub fn is_allowed(&self, path: &str, role: Role) -> bool {
        self.allowed.get(&role).is_some_and(|prefixes| matches_any(path, prefixes))
    }
}
