//! Credential verification
//!
//! The username/password method asks an [`AuthManager`] whether a pair of
//! credentials is valid. The default store is the `[[server.users]]` table of
//! the configuration file, held in memory.

use crate::config::UserConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

/// Verifies username/password credentials
#[async_trait]
pub trait AuthManager: Debug + Send + Sync {
    /// Return true when the credentials are accepted
    async fn verify_credentials(&self, username: &str, password: &str) -> bool;
}

/// In-memory credential store
#[derive(Debug, Clone, Default)]
pub struct StaticAuthManager {
    users: HashMap<String, String>,
}

impl StaticAuthManager {
    /// Create a store from `(username, password)` pairs
    pub fn new<I, U, P>(users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        StaticAuthManager {
            users: users
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }

    /// Create a store from the configured users
    pub fn from_config(users: &[UserConfig]) -> Self {
        Self::new(
            users
                .iter()
                .map(|user| (user.username.clone(), user.password.clone())),
        )
    }

    /// Number of known users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the store has no users
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl AuthManager for StaticAuthManager {
    async fn verify_credentials(&self, username: &str, password: &str) -> bool {
        let expected = match self.users.get(username) {
            Some(p) => p,
            None => {
                tracing::debug!(username = %username, "Unknown user");
                return false;
            }
        };

        constant_time_compare(password.as_bytes(), expected.as_bytes())
    }
}

/// Accepts any credentials; the user name is still recorded in the session
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthManager for AllowAll {
    async fn verify_credentials(&self, _username: &str, _password: &str) -> bool {
        true
    }
}

/// Constant-time comparison of two byte slices
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
