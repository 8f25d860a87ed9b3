//! Session/credential provider.
//!
//! The engine attaches a bearer token to every remote call when one is
//! available. Absence of a token is not fatal — the request is attempted
//! unauthenticated and the server's rejection is handled like any other
//! delivery failure.

use std::sync::RwLock;

/// Synchronous lookup of the current session credential.
pub trait SessionProvider: Send + Sync {
    /// Returns the current bearer token, if a session is active.
    fn bearer_token(&self) -> Option<String>;
}

/// A session provider holding a swappable token — set on login, cleared on
/// logout.
pub struct StaticSession {
    token: RwLock<Option<String>>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// A provider with no credential; requests go out unauthenticated.
    pub fn anonymous() -> Self {
        Self {
            token: RwLock::new(None),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap() = token;
    }
}

impl SessionProvider for StaticSession {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }
}
