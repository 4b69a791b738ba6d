//! The boundary to the embedding application: authentication state, policy
//! checks and the CSRF token.

use serde_json::Value;
use std::collections::HashSet;

/// Answers the questions templates ask about the current request.
pub trait ViewHost {
    fn is_authenticated(&self) -> bool;

    /// Whether the current user may perform `ability`.
    fn allows(&self, ability: &str, args: &[Value]) -> bool;

    fn csrf_token(&self) -> Option<String>;
}

/// An anonymous visitor with no abilities and no CSRF token.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestHost;

impl ViewHost for GuestHost {
    fn is_authenticated(&self) -> bool {
        false
    }

    fn allows(&self, _ability: &str, _args: &[Value]) -> bool {
        false
    }

    fn csrf_token(&self) -> Option<String> {
        None
    }
}

/// A host with fixed answers, for the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    authenticated: bool,
    abilities: HashSet<String>,
    token: Option<String>,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    pub fn ability(mut self, ability: impl Into<String>) -> Self {
        self.abilities.insert(ability.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl ViewHost for StaticHost {
    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn allows(&self, ability: &str, _args: &[Value]) -> bool {
        self.abilities.contains(ability)
    }

    fn csrf_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_has_nothing() {
        let host = GuestHost;
        assert!(!host.is_authenticated());
        assert!(!host.allows("edit", &[]));
        assert_eq!(host.csrf_token(), None);
    }

    #[test]
    fn static_host_answers_configured_values() {
        let host = StaticHost::new()
            .authenticated(true)
            .ability("edit-post")
            .token("abc");
        assert!(host.is_authenticated());
        assert!(host.allows("edit-post", &[Value::from(1)]));
        assert!(!host.allows("delete-post", &[]));
        assert_eq!(host.csrf_token().as_deref(), Some("abc"));
    }
}
