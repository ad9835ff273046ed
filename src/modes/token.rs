use chrono::{DateTime, Utc};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::RwLock;

/// One mirror token binding an opaque credential to a user.
#[derive(Debug, Clone)]
pub struct MirrorToken {
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory token <-> user mapping for the mirror ingress. A user holds at
/// most one active token; issuing a new one deletes the old entry.
#[derive(Default)]
pub struct TokenRegistry {
    tokens: RwLock<HashMap<String, MirrorToken>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the user's current token, minting one if none exists. The
    /// mirror driver uses this so a stop/start cycle keeps the token the
    /// browser script already carries.
    pub fn get_or_create(&self, user_id: i64, username: &str) -> String {
        let mut tokens = self.tokens.write().unwrap();

        if let Some(existing) = tokens.values().find(|t| t.user_id == user_id) {
            return existing.token.clone();
        }

        insert_new(&mut tokens, user_id, username)
    }

    /// Mint a fresh token, deleting any prior entry for the user.
    pub fn generate(&self, user_id: i64, username: &str) -> String {
        let mut tokens = self.tokens.write().unwrap();

        tokens.retain(|_, t| t.user_id != user_id);

        insert_new(&mut tokens, user_id, username)
    }

    pub fn validate(&self, token: &str) -> Option<(i64, String)> {
        let tokens = self.tokens.read().unwrap();
        tokens
            .get(token)
            .map(|t| (t.user_id, t.username.clone()))
    }
}

fn insert_new(tokens: &mut HashMap<String, MirrorToken>, user_id: i64, username: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    tokens.insert(
        token.clone(),
        MirrorToken {
            token: token.clone(),
            user_id,
            username: username.to_string(),
            created_at: Utc::now(),
        },
    );

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_round_trip() {
        let registry = TokenRegistry::new();

        let token = registry.generate(1, "alice");
        assert_eq!(token.len(), 32);
        assert_eq!(registry.validate(&token), Some((1, "alice".to_string())));
        assert_eq!(registry.validate("deadbeef"), None);
    }

    #[test]
    fn test_generate_rotates() {
        let registry = TokenRegistry::new();

        let old = registry.generate(1, "alice");
        let new = registry.generate(1, "alice");

        assert_ne!(old, new);
        assert_eq!(registry.validate(&old), None);
        assert!(registry.validate(&new).is_some());
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let registry = TokenRegistry::new();

        let a = registry.get_or_create(1, "alice");
        let b = registry.get_or_create(1, "alice");
        assert_eq!(a, b);

        // other users get their own token
        let c = registry.get_or_create(2, "bob");
        assert_ne!(a, c);
    }
}
