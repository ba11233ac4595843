//! Bearer-token storage shared between API calls.

use std::sync::{Arc, PoisonError, RwLock};

/// Holds the current session token, if any.
///
/// Cloning yields another handle to the same token. The API layer clears it
/// when the service answers `401`.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    token: Arc<RwLock<Option<String>>>,
}

impl SessionStore {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token)),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        let previous = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::info!("Session token cleared");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_token() {
        let store = SessionStore::default();
        let other = store.clone();

        store.set("abc");
        assert_eq!(other.token().as_deref(), Some("abc"));

        other.clear();
        assert!(!store.is_authenticated());
    }
}
