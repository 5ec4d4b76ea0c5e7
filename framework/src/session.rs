//! In-memory session store
//!
//! A key-value bag with the CSRF token convention: `token()` lazily
//! generates a 40-character alphanumeric token under the `_token` key, and
//! form rendering embeds it via the `@csrf` directive.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::distributions::Alphanumeric;
use rand::Rng;

const TOKEN_KEY: &str = "_token";
const TOKEN_LENGTH: usize = 40;

#[derive(Default)]
pub struct Session {
    data: RwLock<HashMap<String, String>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.write().insert(key.to_string(), value.to_string());
    }

    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn forget(&self, key: &str) {
        self.write().remove(key);
    }

    /// The session's CSRF token, generated on first access.
    pub fn token(&self) -> String {
        if let Some(existing) = self.get(TOKEN_KEY) {
            return existing;
        }
        let token = generate_token();
        self.put(TOKEN_KEY, &token);
        token
    }

    /// Replace the CSRF token, e.g. after authentication changes.
    pub fn regenerate_token(&self) -> String {
        let token = generate_token();
        self.put(TOKEN_KEY, &token);
        token
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_stable_until_regenerated() {
        let session = Session::new();
        let first = session.token();
        assert_eq!(first.len(), 40);
        assert_eq!(session.token(), first);

        let second = session.regenerate_token();
        assert_ne!(first, second);
        assert_eq!(session.token(), second);
    }

    #[test]
    fn test_put_get_forget() {
        let session = Session::new();
        session.put("user", "ada");
        assert_eq!(session.get("user").as_deref(), Some("ada"));
        assert!(session.has("user"));
        session.forget("user");
        assert!(!session.has("user"));
    }
}
