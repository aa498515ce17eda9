//! Session-store collaborator.
//!
//! The Authorization middleware resolves the caller's session from a cookie and
//! attaches a [`Session`] handle to the request context. Handlers read and
//! write session values through that handle.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

/// Session key holding `"true"` once the caller has logged in.
pub const AUTHENTICATED_KEY: &str = "authenticated";
/// Session key holding the caller's role(s), comma separated.
pub const ROLE_KEY: &str = "role";

/// Key/value storage scoped by session id.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, session_id: &str, key: &str, value: String) -> anyhow::Result<()>;
}

/// Process-local session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `session_id` as authenticated with the given role.
    pub fn login(&self, session_id: &str, role: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.insert(AUTHENTICATED_KEY.to_string(), "true".to_string());
        entry.insert(ROLE_KEY.to_string(), role.to_string());
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, session_id: &str, key: &str) -> anyhow::Result<Option<String>> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(session_id).and_then(|s| s.get(key)).cloned())
    }

    fn set(&self, session_id: &str, key: &str, value: String) -> anyhow::Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// The caller's session: an id bound to the store that holds it.
#[derive(Clone)]
pub struct Session {
    id: String,
    store: Arc<dyn SessionStore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

impl Session {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.store.get(&self.id, key)
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> anyhow::Result<()> {
        self.store.set(&self.id, key, value.into())
    }

    pub fn is_authenticated(&self) -> anyhow::Result<bool> {
        Ok(self.get(AUTHENTICATED_KEY)?.as_deref() == Some("true"))
    }

    pub fn roles(&self) -> anyhow::Result<BTreeSet<String>> {
        Ok(self
            .get(ROLE_KEY)?
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}
