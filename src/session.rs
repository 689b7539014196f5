//! Process-wide session state.
//!
//! The session is a single optional bearer token. Whether a user is signed in
//! is always computed from that token; there is no separate flag to drift.
//!
//! Mutation points are explicit: [`SessionStore::set_token`] after a login,
//! [`SessionStore::logout`] on an explicit sign-out, and the API client calling
//! `logout` when the server rejects the credential.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::storage::Storage;

/// Durable key holding the bearer token.
pub const TOKEN_KEY: &str = "qatron-token";

/// Shared handle to the session token. Clones observe the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    token: watch::Sender<Option<String>>,
    storage: Option<Arc<dyn Storage>>,
}

impl SessionStore {
    /// Create a session, adopting any previously persisted token.
    ///
    /// A storage read failure is logged and treated as "no token".
    pub fn open(storage: Option<Arc<dyn Storage>>) -> Self {
        let initial = storage.as_ref().and_then(|s| match s.get_item(TOKEN_KEY) {
            Ok(token) => normalize(token),
            Err(e) => {
                tracing::warn!("Could not read persisted session, starting signed out: {:#}", e);
                None
            }
        });

        if initial.is_some() {
            tracing::debug!("Restored persisted session");
        }

        let (token, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner { token, storage }),
        }
    }

    /// A session with no durable storage behind it.
    pub fn in_memory() -> Self {
        Self::open(None)
    }

    pub fn token(&self) -> Option<String> {
        self.inner.token.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.token.borrow().is_some()
    }

    /// Replace the token. `None` or an empty string signs the user out.
    ///
    /// The in-memory value is updated even when persisting fails, so the very
    /// next read in the same operation sees the new state.
    pub fn set_token(&self, token: Option<String>) {
        let token = normalize(token);

        if let Some(storage) = &self.inner.storage {
            let persisted = match &token {
                Some(t) => storage.set_item(TOKEN_KEY, t),
                None => storage.remove_item(TOKEN_KEY),
            };
            if let Err(e) = persisted {
                tracing::warn!("Could not persist session change: {:#}", e);
            }
        }

        let was_authenticated = self.is_authenticated();
        let now_authenticated = token.is_some();
        self.inner.token.send_replace(token);

        match (was_authenticated, now_authenticated) {
            (false, true) => tracing::info!("Session authenticated"),
            (true, false) => tracing::info!("Session cleared"),
            _ => {}
        }
    }

    pub fn logout(&self) {
        self.set_token(None);
    }

    /// Watch for token changes; every mutation notifies subscribers.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.token.subscribe()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("is_authenticated", &self.is_authenticated())
            .field("durable", &self.inner.storage.is_some())
            .finish()
    }
}

fn normalize(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}
