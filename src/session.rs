//! Session context: the single owner of the stored token and role.
//!
//! Every read or write of session state goes through [`SessionContext`]. The
//! route guard, the expiry watcher and the HTTP client observe changes through a
//! `tokio::sync::watch` subscription instead of reading storage themselves.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::storage::{StorageAdapter, keys};

/// A logged-in staff session as persisted in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    /// Role saved at login. `None` if storage held a token without a role.
    pub role: Option<String>,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    Explicit,
    Expired,
    InvalidSession,
    Unauthorized,
    AccessDenied,
}

impl std::fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit logout"),
            Self::Expired => write!(f, "token expired"),
            Self::InvalidSession => write!(f, "invalid token"),
            Self::Unauthorized => write!(f, "unauthorized response"),
            Self::AccessDenied => write!(f, "access denied"),
        }
    }
}

pub struct SessionContext {
    storage: Arc<dyn StorageAdapter>,
    state: watch::Sender<Option<Session>>,
    last_logout: Mutex<Option<LogoutReason>>,
    /// Timer task of the watcher currently attached to this session, if any.
    watcher: Mutex<Option<AbortHandle>>,
}

impl SessionContext {
    /// Load the session from storage.
    ///
    /// A role without a token is meaningless, so a stray role is removed here.
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        let session = match storage.get(keys::TOKEN) {
            Some(token) if !token.is_empty() => Some(Session {
                token,
                role: storage.get(keys::ROLE),
            }),
            _ => {
                storage.remove(keys::TOKEN);
                storage.remove(keys::ROLE);
                None
            }
        };

        let (state, _) = watch::channel(session);

        Self {
            storage,
            state,
            last_logout: Mutex::new(None),
            watcher: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().as_ref().map(|s| s.token.clone())
    }

    pub fn role(&self) -> Option<String> {
        self.state.borrow().as_ref().and_then(|s| s.role.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Store a fresh session. Token and role are written together.
    pub fn establish(&self, token: &str, role: &str) {
        self.storage.set(keys::TOKEN, token);
        self.storage.set(keys::ROLE, role);

        if let Ok(mut last) = self.last_logout.lock() {
            *last = None;
        }

        tracing::info!(role = %role, "Session established");
        self.state.send_replace(Some(Session {
            token: token.to_string(),
            role: Some(role.to_string()),
        }));
    }

    /// Remove token and role together and notify subscribers.
    ///
    /// Returns `false` if there was no session to clear.
    pub fn clear(&self, reason: LogoutReason) -> bool {
        self.storage.remove(keys::TOKEN);
        self.storage.remove(keys::ROLE);

        let previous = self.state.send_replace(None);
        if previous.is_some() {
            tracing::info!(reason = %reason, "Session cleared");
            if let Ok(mut last) = self.last_logout.lock() {
                *last = Some(reason);
            }
        }
        previous.is_some()
    }

    /// Explicit logout.
    pub fn logout(&self) -> bool {
        self.clear(LogoutReason::Explicit)
    }

    /// Reason for the most recent logout since the last login.
    pub fn last_logout(&self) -> Option<LogoutReason> {
        self.last_logout.lock().ok().and_then(|l| *l)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// Resolves once the session holding `token` is gone, either cleared or
    /// replaced by a different token.
    pub async fn ended_for(&self, token: &str) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail while borrowed.
        let _ = rx
            .wait_for(|s| s.as_ref().map(|s| s.token.as_str()) != Some(token))
            .await;
    }

    /// Attach a watcher task, aborting the one attached before it.
    pub(crate) fn replace_watcher(&self, handle: AbortHandle) {
        if let Ok(mut slot) = self.watcher.lock()
            && let Some(previous) = slot.replace(handle)
        {
            tracing::debug!("Replacing existing expiry watcher");
            previous.abort();
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("logged_in", &self.is_logged_in())
            .field("role", &self.role())
            .finish()
    }
}
