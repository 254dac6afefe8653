//! Response interceptors for the backend client.
//!
//! Interceptors are registered on an [`InterceptorRegistry`] owned by the client.
//! Registration is reference counted per name: registering a name that is already
//! present shares the existing entry, so repeated registration from several
//! places never stacks duplicate handlers. The entry is removed when its last
//! [`InterceptorHandle`] is dropped.

use std::sync::{Arc, Mutex};

use crate::notice::{Notice, Notifier};
use crate::session::{LogoutReason, SessionContext};

/// What an interceptor gets to see about a failed response.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub status: u16,
    /// Whether the request carried the session token.
    pub authenticated: bool,
}

pub trait ResponseInterceptor: Send + Sync {
    /// Called for every non-2xx response before the error reaches the caller.
    fn on_error(&self, ctx: &ResponseContext<'_>);
}

struct Entry {
    name: &'static str,
    interceptor: Arc<dyn ResponseInterceptor>,
    refs: usize,
}

#[derive(Default)]
pub struct InterceptorRegistry {
    entries: Mutex<Vec<Entry>>,
}

impl InterceptorRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `interceptor` under `name`.
    ///
    /// If `name` is already registered, the existing interceptor is kept and its
    /// reference count goes up; `interceptor` is discarded.
    pub fn register(
        self: &Arc<Self>,
        name: &'static str,
        interceptor: Arc<dyn ResponseInterceptor>,
    ) -> InterceptorHandle {
        if let Ok(mut entries) = self.entries.lock() {
            match entries.iter_mut().find(|e| e.name == name) {
                Some(entry) => {
                    entry.refs += 1;
                    tracing::debug!(name, refs = entry.refs, "Interceptor already registered");
                }
                None => {
                    tracing::debug!(name, "Interceptor registered");
                    entries.push(Entry {
                        name,
                        interceptor,
                        refs: 1,
                    });
                }
            }
        }

        InterceptorHandle {
            registry: Arc::clone(self),
            name,
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.iter().any(|e| e.name == name))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered interceptor. The lock is released before calling out.
    pub fn dispatch(&self, ctx: &ResponseContext<'_>) {
        let interceptors: Vec<Arc<dyn ResponseInterceptor>> = match self.entries.lock() {
            Ok(entries) => entries.iter().map(|e| Arc::clone(&e.interceptor)).collect(),
            Err(_) => return,
        };

        for interceptor in interceptors {
            interceptor.on_error(ctx);
        }
    }

    fn release(&self, name: &str) {
        if let Ok(mut entries) = self.entries.lock()
            && let Some(pos) = entries.iter().position(|e| e.name == name)
        {
            entries[pos].refs -= 1;
            if entries[pos].refs == 0 {
                entries.remove(pos);
                tracing::debug!(name, "Interceptor removed");
            }
        }
    }
}

/// Keeps a registration alive. Dropping the last handle for a name removes it.
pub struct InterceptorHandle {
    registry: Arc<InterceptorRegistry>,
    name: &'static str,
}

impl InterceptorHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for InterceptorHandle {
    fn drop(&mut self) {
        self.registry.release(self.name);
    }
}

impl std::fmt::Debug for InterceptorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorHandle")
            .field("name", &self.name)
            .finish()
    }
}

pub const SESSION_INTERCEPTOR: &str = "session-401";
pub const UNAUTHORIZED_NOTICE: &str = "Session expired";

/// Forces logout when an authenticated request comes back 401.
///
/// Unauthenticated calls (the login form) are ignored: a 401 there means bad
/// credentials, not a dead session.
pub struct SessionInterceptor {
    session: Arc<SessionContext>,
    notifier: Arc<dyn Notifier>,
}

impl SessionInterceptor {
    pub fn new(session: Arc<SessionContext>, notifier: Arc<dyn Notifier>) -> Self {
        Self { session, notifier }
    }
}

impl ResponseInterceptor for SessionInterceptor {
    fn on_error(&self, ctx: &ResponseContext<'_>) {
        if ctx.status != 401 || !ctx.authenticated {
            return;
        }

        tracing::warn!(method = ctx.method, path = ctx.path, "Backend rejected session");
        if self.session.clear(LogoutReason::Unauthorized) {
            self.notifier.notify(Notice::error(UNAUTHORIZED_NOTICE));
        }
    }
}
