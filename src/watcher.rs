//! Automatic logout when the session token expires.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::notice::{Notice, Notifier};
use crate::session::{LogoutReason, SessionContext};
use crate::token::{ExpiryPlan, expiry_plan, now_millis};

pub const EXPIRED_NOTICE: &str = "Session expired, please log in again";
pub const INVALID_NOTICE: &str = "Invalid session, please log in again";

/// Owns the one-shot expiry timer of a session.
///
/// The timer re-arms whenever the session token changes and is aborted when the
/// watcher is dropped. Spawning a second watcher on the same session aborts the
/// first one.
pub struct ExpiryWatcher {
    task: JoinHandle<()>,
}

impl ExpiryWatcher {
    /// Start watching. Must be called inside a tokio runtime.
    pub fn spawn(session: Arc<SessionContext>, notifier: Arc<dyn Notifier>) -> Self {
        let task = tokio::spawn(watch_session(session.clone(), notifier));
        session.replace_watcher(task.abort_handle());
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ExpiryWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn watch_session(session: Arc<SessionContext>, notifier: Arc<dyn Notifier>) {
    let mut rx = session.subscribe();

    loop {
        let token = rx.borrow_and_update().as_ref().map(|s| s.token.clone());

        if let Some(token) = token {
            match expiry_plan(&token, now_millis()) {
                ExpiryPlan::Invalid => {
                    tracing::warn!("Stored token cannot be decoded, logging out");
                    if session.clear(LogoutReason::InvalidSession) {
                        notifier.notify(Notice::error(INVALID_NOTICE));
                    }
                }
                ExpiryPlan::Elapsed => {
                    if session.clear(LogoutReason::Expired) {
                        notifier.notify(Notice::info(EXPIRED_NOTICE));
                    }
                }
                ExpiryPlan::In(delay) => {
                    tracing::debug!(delay_ms = delay.as_millis() as u64, "Expiry timer armed");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            if session.clear(LogoutReason::Expired) {
                                notifier.notify(Notice::info(EXPIRED_NOTICE));
                            }
                        }
                        changed = rx.changed() => {
                            // Token replaced or cleared: drop this timer and re-arm.
                            if changed.is_err() {
                                return;
                            }
                            continue;
                        }
                    }
                }
            }
        }

        if rx.changed().await.is_err() {
            return;
        }
    }
}
