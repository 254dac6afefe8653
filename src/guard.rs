//! Navigation-time access checks for cashier-only commands.

use std::sync::Arc;

use crate::error::CashierError;
use crate::notice::{Notice, Notifier};
use crate::session::{LogoutReason, SessionContext};
use crate::token::{SessionClaims, decode_token, is_expired, now};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const DEFAULT_REQUIRED_ROLE: &str = "cashier";

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoSession,
    InvalidSession,
    Expired,
    AccessDenied,
}

impl DenyReason {
    fn notice(&self) -> Notice {
        match self {
            Self::NoSession => Notice::info("Please log in to continue"),
            Self::InvalidSession => Notice::error("Invalid session, please log in again"),
            Self::Expired => Notice::info("Session expired, please log in again"),
            Self::AccessDenied => Notice::error("Access denied: only cashiers can use this app."),
        }
    }
}

/// Access refused; the caller should navigate to `redirect_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denied {
    pub reason: DenyReason,
    pub redirect_to: &'static str,
}

impl From<Denied> for CashierError {
    fn from(denied: Denied) -> Self {
        match denied.reason {
            DenyReason::NoSession => CashierError::NoSession,
            DenyReason::InvalidSession => CashierError::InvalidSession,
            DenyReason::Expired => CashierError::SessionExpired,
            DenyReason::AccessDenied => {
                CashierError::AccessDenied("only cashiers can use this app".into())
            }
        }
    }
}

/// Access granted.
#[derive(Debug, Clone)]
pub struct Access {
    pub claims: SessionClaims,
    pub role: String,
}

pub struct RouteGuard {
    session: Arc<SessionContext>,
    notifier: Arc<dyn Notifier>,
    required_role: String,
}

impl RouteGuard {
    pub fn new(
        session: Arc<SessionContext>,
        notifier: Arc<dyn Notifier>,
        required_role: impl Into<String>,
    ) -> Self {
        Self {
            session,
            notifier,
            required_role: required_role.into(),
        }
    }

    pub fn required_role(&self) -> &str {
        &self.required_role
    }

    /// Where `/` should land: the dashboard when a token is stored, else login.
    pub fn landing(&self) -> &'static str {
        if self.session.is_logged_in() {
            DASHBOARD_PATH
        } else {
            LOGIN_PATH
        }
    }

    pub fn check(&self) -> Result<Access, Denied> {
        self.check_at(now())
    }

    /// Run the checks as of `now_secs`. Fails closed: any failure after the
    /// token-presence check clears token and role together.
    pub fn check_at(&self, now_secs: i64) -> Result<Access, Denied> {
        let Some(session) = self.session.current() else {
            return Err(self.deny(DenyReason::NoSession));
        };

        let claims = match decode_token(&session.token) {
            Ok(claims) => claims,
            Err(_) => {
                self.session.clear(LogoutReason::InvalidSession);
                return Err(self.deny(DenyReason::InvalidSession));
            }
        };

        if is_expired(&claims, now_secs) {
            self.session.clear(LogoutReason::Expired);
            return Err(self.deny(DenyReason::Expired));
        }

        match session.role {
            Some(role) if role.to_lowercase() == self.required_role.to_lowercase() => {
                Ok(Access { claims, role })
            }
            role => {
                tracing::warn!(role = ?role, required = %self.required_role, "Role not allowed");
                self.session.clear(LogoutReason::AccessDenied);
                Err(self.deny(DenyReason::AccessDenied))
            }
        }
    }

    fn deny(&self, reason: DenyReason) -> Denied {
        self.notifier.notify(reason.notice());
        Denied {
            reason,
            redirect_to: LOGIN_PATH,
        }
    }
}

impl std::fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGuard")
            .field("required_role", &self.required_role)
            .finish()
    }
}
