//! Error types for the cashier client

use rust_decimal::Decimal;
use thiserror::Error;

/// Client-side amount checks. These never reach the network layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Select a student and a payment first")]
    MissingSelection,

    #[error("This payment is not open for the selected student")]
    PaymentUnavailable,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Cash payment cannot exceed ₱{remaining}")]
    ExceedsBalance { remaining: Decimal },

    #[error("Online payments must be at least ₱{minimum}")]
    BelowMinimum { minimum: Decimal },
}

#[derive(Error, Debug)]
pub enum CashierError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid session")]
    InvalidSession,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not logged in")]
    NoSession,

    #[error("Request cancelled because the session ended")]
    SessionEnded,

    #[error("Backend error: {}", .message.as_deref().unwrap_or("no message"))]
    Backend {
        status: Option<u16>,
        message: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid operation: {0}")]
    InvalidState(&'static str),
}

/// Coarse classification, handy for CLI exit codes and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    SessionExpired,
    InvalidSession,
    AccessDenied,
    NoSession,
    SessionEnded,
    Backend,
    Network,
    Config,
    InvalidState,
}

impl CashierError {
    pub fn backend(status: Option<u16>, message: Option<String>) -> Self {
        Self::Backend { status, message }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::InvalidSession => ErrorCode::InvalidSession,
            Self::AccessDenied(_) => ErrorCode::AccessDenied,
            Self::NoSession => ErrorCode::NoSession,
            Self::SessionEnded => ErrorCode::SessionEnded,
            Self::Backend { .. } => ErrorCode::Backend,
            Self::Network(_) => ErrorCode::Network,
            Self::Config(_) => ErrorCode::Config,
            Self::InvalidState(_) => ErrorCode::InvalidState,
        }
    }

    /// Errors after which the stored session is gone and the user must log in again.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Unauthorized
                | ErrorCode::SessionExpired
                | ErrorCode::InvalidSession
                | ErrorCode::AccessDenied
                | ErrorCode::NoSession
                | ErrorCode::SessionEnded
        )
    }

    /// Text for a user-facing notice: the server's own message when it sent one,
    /// otherwise `fallback`.
    pub fn notice_text(&self, fallback: &str) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Backend {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }

    /// Notice text for a failed login. A refusal inside a 2xx body reads
    /// "Login failed" when the backend gave no reason.
    pub fn login_notice_text(&self) -> String {
        match self {
            Self::Backend {
                status: Some(status),
                ..
            } if (200..300).contains(status) => self.notice_text("Login failed"),
            _ => self.notice_text("Invalid credentials or server error"),
        }
    }
}

impl From<reqwest::Error> for CashierError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CashierError>;
