//! # Cashier
//!
//! Client for the cashier desk of a school payment system: staff sign in, look
//! up student payments, record cash or QR Ph transactions and check gateway
//! status.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cashier::{
//!     CashierClient, ClientOptions, ConsoleNotifier, ExpiryWatcher, MemoryStorage, SessionContext,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(SessionContext::new(Arc::new(MemoryStorage::new())));
//!     let client = CashierClient::new(session.clone(), ClientOptions::default())?;
//!
//!     // Logs the user out on any 401 while the handle lives
//!     let _interceptor = client.install_session_interceptor(Arc::new(ConsoleNotifier));
//!
//!     client.login("cashier1", "secret").await?;
//!     let _watcher = ExpiryWatcher::spawn(session, Arc::new(ConsoleNotifier));
//!
//!     for payment in client.payments().await? {
//!         println!("{} {}", payment.student_name(), payment.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `native-storage` (default): [`FileStorage`], a JSON file in a state directory
//!
//! ## Session lifecycle
//!
//! Token and role live in one [`SessionContext`]. The [`RouteGuard`] checks them
//! before a protected command runs, the [`ExpiryWatcher`] clears them at `exp`,
//! and the session interceptor clears them on a 401. Requests still in flight when
//! the session ends resolve to [`CashierError::SessionEnded`].

pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod interceptor;
pub mod ledger;
pub mod listing;
pub mod notice;
pub mod polling;
pub mod report;
pub mod session;
pub mod storage;
pub mod submission;
pub mod token;
pub mod types;
pub mod watcher;

pub use client::{CashierClient, ClientOptions};
pub use config::Config;
pub use error::{CashierError, ErrorCode, Result, ValidationError};
pub use guard::{Access, Denied, DenyReason, RouteGuard};
pub use interceptor::{InterceptorHandle, InterceptorRegistry, ResponseInterceptor};
pub use notice::{ConsoleNotifier, Notice, NoticeLevel, NoticeLog, Notifier, TracingNotifier};
pub use polling::{PollOutcome, StatusPoller};
pub use session::{LogoutReason, Session, SessionContext};
#[cfg(feature = "native-storage")]
pub use storage::FileStorage;
pub use storage::{MemoryStorage, StorageAdapter};
pub use submission::{FlowState, TransactionDraft, TransactionFlow};
pub use types::*;
pub use watcher::ExpiryWatcher;
