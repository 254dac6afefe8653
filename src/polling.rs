//! Manual status checks for gateway (QR) transactions.
//!
//! There is no background polling: every check is triggered by the user. While a
//! check for a transaction is outstanding, further checks for the same id are
//! no-ops.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::client::CashierClient;
use crate::error::Result;
use crate::listing::RefreshTrigger;
use crate::notice::{Notice, Notifier};
use crate::types::StatusReport;

pub const CHECK_FAILED_NOTICE: &str = "Status check failed";
pub const PAYMENT_COMPLETED_NOTICE: &str = "Payment fully completed!";
pub const PAYMENT_SUCCEEDED_NOTICE: &str = "Payment succeeded!";

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A check for this transaction is already running
    Busy,
    /// Not settled yet; the user may check again
    Pending(StatusReport),
    /// Confirmed terminal success
    Completed(StatusReport),
}

impl PollOutcome {
    pub fn report(&self) -> Option<&StatusReport> {
        match self {
            Self::Busy => None,
            Self::Pending(r) | Self::Completed(r) => Some(r),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

pub struct StatusPoller {
    client: Arc<CashierClient>,
    notifier: Arc<dyn Notifier>,
    refresh: RefreshTrigger,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Clears the checking flag for one transaction when dropped, whatever the
/// outcome of the request.
struct CheckingGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    transaction_id: String,
}

impl Drop for CheckingGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.transaction_id);
        }
    }
}

impl StatusPoller {
    pub fn new(
        client: Arc<CashierClient>,
        notifier: Arc<dyn Notifier>,
        refresh: RefreshTrigger,
    ) -> Self {
        Self {
            client,
            notifier,
            refresh,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_checking(&self, transaction_id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(transaction_id))
            .unwrap_or(false)
    }

    /// Query the current status of `transaction_id` once.
    ///
    /// Errors are reported to the notifier and returned; the caller can simply
    /// try again.
    pub async fn check(&self, transaction_id: &str) -> Result<PollOutcome> {
        let Some(_guard) = self.begin(transaction_id) else {
            tracing::debug!(transaction_id, "Status check already in flight");
            return Ok(PollOutcome::Busy);
        };

        let report = match self.client.transaction_status(transaction_id).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(transaction_id, "Status check failed: {}", e);
                if !e.is_session_fatal() {
                    self.notifier
                        .notify(Notice::error(e.notice_text(CHECK_FAILED_NOTICE)));
                }
                return Err(e);
            }
        };

        tracing::info!(
            transaction_id,
            gateway = %report.current_status,
            app = %report.app_status,
            completed = report.payment_completed,
            "Status checked"
        );
        self.notifier.notify(Notice::info(format!(
            "Gateway status: {} | App status: {}",
            report.current_status, report.app_status
        )));
        self.refresh.bump();

        if report.payment_completed {
            self.notifier
                .notify(Notice::success(PAYMENT_COMPLETED_NOTICE));
        }
        if report.app_status == crate::types::TransactionStatus::Success {
            self.notifier
                .notify(Notice::success(PAYMENT_SUCCEEDED_NOTICE));
        }

        if report.is_complete() {
            Ok(PollOutcome::Completed(report))
        } else {
            Ok(PollOutcome::Pending(report))
        }
    }

    fn begin(&self, transaction_id: &str) -> Option<CheckingGuard> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert(transaction_id.to_string()) {
            return None;
        }
        Some(CheckingGuard {
            in_flight: Arc::clone(&self.in_flight),
            transaction_id: transaction_id.to_string(),
        })
    }
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("in_flight", &self.in_flight.lock().map(|s| s.len()).unwrap_or(0))
            .finish()
    }
}
