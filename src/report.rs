//! Dashboard data, transaction timelines and CSV export.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::client::CashierClient;
use crate::error::{CashierError, Result};
use crate::types::{DashboardSummary, PaymentMethod, Ref, Transaction, TransactionStatus};

pub const DEFAULT_RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub recent: Vec<Transaction>,
}

impl Dashboard {
    /// Fetch summary and recent transactions together.
    ///
    /// Errors other than session-fatal ones are logged and give an empty dashboard.
    pub async fn load(client: &CashierClient, limit: usize) -> Result<Self> {
        match tokio::try_join!(client.summary(), client.recent_transactions(limit)) {
            Ok((summary, recent)) => Ok(Self { summary, recent }),
            Err(e) if e.is_session_fatal() => Err(e),
            Err(e) => {
                tracing::error!("Failed to fetch dashboard data: {}", e);
                Ok(Self::default())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Success,
    Failed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub label: &'static str,
    pub at: Option<DateTime<Utc>>,
    pub detail: String,
    pub kind: EventKind,
}

/// Lifecycle of a transaction as a list of events.
pub fn timeline(txn: &Transaction) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(3);

    let recorded_by = txn
        .staff
        .as_ref()
        .and_then(Ref::doc)
        .and_then(|s| s.full_name.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    events.push(TimelineEvent {
        label: "Created",
        at: txn.created_at,
        detail: format!("Recorded by {}", recorded_by),
        kind: EventKind::Info,
    });

    if let Some(verified_at) = txn.verified_at {
        let detail = match (txn.payment_method, txn.source.as_deref()) {
            (PaymentMethod::Cash, _) => "Cash payment auto-verified by cashier".to_string(),
            (PaymentMethod::Online, Some("cashier")) => format!(
                "Cashier verified (gateway: {})",
                txn.gateway_status().unwrap_or("N/A")
            ),
            (PaymentMethod::Online, _) => "Generated automatically by system (QR Ph)".to_string(),
        };
        events.push(TimelineEvent {
            label: "Verified",
            at: Some(verified_at),
            detail,
            kind: if txn.status == TransactionStatus::Success {
                EventKind::Success
            } else {
                EventKind::Failed
            },
        });
    }

    events.push(match txn.status {
        TransactionStatus::Success => TimelineEvent {
            label: "Payment Succeeded",
            at: txn.updated_at,
            detail: "Funds confirmed".to_string(),
            kind: EventKind::Success,
        },
        TransactionStatus::Failed => TimelineEvent {
            label: "Payment Failed",
            at: txn.updated_at,
            detail: "Transaction was not completed".to_string(),
            kind: EventKind::Failed,
        },
        _ => TimelineEvent {
            label: "Awaiting Verification",
            at: None,
            detail: "Waiting for gateway confirmation".to_string(),
            kind: EventKind::Pending,
        },
    });

    events
}

/// Local time, or an empty string when the backend sent no timestamp.
pub fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

#[derive(Serialize)]
struct CsvRow {
    #[serde(rename = "Student")]
    student: String,
    #[serde(rename = "Method")]
    method: &'static str,
    #[serde(rename = "Amount")]
    amount: String,
    #[serde(rename = "Status")]
    status: &'static str,
    #[serde(rename = "Date")]
    date: String,
}

/// Write transactions as CSV with a `Student,Method,Amount,Status,Date` header.
///
/// Nothing is written for an empty list.
pub fn export_csv<W: Write>(transactions: &[Transaction], out: W) -> Result<usize> {
    if transactions.is_empty() {
        return Ok(0);
    }

    let mut writer = csv::Writer::from_writer(out);
    for txn in transactions {
        writer
            .serialize(CsvRow {
                student: txn.student_name(),
                method: txn.payment_method.as_str(),
                amount: format!("{:.2}", txn.amount_paid),
                status: txn.status.as_str(),
                date: format_timestamp(txn.created_at),
            })
            .map_err(|e| CashierError::config(format!("CSV export failed: {}", e)))?;
    }
    writer
        .flush()
        .map_err(|e| CashierError::config(format!("CSV export failed: {}", e)))?;

    Ok(transactions.len())
}
