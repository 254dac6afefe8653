//! Transaction and payment lists: loading, refreshing and client-side search.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use tokio::sync::watch;

use crate::client::CashierClient;
use crate::error::Result;
use crate::types::{Payment, Transaction};

/// Signals that lists should be reloaded.
///
/// Holds a generation counter; views subscribe and reload when it moves.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for RefreshTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshTrigger {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn bump(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// Load all transactions.
///
/// A lost session is returned as an error; any other failure is logged and
/// gives an empty list.
pub async fn load_transactions(client: &CashierClient) -> Result<Vec<Transaction>> {
    fail_open(client.transactions().await, "transactions")
}

/// Load all payments, failing open the same way as [`load_transactions`].
pub async fn load_payments(client: &CashierClient) -> Result<Vec<Payment>> {
    fail_open(client.payments().await, "payments")
}

fn fail_open<T>(result: Result<Vec<T>>, what: &str) -> Result<Vec<T>> {
    match result {
        Ok(items) => Ok(items),
        Err(e) if e.is_session_fatal() => Err(e),
        Err(e) => {
            tracing::error!("Failed to fetch {}: {}", what, e);
            Ok(Vec::new())
        }
    }
}

/// Case-insensitive match on reference, student name or status.
pub fn filter_transactions<'a>(
    transactions: &'a [Transaction],
    term: &str,
) -> Vec<&'a Transaction> {
    let term = term.trim().to_lowercase();
    transactions
        .iter()
        .filter(|t| {
            term.is_empty()
                || t.transaction_ref
                    .as_deref()
                    .is_some_and(|r| r.to_lowercase().contains(&term))
                || t.student_name().to_lowercase().contains(&term)
                || t.status.as_str().to_lowercase().contains(&term)
        })
        .collect()
}

/// Case-insensitive match on student name, school year, semester or status.
pub fn filter_payments<'a>(payments: &'a [Payment], term: &str) -> Vec<&'a Payment> {
    let term = term.trim().to_lowercase();
    let has = |value: Option<&str>| value.is_some_and(|v| v.to_lowercase().contains(&term));
    payments
        .iter()
        .filter(|p| {
            term.is_empty()
                || p.student_name().to_lowercase().contains(&term)
                || has(p.school_year.as_deref())
                || has(p.semester())
                || p.status.as_str().contains(&term)
        })
        .collect()
}

pub fn semester_label(value: Option<&str>) -> String {
    match value {
        Some("firstSemester") => "1st Semester".to_string(),
        Some("secondSemester") => "2nd Semester".to_string(),
        Some("summer") => "Summer Term".to_string(),
        Some(other) if !other.is_empty() => other.to_string(),
        _ => "—".to_string(),
    }
}

/// Format as pesos with thousands separators, e.g. `₱12,345.50`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}₱{}.{}", if negative { "-" } else { "" }, grouped, frac)
}
