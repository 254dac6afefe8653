//! Recording a transaction against a selected payment.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::client::{CashierClient, TRANSACTION_SOURCE};
use crate::error::{CashierError, Result, ValidationError};
use crate::ledger::remaining_balance;
use crate::listing::RefreshTrigger;
use crate::notice::{Notice, Notifier};
use crate::polling::{PAYMENT_COMPLETED_NOTICE, PollOutcome, StatusPoller};
use crate::types::{NewTransaction, Payment, PaymentMethod, QrPayload};

/// Smallest amount the payment gateway accepts for an online payment.
pub const MIN_ONLINE_AMOUNT: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

pub const RECORDED_NOTICE: &str = "Transaction recorded!";
pub const SUBMIT_FAILED_NOTICE: &str = "Transaction failed";

/// Check an amount before anything is sent to the backend.
///
/// Rules apply in order: positive amount, then the cash balance cap, then the
/// online minimum.
pub fn validate_amount(
    amount: Decimal,
    method: PaymentMethod,
    remaining: Decimal,
) -> std::result::Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::InvalidAmount);
    }
    match method {
        PaymentMethod::Cash if amount > remaining => {
            Err(ValidationError::ExceedsBalance { remaining })
        }
        PaymentMethod::Online if amount < MIN_ONLINE_AMOUNT => {
            Err(ValidationError::BelowMinimum {
                minimum: MIN_ONLINE_AMOUNT,
            })
        }
        _ => Ok(()),
    }
}

/// What the cashier filled in.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub student_id: String,
    pub payment: Payment,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

impl TransactionDraft {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.student_id.trim().is_empty() || self.payment.id.trim().is_empty() {
            return Err(ValidationError::MissingSelection);
        }
        validate_amount(self.amount, self.method, remaining_balance(&self.payment))
    }

    fn to_request(&self) -> NewTransaction {
        NewTransaction {
            student_id: self.student_id.clone(),
            payment_id: self.payment.id.clone(),
            amount_paid: self.amount,
            payment_method: self.method,
            source: TRANSACTION_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Form open, nothing submitted or last attempt failed
    Editing,
    /// Online transaction created; waiting for the payer to scan the QR code
    QrPending {
        transaction_id: String,
        qr: QrPayload,
    },
    Closed,
}

/// One "create transaction" dialog, from the form to the QR wait.
pub struct TransactionFlow {
    client: Arc<CashierClient>,
    notifier: Arc<dyn Notifier>,
    refresh: RefreshTrigger,
    poller: StatusPoller,
    state: FlowState,
    last_transaction: Option<String>,
}

impl TransactionFlow {
    pub fn new(
        client: Arc<CashierClient>,
        notifier: Arc<dyn Notifier>,
        refresh: RefreshTrigger,
    ) -> Self {
        let poller = StatusPoller::new(client.clone(), notifier.clone(), refresh.clone());
        Self {
            client,
            notifier,
            refresh,
            poller,
            state: FlowState::Editing,
            last_transaction: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Id of the transaction created by the last successful submit.
    pub fn transaction_id(&self) -> Option<&str> {
        self.last_transaction.as_deref()
    }

    /// Build a draft against one of the student's open payments.
    ///
    /// The payment is looked up among the student's payments that can still
    /// take money; a completed payment or one that belongs to someone else is
    /// refused before anything is submitted.
    pub async fn prepare(
        &self,
        student_id: &str,
        payment_id: &str,
        amount: Decimal,
        method: PaymentMethod,
    ) -> Result<TransactionDraft> {
        if student_id.trim().is_empty() || payment_id.trim().is_empty() {
            return Err(self.refuse(ValidationError::MissingSelection));
        }

        let open = self.client.student_payments(student_id).await?;
        let Some(payment) = open.into_iter().find(|p| p.id == payment_id) else {
            tracing::warn!(student_id, payment_id, "Payment is not open for this student");
            return Err(self.refuse(ValidationError::PaymentUnavailable));
        };

        Ok(TransactionDraft {
            student_id: student_id.to_string(),
            payment,
            amount,
            method,
        })
    }

    fn refuse(&self, e: ValidationError) -> CashierError {
        self.notifier.notify(Notice::error(e.to_string()));
        e.into()
    }

    pub fn close(&mut self) {
        self.state = FlowState::Closed;
    }

    /// Validate and submit. On success the flow moves to `QrPending` when the
    /// backend returned a QR payload, else to `Closed`. On failure it stays
    /// `Editing`.
    pub async fn submit(&mut self, draft: &TransactionDraft) -> Result<&FlowState> {
        if self.state != FlowState::Editing {
            return Err(CashierError::InvalidState("transaction already submitted"));
        }

        if let Err(e) = draft.validate() {
            return Err(self.refuse(e));
        }

        let created = match self.client.create_transaction(&draft.to_request()).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(payment_id = %draft.payment.id, "Transaction failed: {}", e);
                if !e.is_session_fatal() {
                    self.notifier.notify(Notice::error(e.notice_text(SUBMIT_FAILED_NOTICE)));
                }
                return Err(e);
            }
        };

        tracing::info!(
            transaction_id = %created.transaction.id,
            method = %draft.method,
            amount = %draft.amount,
            "Transaction recorded"
        );
        self.notifier.notify(Notice::success(RECORDED_NOTICE));
        self.last_transaction = Some(created.transaction.id.clone());
        self.refresh.bump();

        if created.payment_completed {
            self.notifier.notify(Notice::success(PAYMENT_COMPLETED_NOTICE));
        }

        self.state = match created.qr_image.as_deref().and_then(QrPayload::parse) {
            Some(qr) => FlowState::QrPending {
                transaction_id: created.transaction.id,
                qr,
            },
            None => FlowState::Closed,
        };

        Ok(&self.state)
    }

    /// Manually check the status of the submitted transaction.
    ///
    /// A completed payment closes the flow; once closed it stays closed, and
    /// further checks keep reporting the settled status.
    pub async fn check_status(&mut self) -> Result<PollOutcome> {
        let Some(transaction_id) = self.last_transaction.clone() else {
            return Err(CashierError::InvalidState("no transaction to check"));
        };

        let outcome = self.poller.check(&transaction_id).await?;
        if outcome.is_completed() {
            self.state = FlowState::Closed;
        }
        Ok(outcome)
    }

    pub fn is_checking(&self) -> bool {
        self.last_transaction
            .as_deref()
            .is_some_and(|id| self.poller.is_checking(id))
    }
}

impl std::fmt::Debug for TransactionFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionFlow")
            .field("state", &self.state)
            .field("last_transaction", &self.last_transaction)
            .finish()
    }
}
