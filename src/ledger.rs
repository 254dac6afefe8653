//! Balance maths over a payment and its transactions.
//!
//! Only `success` transactions count as paid. Transactions still pending
//! verification are not subtracted from the balance; [`pending_total`] exposes
//! them separately so a cashier can see money that is not confirmed yet.

use rust_decimal::Decimal;

use crate::types::{Payment, TransactionStatus};

/// Sum of successful transactions.
pub fn total_paid(payment: &Payment) -> Decimal {
    payment
        .transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Success)
        .map(|t| t.amount_paid)
        .sum()
}

/// Sum of transactions still awaiting gateway confirmation.
pub fn pending_total(payment: &Payment) -> Decimal {
    payment
        .transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::PendingVerification)
        .map(|t| t.amount_paid)
        .sum()
}

/// `totalAmount` minus successful payments, never below zero.
pub fn remaining_balance(payment: &Payment) -> Decimal {
    (payment.total_amount - total_paid(payment)).max(Decimal::ZERO)
}

/// Fee breakdown for the payment detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub tuition_fee: Decimal,
    pub misc_total: Decimal,
    pub gross_fees: Decimal,
    /// Fraction, e.g. 0.25 for 25%
    pub discount_rate: Decimal,
    pub discount_amount: Decimal,
    pub total_fees: Decimal,
    pub total_paid: Decimal,
    /// `total_fees - total_paid`; negative when overpaid
    pub balance: Decimal,
}

impl FeeBreakdown {
    pub fn for_payment(payment: &Payment) -> Self {
        let tuition_fee = payment.tuition_fee.unwrap_or_default();
        let misc_total: Decimal = payment.misc_fees.values().copied().sum();
        let gross_fees = tuition_fee + misc_total;
        let discount_rate = payment.discount_applied.unwrap_or_default();
        let discount_amount = (gross_fees * discount_rate).round_dp(2);
        let total_fees = gross_fees - discount_amount;
        let total_paid = total_paid(payment);

        Self {
            tuition_fee,
            misc_total,
            gross_fees,
            discount_rate,
            discount_amount,
            total_fees,
            total_paid,
            balance: total_fees - total_paid,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.balance <= Decimal::ZERO
    }

    /// "Completed" once nothing is left to pay, else "Pending".
    pub fn status_label(&self) -> &'static str {
        if self.is_settled() {
            "Completed"
        } else {
            "Pending"
        }
    }

    /// Discount as a whole percentage, e.g. 25 for 0.25
    pub fn discount_percent(&self) -> Decimal {
        (self.discount_rate * Decimal::ONE_HUNDRED).round_dp(0)
    }
}
