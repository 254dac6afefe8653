//! Type definitions for the cashier backend API

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A reference to another document: either its id or the populated document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(String),
    Doc(T),
}

impl<T> Ref<T> {
    pub fn doc(&self) -> Option<&T> {
        match self {
            Self::Doc(doc) => Some(doc),
            Self::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub student_number: Option<String>,
}

impl Student {
    /// `fullName` when the backend sent one, else first and last name.
    pub fn display_name(&self) -> String {
        if let Some(full) = self.full_name.as_deref().map(str::trim)
            && !full.is_empty()
        {
            return full.to_string();
        }
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: String,
}

/// How a transaction is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    /// QR Ph through the payment gateway
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Online => "online",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "online" | "qr" | "qrph" => Ok(Self::Online),
            other => Err(format!("unknown payment method: {}", other)),
        }
    }
}

/// Domain status of a transaction. Only the backend changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    #[default]
    PendingVerification,
    Success,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingVerification => "pendingVerification",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Partial,
    Completed,
    #[serde(other)]
    Other,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Completed => "completed",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// The parent payment as embedded in a transaction listing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentRef {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, alias = "paymentId")]
    pub payment: Option<Ref<PaymentRef>>,
    pub transaction_ref: Option<String>,
    pub amount_paid: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub status: TransactionStatus,
    pub source: Option<String>,
    pub student: Option<Ref<Student>>,
    pub staff: Option<Ref<Staff>>,
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn payment_id(&self) -> Option<&str> {
        match self.payment.as_ref()? {
            Ref::Id(id) => Some(id.as_str()),
            Ref::Doc(doc) => Some(doc.id.as_str()),
        }
    }

    /// Status of the parent payment; only known when the backend populated it.
    pub fn payment_status(&self) -> Option<PaymentStatus> {
        self.payment.as_ref().and_then(Ref::doc).map(|p| p.status)
    }

    pub fn student_name(&self) -> String {
        self.student
            .as_ref()
            .and_then(Ref::doc)
            .map(Student::display_name)
            .unwrap_or_default()
    }

    /// Status string reported by the payment gateway, if the backend kept its response.
    pub fn gateway_status(&self) -> Option<&str> {
        self.gateway_response
            .as_ref()?
            .pointer("/data/attributes/status")?
            .as_str()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Enrollment {
    pub semester: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub student: Option<Ref<Student>>,
    pub school_year: Option<String>,
    pub enrollment: Option<Enrollment>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub tuition_fee: Option<Decimal>,
    #[serde(default)]
    pub misc_fees: BTreeMap<String, Decimal>,
    pub discount_applied: Option<Decimal>,
}

impl Payment {
    pub fn student_name(&self) -> String {
        self.student
            .as_ref()
            .and_then(Ref::doc)
            .map(Student::display_name)
            .unwrap_or_default()
    }

    pub fn semester(&self) -> Option<&str> {
        self.enrollment.as_ref()?.semester.as_deref()
    }
}

/// Aggregates shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(default)]
    pub transactions_today: u64,
    #[serde(default)]
    pub amount_collected: Decimal,
    #[serde(default)]
    pub pending_payments: u64,
    #[serde(default)]
    pub completed_payments: u64,
}

/// Result of a manual status check. Never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Raw status from the payment gateway
    #[serde(default)]
    pub current_status: String,
    /// This system's classification
    #[serde(default)]
    pub app_status: TransactionStatus,
    #[serde(default)]
    pub payment_completed: bool,
}

impl StatusReport {
    /// A confirmed terminal success: further polling is pointless.
    pub fn is_complete(&self) -> bool {
        self.payment_completed || self.app_status == TransactionStatus::Success
    }
}

/// Body of `POST /transactions`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub student_id: String,
    pub payment_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    pub payment_method: PaymentMethod,
    pub source: String,
}

/// Response of `POST /transactions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTransaction {
    pub transaction: Transaction,
    #[serde(default)]
    pub payment_completed: bool,
    pub qr_image: Option<String>,
}

/// The QR payload returned for an online payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrPayload {
    /// A ready-made image as a `data:image/...` URL
    Image(String),
    /// Raw payment payload; a renderer has to encode it as a QR code
    Raw(String),
}

impl QrPayload {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else if value.starts_with("data:image") {
            Some(Self::Image(value.to_string()))
        } else {
            Some(Self::Raw(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Image(s) | Self::Raw(s) => s,
        }
    }
}

// ==================== Wire envelopes ====================

/// Every backend response carries `success` and sometimes `message`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    pub staff: Staff,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentsResponse {
    #[serde(default)]
    pub students: Vec<Student>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentsResponse {
    #[serde(default)]
    pub payments: Vec<Payment>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentResponse {
    pub payment: Payment,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionsResponse {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryResponse {
    #[serde(default)]
    pub summary: DashboardSummary,
}
