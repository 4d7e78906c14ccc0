use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub receipt_url: String,
    pub status: PaymentStatus,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    /// PENDING and APPROVED rows block a new upload for the same course.
    pub fn is_active(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Approved)
    }
}

/// Admin listing row.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWithDetails {
    pub id: i32,
    pub student_id: i32,
    pub student_name: String,
    pub student_email: String,
    pub course_id: i32,
    pub course_title: String,
    pub receipt_url: String,
    pub status: PaymentStatus,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An approved payment already holding a bank reference number.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceUsage {
    pub payment_id: i32,
    pub reference_number: String,
    pub student_id: i32,
    pub student_name: String,
    pub student_email: String,
    pub course_id: i32,
    pub course_title: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePaymentRequest {
    pub reference_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReferenceResponse {
    pub is_duplicate: bool,
    pub payment: Option<ReferenceUsage>,
}

/// Trims a bank reference number; `None` when nothing is left.
pub fn normalize_reference(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
