use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub student_id: Uuid,
    pub reason: String,
    pub requested_amount_cents: i64,
    pub status: RefundStatus,
    pub provider_refund_id: Option<String>,
    pub refunded_amount_cents: Option<i64>,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
}

impl RefundStatus {
    /// Open requests block a second refund for the same payment.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            RefundStatus::Pending | RefundStatus::Approved | RefundStatus::Processed
        )
    }
}
