use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BookingPaymentStatus;

/// 1:1 with a booking. Carries a snapshot of the rate and duration at
/// charge time, so later gig price edits never move the charged amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub gig_id: Uuid,
    pub provider_charge_id: Option<String>,
    pub provider_customer_id: Option<String>,
    pub amount_cents: i64,
    pub hourly_rate_cents: i64,
    pub duration_hours: f64,
    pub platform_fee_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    RefundRequested,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    /// How the booking mirrors this payment state.
    pub fn booking_payment_status(&self) -> BookingPaymentStatus {
        match self {
            PaymentStatus::Pending | PaymentStatus::Processing => BookingPaymentStatus::Pending,
            PaymentStatus::Completed | PaymentStatus::RefundRequested => BookingPaymentStatus::Paid,
            PaymentStatus::Failed => BookingPaymentStatus::Failed,
            PaymentStatus::Refunded => BookingPaymentStatus::Refunded,
            PaymentStatus::Cancelled => BookingPaymentStatus::Unpaid,
        }
    }
}

/// A card saved against the provider for reuse, with cached display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPaymentMethod {
    pub id: Uuid,
    pub student_id: Uuid,
    pub provider_method_id: String,
    pub brand: String,
    pub last_four: String,
    pub exp_month: i64,
    pub exp_year: i64,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
