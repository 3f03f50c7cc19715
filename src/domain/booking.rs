use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserRole;

/// The central aggregate: a scheduled one-on-one session between a student
/// and a teacher for a specific gig. Status, payment_status and the meeting
/// handle are mutated only through the booking service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub student_id: Uuid,
    pub teacher_id: Uuid,
    pub gig_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_hours: f64,
    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,
    pub reschedule: RescheduleState,
    pub previous_reschedule: RescheduleOutcome,
    pub meeting: Option<MeetingHandle>,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Bookings in these states hold their slot against the teacher's
    /// calendar and count for overlap checks.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum BookingPaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// A pending two-party reschedule proposal, carried as typed fields on the
/// aggregate rather than scratch metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RescheduleState {
    None,
    Pending {
        requested_by: UserRole,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: Option<String>,
    },
}

impl RescheduleState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RescheduleState::Pending { .. })
    }
}

/// Outcome of the most recently resolved proposal, kept for auditability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum RescheduleOutcome {
    None,
    Confirmed,
    Declined,
}

/// Opaque reference into the meeting provider plus the join material
/// surfaced to both parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingHandle {
    pub id: String,
    pub join_url: String,
    pub host_url: String,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub gig_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_and_confirmed_occupy_the_slot() {
        assert!(BookingStatus::Pending.occupies_slot());
        assert!(BookingStatus::Confirmed.occupies_slot());
        assert!(!BookingStatus::Cancelled.occupies_slot());
        assert!(!BookingStatus::Completed.occupies_slot());
    }

    #[test]
    fn reschedule_state_pending_flag() {
        assert!(!RescheduleState::None.is_pending());
        let pending = RescheduleState::Pending {
            requested_by: UserRole::Student,
            start: Utc::now(),
            end: Utc::now(),
            reason: None,
        };
        assert!(pending.is_pending());
    }
}
