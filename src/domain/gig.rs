use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gig {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub category: String,
    pub hourly_rate_cents: i64,
    /// Default session length offered to students picking a slot.
    pub duration_minutes: i64,
    pub status: GigStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Gig {
    /// Only active gigs accept new bookings.
    pub fn accepts_bookings(&self) -> bool {
        self.status == GigStatus::Active
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT")]
pub enum GigStatus {
    Active,
    Inactive,
    Draft,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGigRequest {
    pub title: String,
    pub category: String,
    pub hourly_rate_cents: i64,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGigRequest {
    pub title: Option<String>,
    pub hourly_rate_cents: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub status: Option<GigStatus>,
}
