//! Shared fixtures: an in-memory database with migrations applied, the
//! full service wiring over fake gateways, and a manual clock pinned to
//! a known Monday morning.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use linguahub::{
    clock::ManualClock,
    domain::{
        Actor, CreateGigRequest, CreateUserRequest, Gig, GigStatus, SlotSpec, UpdateGigRequest,
        User, UserRole,
    },
    meetings::FakeMeetingGateway,
    payments::FakePaymentGateway,
    repository::{GigRepository, UserRepository},
    service::ServiceContext,
};

pub struct TestHarness {
    pub pool: SqlitePool,
    pub services: Arc<ServiceContext>,
    pub meetings: Arc<FakeMeetingGateway>,
    pub payments: Arc<FakePaymentGateway>,
    pub clock: Arc<ManualClock>,
}

/// Monday 2026-03-02, 08:00 UTC.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

/// Offset from the base day's midnight, for readable session times.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
}

pub async fn harness() -> anyhow::Result<TestHarness> {
    // A single connection keeps every query on the same in-memory
    // database; a second pooled connection would see an empty one.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let meetings = Arc::new(FakeMeetingGateway::new());
    let payments = Arc::new(FakePaymentGateway::new());
    let clock = Arc::new(ManualClock::new(base_time()));

    let services = Arc::new(ServiceContext::new(
        pool.clone(),
        meetings.clone(),
        payments.clone(),
        clock.clone(),
    ));

    Ok(TestHarness {
        pool,
        services,
        meetings,
        payments,
        clock,
    })
}

impl TestHarness {
    pub async fn create_user(&self, role: UserRole, email: &str) -> anyhow::Result<User> {
        Ok(self
            .services
            .user_repo
            .create(CreateUserRequest {
                email: email.to_string(),
                display_name: email.split('@').next().unwrap_or("user").to_string(),
                role,
            })
            .await?)
    }

    pub async fn create_teacher(&self) -> anyhow::Result<User> {
        self.create_user(UserRole::Teacher, &format!("teacher-{}@example.com", Uuid::new_v4()))
            .await
    }

    pub async fn create_student(&self) -> anyhow::Result<User> {
        self.create_user(UserRole::Student, &format!("student-{}@example.com", Uuid::new_v4()))
            .await
    }

    pub async fn create_admin(&self) -> anyhow::Result<User> {
        self.create_user(UserRole::Admin, &format!("admin-{}@example.com", Uuid::new_v4()))
            .await
    }

    /// An active gig at 50 USD/h with one-hour default sessions.
    pub async fn create_active_gig(&self, teacher: &User) -> anyhow::Result<Gig> {
        let gig = self
            .services
            .gig_repo
            .create(
                teacher.id,
                CreateGigRequest {
                    title: "Conversational Spanish".to_string(),
                    category: "spanish".to_string(),
                    hourly_rate_cents: 5000,
                    duration_minutes: 60,
                },
            )
            .await?;
        Ok(self
            .services
            .gig_repo
            .update(
                gig.id,
                UpdateGigRequest {
                    status: Some(GigStatus::Active),
                    ..Default::default()
                },
            )
            .await?)
    }

    /// Recurring Monday 09:00-17:00 availability (day 1, Sunday-based).
    pub async fn monday_availability(&self, teacher: &User) -> anyhow::Result<()> {
        self.services
            .availability_service
            .upsert_slots(
                teacher.id,
                vec![SlotSpec {
                    day_of_week: Some(1),
                    specific_date: None,
                    start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                }],
            )
            .await?;
        Ok(())
    }

    pub fn actor(&self, user: &User) -> Actor {
        Actor {
            id: user.id,
            role: user.role,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}
