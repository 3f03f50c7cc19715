use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod availability_repository;
pub mod booking_repository;
pub mod gig_repository;
pub mod payment_repository;
pub mod refund_repository;
pub mod user_repository;

pub use availability_repository::SqliteAvailabilityRepository;
pub use booking_repository::SqliteBookingRepository;
pub use gig_repository::SqliteGigRepository;
pub use payment_repository::{SqlitePaymentRepository, SqliteSavedPaymentMethodRepository};
pub use refund_repository::SqliteRefundRepository;
pub use user_repository::SqliteUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn set_provider_customer_id(&self, id: Uuid, customer_id: &str) -> Result<User>;
}

#[async_trait]
pub trait GigRepository: Send + Sync {
    async fn create(&self, teacher_id: Uuid, gig: CreateGigRequest) -> Result<Gig>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Gig>>;
    async fn list_by_teacher(&self, teacher_id: Uuid) -> Result<Vec<Gig>>;
    async fn update(&self, id: Uuid, update: UpdateGigRequest) -> Result<Gig>;
}

#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Per-tuple idempotent insert-or-touch of a whole batch, atomically.
    async fn upsert_slots(&self, teacher_id: Uuid, specs: &[SlotSpec]) -> Result<Vec<AvailabilitySlot>>;
    /// Drops every recurring slot of the teacher and installs the new set.
    async fn replace_weekly(&self, teacher_id: Uuid, specs: &[SlotSpec]) -> Result<Vec<AvailabilitySlot>>;
    /// Atomic delete; fails NOT_OWNED if any id belongs to someone else.
    async fn delete_slots(&self, teacher_id: Uuid, slot_ids: &[Uuid]) -> Result<()>;
    async fn list_for_teacher(&self, teacher_id: Uuid) -> Result<Vec<AvailabilitySlot>>;
    /// Slots applying to one concrete date: recurring entries for its
    /// weekday plus one-shot entries for the date itself.
    async fn list_for_date(&self, teacher_id: Uuid, date: NaiveDate) -> Result<Vec<AvailabilitySlot>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn find_by_meeting_id(&self, meeting_id: &str) -> Result<Option<Booking>>;
    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<Booking>>;
    async fn list_by_teacher(&self, teacher_id: Uuid) -> Result<Vec<Booking>>;
    /// Slot-holding bookings of the teacher intersecting [from, to).
    async fn list_occupying(
        &self,
        teacher_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;
    /// Confirmed and paid bookings whose end_time has passed; the
    /// auto-completion sweep feeds on this.
    async fn list_completable(&self, now: DateTime<Utc>) -> Result<Vec<Booking>>;
    async fn update(&self, booking: &Booking) -> Result<Booking>;

    // Transaction-scoped variants used inside the critical sections of the
    // booking service, where the overlap re-check and the write must share
    // one transaction.
    async fn insert_tx(&self, conn: &mut SqliteConnection, booking: &Booking) -> Result<()>;
    async fn update_tx(&self, conn: &mut SqliteConnection, booking: &Booking) -> Result<()>;
    async fn count_overlapping_tx(
        &self,
        conn: &mut SqliteConnection,
        teacher_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<i64>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: &Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_charge_id(&self, charge_id: &str) -> Result<Option<Payment>>;
    async fn update(&self, payment: &Payment) -> Result<Payment>;
    async fn insert_tx(&self, conn: &mut SqliteConnection, payment: &Payment) -> Result<()>;
    async fn update_tx(&self, conn: &mut SqliteConnection, payment: &Payment) -> Result<()>;
}

#[async_trait]
pub trait SavedPaymentMethodRepository: Send + Sync {
    async fn create(&self, method: &SavedPaymentMethod) -> Result<SavedPaymentMethod>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SavedPaymentMethod>>;
    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<SavedPaymentMethod>>;
    /// Marks the given method default and clears the flag everywhere else,
    /// atomically.
    async fn set_default(&self, student_id: Uuid, method_id: Uuid) -> Result<SavedPaymentMethod>;
}

#[async_trait]
pub trait RefundRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefundRequest>>;
    async fn list_by_payment(&self, payment_id: Uuid) -> Result<Vec<RefundRequest>>;
    async fn list_pending(&self) -> Result<Vec<RefundRequest>>;
    async fn update(&self, request: &RefundRequest) -> Result<RefundRequest>;
    async fn insert_tx(&self, conn: &mut SqliteConnection, request: &RefundRequest) -> Result<()>;
    /// Open request (Pending/Approved/Processed) for the payment, if any.
    async fn find_open_by_payment_tx(
        &self,
        conn: &mut SqliteConnection,
        payment_id: Uuid,
    ) -> Result<Option<RefundRequest>>;
}
