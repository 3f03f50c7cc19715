use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    clock::Clock,
    domain::{
        money, Actor, Booking, BookingPaymentStatus, BookingStatus, CreateBookingRequest, Gig,
        RescheduleOutcome, RescheduleState, UserRole,
    },
    error::{AppError, Result},
    meetings::{MeetingContext, MeetingGateway},
    repository::{BookingRepository, GigRepository},
    service::{availability_service::AvailabilityService, locks::TeacherLocks,
        refund_service::RefundService},
};

/// The booking state machine. Every status, payment_status and meeting
/// mutation in the system funnels through this service (or its refund
/// sibling); webhooks and the auto-completion sweep call back into the
/// same operations.
pub struct BookingService {
    pool: SqlitePool,
    booking_repo: Arc<dyn BookingRepository>,
    gig_repo: Arc<dyn GigRepository>,
    availability: Arc<AvailabilityService>,
    meetings: Arc<dyn MeetingGateway>,
    teacher_locks: Arc<TeacherLocks>,
    refunds: Arc<RefundService>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        booking_repo: Arc<dyn BookingRepository>,
        gig_repo: Arc<dyn GigRepository>,
        availability: Arc<AvailabilityService>,
        meetings: Arc<dyn MeetingGateway>,
        teacher_locks: Arc<TeacherLocks>,
        refunds: Arc<RefundService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            booking_repo,
            gig_repo,
            availability,
            meetings,
            teacher_locks,
            refunds,
            clock,
        }
    }

    pub async fn get(&self, booking_id: Uuid, actor: Actor) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if !is_party(&booking, actor) {
            return Err(AppError::Forbidden);
        }
        Ok(booking)
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<Booking>> {
        self.booking_repo.list_by_student(student_id).await
    }

    pub async fn list_for_teacher(&self, teacher_id: Uuid) -> Result<Vec<Booking>> {
        self.booking_repo.list_by_teacher(teacher_id).await
    }

    /// Creates a booking in Pending/Unpaid. The teacher lock is held only
    /// across the in-transaction overlap re-check and insert; no meeting
    /// is allocated yet.
    pub async fn create(&self, actor: Actor, request: CreateBookingRequest) -> Result<Booking> {
        if actor.role != UserRole::Student {
            return Err(AppError::Forbidden);
        }

        let gig = self
            .gig_repo
            .find_by_id(request.gig_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Gig not found".to_string()))?;

        if !gig.accepts_bookings() {
            return Err(AppError::InvalidState(
                "Gig is not accepting bookings".to_string(),
            ));
        }

        self.validate_window(request.start_time, request.end_time)?;

        if !self
            .availability
            .covers(gig.teacher_id, request.start_time, request.end_time)
            .await?
        {
            return Err(AppError::NoAvailability(
                "The requested window is outside the teacher's availability".to_string(),
            ));
        }

        let booking = new_booking(actor.id, &gig, &request);

        let lock = self.teacher_locks.for_teacher(gig.teacher_id);
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;
        let overlapping = self
            .booking_repo
            .count_overlapping_tx(
                &mut tx,
                gig.teacher_id,
                request.start_time,
                request.end_time,
                None,
            )
            .await?;
        if overlapping > 0 {
            return Err(AppError::Conflict(
                "The teacher already has a booking in this window".to_string(),
            ));
        }

        self.booking_repo.insert_tx(&mut tx, &booking).await?;
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            teacher_id = %booking.teacher_id,
            "Booking created"
        );

        self.load(booking.id).await
    }

    /// Teacher confirmation: allocates the meeting (reusing an existing
    /// handle) and moves Pending -> Confirmed. Idempotent on an already
    /// confirmed booking; the provider is not called a second time.
    pub async fn confirm(&self, booking_id: Uuid, actor: Actor) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        if actor.id != booking.teacher_id && !actor.is_admin() {
            return Err(AppError::Unauthorized);
        }

        if booking.status == BookingStatus::Confirmed {
            return Ok(booking);
        }
        if booking.status != BookingStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Cannot confirm a booking in state {:?}",
                booking.status
            )));
        }

        self.confirm_transition(booking).await
    }

    /// The shared Pending -> Confirmed transition, also driven by the
    /// payment path and webhook ingest. If the meeting allocation fails
    /// the booking is left untouched in Pending and the error surfaces.
    pub(crate) async fn confirm_transition(&self, mut booking: Booking) -> Result<Booking> {
        if booking.meeting.is_none() {
            let gig = self.load_gig(booking.gig_id).await?;
            let handle = self.meetings.create(&meeting_context(&booking, &gig)).await?;
            booking.meeting = Some(handle);
        }

        booking.status = BookingStatus::Confirmed;
        let updated = self.booking_repo.update(&booking).await?;

        tracing::info!(booking_id = %updated.id, "Booking confirmed");
        Ok(updated)
    }

    /// Cancels a Pending or Confirmed booking. Meeting deletion is
    /// best-effort; a paid booking gets an automatic refund enqueued.
    pub async fn cancel(&self, booking_id: Uuid, actor: Actor, reason: String) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        if !is_party(&booking, actor) {
            return Err(AppError::Unauthorized);
        }
        if !booking.status.occupies_slot() {
            return Err(AppError::InvalidState(format!(
                "Cannot cancel a booking in state {:?}",
                booking.status
            )));
        }

        let was_paid = booking.payment_status == BookingPaymentStatus::Paid;

        let mut cancelled = booking;
        cancelled.status = BookingStatus::Cancelled;
        cancelled.cancellation_reason = Some(reason.clone());
        let mut updated = self.booking_repo.update(&cancelled).await?;

        if let Some(handle) = updated.meeting.clone() {
            match self.meetings.delete(&handle).await {
                Ok(()) => {
                    updated.meeting = None;
                    updated = self.booking_repo.update(&updated).await?;
                }
                Err(e) => {
                    tracing::warn!(
                        booking_id = %updated.id,
                        meeting_id = %handle.id,
                        error = %e,
                        "Failed to delete meeting on cancel"
                    );
                }
            }
        }

        if was_paid {
            self.refunds
                .enqueue_automatic(&updated, &reason)
                .await?;
            // Re-read: the refund path moved payment_status.
            updated = self.load(updated.id).await?;
        }

        tracing::info!(booking_id = %updated.id, "Booking cancelled");
        Ok(updated)
    }

    /// Finalizes a session after it has ended. No-op success when already
    /// Completed.
    pub async fn complete(&self, booking_id: Uuid, actor: Actor) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if !is_party(&booking, actor) {
            return Err(AppError::Unauthorized);
        }
        self.complete_checked(booking, false).await
    }

    /// Completion driven by a provider-signalled meeting end; the
    /// end-time check is bypassed because the provider reports the
    /// actual end.
    pub(crate) async fn complete_from_event(&self, booking: Booking) -> Result<Booking> {
        self.complete_checked(booking, true).await
    }

    async fn complete_checked(&self, booking: Booking, bypass_end_check: bool) -> Result<Booking> {
        if booking.status == BookingStatus::Completed {
            return Ok(booking);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(AppError::InvalidState(format!(
                "Cannot complete a booking in state {:?}",
                booking.status
            )));
        }
        if booking.payment_status != BookingPaymentStatus::Paid {
            return Err(AppError::InvalidState(
                "Cannot complete an unpaid booking".to_string(),
            ));
        }
        if !bypass_end_check && booking.end_time > self.clock.now() {
            return Err(AppError::InvalidTime(
                "The session has not ended yet".to_string(),
            ));
        }

        let mut completed = booking;
        completed.status = BookingStatus::Completed;
        let updated = self.booking_repo.update(&completed).await?;

        tracing::info!(booking_id = %updated.id, "Booking completed");
        Ok(updated)
    }

    /// Marks the booking paid and confirms it if still pending; called by
    /// the payment path and the charge.succeeded webhook with the meeting
    /// allocation following the confirm rules.
    pub(crate) async fn mark_paid(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        let mut paid = booking;
        paid.payment_status = BookingPaymentStatus::Paid;
        let updated = self.booking_repo.update(&paid).await?;

        if updated.status == BookingStatus::Pending {
            return self.confirm_transition(updated).await;
        }
        Ok(updated)
    }

    pub(crate) async fn mark_payment_failed(&self, booking_id: Uuid) -> Result<Booking> {
        let mut booking = self.load(booking_id).await?;
        booking.payment_status = BookingPaymentStatus::Failed;
        self.booking_repo.update(&booking).await
    }

    pub(crate) async fn load(&self, booking_id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    pub(crate) async fn load_gig(&self, gig_id: Uuid) -> Result<Gig> {
        self.gig_repo
            .find_by_id(gig_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Gig not found".to_string()))
    }

    pub(crate) fn validate_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        if start >= end {
            return Err(AppError::InvalidTime(
                "start_time must be before end_time".to_string(),
            ));
        }
        if start < self.clock.now() {
            return Err(AppError::InvalidTime(
                "start_time must be in the future".to_string(),
            ));
        }
        Ok(())
    }
}

fn new_booking(student_id: Uuid, gig: &Gig, request: &CreateBookingRequest) -> Booking {
    let now = Utc::now();
    Booking {
        id: Uuid::new_v4(),
        student_id,
        teacher_id: gig.teacher_id,
        gig_id: gig.id,
        start_time: request.start_time,
        end_time: request.end_time,
        duration_hours: money::duration_hours(request.start_time, request.end_time),
        status: BookingStatus::Pending,
        payment_status: BookingPaymentStatus::Unpaid,
        reschedule: RescheduleState::None,
        previous_reschedule: RescheduleOutcome::None,
        meeting: None,
        cancellation_reason: None,
        notes: request.notes.clone(),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn meeting_context(booking: &Booking, gig: &Gig) -> MeetingContext {
    MeetingContext {
        topic: gig.title.clone(),
        start_time: booking.start_time,
        duration_minutes: (booking.end_time - booking.start_time).num_minutes(),
        agenda: booking.notes.clone(),
    }
}

pub(crate) fn is_party(booking: &Booking, actor: Actor) -> bool {
    actor.id == booking.student_id || actor.id == booking.teacher_id || actor.is_admin()
}
