use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    clock::Clock,
    domain::{money, Actor, Booking, RescheduleOutcome, RescheduleState, UserRole},
    error::{AppError, Result},
    meetings::MeetingGateway,
    repository::{BookingRepository, GigRepository},
    service::{
        availability_service::AvailabilityService,
        booking_service::{is_party, meeting_context},
        locks::TeacherLocks,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub enum RescheduleAction {
    Confirmed,
    Declined,
}

/// The two-party reschedule sub-protocol over a booking: one side
/// proposes a new window, the other confirms or declines. A unilateral
/// `apply` path covers admin intervention.
pub struct RescheduleService {
    pool: SqlitePool,
    booking_repo: Arc<dyn BookingRepository>,
    gig_repo: Arc<dyn GigRepository>,
    availability: Arc<AvailabilityService>,
    meetings: Arc<dyn MeetingGateway>,
    teacher_locks: Arc<TeacherLocks>,
    clock: Arc<dyn Clock>,
}

impl RescheduleService {
    pub fn new(
        pool: SqlitePool,
        booking_repo: Arc<dyn BookingRepository>,
        gig_repo: Arc<dyn GigRepository>,
        availability: Arc<AvailabilityService>,
        meetings: Arc<dyn MeetingGateway>,
        teacher_locks: Arc<TeacherLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            booking_repo,
            gig_repo,
            availability,
            meetings,
            teacher_locks,
            clock,
        }
    }

    /// Opens a proposal. At most one proposal can be in flight per
    /// booking.
    pub async fn request(
        &self,
        booking_id: Uuid,
        actor: Actor,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        if actor.id != booking.student_id && actor.id != booking.teacher_id {
            return Err(AppError::Unauthorized);
        }
        if !booking.status.occupies_slot() {
            return Err(AppError::InvalidState(format!(
                "Cannot reschedule a booking in state {:?}",
                booking.status
            )));
        }
        if booking.reschedule.is_pending() {
            return Err(AppError::ProposalInFlight);
        }

        self.validate_new_window(&booking, new_start, new_end).await?;

        let requested_by = if actor.id == booking.student_id {
            UserRole::Student
        } else {
            UserRole::Teacher
        };

        let mut updated = booking;
        updated.reschedule = RescheduleState::Pending {
            requested_by,
            start: new_start,
            end: new_end,
            reason,
        };
        let updated = self.booking_repo.update(&updated).await?;

        tracing::info!(booking_id = %updated.id, "Reschedule proposed");
        Ok(updated)
    }

    /// The other party answers the proposal. A decline clears it; a
    /// confirmation re-checks the window under the teacher lock and swaps
    /// the times.
    pub async fn respond(
        &self,
        booking_id: Uuid,
        actor: Actor,
        action: RescheduleAction,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        let (requested_by, start, end) = match &booking.reschedule {
            RescheduleState::Pending {
                requested_by,
                start,
                end,
                ..
            } => (*requested_by, *start, *end),
            RescheduleState::None => {
                return Err(AppError::InvalidState(
                    "No reschedule proposal is pending".to_string(),
                ))
            }
        };

        // The responder is the counterparty of whoever asked.
        let expected_responder = match requested_by {
            UserRole::Student => booking.teacher_id,
            UserRole::Teacher => booking.student_id,
            UserRole::Admin => booking.student_id,
        };
        if actor.id != expected_responder {
            return Err(AppError::Unauthorized);
        }

        match action {
            RescheduleAction::Declined => {
                let mut updated = booking;
                updated.reschedule = RescheduleState::None;
                updated.previous_reschedule = RescheduleOutcome::Declined;
                let updated = self.booking_repo.update(&updated).await?;
                tracing::info!(booking_id = %updated.id, "Reschedule declined");
                Ok(updated)
            }
            RescheduleAction::Confirmed => self.commit_swap(booking, start, end).await,
        }
    }

    /// Unilateral reschedule for either party or an admin; both protocol
    /// steps happen atomically with no counterparty confirmation.
    pub async fn apply(
        &self,
        booking_id: Uuid,
        actor: Actor,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        if !is_party(&booking, actor) {
            return Err(AppError::Unauthorized);
        }

        tracing::info!(
            booking_id = %booking.id,
            actor_id = %actor.id,
            reason = reason.as_deref().unwrap_or(""),
            "Unilateral reschedule requested"
        );
        if !booking.status.occupies_slot() {
            return Err(AppError::InvalidState(format!(
                "Cannot reschedule a booking in state {:?}",
                booking.status
            )));
        }

        self.validate_new_window(&booking, new_start, new_end).await?;
        self.commit_swap(booking, new_start, new_end).await
    }

    /// Swaps the booking onto the new window under the teacher lock, then
    /// updates the meeting. A failed meeting update does not undo the
    /// committed swap; it is logged for manual follow-up.
    async fn commit_swap(
        &self,
        booking: Booking,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut updated = booking;

        let lock = self.teacher_locks.for_teacher(updated.teacher_id);
        {
            let _guard = lock.lock().await;

            let mut tx = self.pool.begin().await?;
            let overlapping = self
                .booking_repo
                .count_overlapping_tx(
                    &mut tx,
                    updated.teacher_id,
                    new_start,
                    new_end,
                    Some(updated.id),
                )
                .await?;
            if overlapping > 0 {
                return Err(AppError::Conflict(
                    "The teacher already has a booking in the proposed window".to_string(),
                ));
            }

            updated.start_time = new_start;
            updated.end_time = new_end;
            updated.duration_hours = money::duration_hours(new_start, new_end);
            updated.reschedule = RescheduleState::None;
            updated.previous_reschedule = RescheduleOutcome::Confirmed;

            self.booking_repo.update_tx(&mut tx, &updated).await?;
            tx.commit().await?;
        }

        if let Some(handle) = updated.meeting.clone() {
            let gig = self
                .gig_repo
                .find_by_id(updated.gig_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Gig not found".to_string()))?;

            if let Err(e) = self
                .meetings
                .update(&handle, &meeting_context(&updated, &gig))
                .await
            {
                // The slot swap stands; the meeting is fixed administratively.
                tracing::warn!(
                    booking_id = %updated.id,
                    meeting_id = %handle.id,
                    error = %e,
                    "Meeting update failed after reschedule"
                );
            }
        }

        tracing::info!(booking_id = %updated.id, "Reschedule applied");
        self.load(updated.id).await
    }

    /// The new window passes the same checks as create, with the booking
    /// itself excluded from the overlap query.
    async fn validate_new_window(
        &self,
        booking: &Booking,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Result<()> {
        if new_start >= new_end {
            return Err(AppError::InvalidTime(
                "start_time must be before end_time".to_string(),
            ));
        }
        if new_start < self.clock.now() {
            return Err(AppError::InvalidTime(
                "start_time must be in the future".to_string(),
            ));
        }

        if !self
            .availability
            .covers(booking.teacher_id, new_start, new_end)
            .await?
        {
            return Err(AppError::NoAvailability(
                "The proposed window is outside the teacher's availability".to_string(),
            ));
        }

        let mut conn = self.pool.acquire().await?;
        let overlapping = self
            .booking_repo
            .count_overlapping_tx(
                &mut conn,
                booking.teacher_id,
                new_start,
                new_end,
                Some(booking.id),
            )
            .await?;
        if overlapping > 0 {
            return Err(AppError::Conflict(
                "The teacher already has a booking in the proposed window".to_string(),
            ));
        }

        Ok(())
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking> {
        self.booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }
}
