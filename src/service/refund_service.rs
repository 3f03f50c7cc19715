use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    clock::Clock,
    domain::{Actor, Booking, BookingStatus, Payment, PaymentStatus, RefundRequest, RefundStatus},
    error::{AppError, Result},
    payments::PaymentGateway,
    repository::{BookingRepository, PaymentRepository, RefundRepository},
    service::locks::PaymentLocks,
};

/// The refund workflow. Refunds for sessions that never completed are
/// issued automatically; refunds against a completed session wait for an
/// admin decision.
pub struct RefundService {
    pool: SqlitePool,
    payment_repo: Arc<dyn PaymentRepository>,
    refund_repo: Arc<dyn RefundRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    gateway: Arc<dyn PaymentGateway>,
    payment_locks: Arc<PaymentLocks>,
    clock: Arc<dyn Clock>,
}

impl RefundService {
    pub fn new(
        pool: SqlitePool,
        payment_repo: Arc<dyn PaymentRepository>,
        refund_repo: Arc<dyn RefundRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        gateway: Arc<dyn PaymentGateway>,
        payment_locks: Arc<PaymentLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            payment_repo,
            refund_repo,
            booking_repo,
            gateway,
            payment_locks,
            clock,
        }
    }

    pub async fn get(&self, refund_id: Uuid, actor: Actor) -> Result<RefundRequest> {
        let request = self
            .refund_repo
            .find_by_id(refund_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Refund request not found".to_string()))?;
        if request.student_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(request)
    }

    pub async fn list_pending(&self) -> Result<Vec<RefundRequest>> {
        self.refund_repo.list_pending().await
    }

    /// Student-initiated refund. Branches on the booking state at request
    /// time: anything short of Completed refunds automatically, a
    /// completed session goes to admin review.
    pub async fn request_refund(
        &self,
        actor: Actor,
        payment_id: Uuid,
        requested_amount_cents: i64,
        reason: String,
    ) -> Result<RefundRequest> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.student_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }
        if payment.status != PaymentStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Payment in state {:?} cannot be refunded",
                payment.status
            )));
        }
        if requested_amount_cents <= 0 || requested_amount_cents > payment.amount_cents {
            return Err(AppError::Validation(format!(
                "Refund amount must be between 1 and {} cents",
                payment.amount_cents
            )));
        }

        let booking = self
            .booking_repo
            .find_by_id(payment.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let automatic = booking.status != BookingStatus::Completed;
        let initial_status = if automatic {
            RefundStatus::Approved
        } else {
            RefundStatus::Pending
        };

        let request = self
            .open_request(&payment, actor, requested_amount_cents, reason, initial_status)
            .await?;

        if automatic {
            self.execute_refund(request, payment).await
        } else {
            // Admin-review path: mark the payment so a second request
            // cannot race in while the decision is pending.
            let mut held = payment;
            held.status = PaymentStatus::RefundRequested;
            self.payment_repo.update(&held).await?;
            Ok(request)
        }
    }

    /// Admin decision on a pending (or previously rejected, for manual
    /// retries) refund request.
    pub async fn review(
        &self,
        refund_id: Uuid,
        actor: Actor,
        approve: bool,
        admin_notes: Option<String>,
    ) -> Result<RefundRequest> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let mut request = self
            .refund_repo
            .find_by_id(refund_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Refund request not found".to_string()))?;

        if !matches!(request.status, RefundStatus::Pending | RefundStatus::Rejected) {
            return Err(AppError::InvalidState(format!(
                "Refund request in state {:?} cannot be reviewed",
                request.status
            )));
        }

        let payment = self
            .payment_repo
            .find_by_id(request.payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        request.reviewed_by = Some(actor.id);
        request.reviewed_at = Some(self.clock.now());
        request.admin_notes = admin_notes;

        if !approve {
            request.status = RefundStatus::Rejected;
            let updated = self.refund_repo.update(&request).await?;

            if payment.status == PaymentStatus::RefundRequested {
                let mut released = payment;
                released.status = PaymentStatus::Completed;
                self.payment_repo.update(&released).await?;
            }
            return Ok(updated);
        }

        request.status = RefundStatus::Approved;
        let request = self.refund_repo.update(&request).await?;
        self.execute_refund(request, payment).await
    }

    /// Automatic refund triggered by cancelling a paid booking. Provider
    /// failures are recorded on the request and do not undo the cancel.
    pub(crate) async fn enqueue_automatic(&self, booking: &Booking, reason: &str) -> Result<()> {
        let payment = match self.payment_repo.find_by_booking(booking.id).await? {
            Some(p) if p.status == PaymentStatus::Completed => p,
            Some(p) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    payment_status = ?p.status,
                    "Paid booking cancelled but payment is not refundable"
                );
                return Ok(());
            }
            None => {
                tracing::warn!(booking_id = %booking.id, "Paid booking has no payment row");
                return Ok(());
            }
        };

        let actor = Actor {
            id: payment.student_id,
            role: crate::domain::UserRole::Student,
        };
        let amount = payment.amount_cents;

        let request = match self
            .open_request(
                &payment,
                actor,
                amount,
                format!("Booking cancelled: {}", reason),
                RefundStatus::Approved,
            )
            .await
        {
            Ok(request) => request,
            Err(AppError::OpenRefundExists) => {
                tracing::info!(payment_id = %payment.id, "Refund already open, skipping");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.execute_refund(request, payment).await?;
        Ok(())
    }

    /// Creates the refund request row under the payment lock so the
    /// one-open-refund invariant holds under concurrency.
    async fn open_request(
        &self,
        payment: &Payment,
        actor: Actor,
        requested_amount_cents: i64,
        reason: String,
        status: RefundStatus,
    ) -> Result<RefundRequest> {
        let lock = self.payment_locks.for_payment(payment.id);
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;

        if self
            .refund_repo
            .find_open_by_payment_tx(&mut tx, payment.id)
            .await?
            .is_some()
        {
            return Err(AppError::OpenRefundExists);
        }

        let now = self.clock.now();
        let request = RefundRequest {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            student_id: payment.student_id,
            reason,
            requested_amount_cents,
            status,
            provider_refund_id: None,
            refunded_amount_cents: None,
            admin_notes: None,
            reviewed_by: if actor.is_admin() { Some(actor.id) } else { None },
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.refund_repo.insert_tx(&mut tx, &request).await?;
        tx.commit().await?;

        Ok(request)
    }

    /// Drives the provider refund for an Approved request. On success the
    /// request, payment and booking move together in one transaction; on
    /// provider failure the request flips to Rejected with the error in
    /// admin_notes and nothing else is touched.
    async fn execute_refund(
        &self,
        mut request: RefundRequest,
        mut payment: Payment,
    ) -> Result<RefundRequest> {
        let charge_id = match payment.provider_charge_id.clone() {
            Some(id) => id,
            None => {
                return Err(AppError::Internal(format!(
                    "Payment {} has no provider charge id",
                    payment.id
                )))
            }
        };

        let mut metadata = HashMap::new();
        metadata.insert("refund_request_id".to_string(), request.id.to_string());
        metadata.insert("booking_id".to_string(), payment.booking_id.to_string());

        let outcome = match self
            .gateway
            .refund(&charge_id, request.requested_amount_cents, metadata)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    refund_request_id = %request.id,
                    error = %e,
                    "Provider refund failed"
                );
                request.status = RefundStatus::Rejected;
                request.admin_notes = Some(e.to_string());
                return self.refund_repo.update(&request).await;
            }
        };

        request.status = RefundStatus::Processed;
        request.provider_refund_id = Some(outcome.refund_id);
        request.refunded_amount_cents = Some(outcome.amount_cents);

        payment.status = PaymentStatus::Refunded;

        let booking = self
            .booking_repo
            .find_by_id(payment.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        let mut booking = booking;
        booking.payment_status = payment.status.booking_payment_status();
        if booking.status != BookingStatus::Cancelled {
            booking.status = BookingStatus::Cancelled;
            if booking.cancellation_reason.is_none() {
                booking.cancellation_reason = Some("Refunded".to_string());
            }
        }

        let mut tx = self.pool.begin().await?;
        self.payment_repo.update_tx(&mut tx, &payment).await?;
        self.booking_repo.update_tx(&mut tx, &booking).await?;
        tx.commit().await?;

        let updated = self.refund_repo.update(&request).await?;

        tracing::info!(
            refund_request_id = %updated.id,
            payment_id = %payment.id,
            "Refund processed"
        );
        Ok(updated)
    }
}
