use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    clock::Clock,
    domain::{BookingStatus, Payment, PaymentStatus},
    error::{AppError, Result},
    meetings::MeetingGateway,
    payments::{PaymentEvent, PaymentGateway},
    repository::{BookingRepository, PaymentRepository},
    service::booking_service::BookingService,
};

/// Provider-initiated events re-entering the lifecycle. Signatures are
/// verified by the gateways before anything is touched; every handler
/// checks the target state first so replays are harmless.
pub struct WebhookService {
    payment_gateway: Arc<dyn PaymentGateway>,
    meeting_gateway: Arc<dyn MeetingGateway>,
    payment_repo: Arc<dyn PaymentRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    bookings: Arc<BookingService>,
    clock: Arc<dyn Clock>,
}

#[derive(Deserialize)]
struct MeetingEventEnvelope {
    event: String,
    payload: MeetingEventPayload,
}

#[derive(Deserialize)]
struct MeetingEventPayload {
    object: MeetingEventObject,
}

#[derive(Deserialize)]
struct MeetingEventObject {
    id: serde_json::Value,
}

impl WebhookService {
    pub fn new(
        payment_gateway: Arc<dyn PaymentGateway>,
        meeting_gateway: Arc<dyn MeetingGateway>,
        payment_repo: Arc<dyn PaymentRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        bookings: Arc<BookingService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            payment_gateway,
            meeting_gateway,
            payment_repo,
            booking_repo,
            bookings,
            clock,
        }
    }

    pub async fn handle_payment_event(&self, payload: &str, signature: &str) -> Result<()> {
        let event = self.payment_gateway.verify_webhook(payload, signature)?;

        match event {
            PaymentEvent::ChargeSucceeded {
                charge_id,
                metadata,
            } => self.on_charge_succeeded(&charge_id, &metadata).await,
            PaymentEvent::ChargeFailed {
                charge_id,
                metadata,
            } => self.on_charge_failed(&charge_id, &metadata).await,
            PaymentEvent::Ignored => Ok(()),
        }
    }

    pub async fn handle_meeting_event(
        &self,
        payload: &str,
        timestamp: &str,
        signature: &str,
    ) -> Result<()> {
        self.meeting_gateway
            .verify_webhook(payload, timestamp, signature)?;

        let envelope: MeetingEventEnvelope = serde_json::from_str(payload)
            .map_err(|e| AppError::BadRequest(format!("Malformed meeting event: {}", e)))?;

        let meeting_id = match &envelope.payload.object.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(AppError::BadRequest(format!(
                    "Unexpected meeting id: {}",
                    other
                )))
            }
        };

        match envelope.event.as_str() {
            "meeting.ended" => self.on_meeting_ended(&meeting_id).await,
            "meeting.started" => self.on_meeting_started(&meeting_id).await,
            other => {
                tracing::debug!(event = other, "Ignoring meeting event");
                Ok(())
            }
        }
    }

    /// Reconciles a settled charge. Also the recovery path for payments
    /// stranded in Processing because the original charge response was
    /// lost: those are located via the charge metadata.
    async fn on_charge_succeeded(
        &self,
        charge_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        let payment = match self.locate_payment(charge_id, metadata).await? {
            Some(payment) => payment,
            None => {
                tracing::warn!(charge_id, "charge.succeeded for unknown payment");
                return Ok(());
            }
        };

        if payment.status == PaymentStatus::Completed {
            // Replay; paid_at stays at the first application.
            return Ok(());
        }

        let mut settled = payment;
        settled.status = PaymentStatus::Completed;
        settled.paid_at = Some(self.clock.now());
        if settled.provider_charge_id.is_none() {
            settled.provider_charge_id = Some(charge_id.to_string());
        }
        let settled = self.payment_repo.update(&settled).await?;

        self.bookings.mark_paid(settled.booking_id).await?;

        tracing::info!(
            payment_id = %settled.id,
            charge_id,
            "Payment settled via webhook"
        );
        Ok(())
    }

    async fn on_charge_failed(
        &self,
        charge_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        let payment = match self.locate_payment(charge_id, metadata).await? {
            Some(payment) => payment,
            None => {
                tracing::warn!(charge_id, "charge.failed for unknown payment");
                return Ok(());
            }
        };

        // A charge that already settled or failed is left alone.
        if !matches!(
            payment.status,
            PaymentStatus::Pending | PaymentStatus::Processing
        ) {
            return Ok(());
        }

        let mut failed = payment;
        failed.status = PaymentStatus::Failed;
        let failed = self.payment_repo.update(&failed).await?;

        self.bookings.mark_payment_failed(failed.booking_id).await?;

        tracing::info!(payment_id = %failed.id, charge_id, "Payment failed via webhook");
        Ok(())
    }

    async fn on_meeting_ended(&self, meeting_id: &str) -> Result<()> {
        let booking = match self.booking_repo.find_by_meeting_id(meeting_id).await? {
            Some(booking) => booking,
            None => {
                tracing::warn!(meeting_id, "meeting.ended for unknown booking");
                return Ok(());
            }
        };

        if !booking.status.occupies_slot() {
            return Ok(());
        }

        let booking = if booking.status == BookingStatus::Pending {
            self.bookings.confirm_transition(booking).await?
        } else {
            booking
        };

        // The provider signals the actual end, so the wall-clock check is
        // bypassed. An unpaid session cannot complete; leave it for the
        // payment reconciliation to catch up.
        match self.bookings.complete_from_event(booking).await {
            Ok(_) => Ok(()),
            Err(AppError::InvalidState(msg)) => {
                tracing::warn!(meeting_id, "meeting.ended not applied: {}", msg);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn on_meeting_started(&self, meeting_id: &str) -> Result<()> {
        let booking = match self.booking_repo.find_by_meeting_id(meeting_id).await? {
            Some(booking) => booking,
            None => {
                tracing::warn!(meeting_id, "meeting.started for unknown booking");
                return Ok(());
            }
        };

        if booking.status == BookingStatus::Pending {
            self.bookings.confirm_transition(booking).await?;
        }
        Ok(())
    }

    async fn locate_payment(
        &self,
        charge_id: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<Option<Payment>> {
        if let Some(payment) = self.payment_repo.find_by_charge_id(charge_id).await? {
            return Ok(Some(payment));
        }

        if let Some(payment_id) = metadata.get("payment_id") {
            let id = Uuid::parse_str(payment_id)
                .map_err(|e| AppError::BadRequest(format!("Bad payment_id metadata: {}", e)))?;
            return self.payment_repo.find_by_id(id).await;
        }

        Ok(None)
    }
}
