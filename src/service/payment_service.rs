use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    clock::Clock,
    domain::{
        money, Actor, Booking, BookingPaymentStatus, BookingStatus, CreateBookingRequest,
        Payment, PaymentStatus, SavedPaymentMethod, User, UserRole,
    },
    error::{AppError, Result},
    payments::{ChargeRequest, PaymentGateway},
    repository::{
        BookingRepository, GigRepository, PaymentRepository, SavedPaymentMethodRepository,
        UserRepository,
    },
    service::{booking_service::BookingService, settings_service::SettingsService},
};

/// Orchestrates the payment provider around bookings: customer setup,
/// saved cards, charging an existing booking, and the direct
/// book-and-pay flow.
pub struct PaymentService {
    pool: SqlitePool,
    user_repo: Arc<dyn UserRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    method_repo: Arc<dyn SavedPaymentMethodRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    gig_repo: Arc<dyn GigRepository>,
    gateway: Arc<dyn PaymentGateway>,
    bookings: Arc<BookingService>,
    settings: Arc<SettingsService>,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: SqlitePool,
        user_repo: Arc<dyn UserRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        method_repo: Arc<dyn SavedPaymentMethodRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        gig_repo: Arc<dyn GigRepository>,
        gateway: Arc<dyn PaymentGateway>,
        bookings: Arc<BookingService>,
        settings: Arc<SettingsService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            user_repo,
            payment_repo,
            method_repo,
            booking_repo,
            gig_repo,
            gateway,
            bookings,
            settings,
            clock,
        }
    }

    pub async fn get_payment(&self, payment_id: Uuid, actor: Actor) -> Result<Payment> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        if payment.student_id != actor.id
            && payment.teacher_id != actor.id
            && !actor.is_admin()
        {
            return Err(AppError::Forbidden);
        }
        Ok(payment)
    }

    pub async fn payment_for_booking(&self, booking_id: Uuid, actor: Actor) -> Result<Payment> {
        let payment = self
            .payment_repo
            .find_by_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No payment for this booking".to_string()))?;
        if payment.student_id != actor.id
            && payment.teacher_id != actor.id
            && !actor.is_admin()
        {
            return Err(AppError::Forbidden);
        }
        Ok(payment)
    }

    /// Saves a tokenised card against the student, attaching it to the
    /// provider customer and caching its display attributes.
    pub async fn save_method(
        &self,
        actor: Actor,
        method_token: String,
        make_default: bool,
    ) -> Result<SavedPaymentMethod> {
        if actor.role != UserRole::Student {
            return Err(AppError::Forbidden);
        }

        let user = self.load_user(actor.id).await?;
        let customer_id = self.ensure_customer(&user).await?;
        let card = self
            .gateway
            .attach_payment_method(&customer_id, &method_token)
            .await?;

        let now = self.clock.now();
        let method = SavedPaymentMethod {
            id: Uuid::new_v4(),
            student_id: actor.id,
            provider_method_id: card.method_id,
            brand: card.brand,
            last_four: card.last_four,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
            is_default: make_default,
            created_at: now,
            updated_at: now,
        };

        self.method_repo.create(&method).await
    }

    pub async fn list_methods(&self, actor: Actor) -> Result<Vec<SavedPaymentMethod>> {
        self.method_repo.list_by_student(actor.id).await
    }

    pub async fn set_default_method(
        &self,
        actor: Actor,
        method_id: Uuid,
    ) -> Result<SavedPaymentMethod> {
        self.method_repo.set_default(actor.id, method_id).await
    }

    /// Charges an existing unpaid booking. The payment snapshot is taken
    /// here: later gig price changes never move the amount. On success
    /// the booking is marked paid and, if it was still pending, confirmed
    /// with a meeting.
    pub async fn pay_booking(
        &self,
        actor: Actor,
        booking_id: Uuid,
        provider_method_id: String,
    ) -> Result<(Booking, Payment)> {
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if booking.student_id != actor.id {
            return Err(AppError::Unauthorized);
        }
        if !booking.status.occupies_slot() {
            return Err(AppError::InvalidState(format!(
                "Cannot pay for a booking in state {:?}",
                booking.status
            )));
        }
        if !matches!(
            booking.payment_status,
            BookingPaymentStatus::Unpaid | BookingPaymentStatus::Failed
        ) {
            return Err(AppError::InvalidState(format!(
                "Booking payment is already {:?}",
                booking.payment_status
            )));
        }

        let payment = self.charge_booking(&booking, provider_method_id).await?;
        let booking = self.bookings.load(booking_id).await?;
        Ok((booking, payment))
    }

    /// The direct flow: reserve the slot, charge, confirm. A failed
    /// charge cancels the reservation so the slot frees up immediately.
    pub async fn book_and_pay(
        &self,
        actor: Actor,
        request: CreateBookingRequest,
        provider_method_id: String,
    ) -> Result<(Booking, Payment)> {
        let booking = self.bookings.create(actor, request).await?;

        match self.charge_booking(&booking, provider_method_id).await {
            Ok(payment) => {
                let booking = self.bookings.load(booking.id).await?;
                Ok((booking, payment))
            }
            Err(e) => {
                if let Err(cancel_err) = self
                    .bookings
                    .cancel(booking.id, actor, "Payment failed".to_string())
                    .await
                {
                    tracing::error!(
                        booking_id = %booking.id,
                        error = %cancel_err,
                        "Failed to release reservation after declined charge"
                    );
                }
                Err(e)
            }
        }
    }

    /// Shared charge path: snapshot pricing, write the Processing payment
    /// row, call the provider, then commit the payment/booking outcome in
    /// one transaction.
    async fn charge_booking(
        &self,
        booking: &Booking,
        provider_method_id: String,
    ) -> Result<Payment> {
        let gig = self
            .gig_repo
            .find_by_id(booking.gig_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Gig not found".to_string()))?;

        let student = self.load_user(booking.student_id).await?;
        let customer_id = self.ensure_customer(&student).await?;

        let fee_percent = self.settings.platform_fee_percent().await?;
        let quote = money::quote(
            gig.hourly_rate_cents,
            booking.start_time,
            booking.end_time,
            fee_percent,
        );

        // Reuse the 1:1 payment row on retry after a failed charge.
        let now = self.clock.now();
        let mut payment = match self.payment_repo.find_by_booking(booking.id).await? {
            Some(existing) if existing.status == PaymentStatus::Failed => existing,
            Some(existing) => {
                return Err(AppError::InvalidState(format!(
                    "Payment for this booking is already {:?}",
                    existing.status
                )))
            }
            None => {
                let payment = Payment {
                    id: Uuid::new_v4(),
                    booking_id: booking.id,
                    student_id: booking.student_id,
                    teacher_id: booking.teacher_id,
                    gig_id: booking.gig_id,
                    provider_charge_id: None,
                    provider_customer_id: Some(customer_id.clone()),
                    amount_cents: quote.total_cents,
                    hourly_rate_cents: quote.hourly_rate_cents,
                    duration_hours: quote.duration_hours,
                    platform_fee_cents: quote.platform_fee_cents,
                    status: PaymentStatus::Processing,
                    paid_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.payment_repo.create(&payment).await?
            }
        };

        payment.status = PaymentStatus::Processing;
        payment.provider_customer_id = Some(customer_id.clone());
        let mut payment = self.payment_repo.update(&payment).await?;

        let mut metadata = HashMap::new();
        metadata.insert("booking_id".to_string(), booking.id.to_string());
        metadata.insert("payment_id".to_string(), payment.id.to_string());
        metadata.insert("gig_id".to_string(), booking.gig_id.to_string());

        let outcome = self
            .gateway
            .charge(ChargeRequest {
                customer_id,
                method_id: provider_method_id,
                amount_cents: payment.amount_cents,
                description: format!("{} ({:.2}h)", gig.title, payment.duration_hours),
                metadata,
            })
            .await;

        match outcome {
            Ok(charge) => {
                payment.status = PaymentStatus::Completed;
                payment.provider_charge_id = Some(charge.charge_id);
                payment.paid_at = Some(self.clock.now());

                // Payment and booking flip together so readers never see a
                // settled charge on an unpaid booking.
                let mut paid_booking = self
                    .booking_repo
                    .find_by_id(booking.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
                paid_booking.payment_status = BookingPaymentStatus::Paid;

                let mut tx = self.pool.begin().await?;
                self.payment_repo.update_tx(&mut tx, &payment).await?;
                self.booking_repo.update_tx(&mut tx, &paid_booking).await?;
                tx.commit().await?;

                if paid_booking.status == BookingStatus::Pending {
                    self.bookings.confirm_transition(paid_booking).await?;
                }

                tracing::info!(
                    payment_id = %payment.id,
                    booking_id = %booking.id,
                    amount_cents = payment.amount_cents,
                    "Charge completed"
                );
                self.payment_repo
                    .find_by_id(payment.id)
                    .await?
                    .ok_or_else(|| AppError::Database("Payment disappeared".to_string()))
            }
            Err(e) => {
                payment.status = PaymentStatus::Failed;

                let mut failed_booking = self
                    .booking_repo
                    .find_by_id(booking.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
                failed_booking.payment_status = BookingPaymentStatus::Failed;

                let mut tx = self.pool.begin().await?;
                self.payment_repo.update_tx(&mut tx, &payment).await?;
                self.booking_repo.update_tx(&mut tx, &failed_booking).await?;
                tx.commit().await?;

                tracing::warn!(
                    payment_id = %payment.id,
                    booking_id = %booking.id,
                    error = %e,
                    "Charge failed"
                );
                Err(e)
            }
        }
    }

    async fn ensure_customer(&self, user: &User) -> Result<String> {
        if let Some(existing) = &user.provider_customer_id {
            return Ok(existing.clone());
        }

        let customer_id = self.gateway.get_or_create_customer(user).await?;
        self.user_repo
            .set_provider_customer_id(user.id, &customer_id)
            .await?;
        Ok(customer_id)
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
