pub mod availability_service;
pub mod booking_service;
pub mod completion_service;
pub mod locks;
pub mod payment_service;
pub mod refund_service;
pub mod reschedule;
pub mod settings_service;
pub mod webhook_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::clock::Clock;
use crate::meetings::MeetingGateway;
use crate::payments::PaymentGateway;
use crate::repository::*;

use availability_service::AvailabilityService;
use booking_service::BookingService;
use completion_service::CompletionService;
use locks::{PaymentLocks, TeacherLocks};
use payment_service::PaymentService;
use refund_service::RefundService;
use reschedule::RescheduleService;
use settings_service::SettingsService;
use webhook_service::WebhookService;

pub use completion_service::CompletionSummary;
pub use reschedule::RescheduleAction;

/// One shared bundle of repositories and lifecycle services, wired once
/// at startup and handed to the API layer and the workers.
pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub gig_repo: Arc<dyn GigRepository>,
    pub availability_repo: Arc<dyn AvailabilityRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub method_repo: Arc<dyn SavedPaymentMethodRepository>,
    pub refund_repo: Arc<dyn RefundRepository>,
    pub availability_service: Arc<AvailabilityService>,
    pub booking_service: Arc<BookingService>,
    pub reschedule_service: Arc<RescheduleService>,
    pub payment_service: Arc<PaymentService>,
    pub refund_service: Arc<RefundService>,
    pub completion_service: Arc<CompletionService>,
    pub webhook_service: Arc<WebhookService>,
    pub settings_service: Arc<SettingsService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        meeting_gateway: Arc<dyn MeetingGateway>,
        payment_gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let gig_repo: Arc<dyn GigRepository> = Arc::new(SqliteGigRepository::new(db_pool.clone()));
        let availability_repo: Arc<dyn AvailabilityRepository> =
            Arc::new(SqliteAvailabilityRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let method_repo: Arc<dyn SavedPaymentMethodRepository> =
            Arc::new(SqliteSavedPaymentMethodRepository::new(db_pool.clone()));
        let refund_repo: Arc<dyn RefundRepository> =
            Arc::new(SqliteRefundRepository::new(db_pool.clone()));

        let teacher_locks = Arc::new(TeacherLocks::new());
        let payment_locks = Arc::new(PaymentLocks::new());

        let settings_service = Arc::new(SettingsService::new(db_pool.clone()));

        let availability_service = Arc::new(AvailabilityService::new(
            availability_repo.clone(),
            booking_repo.clone(),
        ));

        let refund_service = Arc::new(RefundService::new(
            db_pool.clone(),
            payment_repo.clone(),
            refund_repo.clone(),
            booking_repo.clone(),
            payment_gateway.clone(),
            payment_locks,
            clock.clone(),
        ));

        let booking_service = Arc::new(BookingService::new(
            db_pool.clone(),
            booking_repo.clone(),
            gig_repo.clone(),
            availability_service.clone(),
            meeting_gateway.clone(),
            teacher_locks.clone(),
            refund_service.clone(),
            clock.clone(),
        ));

        let reschedule_service = Arc::new(RescheduleService::new(
            db_pool.clone(),
            booking_repo.clone(),
            gig_repo.clone(),
            availability_service.clone(),
            meeting_gateway.clone(),
            teacher_locks,
            clock.clone(),
        ));

        let payment_service = Arc::new(PaymentService::new(
            db_pool.clone(),
            user_repo.clone(),
            payment_repo.clone(),
            method_repo.clone(),
            booking_repo.clone(),
            gig_repo.clone(),
            payment_gateway.clone(),
            booking_service.clone(),
            settings_service.clone(),
            clock.clone(),
        ));

        let completion_service = Arc::new(CompletionService::new(
            booking_repo.clone(),
            booking_service.clone(),
            clock.clone(),
        ));

        let webhook_service = Arc::new(WebhookService::new(
            payment_gateway,
            meeting_gateway,
            payment_repo.clone(),
            booking_repo.clone(),
            booking_service.clone(),
            clock,
        ));

        Self {
            user_repo,
            gig_repo,
            availability_repo,
            booking_repo,
            payment_repo,
            method_repo,
            refund_repo,
            availability_service,
            booking_service,
            reschedule_service,
            payment_service,
            refund_service,
            completion_service,
            webhook_service,
            settings_service,
            db_pool,
        }
    }
}
