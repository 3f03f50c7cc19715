use std::sync::Arc;

use crate::{
    clock::Clock,
    domain::SYSTEM_ACTOR,
    error::Result,
    repository::BookingRepository,
    service::booking_service::BookingService,
};

#[derive(Debug, Default, Clone)]
pub struct CompletionSummary {
    pub scanned: usize,
    pub completed: usize,
    pub failed: usize,
}

/// The auto-completion sweep: every Confirmed, paid booking whose end
/// time has passed is driven through the regular complete transition.
/// This is the authoritative path from Confirmed to Completed;
/// user-initiated completion is an optimization.
pub struct CompletionService {
    booking_repo: Arc<dyn BookingRepository>,
    bookings: Arc<BookingService>,
    clock: Arc<dyn Clock>,
}

impl CompletionService {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        bookings: Arc<BookingService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            booking_repo,
            bookings,
            clock,
        }
    }

    /// One sweep. Idempotent and safe to run concurrently with itself:
    /// a booking completed by a racing sweep turns into a no-op here.
    /// Per-row failures are logged and do not stop the rest.
    pub async fn run(&self, dry_run: bool) -> Result<CompletionSummary> {
        let now = self.clock.now();
        let eligible = self.booking_repo.list_completable(now).await?;

        let mut summary = CompletionSummary {
            scanned: eligible.len(),
            ..Default::default()
        };

        for booking in eligible {
            if dry_run {
                tracing::info!(
                    booking_id = %booking.id,
                    end_time = %booking.end_time,
                    "Would complete booking (dry run)"
                );
                continue;
            }

            match self.bookings.complete(booking.id, SYSTEM_ACTOR).await {
                Ok(_) => summary.completed += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        booking_id = %booking.id,
                        error = %e,
                        "Auto-completion failed for booking"
                    );
                }
            }
        }

        tracing::info!(
            scanned = summary.scanned,
            completed = summary.completed,
            failed = summary.failed,
            "Auto-completion sweep finished"
        );
        Ok(summary)
    }
}
