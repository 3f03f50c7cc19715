mod common;

use chrono::Duration;

use linguahub::{
    domain::{BookingPaymentStatus, BookingStatus, CreateBookingRequest, PaymentStatus},
    error::AppError,
    repository::GigRepository,
};

use common::{at, harness};

#[tokio::test]
async fn happy_path_book_confirm_pay_complete() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    // Student books Monday 10:00-11:00.
    let booking = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: Some("First lesson".to_string()),
            },
        )
        .await?;
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Unpaid);
    assert!(booking.meeting.is_none());
    assert_eq!(booking.duration_hours, 1.0);

    // Teacher confirms: exactly one meeting is allocated.
    let confirmed = h
        .services
        .booking_service
        .confirm(booking.id, h.actor(&teacher))
        .await?;
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert!(confirmed.meeting.is_some());
    assert_eq!(h.meetings.created_count(), 1);

    // Student pays: 5000 session cost + 250 platform fee (5%).
    let (paid_booking, payment) = h
        .services
        .payment_service
        .pay_booking(h.actor(&student), booking.id, "pm_card_visa".to_string())
        .await?;
    assert_eq!(payment.amount_cents, 5250);
    assert_eq!(payment.platform_fee_cents, 250);
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.paid_at.is_some());
    assert_eq!(paid_booking.payment_status, BookingPaymentStatus::Paid);

    // After the session ends the sweep finalizes the booking.
    h.advance(Duration::hours(4));
    let summary = h.services.completion_service.run(false).await?;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);

    let finished = h
        .services
        .booking_service
        .get(booking.id, h.actor(&student))
        .await?;
    assert_eq!(finished.status, BookingStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn create_rejects_inactive_gig_bad_times_and_uncovered_windows() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    h.monday_availability(&teacher).await?;

    // A draft gig does not accept bookings.
    let draft = h
        .services
        .gig_repo
        .create(
            teacher.id,
            linguahub::domain::CreateGigRequest {
                title: "Grammar".to_string(),
                category: "grammar".to_string(),
                hourly_rate_cents: 4000,
                duration_minutes: 60,
            },
        )
        .await?;
    let err = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: draft.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let gig = h.create_active_gig(&teacher).await?;

    // Inverted window.
    let err = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(11, 0),
                end_time: at(10, 0),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTime(_)));

    // Start in the past (clock is pinned at 08:00).
    let err = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(7, 0),
                end_time: at(8, 0),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTime(_)));

    // Outside the 09:00-17:00 availability.
    let err = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(18, 0),
                end_time: at(19, 0),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoAvailability(_)));

    Ok(())
}

#[tokio::test]
async fn overlapping_create_conflicts() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    let alice = h.create_student().await?;
    let bob = h.create_student().await?;

    h.services
        .booking_service
        .create(
            h.actor(&alice),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
        )
        .await?;

    // A half-overlapping window is rejected.
    let err = h
        .services
        .booking_service
        .create(
            h.actor(&bob),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 30),
                end_time: at(11, 30),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Back-to-back is fine: intervals are closed-open.
    h.services
        .booking_service
        .create(
            h.actor(&bob),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(11, 0),
                end_time: at(12, 0),
                notes: None,
            },
        )
        .await?;

    Ok(())
}

#[tokio::test]
async fn concurrent_creates_for_same_window_produce_one_booking() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    let alice = h.create_student().await?;
    let bob = h.create_student().await?;

    let request = |student| {
        let services = h.services.clone();
        let gig_id = gig.id;
        async move {
            services
                .booking_service
                .create(
                    student,
                    CreateBookingRequest {
                        gig_id,
                        start_time: at(14, 0),
                        end_time: at(15, 0),
                        notes: None,
                    },
                )
                .await
        }
    };

    let (first, second) = tokio::join!(request(h.actor(&alice)), request(h.actor(&bob)));

    let outcomes = [first, second];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);

    Ok(())
}

#[tokio::test]
async fn confirm_is_idempotent_and_teacher_only() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    let booking = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
        )
        .await?;

    // The student cannot confirm.
    let err = h
        .services
        .booking_service
        .confirm(booking.id, h.actor(&student))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    let first = h
        .services
        .booking_service
        .confirm(booking.id, h.actor(&teacher))
        .await?;
    let second = h
        .services
        .booking_service
        .confirm(booking.id, h.actor(&teacher))
        .await?;

    // Same handle, one provider call.
    assert_eq!(first.meeting, second.meeting);
    assert_eq!(h.meetings.created_count(), 1);

    Ok(())
}

#[tokio::test]
async fn confirm_failure_leaves_booking_pending() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    let booking = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
        )
        .await?;

    h.meetings.fail_next();
    let err = h
        .services
        .booking_service
        .confirm(booking.id, h.actor(&teacher))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::External(_)));

    let unchanged = h
        .services
        .booking_service
        .get(booking.id, h.actor(&teacher))
        .await?;
    assert_eq!(unchanged.status, BookingStatus::Pending);
    assert!(unchanged.meeting.is_none());

    Ok(())
}

#[tokio::test]
async fn cancel_deletes_meeting_and_frees_the_slot() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    let booking = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
        )
        .await?;
    h.services
        .booking_service
        .confirm(booking.id, h.actor(&teacher))
        .await?;

    let cancelled = h
        .services
        .booking_service
        .cancel(booking.id, h.actor(&student), "Can't make it".to_string())
        .await?;
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("Can't make it")
    );
    assert!(cancelled.meeting.is_none());

    // The window is bookable again.
    let other = h.create_student().await?;
    h.services
        .booking_service
        .create(
            h.actor(&other),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
        )
        .await?;

    // A second cancel is an invalid state.
    let err = h
        .services
        .booking_service
        .cancel(booking.id, h.actor(&student), "again".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    Ok(())
}

#[tokio::test]
async fn complete_requires_payment_and_elapsed_end_time() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    let booking = h
        .services
        .booking_service
        .create(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
        )
        .await?;
    h.services
        .booking_service
        .confirm(booking.id, h.actor(&teacher))
        .await?;

    // Unpaid: cannot complete even after the end time.
    h.advance(Duration::hours(4));
    let err = h
        .services
        .booking_service
        .complete(booking.id, h.actor(&teacher))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    h.clock.set(common::base_time());
    h.services
        .payment_service
        .pay_booking(h.actor(&student), booking.id, "pm_card_visa".to_string())
        .await?;

    // Paid but the session has not ended yet.
    let err = h
        .services
        .booking_service
        .complete(booking.id, h.actor(&teacher))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTime(_)));

    h.advance(Duration::hours(4));
    let completed = h
        .services
        .booking_service
        .complete(booking.id, h.actor(&teacher))
        .await?;
    assert_eq!(completed.status, BookingStatus::Completed);

    // Completing again is a no-op success.
    let again = h
        .services
        .booking_service
        .complete(booking.id, h.actor(&student))
        .await?;
    assert_eq!(again.status, BookingStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn direct_book_and_pay_confirms_with_meeting() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    let (booking, payment) = h
        .services
        .payment_service
        .book_and_pay(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
            "pm_card_visa".to_string(),
        )
        .await?;

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);
    assert!(booking.meeting.is_some());
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.amount_cents, 5250);
    assert_eq!(h.meetings.created_count(), 1);

    Ok(())
}

#[tokio::test]
async fn direct_book_and_pay_releases_slot_on_declined_card() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    let gig = h.create_active_gig(&teacher).await?;
    h.monday_availability(&teacher).await?;

    let err = h
        .services
        .payment_service
        .book_and_pay(
            h.actor(&student),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
            "pm_card_chargeDeclined".to_string(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Payment(_)));

    // The failed attempt released the reservation.
    let other = h.create_student().await?;
    h.services
        .booking_service
        .create(
            h.actor(&other),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(10, 0),
                end_time: at(11, 0),
                notes: None,
            },
        )
        .await?;
    assert_eq!(h.meetings.created_count(), 0);

    Ok(())
}
