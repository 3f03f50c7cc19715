mod common;

use uuid::Uuid;

use linguahub::{
    domain::{
        BookingPaymentStatus, BookingStatus, CreateBookingRequest, MeetingHandle, Payment,
        PaymentStatus,
    },
    error::AppError,
    repository::{BookingRepository, PaymentRepository},
};

use common::{at, base_time, harness, TestHarness};

/// A booking whose charge settled at the provider but whose payment row
/// is stranded in Processing (the original charge response was lost).
async fn stranded_payment(
    h: &TestHarness,
) -> anyhow::Result<(linguahub::domain::Booking, Payment)> {
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

    let payment = Payment {
        id: Uuid::new_v4(),
        booking_id: booking.id,
        student_id: booking.student_id,
        teacher_id: booking.teacher_id,
        gig_id: booking.gig_id,
        provider_charge_id: None,
        provider_customer_id: Some("cus_fake_1".to_string()),
        amount_cents: 5250,
        hourly_rate_cents: 5000,
        duration_hours: 1.0,
        platform_fee_cents: 250,
        status: PaymentStatus::Processing,
        paid_at: None,
        created_at: base_time(),
        updated_at: base_time(),
    };
    let payment = h.services.payment_repo.create(&payment).await?;

    Ok((booking, payment))
}

#[tokio::test]
async fn charge_succeeded_reconciles_a_stranded_payment() -> anyhow::Result<()> {
    let h = harness().await?;
    let (booking, payment) = stranded_payment(&h).await?;

    let payload = format!("charge.succeeded:pi_recovered_1:{}", payment.id);
    h.services
        .webhook_service
        .handle_payment_event(&payload, "valid")
        .await?;

    let settled = h
        .services
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment exists");
    assert_eq!(settled.status, PaymentStatus::Completed);
    assert!(settled.paid_at.is_some());
    assert_eq!(
        settled.provider_charge_id.as_deref(),
        Some("pi_recovered_1")
    );

    // The pending booking advanced to Confirmed with a meeting.
    let booking = h
        .services
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("booking exists");
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);
    assert!(booking.meeting.is_some());
    assert_eq!(h.meetings.created_count(), 1);

    Ok(())
}

#[tokio::test]
async fn replayed_charge_succeeded_is_a_noop() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_booking, payment) = stranded_payment(&h).await?;

    let payload = format!("charge.succeeded:pi_recovered_1:{}", payment.id);
    h.services
        .webhook_service
        .handle_payment_event(&payload, "valid")
        .await?;

    let first = h
        .services
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment exists");
    let first_paid_at = first.paid_at.expect("paid_at set");

    // An hour later the provider replays the same event.
    h.advance(chrono::Duration::hours(1));
    h.services
        .webhook_service
        .handle_payment_event(&payload, "valid")
        .await?;

    let second = h
        .services
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment exists");
    assert_eq!(second.paid_at, Some(first_paid_at));
    assert_eq!(h.meetings.created_count(), 1);

    Ok(())
}

#[tokio::test]
async fn charge_failed_marks_payment_and_booking() -> anyhow::Result<()> {
    let h = harness().await?;
    let (booking, payment) = stranded_payment(&h).await?;

    let payload = format!("charge.failed:pi_recovered_1:{}", payment.id);
    h.services
        .webhook_service
        .handle_payment_event(&payload, "valid")
        .await?;

    let failed = h
        .services
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment exists");
    assert_eq!(failed.status, PaymentStatus::Failed);

    let booking = h
        .services
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("booking exists");
    assert_eq!(booking.payment_status, BookingPaymentStatus::Failed);

    Ok(())
}

#[tokio::test]
async fn bad_signature_is_rejected_before_any_state_change() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_booking, payment) = stranded_payment(&h).await?;

    let payload = format!("charge.succeeded:pi_recovered_1:{}", payment.id);
    let err = h
        .services
        .webhook_service
        .handle_payment_event(&payload, "forged")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    let untouched = h
        .services
        .payment_repo
        .find_by_id(payment.id)
        .await?
        .expect("payment exists");
    assert_eq!(untouched.status, PaymentStatus::Processing);

    Ok(())
}

#[tokio::test]
async fn meeting_ended_completes_a_confirmed_paid_booking() -> anyhow::Result<()> {
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
    let booking = h
        .services
        .booking_service
        .confirm(booking.id, h.actor(&teacher))
        .await?;
    h.services
        .payment_service
        .pay_booking(h.actor(&student), booking.id, "pm_card_visa".to_string())
        .await?;

    let meeting_id = booking.meeting.as_ref().expect("meeting allocated").id.clone();
    let payload = format!(
        r#"{{"event":"meeting.ended","payload":{{"object":{{"id":"{}"}}}}}}"#,
        meeting_id
    );

    // The clock still sits before end_time: the provider's signal wins.
    h.services
        .webhook_service
        .handle_meeting_event(&payload, "1234567890", "valid")
        .await?;

    let completed = h
        .services
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("booking exists");
    assert_eq!(completed.status, BookingStatus::Completed);

    // Replay is harmless.
    h.services
        .webhook_service
        .handle_meeting_event(&payload, "1234567890", "valid")
        .await?;

    Ok(())
}

#[tokio::test]
async fn meeting_started_confirms_a_pending_booking() -> anyhow::Result<()> {
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

    // A meeting that exists while the booking is still pending (e.g. the
    // confirm response was lost after the provider call).
    let mut with_meeting = booking.clone();
    with_meeting.meeting = Some(MeetingHandle {
        id: "orphan-meeting-1".to_string(),
        join_url: "https://meet.example.com/j/orphan".to_string(),
        host_url: "https://meet.example.com/s/orphan".to_string(),
        password: None,
    });
    h.services.booking_repo.update(&with_meeting).await?;

    let payload = r#"{"event":"meeting.started","payload":{"object":{"id":"orphan-meeting-1"}}}"#;
    h.services
        .webhook_service
        .handle_meeting_event(payload, "1234567890", "valid")
        .await?;

    let confirmed = h
        .services
        .booking_repo
        .find_by_id(booking.id)
        .await?
        .expect("booking exists");
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    // The existing handle was reused; no new meeting was allocated.
    assert_eq!(h.meetings.created_count(), 0);

    Ok(())
}

#[tokio::test]
async fn unknown_meeting_events_are_ignored() -> anyhow::Result<()> {
    let h = harness().await?;

    let payload = r#"{"event":"meeting.ended","payload":{"object":{"id":"never-seen"}}}"#;
    h.services
        .webhook_service
        .handle_meeting_event(payload, "1234567890", "valid")
        .await?;

    Ok(())
}
