mod common;

use chrono::Duration;

use linguahub::{
    domain::{
        BookingPaymentStatus, BookingStatus, CreateBookingRequest, PaymentStatus, RefundStatus,
    },
    error::AppError,
};

use common::{at, harness, TestHarness};

/// Books, confirms and pays Monday 10:00-11:00; returns (student, payment).
async fn paid_booking(
    h: &TestHarness,
) -> anyhow::Result<(
    linguahub::domain::User,
    linguahub::domain::User,
    linguahub::domain::Booking,
    linguahub::domain::Payment,
)> {
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
    let (booking, payment) = h
        .services
        .payment_service
        .pay_booking(h.actor(&student), booking.id, "pm_card_visa".to_string())
        .await?;

    Ok((teacher, student, booking, payment))
}

#[tokio::test]
async fn refund_before_session_start_is_automatic() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_teacher, student, booking, payment) = paid_booking(&h).await?;

    let refund = h
        .services
        .refund_service
        .request_refund(
            h.actor(&student),
            payment.id,
            5250,
            "Plans changed".to_string(),
        )
        .await?;

    assert_eq!(refund.status, RefundStatus::Processed);
    assert_eq!(refund.refunded_amount_cents, Some(5250));
    assert!(refund.provider_refund_id.is_some());
    assert_eq!(h.payments.refunds().len(), 1);

    let payment = h
        .services
        .payment_service
        .get_payment(payment.id, h.actor(&student))
        .await?;
    assert_eq!(payment.status, PaymentStatus::Refunded);

    let booking = h
        .services
        .booking_service
        .get(booking.id, h.actor(&student))
        .await?;
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Refunded);

    // A second request finds the processed one already open.
    let err = h
        .services
        .refund_service
        .request_refund(h.actor(&student), payment.id, 100, "again".to_string())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::OpenRefundExists | AppError::InvalidState(_)
    ));

    Ok(())
}

#[tokio::test]
async fn refund_after_completion_waits_for_admin() -> anyhow::Result<()> {
    let h = harness().await?;
    let (teacher, student, booking, payment) = paid_booking(&h).await?;

    h.advance(Duration::hours(4));
    h.services
        .booking_service
        .complete(booking.id, h.actor(&teacher))
        .await?;

    let refund = h
        .services
        .refund_service
        .request_refund(
            h.actor(&student),
            payment.id,
            5250,
            "Teacher never showed".to_string(),
        )
        .await?;

    // No provider call yet.
    assert_eq!(refund.status, RefundStatus::Pending);
    assert!(h.payments.refunds().is_empty());

    let payment_held = h
        .services
        .payment_service
        .get_payment(payment.id, h.actor(&student))
        .await?;
    assert_eq!(payment_held.status, PaymentStatus::RefundRequested);

    Ok(())
}

#[tokio::test]
async fn admin_rejection_leaves_payment_and_booking_untouched() -> anyhow::Result<()> {
    let h = harness().await?;
    let (teacher, student, booking, payment) = paid_booking(&h).await?;
    let admin = h.create_admin().await?;

    h.advance(Duration::hours(4));
    h.services
        .booking_service
        .complete(booking.id, h.actor(&teacher))
        .await?;

    let refund = h
        .services
        .refund_service
        .request_refund(h.actor(&student), payment.id, 5250, "Unhappy".to_string())
        .await?;

    let rejected = h
        .services
        .refund_service
        .review(
            refund.id,
            h.actor(&admin),
            false,
            Some("Session took place as scheduled".to_string()),
        )
        .await?;

    assert_eq!(rejected.status, RefundStatus::Rejected);
    assert_eq!(rejected.reviewed_by, Some(admin.id));
    assert!(rejected.reviewed_at.is_some());

    let payment = h
        .services
        .payment_service
        .get_payment(payment.id, h.actor(&student))
        .await?;
    assert_eq!(payment.status, PaymentStatus::Completed);

    let booking = h
        .services
        .booking_service
        .get(booking.id, h.actor(&student))
        .await?;
    assert_eq!(booking.status, BookingStatus::Completed);
    assert!(h.payments.refunds().is_empty());

    Ok(())
}

#[tokio::test]
async fn admin_approval_executes_the_provider_refund() -> anyhow::Result<()> {
    let h = harness().await?;
    let (teacher, student, booking, payment) = paid_booking(&h).await?;
    let admin = h.create_admin().await?;

    h.advance(Duration::hours(4));
    h.services
        .booking_service
        .complete(booking.id, h.actor(&teacher))
        .await?;

    let refund = h
        .services
        .refund_service
        .request_refund(h.actor(&student), payment.id, 5250, "Unhappy".to_string())
        .await?;

    let processed = h
        .services
        .refund_service
        .review(refund.id, h.actor(&admin), true, None)
        .await?;

    assert_eq!(processed.status, RefundStatus::Processed);
    assert_eq!(h.payments.refunds().len(), 1);

    let payment = h
        .services
        .payment_service
        .get_payment(payment.id, h.actor(&student))
        .await?;
    assert_eq!(payment.status, PaymentStatus::Refunded);

    Ok(())
}

#[tokio::test]
async fn provider_failure_rejects_the_request_and_mutates_nothing() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_teacher, student, booking, payment) = paid_booking(&h).await?;

    h.payments.fail_next_refund();
    let refund = h
        .services
        .refund_service
        .request_refund(h.actor(&student), payment.id, 5250, "Oops".to_string())
        .await?;

    assert_eq!(refund.status, RefundStatus::Rejected);
    assert!(refund.admin_notes.is_some());

    let payment_after = h
        .services
        .payment_service
        .get_payment(payment.id, h.actor(&student))
        .await?;
    assert_eq!(payment_after.status, PaymentStatus::Completed);

    let booking_after = h
        .services
        .booking_service
        .get(booking.id, h.actor(&student))
        .await?;
    assert_eq!(booking_after.status, BookingStatus::Confirmed);
    assert_eq!(booking_after.payment_status, BookingPaymentStatus::Paid);

    // With the failed request closed, a manual retry can open a new one.
    let retry = h
        .services
        .refund_service
        .request_refund(h.actor(&student), payment.id, 5250, "Retry".to_string())
        .await?;
    assert_eq!(retry.status, RefundStatus::Processed);

    Ok(())
}

#[tokio::test]
async fn refund_amount_is_bounded_by_the_payment() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_teacher, student, _booking, payment) = paid_booking(&h).await?;

    let err = h
        .services
        .refund_service
        .request_refund(h.actor(&student), payment.id, 0, "zero".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = h
        .services
        .refund_service
        .request_refund(h.actor(&student), payment.id, 99999, "too much".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn cancelling_a_paid_booking_refunds_automatically() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_teacher, student, booking, payment) = paid_booking(&h).await?;

    let cancelled = h
        .services
        .booking_service
        .cancel(booking.id, h.actor(&student), "Emergency".to_string())
        .await?;

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, BookingPaymentStatus::Refunded);
    assert_eq!(h.payments.refunds().len(), 1);
    assert_eq!(h.payments.refunds()[0].amount_cents, 5250);

    let payment = h
        .services
        .payment_service
        .get_payment(payment.id, h.actor(&student))
        .await?;
    assert_eq!(payment.status, PaymentStatus::Refunded);

    Ok(())
}

#[tokio::test]
async fn strangers_cannot_request_refunds_for_other_students() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_teacher, _student, _booking, payment) = paid_booking(&h).await?;
    let stranger = h.create_student().await?;

    let err = h
        .services
        .refund_service
        .request_refund(h.actor(&stranger), payment.id, 100, "mine now".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}
