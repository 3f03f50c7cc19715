mod common;

use linguahub::{
    domain::{
        BookingStatus, CreateBookingRequest, RescheduleOutcome, RescheduleState, UserRole,
    },
    error::AppError,
    repository::GigRepository,
    service::RescheduleAction,
};

use common::{at, harness, TestHarness};

async fn confirmed_booking(h: &TestHarness) -> anyhow::Result<(
    linguahub::domain::User,
    linguahub::domain::User,
    linguahub::domain::Booking,
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
    let booking = h
        .services
        .booking_service
        .confirm(booking.id, h.actor(&teacher))
        .await?;

    Ok((teacher, student, booking))
}

#[tokio::test]
async fn declined_proposal_leaves_times_unchanged() -> anyhow::Result<()> {
    let h = harness().await?;
    let (teacher, student, booking) = confirmed_booking(&h).await?;

    let proposed = h
        .services
        .reschedule_service
        .request(
            booking.id,
            h.actor(&student),
            at(11, 0),
            at(12, 0),
            Some("Dentist appointment".to_string()),
        )
        .await?;
    assert!(proposed.reschedule.is_pending());
    match &proposed.reschedule {
        RescheduleState::Pending { requested_by, .. } => {
            assert_eq!(*requested_by, UserRole::Student);
        }
        RescheduleState::None => panic!("expected a pending proposal"),
    }

    let declined = h
        .services
        .reschedule_service
        .respond(booking.id, h.actor(&teacher), RescheduleAction::Declined)
        .await?;

    assert_eq!(declined.start_time, at(10, 0));
    assert_eq!(declined.end_time, at(11, 0));
    assert_eq!(declined.reschedule, RescheduleState::None);
    assert_eq!(declined.previous_reschedule, RescheduleOutcome::Declined);
    assert_eq!(h.meetings.update_count(), 0);

    Ok(())
}

#[tokio::test]
async fn confirmed_proposal_swaps_times_and_updates_meeting_once() -> anyhow::Result<()> {
    let h = harness().await?;
    let (teacher, student, booking) = confirmed_booking(&h).await?;

    h.services
        .reschedule_service
        .request(booking.id, h.actor(&student), at(11, 0), at(12, 0), None)
        .await?;

    let updated = h
        .services
        .reschedule_service
        .respond(booking.id, h.actor(&teacher), RescheduleAction::Confirmed)
        .await?;

    assert_eq!(updated.start_time, at(11, 0));
    assert_eq!(updated.end_time, at(12, 0));
    assert_eq!(updated.reschedule, RescheduleState::None);
    assert_eq!(updated.previous_reschedule, RescheduleOutcome::Confirmed);
    assert_eq!(updated.status, BookingStatus::Confirmed);
    assert_eq!(h.meetings.update_count(), 1);

    Ok(())
}

#[tokio::test]
async fn second_proposal_while_pending_is_rejected() -> anyhow::Result<()> {
    let h = harness().await?;
    let (teacher, student, booking) = confirmed_booking(&h).await?;

    h.services
        .reschedule_service
        .request(booking.id, h.actor(&student), at(11, 0), at(12, 0), None)
        .await?;

    let err = h
        .services
        .reschedule_service
        .request(booking.id, h.actor(&teacher), at(13, 0), at(14, 0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProposalInFlight));

    Ok(())
}

#[tokio::test]
async fn only_the_counterparty_may_respond() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_teacher, student, booking) = confirmed_booking(&h).await?;

    h.services
        .reschedule_service
        .request(booking.id, h.actor(&student), at(11, 0), at(12, 0), None)
        .await?;

    // The proposer cannot answer their own proposal.
    let err = h
        .services
        .reschedule_service
        .respond(booking.id, h.actor(&student), RescheduleAction::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    Ok(())
}

#[tokio::test]
async fn proposal_rejects_windows_that_hit_other_bookings() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_teacher, student, booking) = confirmed_booking(&h).await?;

    // Another student holds 14:00-15:00 with the same teacher.
    let other = h.create_student().await?;
    let gig = h
        .services
        .gig_repo
        .find_by_id(booking.gig_id)
        .await?
        .expect("gig exists");
    h.services
        .booking_service
        .create(
            h.actor(&other),
            CreateBookingRequest {
                gig_id: gig.id,
                start_time: at(14, 0),
                end_time: at(15, 0),
                notes: None,
            },
        )
        .await?;

    let err = h
        .services
        .reschedule_service
        .request(booking.id, h.actor(&student), at(14, 30), at(15, 30), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Rescheduling onto its own current window is not a conflict: the
    // booking is excluded from the overlap check.
    h.services
        .reschedule_service
        .request(booking.id, h.actor(&student), at(10, 0), at(11, 0), None)
        .await?;

    Ok(())
}

#[tokio::test]
async fn unilateral_apply_swaps_without_counterparty() -> anyhow::Result<()> {
    let h = harness().await?;
    let (_teacher, student, booking) = confirmed_booking(&h).await?;
    let admin = h.create_admin().await?;

    let updated = h
        .services
        .reschedule_service
        .apply(
            booking.id,
            h.actor(&admin),
            at(15, 0),
            at(16, 0),
            Some("Schedule conflict resolved by support".to_string()),
        )
        .await?;

    assert_eq!(updated.start_time, at(15, 0));
    assert_eq!(updated.end_time, at(16, 0));
    assert_eq!(updated.previous_reschedule, RescheduleOutcome::Confirmed);

    // A pending proposal from before is superseded and cleared.
    h.services
        .reschedule_service
        .request(booking.id, h.actor(&student), at(12, 0), at(13, 0), None)
        .await?;
    let applied = h
        .services
        .reschedule_service
        .apply(booking.id, h.actor(&student), at(13, 0), at(14, 0), None)
        .await?;
    assert_eq!(applied.reschedule, RescheduleState::None);
    assert_eq!(applied.start_time, at(13, 0));

    Ok(())
}

#[tokio::test]
async fn meeting_update_failure_does_not_roll_back_the_swap() -> anyhow::Result<()> {
    let h = harness().await?;
    let (teacher, student, booking) = confirmed_booking(&h).await?;

    h.services
        .reschedule_service
        .request(booking.id, h.actor(&student), at(11, 0), at(12, 0), None)
        .await?;

    h.meetings.fail_next();
    let updated = h
        .services
        .reschedule_service
        .respond(booking.id, h.actor(&teacher), RescheduleAction::Confirmed)
        .await?;

    // The swap committed even though the provider update failed.
    assert_eq!(updated.start_time, at(11, 0));
    assert_eq!(updated.previous_reschedule, RescheduleOutcome::Confirmed);

    Ok(())
}
