mod common;

use chrono::NaiveTime;
use uuid::Uuid;

use linguahub::{
    domain::{CreateBookingRequest, SlotSpec},
    error::AppError,
};

use common::{at, base_date, harness};

fn t(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn recurring(day: u8, start: NaiveTime, end: NaiveTime) -> SlotSpec {
    SlotSpec {
        day_of_week: Some(day),
        specific_date: None,
        start_time: start,
        end_time: end,
    }
}

#[tokio::test]
async fn upsert_is_idempotent_per_tuple() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;

    let first = h
        .services
        .availability_service
        .upsert_slots(teacher.id, vec![recurring(1, t(9, 0), t(12, 0))])
        .await?;
    let second = h
        .services
        .availability_service
        .upsert_slots(teacher.id, vec![recurring(1, t(9, 0), t(12, 0))])
        .await?;

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].id, second[0].id);

    let all = h
        .services
        .availability_service
        .list_for_teacher(teacher.id)
        .await?;
    assert_eq!(all.len(), 1);

    Ok(())
}

#[tokio::test]
async fn upsert_rejects_duplicates_within_a_batch() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;

    let err = h
        .services
        .availability_service
        .upsert_slots(
            teacher.id,
            vec![
                recurring(1, t(9, 0), t(12, 0)),
                recurring(1, t(9, 0), t(12, 0)),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateInBatch(_)));

    // Atomic: nothing from the failed batch landed.
    let all = h
        .services
        .availability_service
        .list_for_teacher(teacher.id)
        .await?;
    assert!(all.is_empty());

    Ok(())
}

#[tokio::test]
async fn replace_weekly_swaps_the_recurring_set_and_keeps_one_shots() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;

    h.services
        .availability_service
        .upsert_slots(
            teacher.id,
            vec![
                recurring(1, t(9, 0), t(12, 0)),
                recurring(3, t(14, 0), t(18, 0)),
                SlotSpec {
                    day_of_week: None,
                    specific_date: Some(base_date()),
                    start_time: t(19, 0),
                    end_time: t(20, 0),
                },
            ],
        )
        .await?;

    let replaced = h
        .services
        .availability_service
        .replace_weekly(teacher.id, vec![recurring(5, t(10, 0), t(13, 0))])
        .await?;
    assert_eq!(replaced.len(), 1);

    let all = h
        .services
        .availability_service
        .list_for_teacher(teacher.id)
        .await?;
    let recurring_count = all.iter().filter(|s| s.is_recurring()).count();
    let one_shot_count = all.iter().filter(|s| !s.is_recurring()).count();
    assert_eq!(recurring_count, 1);
    assert_eq!(one_shot_count, 1);
    assert_eq!(all.iter().find(|s| s.is_recurring()).map(|s| s.day_of_week), Some(Some(5)));

    Ok(())
}

#[tokio::test]
async fn delete_slots_rejects_foreign_ids_atomically() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let other = h.create_teacher().await?;

    let mine = h
        .services
        .availability_service
        .upsert_slots(teacher.id, vec![recurring(1, t(9, 0), t(12, 0))])
        .await?;
    let theirs = h
        .services
        .availability_service
        .upsert_slots(other.id, vec![recurring(2, t(9, 0), t(12, 0))])
        .await?;

    let err = h
        .services
        .availability_service
        .delete_slots(teacher.id, vec![mine[0].id, theirs[0].id])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotOwned(_)));

    // Nothing was deleted.
    let all = h
        .services
        .availability_service
        .list_for_teacher(teacher.id)
        .await?;
    assert_eq!(all.len(), 1);

    // A missing id is also NOT_OWNED.
    let err = h
        .services
        .availability_service
        .delete_slots(teacher.id, vec![Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotOwned(_)));

    h.services
        .availability_service
        .delete_slots(teacher.id, vec![mine[0].id])
        .await?;
    let all = h
        .services
        .availability_service
        .list_for_teacher(teacher.id)
        .await?;
    assert!(all.is_empty());

    Ok(())
}

#[tokio::test]
async fn available_on_unions_slots_and_subtracts_bookings() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;
    let student = h.create_student().await?;
    let gig = h.create_active_gig(&teacher).await?;

    // Monday 09:00-12:00 recurring plus a one-shot 11:00-14:00 on the
    // base date: the union is 09:00-14:00.
    h.services
        .availability_service
        .upsert_slots(
            teacher.id,
            vec![
                recurring(1, t(9, 0), t(12, 0)),
                SlotSpec {
                    day_of_week: None,
                    specific_date: Some(base_date()),
                    start_time: t(11, 0),
                    end_time: t(14, 0),
                },
            ],
        )
        .await?;

    // A booking 10:00-11:00 splits the morning.
    h.services
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

    let windows = h
        .services
        .availability_service
        .available_on(teacher.id, base_date(), 60)
        .await?;

    let rendered: Vec<(String, String)> = windows
        .iter()
        .map(|w| {
            (
                w.start.format("%H:%M").to_string(),
                w.end.format("%H:%M").to_string(),
            )
        })
        .collect();

    // 09:00-10:00 fits before the booking; 11:00-14:00 yields the
    // half-hour-stepped tail. Ascending by start time throughout.
    assert_eq!(
        rendered,
        vec![
            ("09:00".to_string(), "10:00".to_string()),
            ("11:00".to_string(), "12:00".to_string()),
            ("11:30".to_string(), "12:30".to_string()),
            ("12:00".to_string(), "13:00".to_string()),
            ("12:30".to_string(), "13:30".to_string()),
            ("13:00".to_string(), "14:00".to_string()),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn available_on_returns_empty_for_uncovered_days() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;

    h.services
        .availability_service
        .upsert_slots(teacher.id, vec![recurring(1, t(9, 0), t(12, 0))])
        .await?;

    // The base date is a Monday; Tuesday has no coverage.
    let tuesday = base_date().succ_opt().unwrap();
    let windows = h
        .services
        .availability_service
        .available_on(teacher.id, tuesday, 60)
        .await?;
    assert!(windows.is_empty());

    Ok(())
}

#[tokio::test]
async fn weekly_schedule_lists_all_seven_days() -> anyhow::Result<()> {
    let h = harness().await?;
    let teacher = h.create_teacher().await?;

    h.services
        .availability_service
        .upsert_slots(
            teacher.id,
            vec![
                recurring(1, t(9, 0), t(12, 0)),
                recurring(1, t(14, 0), t(17, 0)),
                recurring(4, t(8, 0), t(10, 0)),
            ],
        )
        .await?;

    let schedule = h
        .services
        .availability_service
        .weekly_schedule(teacher.id)
        .await?;

    assert_eq!(schedule.days.len(), 7);
    assert_eq!(schedule.days[1].slots.len(), 2);
    assert_eq!(schedule.days[4].slots.len(), 1);
    assert!(schedule.days[0].slots.is_empty());
    assert!(schedule.days[6].slots.is_empty());

    Ok(())
}
