use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    domain::{AvailabilitySlot, DaySchedule, SlotSpec, TimeWindow, WeeklySchedule},
    error::{AppError, Result},
    repository::{AvailabilityRepository, BookingRepository},
};

/// Candidate windows are emitted on a half-hour grid.
const CANDIDATE_STEP_MINUTES: i64 = 30;

pub struct AvailabilityService {
    availability_repo: Arc<dyn AvailabilityRepository>,
    booking_repo: Arc<dyn BookingRepository>,
}

impl AvailabilityService {
    pub fn new(
        availability_repo: Arc<dyn AvailabilityRepository>,
        booking_repo: Arc<dyn BookingRepository>,
    ) -> Self {
        Self {
            availability_repo,
            booking_repo,
        }
    }

    pub async fn upsert_slots(
        &self,
        teacher_id: Uuid,
        specs: Vec<SlotSpec>,
    ) -> Result<Vec<AvailabilitySlot>> {
        if specs.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate().map_err(AppError::Validation)?;
            let key = (
                spec.day_of_week,
                spec.specific_date,
                spec.start_time,
                spec.end_time,
            );
            if !seen.insert(key) {
                return Err(AppError::DuplicateInBatch(format!(
                    "Slot {}-{} appears twice in the batch",
                    spec.start_time, spec.end_time
                )));
            }
        }

        self.availability_repo.upsert_slots(teacher_id, &specs).await
    }

    pub async fn replace_weekly(
        &self,
        teacher_id: Uuid,
        specs: Vec<SlotSpec>,
    ) -> Result<Vec<AvailabilitySlot>> {
        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate().map_err(AppError::Validation)?;
            if spec.day_of_week.is_none() {
                return Err(AppError::Validation(
                    "replace_weekly only accepts recurring slots".to_string(),
                ));
            }
            let key = (spec.day_of_week, spec.start_time, spec.end_time);
            if !seen.insert(key) {
                return Err(AppError::DuplicateInBatch(format!(
                    "Slot {}-{} appears twice in the batch",
                    spec.start_time, spec.end_time
                )));
            }
        }

        self.availability_repo.replace_weekly(teacher_id, &specs).await
    }

    pub async fn delete_slots(&self, teacher_id: Uuid, slot_ids: Vec<Uuid>) -> Result<()> {
        if slot_ids.is_empty() {
            return Ok(());
        }
        self.availability_repo.delete_slots(teacher_id, &slot_ids).await
    }

    pub async fn list_for_teacher(&self, teacher_id: Uuid) -> Result<Vec<AvailabilitySlot>> {
        self.availability_repo.list_for_teacher(teacher_id).await
    }

    /// The seven-day recurring view with empty days explicit.
    pub async fn weekly_schedule(&self, teacher_id: Uuid) -> Result<WeeklySchedule> {
        let slots = self.availability_repo.list_for_teacher(teacher_id).await?;

        let mut days: Vec<DaySchedule> = (0..7)
            .map(|day_of_week| DaySchedule {
                day_of_week,
                slots: Vec::new(),
            })
            .collect();

        for slot in slots {
            if let Some(day) = slot.day_of_week {
                days[day as usize].slots.push(slot);
            }
        }

        Ok(WeeklySchedule { days })
    }

    /// Candidate bookable windows of exactly `duration_minutes` on `date`:
    /// the union of the teacher's recurring and one-shot slots, minus the
    /// intervals held by Pending/Confirmed bookings, stepped every 30
    /// minutes. Deterministic ordering: ascending start, ties by end.
    pub async fn available_on(
        &self,
        teacher_id: Uuid,
        date: NaiveDate,
        duration_minutes: i64,
    ) -> Result<Vec<TimeWindow>> {
        if duration_minutes <= 0 {
            return Err(AppError::Validation(
                "duration_minutes must be positive".to_string(),
            ));
        }

        let slots = self.availability_repo.list_for_date(teacher_id, date).await?;
        let free = merge_windows(
            slots
                .iter()
                .map(|slot| slot_window_on(slot, date))
                .collect(),
        );

        let day_start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let day_end = day_start + Duration::days(1);

        let bookings = self
            .booking_repo
            .list_occupying(teacher_id, day_start, day_end)
            .await?;
        let busy: Vec<TimeWindow> = bookings
            .iter()
            .map(|b| TimeWindow::new(b.start_time, b.end_time))
            .collect();

        let remaining = subtract_windows(free, &busy);

        let mut candidates = Vec::new();
        for window in remaining {
            emit_candidates(&window, duration_minutes, &mut candidates);
        }
        candidates.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

        Ok(candidates)
    }

    /// Whether [start, end) lies fully inside the teacher's availability
    /// for that date. Used by the booking path; bookings are checked for
    /// overlap separately under the teacher lock.
    pub async fn covers(
        &self,
        teacher_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool> {
        let date = start.date_naive();
        let slots = self.availability_repo.list_for_date(teacher_id, date).await?;
        let free = merge_windows(
            slots
                .iter()
                .map(|slot| slot_window_on(slot, date))
                .collect(),
        );

        Ok(free.iter().any(|w| w.start <= start && end <= w.end))
    }
}

fn slot_window_on(slot: &AvailabilitySlot, date: NaiveDate) -> TimeWindow {
    TimeWindow::new(
        date.and_time(slot.start_time).and_utc(),
        date.and_time(slot.end_time).and_utc(),
    )
}

/// Coalesces overlapping or touching intervals into a sorted disjoint set.
fn merge_windows(mut windows: Vec<TimeWindow>) -> Vec<TimeWindow> {
    windows.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut merged: Vec<TimeWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => {
                if window.end > last.end {
                    last.end = window.end;
                }
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// Removes every busy interval from the free set, splitting windows where
/// a booking sits in the middle.
fn subtract_windows(free: Vec<TimeWindow>, busy: &[TimeWindow]) -> Vec<TimeWindow> {
    let mut result = free;
    for b in busy {
        let mut next = Vec::with_capacity(result.len() + 1);
        for w in result {
            if !w.overlaps(b) {
                next.push(w);
                continue;
            }
            if w.start < b.start {
                next.push(TimeWindow::new(w.start, b.start));
            }
            if b.end < w.end {
                next.push(TimeWindow::new(b.end, w.end));
            }
        }
        result = next;
    }
    result
}

fn emit_candidates(window: &TimeWindow, duration_minutes: i64, out: &mut Vec<TimeWindow>) {
    let duration = Duration::minutes(duration_minutes);
    let step = Duration::minutes(CANDIDATE_STEP_MINUTES);

    let mut start = window.start;
    while start + duration <= window.end {
        out.push(TimeWindow::new(start, start + duration));
        start += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn w(start_h: u32, start_m: u32, end_h: u32, end_m: u32) -> TimeWindow {
        let base = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        TimeWindow::new(
            base + Duration::minutes((start_h * 60 + start_m) as i64),
            base + Duration::minutes((end_h * 60 + end_m) as i64),
        )
    }

    #[test]
    fn merge_coalesces_overlapping_and_touching() {
        let merged = merge_windows(vec![w(9, 0, 11, 0), w(10, 30, 12, 0), w(12, 0, 13, 0)]);
        assert_eq!(merged, vec![w(9, 0, 13, 0)]);
    }

    #[test]
    fn merge_keeps_disjoint_windows_apart() {
        let merged = merge_windows(vec![w(14, 0, 15, 0), w(9, 0, 10, 0)]);
        assert_eq!(merged, vec![w(9, 0, 10, 0), w(14, 0, 15, 0)]);
    }

    #[test]
    fn subtract_splits_around_a_booking() {
        let remaining = subtract_windows(vec![w(9, 0, 17, 0)], &[w(10, 0, 11, 0)]);
        assert_eq!(remaining, vec![w(9, 0, 10, 0), w(11, 0, 17, 0)]);
    }

    #[test]
    fn subtract_removes_fully_covered_window() {
        let remaining = subtract_windows(vec![w(10, 0, 11, 0)], &[w(9, 0, 12, 0)]);
        assert!(remaining.is_empty());
    }

    #[test]
    fn candidates_step_every_thirty_minutes() {
        let mut out = Vec::new();
        emit_candidates(&w(9, 0, 11, 0), 60, &mut out);
        assert_eq!(out, vec![w(9, 0, 10, 0), w(9, 30, 10, 30), w(10, 0, 11, 0)]);
    }

    #[test]
    fn candidates_skip_windows_shorter_than_duration() {
        let mut out = Vec::new();
        emit_candidates(&w(9, 0, 9, 45), 60, &mut out);
        assert!(out.is_empty());
    }
}
