use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A teacher's availability, either recurring weekly (day_of_week set) or
/// one-shot (specific_date set). Exactly one of the two is present.
/// day_of_week runs 0..=6 with 0 = Sunday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub day_of_week: Option<u8>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn is_recurring(&self) -> bool {
        self.day_of_week.is_some()
    }
}

/// One item of an upsert batch. Identity for idempotency purposes is the
/// (day_of_week, specific_date, start_time, end_time) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub day_of_week: Option<u8>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl SlotSpec {
    pub fn validate(&self) -> Result<(), String> {
        match (self.day_of_week, self.specific_date) {
            (Some(_), Some(_)) => {
                return Err("slot cannot be both recurring and date-specific".to_string())
            }
            (None, None) => {
                return Err("slot needs a day_of_week or a specific_date".to_string())
            }
            _ => {}
        }
        if let Some(day) = self.day_of_week {
            if day > 6 {
                return Err(format!("day_of_week out of range: {}", day));
            }
        }
        if self.start_time >= self.end_time {
            return Err("start_time must be before end_time".to_string());
        }
        Ok(())
    }
}

/// Closed-open bookable interval on a concrete date, as produced by the
/// availability queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// The seven-day recurring view, empty days explicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub days: Vec<DaySchedule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day_of_week: u8,
    pub slots: Vec<AvailabilitySlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn spec_rejects_inverted_times() {
        let spec = SlotSpec {
            day_of_week: Some(1),
            specific_date: None,
            start_time: t(12, 0),
            end_time: t(9, 0),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn spec_rejects_both_kinds_set() {
        let spec = SlotSpec {
            day_of_week: Some(1),
            specific_date: Some(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()),
            start_time: t(9, 0),
            end_time: t(12, 0),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn spec_rejects_day_out_of_range() {
        let spec = SlotSpec {
            day_of_week: Some(7),
            specific_date: None,
            start_time: t(9, 0),
            end_time: t(12, 0),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn windows_overlap_is_closed_open() {
        let base = Utc::now();
        let a = TimeWindow::new(base, base + chrono::Duration::hours(1));
        let b = TimeWindow::new(base + chrono::Duration::hours(1), base + chrono::Duration::hours(2));
        assert!(!a.overlaps(&b));
        let c = TimeWindow::new(base + chrono::Duration::minutes(59), base + chrono::Duration::hours(2));
        assert!(a.overlaps(&c));
    }
}
