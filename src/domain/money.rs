//! Integer-cent money arithmetic. Each derived value rounds exactly once,
//! at the cent result; tests pin the direction so provider statements and
//! our records cannot drift.

use chrono::{DateTime, Utc};

/// Session length in hours, two-decimal precision.
pub fn duration_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let seconds = (end - start).num_seconds() as f64;
    (seconds / 3600.0 * 100.0).round() / 100.0
}

pub fn session_cost_cents(hourly_rate_cents: i64, duration_hours: f64) -> i64 {
    (hourly_rate_cents as f64 * duration_hours).round() as i64
}

pub fn platform_fee_cents(session_cost_cents: i64, platform_fee_percent: f64) -> i64 {
    (session_cost_cents as f64 * platform_fee_percent / 100.0).round() as i64
}

/// Full price breakdown for a session, snapshotted onto the Payment row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub hourly_rate_cents: i64,
    pub duration_hours: f64,
    pub session_cost_cents: i64,
    pub platform_fee_cents: i64,
    pub total_cents: i64,
}

pub fn quote(
    hourly_rate_cents: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    platform_fee_percent: f64,
) -> PriceQuote {
    let hours = duration_hours(start, end);
    let cost = session_cost_cents(hourly_rate_cents, hours);
    let fee = platform_fee_cents(cost, platform_fee_percent);
    PriceQuote {
        hourly_rate_cents,
        duration_hours: hours,
        session_cost_cents: cost,
        platform_fee_cents: fee,
        total_cents: cost + fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn one_hour_at_fifty_dollars_with_five_percent_fee() {
        let start = Utc::now();
        let q = quote(5000, start, start + Duration::hours(1), 5.0);
        assert_eq!(q.session_cost_cents, 5000);
        assert_eq!(q.platform_fee_cents, 250);
        assert_eq!(q.total_cents, 5250);
        assert_eq!(q.duration_hours, 1.0);
    }

    #[test]
    fn ninety_minutes_rounds_duration_to_two_decimals() {
        let start = Utc::now();
        assert_eq!(duration_hours(start, start + Duration::minutes(90)), 1.5);
        // 80 minutes = 1.3333... hours -> 1.33
        assert_eq!(duration_hours(start, start + Duration::minutes(80)), 1.33);
    }

    #[test]
    fn fractional_hours_round_once_on_the_cent_result() {
        let start = Utc::now();
        // 1.33 h * 5000 = 6650.0 exactly; 5% of 6650 = 332.5 -> 333
        let q = quote(5000, start, start + Duration::minutes(80), 5.0);
        assert_eq!(q.session_cost_cents, 6650);
        assert_eq!(q.platform_fee_cents, 333);
        assert_eq!(q.total_cents, 6983);
    }

    #[test]
    fn zero_fee_percent_charges_session_cost_only() {
        let start = Utc::now();
        let q = quote(4400, start, start + Duration::minutes(30), 0.0);
        assert_eq!(q.session_cost_cents, 2200);
        assert_eq!(q.platform_fee_cents, 0);
        assert_eq!(q.total_cents, 2200);
    }
}
