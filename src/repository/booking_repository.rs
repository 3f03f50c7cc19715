use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingPaymentStatus, BookingStatus, MeetingHandle, RescheduleOutcome,
        RescheduleState,
    },
    error::{AppError, Result},
    repository::BookingRepository,
};

use super::user_repository::role_to_str;

#[derive(FromRow)]
struct BookingRow {
    id: String,
    student_id: String,
    teacher_id: String,
    gig_id: String,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    duration_hours: f64,
    status: String,
    payment_status: String,
    reschedule_status: String,
    reschedule_requested_by: Option<String>,
    proposed_start_time: Option<NaiveDateTime>,
    proposed_end_time: Option<NaiveDateTime>,
    reschedule_reason: Option<String>,
    previous_reschedule: String,
    meeting_id: Option<String>,
    meeting_join_url: Option<String>,
    meeting_host_url: Option<String>,
    meeting_password: Option<String>,
    cancellation_reason: Option<String>,
    notes: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, student_id, teacher_id, gig_id, start_time, end_time,
           duration_hours, status, payment_status, reschedule_status,
           reschedule_requested_by, proposed_start_time, proposed_end_time,
           reschedule_reason, previous_reschedule, meeting_id,
           meeting_join_url, meeting_host_url, meeting_password,
           cancellation_reason, notes, created_at, updated_at
    FROM bookings
"#;

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        let reschedule = match row.reschedule_status.as_str() {
            "None" => RescheduleState::None,
            "Pending" => {
                let requested_by = row
                    .reschedule_requested_by
                    .as_deref()
                    .ok_or_else(|| {
                        AppError::Database("Pending reschedule missing requested_by".to_string())
                    })?;
                RescheduleState::Pending {
                    requested_by: parse_requested_by(requested_by)?,
                    start: row
                        .proposed_start_time
                        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
                        .ok_or_else(|| {
                            AppError::Database("Pending reschedule missing start".to_string())
                        })?,
                    end: row
                        .proposed_end_time
                        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
                        .ok_or_else(|| {
                            AppError::Database("Pending reschedule missing end".to_string())
                        })?,
                    reason: row.reschedule_reason.clone(),
                }
            }
            other => {
                return Err(AppError::Database(format!(
                    "Invalid reschedule status: {}",
                    other
                )))
            }
        };

        let meeting = match row.meeting_id {
            Some(id) => Some(MeetingHandle {
                id,
                join_url: row.meeting_join_url.unwrap_or_default(),
                host_url: row.meeting_host_url.unwrap_or_default(),
                password: row.meeting_password,
            }),
            None => None,
        };

        Ok(Booking {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            student_id: Uuid::parse_str(&row.student_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            teacher_id: Uuid::parse_str(&row.teacher_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            gig_id: Uuid::parse_str(&row.gig_id).map_err(|e| AppError::Database(e.to_string()))?,
            start_time: DateTime::from_naive_utc_and_offset(row.start_time, Utc),
            end_time: DateTime::from_naive_utc_and_offset(row.end_time, Utc),
            duration_hours: row.duration_hours,
            status: parse_status(&row.status)?,
            payment_status: parse_payment_status(&row.payment_status)?,
            reschedule,
            previous_reschedule: parse_outcome(&row.previous_reschedule)?,
            meeting,
            cancellation_reason: row.cancellation_reason,
            notes: row.notes,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

fn parse_status(s: &str) -> Result<BookingStatus> {
    match s {
        "Pending" => Ok(BookingStatus::Pending),
        "Confirmed" => Ok(BookingStatus::Confirmed),
        "Cancelled" => Ok(BookingStatus::Cancelled),
        "Completed" => Ok(BookingStatus::Completed),
        _ => Err(AppError::Database(format!("Invalid booking status: {}", s))),
    }
}

pub(crate) fn status_to_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "Pending",
        BookingStatus::Confirmed => "Confirmed",
        BookingStatus::Cancelled => "Cancelled",
        BookingStatus::Completed => "Completed",
    }
}

fn parse_payment_status(s: &str) -> Result<BookingPaymentStatus> {
    match s {
        "Unpaid" => Ok(BookingPaymentStatus::Unpaid),
        "Pending" => Ok(BookingPaymentStatus::Pending),
        "Paid" => Ok(BookingPaymentStatus::Paid),
        "Failed" => Ok(BookingPaymentStatus::Failed),
        "Refunded" => Ok(BookingPaymentStatus::Refunded),
        _ => Err(AppError::Database(format!(
            "Invalid booking payment status: {}",
            s
        ))),
    }
}

fn payment_status_to_str(status: BookingPaymentStatus) -> &'static str {
    match status {
        BookingPaymentStatus::Unpaid => "Unpaid",
        BookingPaymentStatus::Pending => "Pending",
        BookingPaymentStatus::Paid => "Paid",
        BookingPaymentStatus::Failed => "Failed",
        BookingPaymentStatus::Refunded => "Refunded",
    }
}

fn parse_requested_by(s: &str) -> Result<crate::domain::UserRole> {
    match s {
        "Student" => Ok(crate::domain::UserRole::Student),
        "Teacher" => Ok(crate::domain::UserRole::Teacher),
        "Admin" => Ok(crate::domain::UserRole::Admin),
        _ => Err(AppError::Database(format!("Invalid requested_by: {}", s))),
    }
}

fn parse_outcome(s: &str) -> Result<RescheduleOutcome> {
    match s {
        "None" => Ok(RescheduleOutcome::None),
        "Confirmed" => Ok(RescheduleOutcome::Confirmed),
        "Declined" => Ok(RescheduleOutcome::Declined),
        _ => Err(AppError::Database(format!(
            "Invalid reschedule outcome: {}",
            s
        ))),
    }
}

fn outcome_to_str(outcome: RescheduleOutcome) -> &'static str {
    match outcome {
        RescheduleOutcome::None => "None",
        RescheduleOutcome::Confirmed => "Confirmed",
        RescheduleOutcome::Declined => "Declined",
    }
}

/// Flattened bind set shared by insert and update.
struct BookingBinds<'a> {
    reschedule_status: &'static str,
    requested_by: Option<&'static str>,
    proposed_start: Option<NaiveDateTime>,
    proposed_end: Option<NaiveDateTime>,
    reschedule_reason: Option<&'a String>,
    meeting_id: Option<&'a String>,
    meeting_join_url: Option<&'a String>,
    meeting_host_url: Option<&'a String>,
    meeting_password: Option<&'a String>,
}

fn booking_binds(booking: &Booking) -> BookingBinds<'_> {
    let (reschedule_status, requested_by, proposed_start, proposed_end, reschedule_reason) =
        match &booking.reschedule {
            RescheduleState::None => ("None", None, None, None, None),
            RescheduleState::Pending {
                requested_by,
                start,
                end,
                reason,
            } => (
                "Pending",
                Some(role_to_str(*requested_by)),
                Some(start.naive_utc()),
                Some(end.naive_utc()),
                reason.as_ref(),
            ),
        };

    let (meeting_id, meeting_join_url, meeting_host_url, meeting_password) =
        match &booking.meeting {
            Some(handle) => (
                Some(&handle.id),
                Some(&handle.join_url),
                Some(&handle.host_url),
                handle.password.as_ref(),
            ),
            None => (None, None, None, None),
        };

    BookingBinds {
        reschedule_status,
        requested_by,
        proposed_start,
        proposed_end,
        reschedule_reason,
        meeting_id,
        meeting_join_url,
        meeting_host_url,
        meeting_password,
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_meeting_id(&self, meeting_id: &str) -> Result<Option<Booking>> {
        let row =
            sqlx::query_as::<_, BookingRow>(&format!("{} WHERE meeting_id = ?", SELECT_COLUMNS))
                .bind(meeting_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE student_id = ? ORDER BY start_time DESC",
            SELECT_COLUMNS
        ))
        .bind(student_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_by_teacher(&self, teacher_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE teacher_id = ? ORDER BY start_time DESC",
            SELECT_COLUMNS
        ))
        .bind(teacher_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_occupying(
        &self,
        teacher_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE teacher_id = ? AND status IN ('Pending', 'Confirmed') \
             AND start_time < ? AND end_time > ? \
             ORDER BY start_time",
            SELECT_COLUMNS
        ))
        .bind(teacher_id.to_string())
        .bind(to.naive_utc())
        .bind(from.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_completable(&self, now: DateTime<Utc>) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE status = 'Confirmed' AND payment_status = 'Paid' AND end_time <= ? \
             ORDER BY end_time",
            SELECT_COLUMNS
        ))
        .bind(now.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn update(&self, booking: &Booking) -> Result<Booking> {
        {
            let mut conn = self.pool.acquire().await?;
            self.update_tx(&mut conn, booking).await?;
        }
        self.find_by_id(booking.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated booking".to_string()))
    }

    async fn insert_tx(&self, conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
        let binds = booking_binds(booking);
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, student_id, teacher_id, gig_id, start_time, end_time,
                duration_hours, status, payment_status, reschedule_status,
                reschedule_requested_by, proposed_start_time, proposed_end_time,
                reschedule_reason, previous_reschedule, meeting_id,
                meeting_join_url, meeting_host_url, meeting_password,
                cancellation_reason, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.id.to_string())
        .bind(booking.student_id.to_string())
        .bind(booking.teacher_id.to_string())
        .bind(booking.gig_id.to_string())
        .bind(booking.start_time.naive_utc())
        .bind(booking.end_time.naive_utc())
        .bind(booking.duration_hours)
        .bind(status_to_str(booking.status))
        .bind(payment_status_to_str(booking.payment_status))
        .bind(binds.reschedule_status)
        .bind(binds.requested_by)
        .bind(binds.proposed_start)
        .bind(binds.proposed_end)
        .bind(binds.reschedule_reason)
        .bind(outcome_to_str(booking.previous_reschedule))
        .bind(binds.meeting_id)
        .bind(binds.meeting_join_url)
        .bind(binds.meeting_host_url)
        .bind(binds.meeting_password)
        .bind(&booking.cancellation_reason)
        .bind(&booking.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn update_tx(&self, conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
        let binds = booking_binds(booking);
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE bookings
            SET start_time = ?,
                end_time = ?,
                duration_hours = ?,
                status = ?,
                payment_status = ?,
                reschedule_status = ?,
                reschedule_requested_by = ?,
                proposed_start_time = ?,
                proposed_end_time = ?,
                reschedule_reason = ?,
                previous_reschedule = ?,
                meeting_id = ?,
                meeting_join_url = ?,
                meeting_host_url = ?,
                meeting_password = ?,
                cancellation_reason = ?,
                notes = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(booking.start_time.naive_utc())
        .bind(booking.end_time.naive_utc())
        .bind(booking.duration_hours)
        .bind(status_to_str(booking.status))
        .bind(payment_status_to_str(booking.payment_status))
        .bind(binds.reschedule_status)
        .bind(binds.requested_by)
        .bind(binds.proposed_start)
        .bind(binds.proposed_end)
        .bind(binds.reschedule_reason)
        .bind(outcome_to_str(booking.previous_reschedule))
        .bind(binds.meeting_id)
        .bind(binds.meeting_join_url)
        .bind(binds.meeting_host_url)
        .bind(binds.meeting_password)
        .bind(&booking.cancellation_reason)
        .bind(&booking.notes)
        .bind(now)
        .bind(booking.id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn count_overlapping_tx(
        &self,
        conn: &mut SqliteConnection,
        teacher_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE teacher_id = ?
              AND status IN ('Pending', 'Confirmed')
              AND start_time < ?
              AND end_time > ?
              AND (? IS NULL OR id != ?)
            "#,
        )
        .bind(teacher_id.to_string())
        .bind(end.naive_utc())
        .bind(start.naive_utc())
        .bind(exclude.map(|id| id.to_string()))
        .bind(exclude.map(|id| id.to_string()))
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }
}
