use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{AvailabilitySlot, SlotSpec},
    error::{AppError, Result},
    repository::AvailabilityRepository,
};

#[derive(FromRow)]
struct SlotRow {
    id: String,
    teacher_id: String,
    day_of_week: Option<i64>,
    specific_date: Option<NaiveDate>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteAvailabilityRepository {
    pool: SqlitePool,
}

impl SqliteAvailabilityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_slot(row: SlotRow) -> Result<AvailabilitySlot> {
        Ok(AvailabilitySlot {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            teacher_id: Uuid::parse_str(&row.teacher_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            day_of_week: row.day_of_week.map(|d| d as u8),
            specific_date: row.specific_date,
            start_time: row.start_time,
            end_time: row.end_time,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, teacher_id, day_of_week, specific_date, start_time, end_time,
           created_at, updated_at
    FROM availability_slots
"#;

#[async_trait]
impl AvailabilityRepository for SqliteAvailabilityRepository {
    async fn upsert_slots(
        &self,
        teacher_id: Uuid,
        specs: &[SlotSpec],
    ) -> Result<Vec<AvailabilitySlot>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().naive_utc();
        let mut ids = Vec::with_capacity(specs.len());

        for spec in specs {
            // NULL-safe tuple lookup; IS compares NULLs as equal.
            let existing: Option<(String,)> = sqlx::query_as(
                r#"
                SELECT id FROM availability_slots
                WHERE teacher_id = ?
                  AND day_of_week IS ?
                  AND specific_date IS ?
                  AND start_time = ?
                  AND end_time = ?
                "#,
            )
            .bind(teacher_id.to_string())
            .bind(spec.day_of_week.map(|d| d as i64))
            .bind(spec.specific_date)
            .bind(spec.start_time)
            .bind(spec.end_time)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            let id = match existing {
                Some((id,)) => {
                    sqlx::query("UPDATE availability_slots SET updated_at = ? WHERE id = ?")
                        .bind(now)
                        .bind(&id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    id
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    sqlx::query(
                        r#"
                        INSERT INTO availability_slots (
                            id, teacher_id, day_of_week, specific_date,
                            start_time, end_time, created_at, updated_at
                        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&id)
                    .bind(teacher_id.to_string())
                    .bind(spec.day_of_week.map(|d| d as i64))
                    .bind(spec.specific_date)
                    .bind(spec.start_time)
                    .bind(spec.end_time)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                    id
                }
            };
            ids.push(id);
        }

        tx.commit().await?;

        let mut slots = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query_as::<_, SlotRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
                .bind(&id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            slots.push(Self::row_to_slot(row)?);
        }
        Ok(slots)
    }

    async fn replace_weekly(
        &self,
        teacher_id: Uuid,
        specs: &[SlotSpec],
    ) -> Result<Vec<AvailabilitySlot>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().naive_utc();

        sqlx::query(
            "DELETE FROM availability_slots WHERE teacher_id = ? AND day_of_week IS NOT NULL",
        )
        .bind(teacher_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let mut ids = Vec::with_capacity(specs.len());
        for spec in specs {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO availability_slots (
                    id, teacher_id, day_of_week, specific_date,
                    start_time, end_time, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(teacher_id.to_string())
            .bind(spec.day_of_week.map(|d| d as i64))
            .bind(spec.specific_date)
            .bind(spec.start_time)
            .bind(spec.end_time)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
            ids.push(id);
        }

        tx.commit().await?;

        let mut slots = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query_as::<_, SlotRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
                .bind(&id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            slots.push(Self::row_to_slot(row)?);
        }
        Ok(slots)
    }

    async fn delete_slots(&self, teacher_id: Uuid, slot_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for slot_id in slot_ids {
            let owned: Option<(String,)> = sqlx::query_as(
                "SELECT teacher_id FROM availability_slots WHERE id = ?",
            )
            .bind(slot_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            match owned {
                Some((owner,)) if owner == teacher_id.to_string() => {}
                Some(_) | None => {
                    return Err(AppError::NotOwned(format!(
                        "Slot {} is not owned by this teacher",
                        slot_id
                    )));
                }
            }

            sqlx::query("DELETE FROM availability_slots WHERE id = ?")
                .bind(slot_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_teacher(&self, teacher_id: Uuid) -> Result<Vec<AvailabilitySlot>> {
        let rows = sqlx::query_as::<_, SlotRow>(&format!(
            "{} WHERE teacher_id = ? ORDER BY day_of_week, specific_date, start_time, end_time",
            SELECT_COLUMNS
        ))
        .bind(teacher_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_slot).collect()
    }

    async fn list_for_date(
        &self,
        teacher_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>> {
        let weekday = date.weekday().num_days_from_sunday() as i64;
        let rows = sqlx::query_as::<_, SlotRow>(&format!(
            "{} WHERE teacher_id = ? AND (day_of_week = ? OR specific_date = ?) \
             ORDER BY start_time, end_time",
            SELECT_COLUMNS
        ))
        .bind(teacher_id.to_string())
        .bind(weekday)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_slot).collect()
    }
}
