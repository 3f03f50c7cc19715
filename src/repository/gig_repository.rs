use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateGigRequest, Gig, GigStatus, UpdateGigRequest},
    error::{AppError, Result},
    repository::GigRepository,
};

#[derive(FromRow)]
struct GigRow {
    id: String,
    teacher_id: String,
    title: String,
    category: String,
    hourly_rate_cents: i64,
    duration_minutes: i64,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteGigRepository {
    pool: SqlitePool,
}

impl SqliteGigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_gig(row: GigRow) -> Result<Gig> {
        Ok(Gig {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            teacher_id: Uuid::parse_str(&row.teacher_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            title: row.title,
            category: row.category,
            hourly_rate_cents: row.hourly_rate_cents,
            duration_minutes: row.duration_minutes,
            status: Self::parse_status(&row.status)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<GigStatus> {
        match s {
            "Active" => Ok(GigStatus::Active),
            "Inactive" => Ok(GigStatus::Inactive),
            "Draft" => Ok(GigStatus::Draft),
            "Suspended" => Ok(GigStatus::Suspended),
            _ => Err(AppError::Database(format!("Invalid gig status: {}", s))),
        }
    }

    fn status_to_str(status: GigStatus) -> &'static str {
        match status {
            GigStatus::Active => "Active",
            GigStatus::Inactive => "Inactive",
            GigStatus::Draft => "Draft",
            GigStatus::Suspended => "Suspended",
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, teacher_id, title, category, hourly_rate_cents,
           duration_minutes, status, created_at, updated_at
    FROM gigs
"#;

#[async_trait]
impl GigRepository for SqliteGigRepository {
    async fn create(&self, teacher_id: Uuid, gig: CreateGigRequest) -> Result<Gig> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO gigs (
                id, teacher_id, title, category, hourly_rate_cents,
                duration_minutes, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(teacher_id.to_string())
        .bind(&gig.title)
        .bind(&gig.category)
        .bind(gig.hourly_rate_cents)
        .bind(gig.duration_minutes)
        .bind(Self::status_to_str(GigStatus::Draft))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            if e.to_string().contains("UNIQUE") {
                return Err(AppError::Conflict(format!(
                    "Teacher already has a gig in category '{}'",
                    gig.category
                )));
            }
            return Err(AppError::Database(e.to_string()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created gig".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Gig>> {
        let row = sqlx::query_as::<_, GigRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_gig(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_teacher(&self, teacher_id: Uuid) -> Result<Vec<Gig>> {
        let rows = sqlx::query_as::<_, GigRow>(&format!(
            "{} WHERE teacher_id = ? ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .bind(teacher_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_gig).collect()
    }

    async fn update(&self, id: Uuid, update: UpdateGigRequest) -> Result<Gig> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Gig not found".to_string()))?;

        let title = update.title.unwrap_or(current.title);
        let hourly_rate_cents = update.hourly_rate_cents.unwrap_or(current.hourly_rate_cents);
        let duration_minutes = update.duration_minutes.unwrap_or(current.duration_minutes);
        let status = update.status.unwrap_or(current.status);
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE gigs
            SET title = ?, hourly_rate_cents = ?, duration_minutes = ?,
                status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(hourly_rate_cents)
        .bind(duration_minutes)
        .bind(Self::status_to_str(status))
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated gig".to_string()))
    }
}
