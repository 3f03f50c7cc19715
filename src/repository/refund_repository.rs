use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{RefundRequest, RefundStatus},
    error::{AppError, Result},
    repository::RefundRepository,
};

#[derive(FromRow)]
struct RefundRow {
    id: String,
    payment_id: String,
    student_id: String,
    reason: String,
    requested_amount_cents: i64,
    status: String,
    provider_refund_id: Option<String>,
    refunded_amount_cents: Option<i64>,
    admin_notes: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteRefundRepository {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, payment_id, student_id, reason, requested_amount_cents,
           status, provider_refund_id, refunded_amount_cents, admin_notes,
           reviewed_by, reviewed_at, created_at, updated_at
    FROM refund_requests
"#;

impl SqliteRefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_request(row: RefundRow) -> Result<RefundRequest> {
        Ok(RefundRequest {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            payment_id: Uuid::parse_str(&row.payment_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            student_id: Uuid::parse_str(&row.student_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            reason: row.reason,
            requested_amount_cents: row.requested_amount_cents,
            status: parse_status(&row.status)?,
            provider_refund_id: row.provider_refund_id,
            refunded_amount_cents: row.refunded_amount_cents,
            admin_notes: row.admin_notes,
            reviewed_by: row
                .reviewed_by
                .map(|s| Uuid::parse_str(&s).map_err(|e| AppError::Database(e.to_string())))
                .transpose()?,
            reviewed_at: row
                .reviewed_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

fn parse_status(s: &str) -> Result<RefundStatus> {
    match s {
        "Pending" => Ok(RefundStatus::Pending),
        "Approved" => Ok(RefundStatus::Approved),
        "Rejected" => Ok(RefundStatus::Rejected),
        "Processed" => Ok(RefundStatus::Processed),
        _ => Err(AppError::Database(format!("Invalid refund status: {}", s))),
    }
}

fn status_to_str(status: RefundStatus) -> &'static str {
    match status {
        RefundStatus::Pending => "Pending",
        RefundStatus::Approved => "Approved",
        RefundStatus::Rejected => "Rejected",
        RefundStatus::Processed => "Processed",
    }
}

#[async_trait]
impl RefundRepository for SqliteRefundRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefundRequest>> {
        let row = sqlx::query_as::<_, RefundRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_payment(&self, payment_id: Uuid) -> Result<Vec<RefundRequest>> {
        let rows = sqlx::query_as::<_, RefundRow>(&format!(
            "{} WHERE payment_id = ? ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(payment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_request).collect()
    }

    async fn list_pending(&self) -> Result<Vec<RefundRequest>> {
        let rows = sqlx::query_as::<_, RefundRow>(&format!(
            "{} WHERE status = 'Pending' ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_request).collect()
    }

    async fn update(&self, request: &RefundRequest) -> Result<RefundRequest> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE refund_requests
            SET status = ?,
                provider_refund_id = ?,
                refunded_amount_cents = ?,
                admin_notes = ?,
                reviewed_by = ?,
                reviewed_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status_to_str(request.status))
        .bind(&request.provider_refund_id)
        .bind(request.refunded_amount_cents)
        .bind(&request.admin_notes)
        .bind(request.reviewed_by.map(|id| id.to_string()))
        .bind(request.reviewed_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(request.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(request.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated refund".to_string()))
    }

    async fn insert_tx(&self, conn: &mut SqliteConnection, request: &RefundRequest) -> Result<()> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO refund_requests (
                id, payment_id, student_id, reason, requested_amount_cents,
                status, provider_refund_id, refunded_amount_cents,
                admin_notes, reviewed_by, reviewed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.id.to_string())
        .bind(request.payment_id.to_string())
        .bind(request.student_id.to_string())
        .bind(&request.reason)
        .bind(request.requested_amount_cents)
        .bind(status_to_str(request.status))
        .bind(&request.provider_refund_id)
        .bind(request.refunded_amount_cents)
        .bind(&request.admin_notes)
        .bind(request.reviewed_by.map(|id| id.to_string()))
        .bind(request.reviewed_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await;

        // The partial unique index backs up the service-level check under
        // concurrent requests.
        if let Err(e) = result {
            if e.to_string().contains("UNIQUE") {
                return Err(AppError::OpenRefundExists);
            }
            return Err(AppError::Database(e.to_string()));
        }

        Ok(())
    }

    async fn find_open_by_payment_tx(
        &self,
        conn: &mut SqliteConnection,
        payment_id: Uuid,
    ) -> Result<Option<RefundRequest>> {
        let row = sqlx::query_as::<_, RefundRow>(&format!(
            "{} WHERE payment_id = ? AND status IN ('Pending', 'Approved', 'Processed')",
            SELECT_COLUMNS
        ))
        .bind(payment_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_request(r)?)),
            None => Ok(None),
        }
    }
}
