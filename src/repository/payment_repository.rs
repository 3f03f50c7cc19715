use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentStatus, SavedPaymentMethod},
    error::{AppError, Result},
    repository::{PaymentRepository, SavedPaymentMethodRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    booking_id: String,
    student_id: String,
    teacher_id: String,
    gig_id: String,
    provider_charge_id: Option<String>,
    provider_customer_id: Option<String>,
    amount_cents: i64,
    hourly_rate_cents: i64,
    duration_hours: f64,
    platform_fee_cents: i64,
    status: String,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, booking_id, student_id, teacher_id, gig_id,
           provider_charge_id, provider_customer_id, amount_cents,
           hourly_rate_cents, duration_hours, platform_fee_cents,
           status, paid_at, created_at, updated_at
    FROM payments
"#;

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            booking_id: Uuid::parse_str(&row.booking_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            student_id: Uuid::parse_str(&row.student_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            teacher_id: Uuid::parse_str(&row.teacher_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            gig_id: Uuid::parse_str(&row.gig_id).map_err(|e| AppError::Database(e.to_string()))?,
            provider_charge_id: row.provider_charge_id,
            provider_customer_id: row.provider_customer_id,
            amount_cents: row.amount_cents,
            hourly_rate_cents: row.hourly_rate_cents,
            duration_hours: row.duration_hours,
            platform_fee_cents: row.platform_fee_cents,
            status: parse_status(&row.status)?,
            paid_at: row
                .paid_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

fn parse_status(s: &str) -> Result<PaymentStatus> {
    match s {
        "Pending" => Ok(PaymentStatus::Pending),
        "Processing" => Ok(PaymentStatus::Processing),
        "Completed" => Ok(PaymentStatus::Completed),
        "Failed" => Ok(PaymentStatus::Failed),
        "RefundRequested" => Ok(PaymentStatus::RefundRequested),
        "Refunded" => Ok(PaymentStatus::Refunded),
        "Cancelled" => Ok(PaymentStatus::Cancelled),
        _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
    }
}

fn status_to_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "Pending",
        PaymentStatus::Processing => "Processing",
        PaymentStatus::Completed => "Completed",
        PaymentStatus::Failed => "Failed",
        PaymentStatus::RefundRequested => "RefundRequested",
        PaymentStatus::Refunded => "Refunded",
        PaymentStatus::Cancelled => "Cancelled",
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: &Payment) -> Result<Payment> {
        {
            let mut conn = self.pool.acquire().await?;
            self.insert_tx(&mut conn, payment).await?;
        }
        self.find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created payment".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        let row =
            sqlx::query_as::<_, PaymentRow>(&format!("{} WHERE booking_id = ?", SELECT_COLUMNS))
                .bind(booking_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_charge_id(&self, charge_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "{} WHERE provider_charge_id = ?",
            SELECT_COLUMNS
        ))
        .bind(charge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_payment(r)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, payment: &Payment) -> Result<Payment> {
        {
            let mut conn = self.pool.acquire().await?;
            self.update_tx(&mut conn, payment).await?;
        }
        self.find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated payment".to_string()))
    }

    async fn insert_tx(&self, conn: &mut SqliteConnection, payment: &Payment) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, booking_id, student_id, teacher_id, gig_id,
                provider_charge_id, provider_customer_id, amount_cents,
                hourly_rate_cents, duration_hours, platform_fee_cents,
                status, paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.booking_id.to_string())
        .bind(payment.student_id.to_string())
        .bind(payment.teacher_id.to_string())
        .bind(payment.gig_id.to_string())
        .bind(&payment.provider_charge_id)
        .bind(&payment.provider_customer_id)
        .bind(payment.amount_cents)
        .bind(payment.hourly_rate_cents)
        .bind(payment.duration_hours)
        .bind(payment.platform_fee_cents)
        .bind(status_to_str(payment.status))
        .bind(payment.paid_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn update_tx(&self, conn: &mut SqliteConnection, payment: &Payment) -> Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            UPDATE payments
            SET provider_charge_id = ?,
                provider_customer_id = ?,
                status = ?,
                paid_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&payment.provider_charge_id)
        .bind(&payment.provider_customer_id)
        .bind(status_to_str(payment.status))
        .bind(payment.paid_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(payment.id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[derive(FromRow)]
struct MethodRow {
    id: String,
    student_id: String,
    provider_method_id: String,
    brand: String,
    last_four: String,
    exp_month: i64,
    exp_year: i64,
    is_default: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteSavedPaymentMethodRepository {
    pool: SqlitePool,
}

const METHOD_COLUMNS: &str = r#"
    SELECT id, student_id, provider_method_id, brand, last_four,
           exp_month, exp_year, is_default, created_at, updated_at
    FROM saved_payment_methods
"#;

impl SqliteSavedPaymentMethodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_method(row: MethodRow) -> Result<SavedPaymentMethod> {
        Ok(SavedPaymentMethod {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            student_id: Uuid::parse_str(&row.student_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            provider_method_id: row.provider_method_id,
            brand: row.brand,
            last_four: row.last_four,
            exp_month: row.exp_month,
            exp_year: row.exp_year,
            is_default: row.is_default,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl SavedPaymentMethodRepository for SqliteSavedPaymentMethodRepository {
    async fn create(&self, method: &SavedPaymentMethod) -> Result<SavedPaymentMethod> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().naive_utc();

        if method.is_default {
            sqlx::query(
                "UPDATE saved_payment_methods SET is_default = 0, updated_at = ? WHERE student_id = ?",
            )
            .bind(now)
            .bind(method.student_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        sqlx::query(
            r#"
            INSERT INTO saved_payment_methods (
                id, student_id, provider_method_id, brand, last_four,
                exp_month, exp_year, is_default, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(method.id.to_string())
        .bind(method.student_id.to_string())
        .bind(&method.provider_method_id)
        .bind(&method.brand)
        .bind(&method.last_four)
        .bind(method.exp_month)
        .bind(method.exp_year)
        .bind(method.is_default)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit().await?;

        self.find_by_id(method.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve saved method".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SavedPaymentMethod>> {
        let row = sqlx::query_as::<_, MethodRow>(&format!("{} WHERE id = ?", METHOD_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_method(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_student(&self, student_id: Uuid) -> Result<Vec<SavedPaymentMethod>> {
        let rows = sqlx::query_as::<_, MethodRow>(&format!(
            "{} WHERE student_id = ? ORDER BY is_default DESC, created_at DESC",
            METHOD_COLUMNS
        ))
        .bind(student_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_method).collect()
    }

    async fn set_default(&self, student_id: Uuid, method_id: Uuid) -> Result<SavedPaymentMethod> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().naive_utc();

        let owned: Option<(String,)> =
            sqlx::query_as("SELECT student_id FROM saved_payment_methods WHERE id = ?")
                .bind(method_id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        match owned {
            Some((owner,)) if owner == student_id.to_string() => {}
            _ => return Err(AppError::NotFound("Payment method not found".to_string())),
        }

        sqlx::query(
            "UPDATE saved_payment_methods SET is_default = 0, updated_at = ? WHERE student_id = ?",
        )
        .bind(now)
        .bind(student_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query("UPDATE saved_payment_methods SET is_default = 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(method_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit().await?;

        self.find_by_id(method_id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve updated method".to_string()))
    }
}
