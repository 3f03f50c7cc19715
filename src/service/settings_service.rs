use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{PaymentSettings, UpdatePaymentSettingsRequest},
    error::{AppError, Result},
};

#[derive(FromRow)]
struct SettingsRow {
    platform_fee_percent: f64,
    updated_by: Option<String>,
    updated_at: NaiveDateTime,
}

/// The payment_settings singleton: the platform fee percentage applied on
/// top of the session cost. Admin-mutable; the environment can pin it at
/// bootstrap.
pub struct SettingsService {
    pool: SqlitePool,
}

impl SettingsService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<PaymentSettings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT platform_fee_percent, updated_by, updated_at FROM payment_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Internal("payment_settings row missing".to_string()))?;

        Ok(PaymentSettings {
            platform_fee_percent: row.platform_fee_percent,
            updated_by: row
                .updated_by
                .map(|s| Uuid::parse_str(&s).map_err(|e| AppError::Database(e.to_string())))
                .transpose()?,
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    pub async fn platform_fee_percent(&self) -> Result<f64> {
        Ok(self.get().await?.platform_fee_percent)
    }

    pub async fn update(
        &self,
        request: UpdatePaymentSettingsRequest,
        updated_by: Uuid,
    ) -> Result<PaymentSettings> {
        if !(0.0..=100.0).contains(&request.platform_fee_percent) {
            return Err(AppError::Validation(
                "platform_fee_percent must be between 0 and 100".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE payment_settings SET platform_fee_percent = ?, updated_by = ?, updated_at = ? WHERE id = 1",
        )
        .bind(request.platform_fee_percent)
        .bind(updated_by.to_string())
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        self.get().await
    }

    /// Bootstrap override from PLATFORM_FEE_PERCENT; keeps updated_by
    /// empty since no admin made the change.
    pub async fn apply_env_override(&self, platform_fee_percent: f64) -> Result<()> {
        sqlx::query(
            "UPDATE payment_settings SET platform_fee_percent = ?, updated_at = ? WHERE id = 1",
        )
        .bind(platform_fee_percent)
        .bind(Utc::now().naive_utc())
        .execute(&self.pool)
        .await?;

        tracing::info!(platform_fee_percent, "Platform fee pinned from environment");
        Ok(())
    }
}
