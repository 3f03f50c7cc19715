use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Singleton platform payment settings, admin-mutable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    pub platform_fee_percent: f64,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePaymentSettingsRequest {
    pub platform_fee_percent: f64,
}
