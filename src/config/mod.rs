use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub zoom: ZoomConfig,
    #[serde(default)]
    pub payments: PaymentConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret for the bearer tokens minted by the identity service.
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ZoomConfig {
    pub account_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentConfig {
    /// Overrides the payment_settings row at bootstrap when set.
    pub platform_fee_percent: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Auto-completion sweep interval. Zero disables the in-process worker
    /// (the auto_complete binary can still be run from cron).
    pub auto_complete_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { auto_complete_interval_secs: 300 }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.max_connections", 10)?
            .set_default("worker.auto_complete_interval_secs", 300)?
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (with LINGUAHUB__ prefix, double
            // underscore separates levels)
            .add_source(Environment::with_prefix("LINGUAHUB").separator("__"));

        // Dedicated provider variables take precedence over the file and
        // prefixed-env layers so deploys can keep secrets in the flat form.
        for (var, key) in [
            ("PLATFORM_FEE_PERCENT", "payments.platform_fee_percent"),
            ("MEETING_PROVIDER_ACCOUNT_ID", "zoom.account_id"),
            ("MEETING_PROVIDER_CLIENT_ID", "zoom.client_id"),
            ("MEETING_PROVIDER_CLIENT_SECRET", "zoom.client_secret"),
            ("MEETING_PROVIDER_WEBHOOK_SECRET", "zoom.webhook_secret"),
            ("PAYMENT_PROVIDER_SECRET_KEY", "stripe.secret_key"),
            ("PAYMENT_PROVIDER_WEBHOOK_SECRET", "stripe.webhook_secret"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let config = builder.build()?;
        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://linguahub.db".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
            },
            stripe: StripeConfig::default(),
            zoom: ZoomConfig::default(),
            payments: PaymentConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}
