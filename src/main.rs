use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linguahub::{
    api,
    clock::SystemClock,
    config::Settings,
    meetings::{MeetingGateway, ZoomMeetingGateway},
    payments::{PaymentGateway, StripeGateway},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linguahub=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting LinguaHub server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Meeting provider client. The booking lifecycle cannot run without
    // it, so missing credentials are a startup error.
    let meeting_gateway: Arc<dyn MeetingGateway> = match (
        settings.zoom.account_id.clone(),
        settings.zoom.client_id.clone(),
        settings.zoom.client_secret.clone(),
        settings.zoom.webhook_secret.clone(),
    ) {
        (Some(account_id), Some(client_id), Some(client_secret), Some(webhook_secret)) => {
            tracing::info!("Meeting provider configured");
            Arc::new(ZoomMeetingGateway::new(
                account_id,
                client_id,
                client_secret,
                webhook_secret,
            )?)
        }
        _ => anyhow::bail!(
            "Meeting provider configuration is required (zoom.* or MEETING_PROVIDER_*)"
        ),
    };

    // Payment provider client
    let payment_gateway: Arc<dyn PaymentGateway> = match (
        settings.stripe.secret_key.clone(),
        settings.stripe.webhook_secret.clone(),
    ) {
        (Some(secret_key), Some(webhook_secret)) => {
            tracing::info!("Payment processing configured");
            Arc::new(StripeGateway::new(secret_key, webhook_secret))
        }
        _ => anyhow::bail!(
            "Payment provider configuration is required (stripe.* or PAYMENT_PROVIDER_*)"
        ),
    };

    // Wire the lifecycle services
    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        meeting_gateway,
        payment_gateway,
        Arc::new(SystemClock),
    ));

    // Pin the platform fee from the environment if provided
    if let Some(fee) = settings.payments.platform_fee_percent {
        service_context
            .settings_service
            .apply_env_override(fee)
            .await?;
    }

    // In-process auto-completion worker
    let interval_secs = settings.worker.auto_complete_interval_secs;
    if interval_secs > 0 {
        let completion = service_context.completion_service.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                if let Err(e) = completion.run(false).await {
                    tracing::error!("Auto-completion sweep failed: {}", e);
                }
            }
        });
        tracing::info!(interval_secs, "Auto-completion worker started");
    }

    // Create the API app
    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
