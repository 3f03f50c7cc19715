//! One-shot auto-completion sweep, intended for cron. Finalizes every
//! confirmed, paid booking whose end time has passed.

use std::sync::Arc;

use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linguahub::{
    clock::SystemClock,
    config::Settings,
    meetings::{MeetingGateway, ZoomMeetingGateway},
    payments::{PaymentGateway, StripeGateway},
    service::ServiceContext,
};

#[derive(Parser, Debug)]
#[command(name = "auto_complete", about = "Run the booking auto-completion sweep once")]
struct Args {
    /// Report what would be completed without changing anything.
    #[arg(long)]
    dry_run: bool,

    /// Log at debug level instead of info.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = if args.verbose {
        "linguahub=debug"
    } else {
        "linguahub=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::new()?;

    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&db_pool).await?;

    let meeting_gateway: Arc<dyn MeetingGateway> = match (
        settings.zoom.account_id.clone(),
        settings.zoom.client_id.clone(),
        settings.zoom.client_secret.clone(),
        settings.zoom.webhook_secret.clone(),
    ) {
        (Some(account_id), Some(client_id), Some(client_secret), Some(webhook_secret)) => {
            Arc::new(ZoomMeetingGateway::new(
                account_id,
                client_id,
                client_secret,
                webhook_secret,
            )?)
        }
        _ => anyhow::bail!("Meeting provider configuration is required"),
    };

    let payment_gateway: Arc<dyn PaymentGateway> = match (
        settings.stripe.secret_key.clone(),
        settings.stripe.webhook_secret.clone(),
    ) {
        (Some(secret_key), Some(webhook_secret)) => {
            Arc::new(StripeGateway::new(secret_key, webhook_secret))
        }
        _ => anyhow::bail!("Payment provider configuration is required"),
    };

    let service_context = ServiceContext::new(
        db_pool,
        meeting_gateway,
        payment_gateway,
        Arc::new(SystemClock),
    );

    let summary = service_context.completion_service.run(args.dry_run).await?;

    println!(
        "auto_complete: scanned {} completed {} failed {}{}",
        summary.scanned,
        summary.completed,
        summary.failed,
        if args.dry_run { " (dry run)" } else { "" }
    );

    if summary.failed > 0 {
        anyhow::bail!("{} bookings failed to complete", summary.failed);
    }

    Ok(())
}
