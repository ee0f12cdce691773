use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wellness_billing::domain::billing::{BillingService, BillingServiceApi};
use wellness_billing::infrastructure::config::{Config, LogFormat};
use wellness_billing::infrastructure::db::{check_connection, create_pool, run_migrations};
use wellness_billing::infrastructure::http::{build_router, start_http_server};
use wellness_billing::infrastructure::jobs::start_rollover_sweep_job;
use wellness_billing::infrastructure::payments::{AutoApprovePaymentGateway, PaymentGateway};
use wellness_billing::infrastructure::repositories::{
    InMemoryLedgerRepository, LedgerRepository, PgLedgerRepository,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    init_logging(&config);

    tracing::info!(
        "Starting billing service on {}:{}",
        config.host,
        config.port
    );

    let repo: Arc<dyn LedgerRepository> = match &config.database_url {
        Some(database_url) => {
            let pool = create_pool(database_url).await?;
            check_connection(&pool).await?;
            tracing::info!("Database connection verified");

            run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");

            Arc::new(PgLedgerRepository::new(Arc::new(pool)))
        }
        None => {
            if !config.is_development() {
                tracing::warn!("DATABASE_URL not set in production; ledger will not survive restarts");
            }
            tracing::info!("Using in-memory ledger");
            Arc::new(InMemoryLedgerRepository::new())
        }
    };

    let payments: Arc<dyn PaymentGateway> =
        Arc::new(AutoApprovePaymentGateway::new(config.payments_auto_approve));
    if !config.payments_auto_approve {
        tracing::warn!("Payment gateway configured to decline every charge");
    }

    let billing_service: Arc<dyn BillingServiceApi> = Arc::new(BillingService::new(
        repo.clone(),
        payments,
        config.max_write_retries,
    ));

    tokio::spawn(start_rollover_sweep_job(
        billing_service.clone(),
        Duration::from_secs(config.rollover_sweep_interval_secs.max(1)),
    ));
    tracing::info!(
        interval_secs = config.rollover_sweep_interval_secs,
        "Rollover sweep scheduled"
    );

    let app = build_router(repo, billing_service);
    start_http_server(Arc::new(config), app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wellness_billing=debug,tower_http=debug".into());

    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
