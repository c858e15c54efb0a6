//! Storefront entry point.

use anyhow::Context;
use cart::AvailabilityResolver;
use checkout::CheckoutCoordinator;
use gateway::{PostgresGateway, PostgresStock};
use sqlx::postgres::PgPoolOptions;
use storefront::{Config, Session, TerminalPrompt};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // 2. Initialize tracing; stdout belongs to the menu
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // 3. Install Prometheus metrics exporter if requested
    if let Some(addr) = config.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        tracing::info!(%addr, "metrics listener started");
    }

    // 4. Connect to the data store
    let database_url = config
        .database_url
        .clone()
        .context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("failed to connect to the database")?;

    // 5. Build the session: one dedicated connection for the checkout
    // transaction, the pool for stock lookups
    let gateway = PostgresGateway::connect(&pool).await?;
    let resolver = AvailabilityResolver::new(PostgresStock::new(pool.clone()))
        .with_preview_limit(config.lot_preview_limit);
    let coordinator = CheckoutCoordinator::with_settings(gateway, config.checkout_settings());
    let prompt = TerminalPrompt::new(std::io::stdin().lock(), std::io::stdout());

    let mut session = Session::new(prompt, resolver, coordinator);
    session.run().await?;

    // Return the dedicated connection before closing the pool
    drop(session);
    pool.close().await;
    Ok(())
}
