use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lumina_api::state::AppState;
use lumina_core::Config;
use lumina_db::PgMediaStore;
use lumina_processing::{DerivativeCoordinator, WebpVariantTransform};
use lumina_queue::{JobQueue, LapinBrokerChannel, QueueTopology};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "lumina=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.db_timeout_seconds))
        .connect(&config.database_url)
        .await
        .context("connect to database")?;

    let broker = Arc::new(
        LapinBrokerChannel::connect(&config.amqp_url)
            .await
            .context("connect to broker")?,
    );

    let derivatives_queue = Arc::new(JobQueue::new(
        broker.clone(),
        QueueTopology::new(
            config.amqp_exchange.clone(),
            config.media_derivatives_queue.clone(),
            config.amqp_queue_prefix.clone(),
        ),
    ));
    derivatives_queue
        .initialize()
        .await
        .context("declare derivatives topology")?;

    let cleanup_queue = Arc::new(JobQueue::new(
        broker.clone(),
        QueueTopology::new(
            config.amqp_exchange.clone(),
            config.media_cleanup_queue.clone(),
            config.amqp_queue_prefix.clone(),
        ),
    ));
    cleanup_queue
        .initialize()
        .await
        .context("declare cleanup topology")?;

    let coordinator = Arc::new(DerivativeCoordinator::new(
        config.originals_root.clone(),
        config.derived_root.clone(),
        Arc::new(WebpVariantTransform),
    ));

    let port = config.server_port;
    let state = Arc::new(AppState::new(
        config,
        Arc::new(PgMediaStore::new(pool)),
        coordinator,
        derivatives_queue,
        cleanup_queue,
    ));

    let app = lumina_api::routes::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .context("bind listener")?;

    tracing::info!(port, "Library API listening");
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
