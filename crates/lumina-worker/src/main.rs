use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lumina_core::Config;
use lumina_db::PgMediaStore;
use lumina_processing::{DerivativeCoordinator, FfmpegPlaybackEncoder, WebpVariantTransform};
use lumina_queue::{CommandHandler, LapinBrokerChannel, QueueTopology, QueueWorker};
use lumina_worker::{CleanupProcessor, DerivativesProcessor};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "lumina=debug".into()))
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
    let store = Arc::new(PgMediaStore::new(pool));

    let coordinator = Arc::new(DerivativeCoordinator::new(
        config.originals_root.clone(),
        config.derived_root.clone(),
        Arc::new(WebpVariantTransform),
    ));
    let playback = Arc::new(FfmpegPlaybackEncoder::new(config.ffmpeg_path.clone()));

    let derivatives: Arc<dyn CommandHandler> = Arc::new(DerivativesProcessor::new(
        store.clone(),
        coordinator,
        playback,
        config.originals_root.clone(),
        config.derived_root.clone(),
    ));
    let cleanup: Arc<dyn CommandHandler> = Arc::new(CleanupProcessor::new(
        store.clone(),
        config.originals_root.clone(),
        config.derived_root.clone(),
    ));

    // media.process and media.derivatives.generate share the processor;
    // media.cleanup executes scheduled hard deletes.
    let consumers = [
        (config.media_process_queue.clone(), derivatives.clone()),
        (config.media_derivatives_queue.clone(), derivatives),
        (config.media_cleanup_queue.clone(), cleanup),
    ];

    let mut tasks = Vec::new();
    for (queue_name, handler) in consumers {
        let channel = Arc::new(
            LapinBrokerChannel::connect(&config.amqp_url)
                .await
                .with_context(|| format!("connect broker channel for {}", queue_name))?,
        );
        let topology = QueueTopology::new(
            config.amqp_exchange.clone(),
            queue_name.clone(),
            config.amqp_queue_prefix.clone(),
        );
        let worker = QueueWorker::new(channel, topology, handler);
        tasks.push(tokio::spawn(async move {
            if let Err(err) = worker.run().await {
                tracing::error!(queue = %queue_name, error = %err, "Consumer exited");
            }
        }));
    }

    tracing::info!("Worker started");
    for task in tasks {
        task.await.context("consumer task join")?;
    }
    Ok(())
}
