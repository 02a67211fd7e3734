//! Configuration module
//!
//! Env-driven configuration for the API and worker services: database,
//! broker, storage roots, timeline paging limits, and trash retention.

use std::env;
use std::path::PathBuf;

const DB_MAX_CONNECTIONS: u32 = 20;
const DB_TIMEOUT_SECS: u64 = 30;
const TIMELINE_DEFAULT_LIMIT: i64 = 24;
const TIMELINE_MAX_LIMIT: i64 = 100;
const TRASH_RETENTION_DAYS: i64 = 30;

fn env_parsed<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn env_or(name: &str, fallback: &str) -> String {
    env::var(name).unwrap_or_else(|_| fallback.to_string())
}

/// Service configuration shared by the API and the worker.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    // Database
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Broker
    pub amqp_url: String,
    pub amqp_exchange: String,
    pub amqp_queue_prefix: String,
    pub media_process_queue: String,
    pub media_derivatives_queue: String,
    pub media_cleanup_queue: String,
    // Storage roots
    pub originals_root: PathBuf,
    pub derived_root: PathBuf,
    // Timeline paging
    pub timeline_default_limit: i64,
    pub timeline_max_limit: i64,
    // Lifecycle
    pub trash_retention_days: i64,
    // External encoders
    pub ffmpeg_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?;
        let amqp_url = env_or("AMQP_URL", "amqp://127.0.0.1:5672");

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            server_port: env_parsed("PORT", 3000),
            environment,
            database_url,
            db_max_connections: env_parsed("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            db_timeout_seconds: env_parsed("DB_TIMEOUT_SECONDS", DB_TIMEOUT_SECS),
            amqp_url,
            amqp_exchange: env_or("AMQP_EXCHANGE", "lumina.media"),
            amqp_queue_prefix: env_or("AMQP_QUEUE_PREFIX", "worker"),
            media_process_queue: env_or("MEDIA_PROCESS_QUEUE_NAME", "media.process"),
            media_derivatives_queue: env_or(
                "MEDIA_DERIVATIVES_QUEUE_NAME",
                "media.derivatives.generate",
            ),
            media_cleanup_queue: env_or("MEDIA_CLEANUP_QUEUE_NAME", "media.cleanup"),
            originals_root: PathBuf::from(env_or(
                "UPLOAD_ORIGINALS_PATH",
                "/data/lumina/originals",
            )),
            derived_root: PathBuf::from(env_or("UPLOAD_DERIVED_PATH", "/data/lumina/derived")),
            timeline_default_limit: env_parsed("TIMELINE_DEFAULT_LIMIT", TIMELINE_DEFAULT_LIMIT),
            timeline_max_limit: env_parsed("TIMELINE_MAX_LIMIT", TIMELINE_MAX_LIMIT),
            trash_retention_days: env_parsed("TRASH_RETENTION_DAYS", TRASH_RETENTION_DAYS),
            ffmpeg_path: env_or("FFMPEG_PATH", "ffmpeg"),
        })
    }

    /// Trash retention as a duration; used to schedule delayed cleanup commands.
    pub fn trash_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.trash_retention_days)
    }

    /// Clamp a caller-supplied page size to the configured window.
    pub fn clamp_timeline_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.timeline_default_limit)
            .clamp(1, self.timeline_max_limit)
    }
}
