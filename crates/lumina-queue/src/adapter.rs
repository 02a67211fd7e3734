//! Publishing adapter for one logical queue.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::channel::{BrokerChannel, MessageProperties};
use crate::error::QueueError;
use crate::topology::QueueTopology;
use crate::{DEFAULT_BACKOFF_DELAY_MS, DEFAULT_MAX_ATTEMPTS};

/// Options for a single enqueue.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Broker message id; stable ids deduplicate repeated enqueue attempts.
    pub job_id: Option<String>,
    /// Delivery attempts before the consumer parks the message in the DLQ.
    pub attempts: Option<i64>,
    /// Base delay between consumer-side retries, in milliseconds.
    pub backoff_delay_ms: Option<i64>,
    /// Scheduled delivery delay in milliseconds; `None`/0 publishes immediately.
    pub delay_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueuedJob {
    pub id: Option<String>,
}

/// The enqueue seam the orchestrator depends on.
#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn add(
        &self,
        routing_key: &str,
        payload: serde_json::Value,
        options: PublishOptions,
    ) -> Result<EnqueuedJob, QueueError>;
}

/// Publisher for one logical queue's topology.
///
/// Topology declaration runs lazily on the first publish and exactly once per
/// adapter; `initialize` may also be called eagerly at startup.
pub struct JobQueue {
    channel: Arc<dyn BrokerChannel>,
    topology: QueueTopology,
    initialized: OnceCell<()>,
}

impl JobQueue {
    pub fn new(channel: Arc<dyn BrokerChannel>, topology: QueueTopology) -> Self {
        Self {
            channel,
            topology,
            initialized: OnceCell::new(),
        }
    }

    pub fn topology(&self) -> &QueueTopology {
        &self.topology
    }

    /// Idempotently declare the exchange, queues, and binding.
    pub async fn initialize(&self) -> Result<(), QueueError> {
        self.initialized
            .get_or_try_init(|| self.topology.declare(self.channel.as_ref()))
            .await?;
        Ok(())
    }

    /// Release the channel and connection. Safe to call when already closed.
    pub async fn close(&self) -> Result<(), QueueError> {
        self.channel.close().await
    }
}

#[async_trait]
impl JobPublisher for JobQueue {
    async fn add(
        &self,
        routing_key: &str,
        payload: serde_json::Value,
        options: PublishOptions,
    ) -> Result<EnqueuedJob, QueueError> {
        self.initialize().await?;

        let body = serde_json::to_vec(&payload)?;
        let delay_ms = options.delay_ms.unwrap_or(0);
        let properties = MessageProperties {
            message_id: options.job_id.clone(),
            attempts_made: 0,
            max_attempts: options.attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            backoff_delay_ms: options.backoff_delay_ms.unwrap_or(DEFAULT_BACKOFF_DELAY_MS),
            expiration: (delay_ms > 0).then(|| delay_ms.to_string()),
        };

        if delay_ms > 0 {
            // Scheduled delivery: park on the retry queue until the TTL
            // dead-letters the message back through the exchange.
            self.channel
                .send_to_queue(&self.topology.retry_queue(), &body, properties)
                .await?;
        } else {
            self.channel
                .publish_to_exchange(&self.topology.exchange, routing_key, &body, properties)
                .await?;
        }

        tracing::debug!(
            routing_key = routing_key,
            job_id = options.job_id.as_deref().unwrap_or(""),
            delay_ms = delay_ms,
            "Enqueued command"
        );

        Ok(EnqueuedJob {
            id: options.job_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::InMemoryChannel;
    use serde_json::json;

    fn queue_with(channel: Arc<InMemoryChannel>) -> JobQueue {
        JobQueue::new(
            channel,
            QueueTopology::new("lumina.media", "media.cleanup", "worker"),
        )
    }

    #[tokio::test]
    async fn initialize_declares_topology_once() {
        let channel = Arc::new(InMemoryChannel::default());
        let queue = queue_with(channel.clone());

        queue.initialize().await.unwrap();
        queue.initialize().await.unwrap();

        assert_eq!(*channel.exchanges.lock().unwrap(), vec!["lumina.media"]);

        let queues = channel.queues.lock().unwrap();
        let names: Vec<_> = queues.iter().map(|q| q.name.clone()).collect();
        assert_eq!(
            names,
            [
                "worker.media.cleanup",
                "worker.media.cleanup.retry",
                "worker.media.cleanup.dlq"
            ]
        );

        let retry = queues
            .iter()
            .find(|q| q.name == "worker.media.cleanup.retry")
            .unwrap();
        assert_eq!(retry.dead_letter_exchange.as_deref(), Some("lumina.media"));
        assert_eq!(
            retry.dead_letter_routing_key.as_deref(),
            Some("media.cleanup")
        );

        let bindings = channel.bindings.lock().unwrap();
        assert_eq!(
            *bindings,
            vec![(
                "worker.media.cleanup".to_string(),
                "lumina.media".to_string(),
                "media.cleanup".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn immediate_publish_goes_through_the_exchange() {
        let channel = Arc::new(InMemoryChannel::default());
        let queue = queue_with(channel.clone());

        let job = queue
            .add(
                "media.cleanup",
                json!({"mediaId": "m1"}),
                PublishOptions {
                    job_id: Some("job-1".into()),
                    attempts: Some(7),
                    backoff_delay_ms: Some(4000),
                    delay_ms: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(job.id.as_deref(), Some("job-1"));
        assert!(channel.sent.lock().unwrap().is_empty());

        let published = channel.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let message = &published[0];
        assert_eq!(message.target, "lumina.media");
        assert_eq!(message.routing_key.as_deref(), Some("media.cleanup"));
        assert_eq!(message.properties.message_id.as_deref(), Some("job-1"));
        assert_eq!(message.properties.attempts_made, 0);
        assert_eq!(message.properties.max_attempts, 7);
        assert_eq!(message.properties.backoff_delay_ms, 4000);
        assert_eq!(message.properties.expiration, None);
    }

    #[tokio::test]
    async fn delayed_publish_goes_to_the_retry_queue_with_ttl() {
        let channel = Arc::new(InMemoryChannel::default());
        let queue = queue_with(channel.clone());

        queue
            .add(
                "media.cleanup",
                json!({"mediaId": "m2"}),
                PublishOptions {
                    job_id: Some("job-2".into()),
                    delay_ms: Some(60000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(channel.published.lock().unwrap().is_empty());

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let message = &sent[0];
        assert_eq!(message.target, "worker.media.cleanup.retry");
        assert_eq!(message.properties.expiration.as_deref(), Some("60000"));
        assert_eq!(message.properties.attempts_made, 0);
        assert_eq!(message.properties.max_attempts, 5);
        assert_eq!(message.properties.backoff_delay_ms, 3000);
    }

    #[tokio::test]
    async fn defaults_apply_when_options_are_empty() {
        let channel = Arc::new(InMemoryChannel::default());
        let queue = queue_with(channel.clone());

        let job = queue
            .add("media.cleanup", json!({}), PublishOptions::default())
            .await
            .unwrap();

        assert_eq!(job.id, None);
        let published = channel.published.lock().unwrap();
        assert_eq!(published[0].properties.max_attempts, 5);
        assert_eq!(published[0].properties.backoff_delay_ms, 3000);
        assert_eq!(published[0].properties.message_id, None);
    }

    #[tokio::test]
    async fn publish_failure_propagates_to_the_caller() {
        let channel = Arc::new(InMemoryChannel::failing());
        let queue = queue_with(channel);

        let result = queue
            .add("media.cleanup", json!({}), PublishOptions::default())
            .await;
        assert!(matches!(result, Err(QueueError::PublishNotConfirmed(_))));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let channel = Arc::new(InMemoryChannel::default());
        let queue = queue_with(channel.clone());
        queue.close().await.unwrap();
        queue.close().await.unwrap();
        assert!(channel.closed.load(std::sync::atomic::Ordering::SeqCst));
    }
}
