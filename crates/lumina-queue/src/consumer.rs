//! Explicit-ack consumer loop with consumer-side retry routing.
//!
//! The broker schedules retries (TTL dead-lettering) but does not count
//! attempts; `attemptsMade` is enforced here. A failed delivery is republished
//! to the retry queue with an exponential per-message TTL until its attempts
//! are exhausted, at which point it is parked in the DLQ. Delivery order is
//! not FIFO once retries are involved, so handlers must be idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions};
use lapin::types::{AMQPValue, FieldTable};

use crate::channel::{BrokerChannel, LapinBrokerChannel, MessageProperties};
use crate::error::QueueError;
use crate::topology::QueueTopology;
use crate::{DEFAULT_BACKOFF_DELAY_MS, DEFAULT_MAX_ATTEMPTS};

const PREFETCH_COUNT: u16 = 2;

/// One delivered command, as seen by a handler.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Option<String>,
    pub queue_name: String,
    pub payload: serde_json::Value,
    pub attempts_made: i64,
    pub max_attempts: i64,
    pub backoff_delay_ms: i64,
}

/// Processes one command. Errors trigger retry/DLQ routing; the handler is
/// invoked at least once per message and must tolerate redelivery.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> anyhow::Result<()>;
}

/// Where a failed delivery goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { expiration_ms: i64 },
    DeadLetter,
}

/// Exponential backoff for the given completed-attempt count.
pub fn retry_delay_ms(attempts_made: i64, base_delay_ms: i64) -> i64 {
    let attempts = attempts_made.max(1);
    let base = if base_delay_ms > 0 {
        base_delay_ms
    } else {
        DEFAULT_BACKOFF_DELAY_MS
    };
    base.saturating_mul(1_i64 << (attempts - 1).min(32))
}

/// Decide routing for a failed delivery. Returns the updated attempt count
/// and the target; exhaustion routing to the DLQ is explicit consumer logic,
/// never assumed broker behavior.
pub fn failure_decision(
    attempts_made: i64,
    max_attempts: i64,
    backoff_delay_ms: i64,
) -> (i64, RetryDecision) {
    let next_attempts = attempts_made + 1;
    if next_attempts >= max_attempts {
        (next_attempts, RetryDecision::DeadLetter)
    } else {
        (
            next_attempts,
            RetryDecision::Retry {
                expiration_ms: retry_delay_ms(next_attempts, backoff_delay_ms),
            },
        )
    }
}

/// Republish a failed delivery to its retry queue or DLQ with updated headers.
pub async fn route_failed(
    channel: &dyn BrokerChannel,
    topology: &QueueTopology,
    job: &Job,
    payload: &[u8],
) -> Result<RetryDecision, QueueError> {
    let (next_attempts, decision) =
        failure_decision(job.attempts_made, job.max_attempts, job.backoff_delay_ms);

    let properties = MessageProperties {
        message_id: job.id.clone(),
        attempts_made: next_attempts,
        max_attempts: job.max_attempts,
        backoff_delay_ms: job.backoff_delay_ms,
        expiration: match decision {
            RetryDecision::Retry { expiration_ms } => Some(expiration_ms.to_string()),
            RetryDecision::DeadLetter => None,
        },
    };

    let target = match decision {
        RetryDecision::Retry { .. } => topology.retry_queue(),
        RetryDecision::DeadLetter => topology.dlq_queue(),
    };
    channel.send_to_queue(&target, payload, properties).await?;

    Ok(decision)
}

fn header_i64(headers: Option<&FieldTable>, key: &str, fallback: i64) -> i64 {
    headers
        .and_then(|table| table.inner().get(key))
        .and_then(|value| match value {
            AMQPValue::LongLongInt(v) => Some(*v),
            AMQPValue::LongInt(v) => Some(i64::from(*v)),
            AMQPValue::ShortInt(v) => Some(i64::from(*v)),
            AMQPValue::ShortShortInt(v) => Some(i64::from(*v)),
            AMQPValue::LongUInt(v) => Some(i64::from(*v)),
            AMQPValue::ShortUInt(v) => Some(i64::from(*v)),
            AMQPValue::ShortShortUInt(v) => Some(i64::from(*v)),
            _ => None,
        })
        .unwrap_or(fallback)
}

fn job_from_delivery(delivery: &Delivery, queue_name: &str) -> Job {
    let headers = delivery.properties.headers().as_ref();
    Job {
        id: delivery
            .properties
            .message_id()
            .as_ref()
            .map(|id| id.as_str().to_string()),
        queue_name: queue_name.to_string(),
        payload: serde_json::from_slice(&delivery.data)
            .unwrap_or(serde_json::Value::Null),
        attempts_made: header_i64(headers, "attemptsMade", 0),
        max_attempts: header_i64(headers, "maxAttempts", DEFAULT_MAX_ATTEMPTS),
        backoff_delay_ms: header_i64(headers, "backoffDelay", DEFAULT_BACKOFF_DELAY_MS),
    }
}

/// Consumer for one logical queue: declares the topology, then processes
/// deliveries until the channel closes.
pub struct QueueWorker {
    channel: Arc<LapinBrokerChannel>,
    topology: QueueTopology,
    handler: Arc<dyn CommandHandler>,
}

impl QueueWorker {
    pub fn new(
        channel: Arc<LapinBrokerChannel>,
        topology: QueueTopology,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        Self {
            channel,
            topology,
            handler,
        }
    }

    pub async fn run(self) -> Result<(), QueueError> {
        self.topology.declare(self.channel.as_ref()).await?;

        let lapin = self.channel.lapin_channel();
        lapin
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await?;

        let main_queue = self.topology.main_queue();
        let mut consumer = lapin
            .basic_consume(
                &main_queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %main_queue, "Consumer started");

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(err) => {
                    tracing::warn!(queue = %main_queue, error = %err, "Delivery stream error");
                    continue;
                }
            };

            let job = job_from_delivery(&delivery, &self.topology.queue_name);
            match self.handler.handle(&job).await {
                Ok(()) => {
                    tracing::debug!(
                        queue = %main_queue,
                        job_id = job.id.as_deref().unwrap_or(""),
                        attempts = job.attempts_made,
                        "Command completed"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        queue = %main_queue,
                        job_id = job.id.as_deref().unwrap_or(""),
                        attempts = job.attempts_made,
                        error = %err,
                        "Command failed"
                    );
                    let decision =
                        route_failed(self.channel.as_ref(), &self.topology, &job, &delivery.data)
                            .await?;
                    if matches!(decision, RetryDecision::DeadLetter) {
                        tracing::warn!(
                            queue = %main_queue,
                            job_id = job.id.as_deref().unwrap_or(""),
                            "Attempts exhausted; message parked in DLQ"
                        );
                    }
                }
            }
            delivery.ack(BasicAckOptions::default()).await?;
        }

        tracing::info!(queue = %main_queue, "Consumer stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::testing::InMemoryChannel;
    use serde_json::json;

    fn topology() -> QueueTopology {
        QueueTopology::new("lumina.media", "media.derivatives.generate", "worker")
    }

    fn job(attempts_made: i64, max_attempts: i64) -> Job {
        Job {
            id: Some("job-9".into()),
            queue_name: "media.derivatives.generate".into(),
            payload: json!({"mediaId": "m9"}),
            attempts_made,
            max_attempts,
            backoff_delay_ms: 3000,
        }
    }

    #[test]
    fn retry_delay_grows_exponentially() {
        assert_eq!(retry_delay_ms(1, 3000), 3000);
        assert_eq!(retry_delay_ms(2, 3000), 6000);
        assert_eq!(retry_delay_ms(3, 3000), 12000);
        // Non-positive inputs fall back to safe defaults
        assert_eq!(retry_delay_ms(0, 3000), 3000);
        assert_eq!(retry_delay_ms(1, 0), 3000);
    }

    #[test]
    fn failure_decision_retries_until_exhausted() {
        assert_eq!(
            failure_decision(0, 5, 3000),
            (1, RetryDecision::Retry { expiration_ms: 3000 })
        );
        assert_eq!(
            failure_decision(3, 5, 3000),
            (4, RetryDecision::Retry { expiration_ms: 24000 })
        );
        assert_eq!(failure_decision(4, 5, 3000), (5, RetryDecision::DeadLetter));
        assert_eq!(failure_decision(7, 5, 3000), (8, RetryDecision::DeadLetter));
    }

    #[tokio::test]
    async fn failed_delivery_is_republished_to_retry_queue() {
        let channel = InMemoryChannel::default();
        let job = job(0, 5);

        let decision = route_failed(&channel, &topology(), &job, b"{}")
            .await
            .unwrap();
        assert_eq!(decision, RetryDecision::Retry { expiration_ms: 3000 });

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, "worker.media.derivatives.generate.retry");
        assert_eq!(sent[0].properties.attempts_made, 1);
        assert_eq!(sent[0].properties.max_attempts, 5);
        assert_eq!(sent[0].properties.expiration.as_deref(), Some("3000"));
        assert_eq!(sent[0].properties.message_id.as_deref(), Some("job-9"));
    }

    #[tokio::test]
    async fn exhausted_delivery_is_parked_in_dlq() {
        let channel = InMemoryChannel::default();
        let job = job(4, 5);

        let decision = route_failed(&channel, &topology(), &job, b"{}")
            .await
            .unwrap();
        assert_eq!(decision, RetryDecision::DeadLetter);

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, "worker.media.derivatives.generate.dlq");
        assert_eq!(sent[0].properties.attempts_made, 5);
        assert_eq!(sent[0].properties.expiration, None);
    }

    #[test]
    fn header_lookup_handles_integer_widths_and_fallback() {
        let mut table = FieldTable::default();
        table.insert("attemptsMade".into(), AMQPValue::LongInt(3));
        assert_eq!(header_i64(Some(&table), "attemptsMade", 0), 3);
        assert_eq!(header_i64(Some(&table), "maxAttempts", 5), 5);
        assert_eq!(header_i64(None, "attemptsMade", 0), 0);
    }
}
