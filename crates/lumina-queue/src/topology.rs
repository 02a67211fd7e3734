//! Queue naming and topology declaration.

use crate::channel::{BrokerChannel, DeadLetter};
use crate::error::QueueError;

/// Names for one logical queue's three-queue topology.
#[derive(Debug, Clone)]
pub struct QueueTopology {
    pub exchange: String,
    pub queue_name: String,
    pub prefix: String,
}

impl QueueTopology {
    pub fn new(
        exchange: impl Into<String>,
        queue_name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            queue_name: queue_name.into(),
            prefix: prefix.into(),
        }
    }

    pub fn main_queue(&self) -> String {
        format!("{}.{}", self.prefix, self.queue_name)
    }

    pub fn retry_queue(&self) -> String {
        format!("{}.retry", self.main_queue())
    }

    pub fn dlq_queue(&self) -> String {
        format!("{}.dlq", self.main_queue())
    }

    /// Declare the exchange, the three queues, and the main-queue binding.
    /// Declarations are idempotent on the broker side; safe to call again.
    pub async fn declare(&self, channel: &dyn BrokerChannel) -> Result<(), QueueError> {
        channel.declare_topic_exchange(&self.exchange).await?;
        channel.declare_durable_queue(&self.main_queue(), None).await?;
        channel
            .declare_durable_queue(
                &self.retry_queue(),
                Some(DeadLetter {
                    exchange: self.exchange.clone(),
                    routing_key: self.queue_name.clone(),
                }),
            )
            .await?;
        channel.declare_durable_queue(&self.dlq_queue(), None).await?;
        channel
            .bind_queue(&self.main_queue(), &self.exchange, &self.queue_name)
            .await?;

        tracing::debug!(
            exchange = %self.exchange,
            main_queue = %self.main_queue(),
            retry_queue = %self.retry_queue(),
            dlq_queue = %self.dlq_queue(),
            "Declared queue topology"
        );
        Ok(())
    }
}
