//! Broker channel abstraction.
//!
//! The publishing surface the adapter needs is small enough to sit behind a
//! trait, which keeps topology and publish semantics testable without a
//! running broker. [`LapinBrokerChannel`] is the production implementation
//! over a confirm-mode AMQP channel.

use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::error::QueueError;

/// Dead-letter target for a queue declaration.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub exchange: String,
    pub routing_key: String,
}

/// Properties attached to a published message.
///
/// `expiration` is the per-message TTL in milliseconds, carried as a string
/// per the wire protocol; it is only set on messages bound for a retry queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub message_id: Option<String>,
    pub attempts_made: i64,
    pub max_attempts: i64,
    pub backoff_delay_ms: i64,
    pub expiration: Option<String>,
}

/// The slice of broker channel behavior the adapter and consumers rely on.
/// Publish methods return once the broker has confirmed the message.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    async fn declare_topic_exchange(&self, name: &str) -> Result<(), QueueError>;

    async fn declare_durable_queue(
        &self,
        name: &str,
        dead_letter: Option<DeadLetter>,
    ) -> Result<(), QueueError>;

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), QueueError>;

    async fn publish_to_exchange(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: MessageProperties,
    ) -> Result<(), QueueError>;

    async fn send_to_queue(
        &self,
        queue: &str,
        payload: &[u8],
        properties: MessageProperties,
    ) -> Result<(), QueueError>;

    async fn close(&self) -> Result<(), QueueError>;
}

/// Confirm-mode AMQP channel over `lapin`.
pub struct LapinBrokerChannel {
    connection: Connection,
    channel: Channel,
}

impl LapinBrokerChannel {
    /// Connect and open a confirm-mode channel. There is no transparent
    /// reconnect: if the connection drops, the next operation fails and the
    /// caller decides whether to rebuild the adapter.
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        Ok(Self {
            connection,
            channel,
        })
    }

    /// The underlying channel, for consumer registration.
    pub fn lapin_channel(&self) -> &Channel {
        &self.channel
    }

    fn basic_properties(properties: &MessageProperties) -> BasicProperties {
        let mut headers = FieldTable::default();
        headers.insert(
            "attemptsMade".into(),
            AMQPValue::LongLongInt(properties.attempts_made),
        );
        headers.insert(
            "maxAttempts".into(),
            AMQPValue::LongLongInt(properties.max_attempts),
        );
        headers.insert(
            "backoffDelay".into(),
            AMQPValue::LongLongInt(properties.backoff_delay_ms),
        );

        // delivery_mode 2 = persistent
        let mut props = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_headers(headers);

        if let Some(message_id) = &properties.message_id {
            props = props.with_message_id(message_id.clone().into());
        }
        if let Some(expiration) = &properties.expiration {
            props = props.with_expiration(expiration.clone().into());
        }
        props
    }

    async fn confirmed_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: MessageProperties,
    ) -> Result<(), QueueError> {
        let confirmation = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                Self::basic_properties(&properties),
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => Err(QueueError::PublishNotConfirmed(format!(
                "broker nacked publish to '{}' with routing key '{}'",
                exchange, routing_key
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl BrokerChannel for LapinBrokerChannel {
    async fn declare_topic_exchange(&self, name: &str) -> Result<(), QueueError> {
        self.channel
            .exchange_declare(
                name,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn declare_durable_queue(
        &self,
        name: &str,
        dead_letter: Option<DeadLetter>,
    ) -> Result<(), QueueError> {
        let mut arguments = FieldTable::default();
        if let Some(dead_letter) = dead_letter {
            arguments.insert(
                "x-dead-letter-exchange".into(),
                AMQPValue::LongString(dead_letter.exchange.into()),
            );
            arguments.insert(
                "x-dead-letter-routing-key".into(),
                AMQPValue::LongString(dead_letter.routing_key.into()),
            );
        }

        self.channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                arguments,
            )
            .await?;
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), QueueError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(())
    }

    async fn publish_to_exchange(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: MessageProperties,
    ) -> Result<(), QueueError> {
        self.confirmed_publish(exchange, routing_key, payload, properties)
            .await
    }

    async fn send_to_queue(
        &self,
        queue: &str,
        payload: &[u8],
        properties: MessageProperties,
    ) -> Result<(), QueueError> {
        // The default exchange routes by queue name
        self.confirmed_publish("", queue, payload, properties).await
    }

    async fn close(&self) -> Result<(), QueueError> {
        if self.channel.status().connected() {
            self.channel.close(200, "closing").await?;
        }
        if self.connection.status().connected() {
            self.connection.close(200, "closing").await?;
        }
        Ok(())
    }
}
