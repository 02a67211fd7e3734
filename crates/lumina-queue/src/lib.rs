//! Durable command queue over AMQP.
//!
//! Each logical queue `Q` under prefix `P` is realized as a three-queue
//! topology on one topic exchange `E`: the durable main queue `P.Q` bound to
//! `E` by routing key `Q`, a durable retry queue `P.Q.retry` that dead-letters
//! expired messages back through `E` (scheduled delivery without polling), and
//! a durable dead-letter queue `P.Q.dlq` where exhausted messages come to
//! rest.
//!
//! Publishing runs in confirm mode: a publish is not durable until the broker
//! acknowledges it, and a failed confirmation propagates to the caller. The
//! adapter does not reconnect transparently; connection loss surfaces on the
//! next operation and retrying is the caller's responsibility.

pub mod adapter;
pub mod channel;
pub mod consumer;
pub mod error;
pub mod topology;

pub use adapter::{EnqueuedJob, JobPublisher, JobQueue, PublishOptions};
pub use channel::{BrokerChannel, DeadLetter, LapinBrokerChannel, MessageProperties};
pub use consumer::{CommandHandler, Job, QueueWorker};
pub use error::QueueError;
pub use topology::QueueTopology;

/// Default number of delivery attempts before a message is parked in the DLQ.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 5;

/// Default base backoff between consumer-side retries, in milliseconds.
pub const DEFAULT_BACKOFF_DELAY_MS: i64 = 3000;
