//! Background consumers for the media pipeline.
//!
//! Three logical queues are consumed: `media.process` and
//! `media.derivatives.generate` share the derivative processor; `media.cleanup`
//! executes scheduled hard deletes. All processors are idempotent — the broker
//! guarantees at-least-once delivery, not exactly-once.

pub mod processors;

pub use processors::cleanup::CleanupProcessor;
pub use processors::derivatives::DerivativesProcessor;
