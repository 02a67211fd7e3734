//! Library service: HTTP surface over the media store, the derivative
//! coordinator, and the command queues.
//!
//! Handlers stay thin; the decisions that matter (content-serving policy,
//! delete scheduling, trash emptying) live in [`services::library`].

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
