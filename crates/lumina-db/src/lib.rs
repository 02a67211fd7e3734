//! Relational store access for the media library.
//!
//! Queries are exposed as an explicit trait with one typed method per query,
//! so callers never branch on SQL shapes and tests can substitute an
//! in-memory store.

pub mod media;
pub mod store;

pub use media::PgMediaStore;
pub use store::{MediaPatch, MediaStore, MetadataUpdate, TimelineFilter};
