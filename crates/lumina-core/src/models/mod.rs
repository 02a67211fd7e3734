pub mod commands;
pub mod media;

pub use commands::{
    cleanup_job_id, derivatives_job_id, process_job_id, CleanupCommand,
    DerivativesGenerateCommand, MediaProcessCommand,
};
pub use media::{MediaFlags, MediaRecord, MediaStatus, Variant};
