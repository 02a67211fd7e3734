use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Publish was not confirmed by the broker: {0}")]
    PublishNotConfirmed(String),

    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<lapin::Error> for QueueError {
    fn from(err: lapin::Error) -> Self {
        QueueError::Broker(err.to_string())
    }
}
