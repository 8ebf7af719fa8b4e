use async_trait::async_trait;
use thiserror::Error;

use super::models::ContentChange;
use crate::models::LivenessStatus;

pub mod log;
pub mod telegram;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Delivery side of the monitor. Implementations talk to a messaging API;
/// the monitoring core only ever sees this trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_liveness_transition(
        &self,
        subject_id: &str,
        status: LivenessStatus,
        dwell_millis: i64,
    ) -> Result<(), SenderError>;

    async fn on_content_change(
        &self,
        subject_id: &str,
        change: &ContentChange,
    ) -> Result<(), SenderError>;
}
