use async_trait::async_trait;
use tracing::info;

use super::{Notifier, SenderError};
use crate::models::LivenessStatus;
use crate::notifications::format::format_duration;
use crate::notifications::models::ContentChange;

/// Writes notifications to the log instead of delivering them. Used when no
/// messaging credentials are configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_liveness_transition(
        &self,
        subject_id: &str,
        status: LivenessStatus,
        dwell_millis: i64,
    ) -> Result<(), SenderError> {
        info!(
            subject_id = %subject_id,
            status = %status,
            previous_state_lasted = %format_duration(dwell_millis),
            "Liveness transition (not delivered)."
        );
        Ok(())
    }

    async fn on_content_change(
        &self,
        subject_id: &str,
        change: &ContentChange,
    ) -> Result<(), SenderError> {
        info!(
            subject_id = %subject_id,
            payload_ref = %change.payload_ref,
            text_len = change.rendered_text.len(),
            "Schedule change (not delivered)."
        );
        Ok(())
    }
}
