use crate::models::{FormatPreference, LivenessStatus, Track};

/// A detected content change, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    /// Watched image URL with a cache-buster appended.
    pub payload_ref: String,
    /// Rendered schedule text; empty when none could be produced.
    pub rendered_text: String,
    pub format_preference: FormatPreference,
    /// Queue the schedule belongs to, used for fallback captions.
    pub group: Option<String>,
}

/// Message passed from the track loops to the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Liveness {
        subject_id: String,
        status: LivenessStatus,
        dwell_millis: i64,
    },
    Content {
        subject_id: String,
        change: ContentChange,
    },
}

impl NotificationEvent {
    pub fn subject_id(&self) -> &str {
        match self {
            NotificationEvent::Liveness { subject_id, .. }
            | NotificationEvent::Content { subject_id, .. } => subject_id,
        }
    }

    pub fn track(&self) -> Track {
        match self {
            NotificationEvent::Liveness { .. } => Track::Liveness,
            NotificationEvent::Content { .. } => Track::Content,
        }
    }
}
