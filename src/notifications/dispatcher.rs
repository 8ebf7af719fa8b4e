use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, SendTimeoutError};
use tracing::{debug, error, info, warn};

use super::models::NotificationEvent;
use super::senders::{Notifier, SenderError};
use crate::models::Track;

/// Buffered notification events per track between the track loops and delivery.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Per-track bounds on a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTimeouts {
    pub liveness: Duration,
    pub content: Duration,
}

impl Default for DispatchTimeouts {
    fn default() -> Self {
        Self {
            liveness: Duration::from_secs(10),
            content: Duration::from_secs(30),
        }
    }
}

impl DispatchTimeouts {
    pub fn for_track(&self, track: Track) -> Duration {
        match track {
            Track::Liveness => self.liveness,
            Track::Content => self.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
    TimedOut,
}

/// Publishing half handed to the track loops. Each track has its own queue,
/// so a backlog on one track never delays the other.
#[derive(Debug, Clone)]
pub struct EventSender {
    liveness: mpsc::Sender<NotificationEvent>,
    content: mpsc::Sender<NotificationEvent>,
}

impl EventSender {
    pub fn new(
        liveness: mpsc::Sender<NotificationEvent>,
        content: mpsc::Sender<NotificationEvent>,
    ) -> Self {
        Self { liveness, content }
    }

    fn lane(&self, track: Track) -> &mpsc::Sender<NotificationEvent> {
        match track {
            Track::Liveness => &self.liveness,
            Track::Content => &self.content,
        }
    }

    pub async fn send(&self, event: NotificationEvent) -> Result<(), SendError<NotificationEvent>> {
        self.lane(event.track()).send(event).await
    }

    pub async fn send_timeout(
        &self,
        event: NotificationEvent,
        timeout: Duration,
    ) -> Result<(), SendTimeoutError<NotificationEvent>> {
        self.lane(event.track()).send_timeout(event, timeout).await
    }
}

struct Delivery {
    notifier: Arc<dyn Notifier>,
    timeouts: DispatchTimeouts,
}

impl Delivery {
    async fn drain(&self, track: Track, mut receiver: mpsc::Receiver<NotificationEvent>) {
        while let Some(event) = receiver.recv().await {
            self.deliver(&event).await;
        }
        debug!(track = %track, "Notification lane drained.");
    }

    async fn deliver(&self, event: &NotificationEvent) -> DeliveryOutcome {
        let track = event.track();
        let limit = self.timeouts.for_track(track);

        match tokio::time::timeout(limit, self.send(event)).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(e)) => {
                error!(subject_id = %event.subject_id(), track = %track, error = %e, "Failed to deliver notification.");
                DeliveryOutcome::Failed
            }
            Err(_) => {
                warn!(
                    subject_id = %event.subject_id(),
                    track = %track,
                    timeout_secs = limit.as_secs(),
                    "Notification delivery timed out."
                );
                DeliveryOutcome::TimedOut
            }
        }
    }

    async fn send(&self, event: &NotificationEvent) -> Result<(), SenderError> {
        match event {
            NotificationEvent::Liveness {
                subject_id,
                status,
                dwell_millis,
            } => {
                self.notifier
                    .on_liveness_transition(subject_id, *status, *dwell_millis)
                    .await
            }
            NotificationEvent::Content { subject_id, change } => {
                self.notifier.on_content_change(subject_id, change).await
            }
        }
    }
}

/// Receives transition events from the track loops and hands them to the
/// notifier, one at a time per track. Delivery is best-effort: a failed or
/// hung send is logged and the next event of that track is processed.
pub struct NotificationDispatcher {
    liveness_receiver: mpsc::Receiver<NotificationEvent>,
    content_receiver: mpsc::Receiver<NotificationEvent>,
    delivery: Delivery,
}

impl NotificationDispatcher {
    /// Creates the dispatcher and the sender half the track loops publish to.
    pub fn new(notifier: Arc<dyn Notifier>, timeouts: DispatchTimeouts) -> (Self, EventSender) {
        let (liveness_sender, liveness_receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (content_sender, content_receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let dispatcher = Self {
            liveness_receiver,
            content_receiver,
            delivery: Delivery { notifier, timeouts },
        };
        (dispatcher, EventSender::new(liveness_sender, content_sender))
    }

    /// Runs until every sender has been dropped.
    pub async fn run(self) {
        info!("Notification dispatcher started.");
        let Self {
            liveness_receiver,
            content_receiver,
            delivery,
        } = self;
        tokio::join!(
            delivery.drain(Track::Liveness, liveness_receiver),
            delivery.drain(Track::Content, content_receiver),
        );
        info!("Notification dispatcher stopped: all event senders closed.");
    }

    pub async fn deliver(&self, event: &NotificationEvent) -> DeliveryOutcome {
        self.delivery.deliver(event).await
    }
}
