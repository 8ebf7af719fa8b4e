//! Periodic sweeps over all subjects, one long-lived loop per track.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::engine::{ChangeDetectionEngine, ContentOutcome, LivenessOutcome};
use super::fetcher::ContentSource;
use super::liveness::LivenessProbe;
use crate::models::{ScheduleSource, Subject, Track};
use crate::notifications::dispatcher::{DispatchTimeouts, EventSender};
use crate::notifications::models::{ContentChange, NotificationEvent};
use crate::schedule::ScheduleEndpoints;
use crate::schedule::parser::parse_schedule;
use crate::schedule::render::render_schedule_text;
use crate::store::{StoreError, SubjectStore};

/// Shortest sleep between two sweeps of a track.
const MIN_SWEEP_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub endpoints: ScheduleEndpoints,
    /// Pause between two content checks within one sweep.
    pub content_subject_spacing: Duration,
    /// Sleep used when no subject is active on a track.
    pub idle_poll: Duration,
    /// Bounds how long a sweep waits to queue a notification.
    pub dispatch_timeouts: DispatchTimeouts,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            endpoints: ScheduleEndpoints::default(),
            content_subject_spacing: Duration::from_secs(1),
            idle_poll: Duration::from_secs(60),
            dispatch_timeouts: DispatchTimeouts::default(),
        }
    }
}

/// What one sweep of a track did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub track: Track,
    /// Subjects evaluated in this sweep.
    pub checked: usize,
    /// Subjects that are paused or have nothing to check on this track.
    pub skipped: usize,
    /// Active subjects whose interval has not elapsed yet.
    pub not_due: usize,
    pub transitions: usize,
    pub failures: usize,
    /// Time until the next active subject becomes due; `None` when no
    /// subject is active.
    pub next_wake: Option<Duration>,
}

impl SweepReport {
    fn new(track: Track) -> Self {
        Self {
            track,
            checked: 0,
            skipped: 0,
            not_due: 0,
            transitions: 0,
            failures: 0,
            next_wake: None,
        }
    }
}

fn earliest(current: Option<Instant>, candidate: Instant) -> Option<Instant> {
    Some(current.map_or(candidate, |current| current.min(candidate)))
}

pub struct Scheduler {
    store: Arc<dyn SubjectStore>,
    engine: Arc<ChangeDetectionEngine>,
    probe: Arc<dyn LivenessProbe>,
    source: Arc<dyn ContentSource>,
    events: EventSender,
    settings: SchedulerSettings,
    last_checked: DashMap<(Track, String), Instant>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn SubjectStore>,
        engine: Arc<ChangeDetectionEngine>,
        probe: Arc<dyn LivenessProbe>,
        source: Arc<dyn ContentSource>,
        events: EventSender,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            engine,
            probe,
            source,
            events,
            settings,
            last_checked: DashMap::new(),
        }
    }

    /// Drives `track` until the shutdown channel fires or its sender is dropped.
    pub async fn run_loop(self: Arc<Self>, track: Track, mut shutdown_rx: watch::Receiver<()>) {
        info!(track = %track, "Track loop started.");
        loop {
            let pause = match self.run_sweep(track).await {
                Ok(report) => {
                    if report.transitions > 0 || report.failures > 0 {
                        info!(
                            track = %track,
                            checked = report.checked,
                            transitions = report.transitions,
                            failures = report.failures,
                            "Sweep finished."
                        );
                    }
                    report
                        .next_wake
                        .map_or(self.settings.idle_poll, |wake| wake.max(MIN_SWEEP_PAUSE))
                }
                Err(e) => {
                    error!(track = %track, error = %e, "Failed to list subjects.");
                    self.settings.idle_poll
                }
            };
            debug!(track = %track, pause_ms = pause.as_millis() as u64, "Sleeping until next sweep.");

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!(track = %track, "Shutdown signal received, stopping track loop.");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    pub async fn run_sweep(&self, track: Track) -> Result<SweepReport, StoreError> {
        self.run_sweep_at(track, Instant::now()).await
    }

    /// One pass over every subject, starting at `now`.
    ///
    /// The sweep clock advances with real time while subjects are checked, so
    /// each subject is judged and stamped at the moment it is reached.
    /// Only listing the subjects can fail; a failure while checking one
    /// subject is counted in the report and the sweep moves on.
    pub async fn run_sweep_at(&self, track: Track, now: Instant) -> Result<SweepReport, StoreError> {
        let sweep_started = Instant::now();
        let clock = || now + sweep_started.elapsed();

        let subjects = self.store.list_all().await?;
        self.prune_removed(&subjects);

        let mut report = SweepReport::new(track);
        let mut next_due = None;
        for subject in &subjects {
            if !subject.is_active(track) {
                report.skipped += 1;
                continue;
            }

            let interval = subject.check_interval(track);
            let key = (track, subject.id.clone());
            if let Some(last) = self.last_checked.get(&key).map(|entry| *entry.value()) {
                let due_at = last + interval;
                if clock() < due_at {
                    report.not_due += 1;
                    next_due = earliest(next_due, due_at);
                    continue;
                }
            }

            if track == Track::Content
                && report.checked > 0
                && !self.settings.content_subject_spacing.is_zero()
            {
                tokio::time::sleep(self.settings.content_subject_spacing).await;
            }

            let checked_at = clock();
            self.last_checked.insert(key, checked_at);
            next_due = earliest(next_due, checked_at + interval);
            report.checked += 1;
            match track {
                Track::Liveness => self.check_liveness(subject, &mut report).await,
                Track::Content => self.check_content(subject, &mut report).await,
            }
        }

        report.next_wake = next_due.map(|due| due.saturating_duration_since(clock()));
        Ok(report)
    }

    fn prune_removed(&self, subjects: &[Subject]) {
        let ids: HashSet<&str> = subjects.iter().map(|s| s.id.as_str()).collect();
        self.engine.retain_subjects(ids.iter().copied());
        self.last_checked
            .retain(|(_, id), _| ids.contains(id.as_str()));
    }

    async fn check_liveness(&self, subject: &Subject, report: &mut SweepReport) {
        let Some(target) = &subject.monitor_target else {
            return;
        };
        let reachable = self.probe.probe(target).await;
        let now_ms = Utc::now().timestamp_millis();

        if let LivenessOutcome::Transition(transition) =
            self.engine.observe_liveness(subject, reachable, now_ms).await
        {
            report.transitions += 1;
            self.publish(NotificationEvent::Liveness {
                subject_id: transition.subject_id,
                status: transition.status,
                dwell_millis: transition.dwell_millis,
            })
            .await;
        }
    }

    async fn check_content(&self, subject: &Subject, report: &mut SweepReport) {
        let Some(source) = &subject.schedule_source else {
            return;
        };
        let url = source.watched_url(&self.settings.endpoints);
        let payload = match self.source.fetch(&url).await {
            Ok(payload) => payload,
            Err(e) => {
                error!(subject_id = %subject.id, url = %url, error = %e, "Failed to fetch schedule image.");
                report.failures += 1;
                return;
            }
        };

        if let ContentOutcome::Changed { .. } = self.engine.observe_content(subject, &payload).await {
            report.transitions += 1;
            let change = ContentChange {
                payload_ref: cache_busted(&url, Utc::now().timestamp_millis()),
                rendered_text: self.render_text(source).await,
                format_preference: subject.format_preference,
                group: source.group().map(str::to_string),
            };
            self.publish(NotificationEvent::Content {
                subject_id: subject.id.clone(),
                change,
            })
            .await;
        }
    }

    /// Schedule text for a region source; empty when it cannot be produced.
    async fn render_text(&self, source: &ScheduleSource) -> String {
        let ScheduleSource::Region { region, group } = source else {
            return String::new();
        };
        let url = self.settings.endpoints.data_url(region);
        let bytes = match self.source.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(region = %region, error = %e, "Failed to fetch schedule data.");
                return String::new();
            }
        };
        match parse_schedule(&bytes) {
            Ok(schedule) => render_schedule_text(&schedule, group, Utc::now()),
            Err(e) => {
                warn!(region = %region, error = %e, "Malformed schedule data.");
                String::new()
            }
        }
    }

    async fn publish(&self, event: NotificationEvent) {
        let limit = self.settings.dispatch_timeouts.for_track(event.track());
        let subject_id = event.subject_id().to_string();
        if let Err(e) = self.events.send_timeout(event, limit).await {
            warn!(subject_id = %subject_id, error = %e, "Could not queue notification.");
        }
    }
}

fn cache_busted(url: &str, now_ms: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}cb={now_ms}")
}
