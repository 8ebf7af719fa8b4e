use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::schedule::ScheduleEndpoints;

/// One of the two independently scheduled aspects of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Liveness,
    Content,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Liveness => f.write_str("liveness"),
            Track::Content => f.write_str("content"),
        }
    }
}

/// Host and port whose TCP reachability stands in for "power is on".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorTarget {
    pub host: String,
    pub port: u16,
}

impl MonitorTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for MonitorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where a subject's outage schedule comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleSource {
    /// A region/queue pair published by the outage-data repository.
    Region { region: String, group: String },
    /// An arbitrary image URL, watched as-is.
    Image { image_url: String },
}

impl ScheduleSource {
    /// URL whose bytes are hashed to detect a schedule change.
    pub fn watched_url(&self, endpoints: &ScheduleEndpoints) -> String {
        match self {
            ScheduleSource::Region { region, group } => endpoints.image_url(region, group),
            ScheduleSource::Image { image_url } => image_url.clone(),
        }
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            ScheduleSource::Region { group, .. } => Some(group),
            ScheduleSource::Image { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatPreference {
    #[default]
    Image,
    Text,
    Both,
}

impl FormatPreference {
    pub fn wants_image(self) -> bool {
        matches!(self, FormatPreference::Image | FormatPreference::Both)
    }

    pub fn wants_text(self) -> bool {
        matches!(self, FormatPreference::Text | FormatPreference::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivenessStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl LivenessStatus {
    pub fn from_probe(reachable: bool) -> Self {
        if reachable {
            LivenessStatus::Online
        } else {
            LivenessStatus::Offline
        }
    }
}

impl fmt::Display for LivenessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LivenessStatus::Unknown => f.write_str("unknown"),
            LivenessStatus::Online => f.write_str("online"),
            LivenessStatus::Offline => f.write_str("offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LivenessState {
    pub status: LivenessStatus,
    /// Epoch milliseconds of the last actual transition.
    pub last_change_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentState {
    /// Hex SHA-256 of the last payload seen, `None` before the first fetch.
    pub last_content_hash: Option<String>,
}

pub const DEFAULT_REGION: &str = "kyiv";
pub const DEFAULT_GROUP: &str = "3.1";

/// Defaults applied once when a subject is first created or loaded with
/// incomplete settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDefaults {
    pub check_interval_liveness: u64,
    pub check_interval_content: u64,
    pub format_preference: FormatPreference,
    pub region: String,
    pub group: String,
}

impl Default for SubjectDefaults {
    fn default() -> Self {
        Self {
            check_interval_liveness: 30,
            check_interval_content: 60,
            format_preference: FormatPreference::Image,
            region: DEFAULT_REGION.to_string(),
            group: DEFAULT_GROUP.to_string(),
        }
    }
}

impl SubjectDefaults {
    /// A region source, filling whichever half is missing from the defaults.
    pub fn region_source(&self, region: Option<&str>, group: Option<&str>) -> ScheduleSource {
        ScheduleSource::Region {
            region: region.unwrap_or(&self.region).to_string(),
            group: group.unwrap_or(&self.group).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub monitor_target: Option<MonitorTarget>,
    pub schedule_source: Option<ScheduleSource>,
    pub check_interval_liveness: u64,
    pub check_interval_content: u64,
    pub paused_liveness: bool,
    pub paused_content: bool,
    pub format_preference: FormatPreference,
    #[serde(default)]
    pub liveness: LivenessState,
    #[serde(default)]
    pub content: ContentState,
}

impl Subject {
    pub fn new(id: impl Into<String>, defaults: &SubjectDefaults) -> Self {
        Self {
            id: id.into(),
            monitor_target: None,
            schedule_source: None,
            check_interval_liveness: defaults.check_interval_liveness.max(1),
            check_interval_content: defaults.check_interval_content.max(1),
            paused_liveness: false,
            paused_content: false,
            format_preference: defaults.format_preference,
            liveness: LivenessState::default(),
            content: ContentState::default(),
        }
    }

    pub fn check_interval(&self, track: Track) -> Duration {
        let seconds = match track {
            Track::Liveness => self.check_interval_liveness,
            Track::Content => self.check_interval_content,
        };
        Duration::from_secs(seconds.max(1))
    }

    pub fn is_paused(&self, track: Track) -> bool {
        match track {
            Track::Liveness => self.paused_liveness,
            Track::Content => self.paused_content,
        }
    }

    pub fn is_configured(&self, track: Track) -> bool {
        match track {
            Track::Liveness => self.monitor_target.is_some(),
            Track::Content => self.schedule_source.is_some(),
        }
    }

    /// Whether a sweep of `track` should consider this subject at all.
    pub fn is_active(&self, track: Track) -> bool {
        !self.is_paused(track) && self.is_configured(track)
    }
}

/// Partial update applied through [`crate::store::SubjectStore::upsert`].
///
/// `None` leaves a field untouched. The doubly optional target fields use
/// `Some(None)` to clear the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectPatch {
    pub monitor_target: Option<Option<MonitorTarget>>,
    pub schedule_source: Option<Option<ScheduleSource>>,
    pub check_interval_liveness: Option<u64>,
    pub check_interval_content: Option<u64>,
    pub paused_liveness: Option<bool>,
    pub paused_content: Option<bool>,
    pub format_preference: Option<FormatPreference>,
    pub liveness: Option<LivenessState>,
    pub content: Option<ContentState>,
}

impl SubjectPatch {
    pub fn liveness(state: LivenessState) -> Self {
        Self {
            liveness: Some(state),
            ..Self::default()
        }
    }

    pub fn content_hash(hash: impl Into<String>) -> Self {
        Self {
            content: Some(ContentState {
                last_content_hash: Some(hash.into()),
            }),
            ..Self::default()
        }
    }

    pub fn monitor_target(mut self, target: Option<MonitorTarget>) -> Self {
        self.monitor_target = Some(target);
        self
    }

    pub fn schedule_source(mut self, source: Option<ScheduleSource>) -> Self {
        self.schedule_source = Some(source);
        self
    }

    pub fn intervals(mut self, liveness: u64, content: u64) -> Self {
        self.check_interval_liveness = Some(liveness);
        self.check_interval_content = Some(content);
        self
    }

    pub fn paused(mut self, track: Track, paused: bool) -> Self {
        match track {
            Track::Liveness => self.paused_liveness = Some(paused),
            Track::Content => self.paused_content = Some(paused),
        }
        self
    }

    pub fn format_preference(mut self, format: FormatPreference) -> Self {
        self.format_preference = Some(format);
        self
    }

    pub fn apply(self, subject: &mut Subject) {
        if let Some(target) = self.monitor_target {
            subject.monitor_target = target;
        }
        if let Some(source) = self.schedule_source {
            subject.schedule_source = source;
        }
        if let Some(seconds) = self.check_interval_liveness {
            subject.check_interval_liveness = seconds.max(1);
        }
        if let Some(seconds) = self.check_interval_content {
            subject.check_interval_content = seconds.max(1);
        }
        if let Some(paused) = self.paused_liveness {
            subject.paused_liveness = paused;
        }
        if let Some(paused) = self.paused_content {
            subject.paused_content = paused;
        }
        if let Some(format) = self.format_preference {
            subject.format_preference = format;
        }
        if let Some(state) = self.liveness {
            subject.liveness = state;
        }
        if let Some(state) = self.content {
            subject.content = state;
        }
    }
}
