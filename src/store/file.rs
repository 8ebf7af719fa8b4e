//! JSON file-backed subject store.
//!
//! On-disk layout is an array of single-key objects sorted by id:
//! `[{"-100123": {...}}, {"-100456": {...}}]`. A plain `{ id: {...} }` object
//! is accepted on read. Fields the core does not know about (titles, counters
//! written by the chat front-end) are carried through untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{StoreError, SubjectStore};
use crate::models::{
    ContentState, FormatPreference, LivenessState, LivenessStatus, MonitorTarget, ScheduleSource,
    Subject, SubjectDefaults, SubjectPatch,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format_preference: Option<FormatPreference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monitor_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monitor_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monitor_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    light_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    graphs_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    light_check_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    graph_check_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monitor_last_status: Option<LivenessStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monitor_last_change: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_graph_hash: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl StoredSubject {
    fn to_subject(&self, id: &str, defaults: &SubjectDefaults) -> Subject {
        let monitor_target = match (&self.monitor_host, self.monitor_port) {
            (Some(host), Some(port)) if self.monitor_enabled.unwrap_or(true) => {
                Some(MonitorTarget::new(host.clone(), port))
            }
            _ => None,
        };
        let schedule_source = match (&self.image_url, &self.region, &self.group) {
            (Some(image_url), _, _) => Some(ScheduleSource::Image {
                image_url: image_url.clone(),
            }),
            (None, None, None) => None,
            (None, region, group) => {
                Some(defaults.region_source(region.as_deref(), group.as_deref()))
            }
        };

        Subject {
            id: id.to_string(),
            monitor_target,
            schedule_source,
            check_interval_liveness: self
                .light_check_interval
                .unwrap_or(defaults.check_interval_liveness)
                .max(1),
            check_interval_content: self
                .graph_check_interval
                .unwrap_or(defaults.check_interval_content)
                .max(1),
            paused_liveness: self.light_paused.unwrap_or(false),
            paused_content: self.graphs_paused.unwrap_or(false),
            format_preference: self
                .format_preference
                .unwrap_or(defaults.format_preference),
            liveness: LivenessState {
                status: self.monitor_last_status.unwrap_or_default(),
                last_change_at: self.monitor_last_change,
            },
            content: ContentState {
                last_content_hash: self.last_graph_hash.clone(),
            },
        }
    }

    /// Writes the typed view back, keeping a disabled target's host and port.
    fn absorb(&mut self, subject: &Subject) {
        match &subject.monitor_target {
            Some(target) => {
                self.monitor_host = Some(target.host.clone());
                self.monitor_port = Some(target.port);
                self.monitor_enabled = Some(true);
            }
            None => {
                if self.monitor_host.is_some() {
                    self.monitor_enabled = Some(false);
                }
            }
        }
        match &subject.schedule_source {
            Some(ScheduleSource::Image { image_url }) => {
                self.image_url = Some(image_url.clone());
            }
            Some(ScheduleSource::Region { region, group }) => {
                self.image_url = None;
                self.region = Some(region.clone());
                self.group = Some(group.clone());
            }
            None => {
                self.image_url = None;
                self.region = None;
                self.group = None;
            }
        }
        self.light_check_interval = Some(subject.check_interval_liveness);
        self.graph_check_interval = Some(subject.check_interval_content);
        self.light_paused = Some(subject.paused_liveness);
        self.graphs_paused = Some(subject.paused_content);
        self.format_preference = Some(subject.format_preference);
        self.monitor_last_status = match subject.liveness.status {
            LivenessStatus::Unknown => None,
            status => Some(status),
        };
        self.monitor_last_change = subject.liveness.last_change_at;
        self.last_graph_hash = subject.content.last_content_hash.clone();
    }
}

pub struct JsonFileStore {
    path: PathBuf,
    defaults: SubjectDefaults,
    // One writer at a time for the whole file.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, defaults: SubjectDefaults) -> Self {
        Self {
            path: path.into(),
            defaults,
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, StoredSubject>, StoreError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path).await?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut subjects = BTreeMap::new();
        match serde_json::from_str::<Value>(&contents)? {
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(entry) = item {
                        for (id, fields) in entry {
                            subjects.insert(id, serde_json::from_value(fields)?);
                        }
                    }
                }
            }
            Value::Object(entry) => {
                for (id, fields) in entry {
                    subjects.insert(id, serde_json::from_value(fields)?);
                }
            }
            _ => debug!(path = ?self.path, "Store file holds neither an array nor an object."),
        }
        Ok(subjects)
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn write_all(&self, subjects: &BTreeMap<String, StoredSubject>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let entries: Vec<Value> = subjects
            .iter()
            .map(|(id, stored)| {
                let mut entry = Map::new();
                entry.insert(id.clone(), serde_json::to_value(stored)?);
                Ok(Value::Object(entry))
            })
            .collect::<Result<_, serde_json::Error>>()?;

        let mut json = serde_json::to_string_pretty(&entries)?;
        json.push('\n');
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn patch(
        &self,
        id: &str,
        patch: SubjectPatch,
        create: bool,
    ) -> Result<Subject, StoreError> {
        let _guard = self.lock.lock().await;
        let mut subjects = self.read_all().await?;
        if !create && !subjects.contains_key(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let stored = subjects.entry(id.to_string()).or_default();
        let mut subject = stored.to_subject(id, &self.defaults);
        patch.apply(&mut subject);
        stored.absorb(&subject);
        self.write_all(&subjects).await?;
        Ok(subject)
    }
}

#[async_trait]
impl SubjectStore for JsonFileStore {
    async fn get(&self, id: &str) -> Result<Option<Subject>, StoreError> {
        let _guard = self.lock.lock().await;
        let subjects = self.read_all().await?;
        Ok(subjects
            .get(id)
            .map(|stored| stored.to_subject(id, &self.defaults)))
    }

    async fn upsert(&self, id: &str, patch: SubjectPatch) -> Result<Subject, StoreError> {
        self.patch(id, patch, true).await
    }

    async fn update(&self, id: &str, patch: SubjectPatch) -> Result<Subject, StoreError> {
        self.patch(id, patch, false).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut subjects = self.read_all().await?;
        if subjects.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.write_all(&subjects).await
    }

    async fn list_all(&self) -> Result<Vec<Subject>, StoreError> {
        let _guard = self.lock.lock().await;
        let subjects = self.read_all().await?;
        Ok(subjects
            .iter()
            .map(|(id, stored)| stored.to_subject(id, &self.defaults))
            .collect())
    }
}
