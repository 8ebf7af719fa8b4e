//! Per-subject change detection for both tracks.
//!
//! Baselines live in the subject store, which is authoritative: an external
//! reset or a re-created subject starts over with a silent initialization.
//! A baseline whose store write failed is held in memory until a later write
//! succeeds, so a failing store does not turn into a notification on every
//! sweep. After a restart such a baseline is rebuilt from the store, which
//! costs at most one silent re-initialization.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::models::{LivenessState, LivenessStatus, Subject, SubjectPatch};
use crate::store::{StoreError, SubjectStore};

/// Hex SHA-256 of a payload.
pub fn content_digest(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessTransition {
    pub subject_id: String,
    pub previous: LivenessStatus,
    pub status: LivenessStatus,
    /// Time spent in `previous`, in milliseconds.
    pub dwell_millis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessOutcome {
    /// First observation; recorded without notification.
    Initialized(LivenessStatus),
    Unchanged(LivenessStatus),
    Transition(LivenessTransition),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOutcome {
    /// First successful fetch; recorded without notification.
    Initialized { hash: String },
    Unchanged,
    Changed { previous: String, hash: String },
}

pub struct ChangeDetectionEngine {
    store: Arc<dyn SubjectStore>,
    // Only baselines not yet written to the store.
    liveness: DashMap<String, LivenessState>,
    content: DashMap<String, String>,
}

impl ChangeDetectionEngine {
    pub fn new(store: Arc<dyn SubjectStore>) -> Self {
        Self {
            store,
            liveness: DashMap::new(),
            content: DashMap::new(),
        }
    }

    /// Feeds one probe result for `subject`, observed at `now_ms`.
    pub async fn observe_liveness(
        &self,
        subject: &Subject,
        reachable: bool,
        now_ms: i64,
    ) -> LivenessOutcome {
        let observed = LivenessStatus::from_probe(reachable);
        let baseline = self
            .liveness
            .get(&subject.id)
            .map(|state| state.value().clone())
            .unwrap_or_else(|| subject.liveness.clone());

        if baseline.status == observed {
            debug!(subject_id = %subject.id, status = %observed, "Liveness unchanged.");
            return LivenessOutcome::Unchanged(observed);
        }

        let next = LivenessState {
            status: observed,
            last_change_at: Some(now_ms),
        };
        if self.persist(&subject.id, SubjectPatch::liveness(next.clone())).await {
            self.liveness.remove(&subject.id);
        } else {
            self.liveness.insert(subject.id.clone(), next);
        }

        if baseline.status == LivenessStatus::Unknown {
            info!(subject_id = %subject.id, status = %observed, "Initialized liveness state.");
            return LivenessOutcome::Initialized(observed);
        }

        let dwell_millis = baseline
            .last_change_at
            .map(|since| (now_ms - since).max(0))
            .unwrap_or(0);
        info!(
            subject_id = %subject.id,
            from = %baseline.status,
            to = %observed,
            dwell_millis = dwell_millis,
            "Liveness changed."
        );
        LivenessOutcome::Transition(LivenessTransition {
            subject_id: subject.id.clone(),
            previous: baseline.status,
            status: observed,
            dwell_millis,
        })
    }

    /// Feeds one successfully fetched payload for `subject`.
    pub async fn observe_content(&self, subject: &Subject, payload: &[u8]) -> ContentOutcome {
        let hash = content_digest(payload);
        let baseline = self
            .content
            .get(&subject.id)
            .map(|h| h.value().clone())
            .or_else(|| subject.content.last_content_hash.clone())
            .filter(|h| !h.is_empty());

        if baseline.as_deref() == Some(hash.as_str()) {
            debug!(subject_id = %subject.id, "Content unchanged.");
            return ContentOutcome::Unchanged;
        }

        if self.persist(&subject.id, SubjectPatch::content_hash(hash.clone())).await {
            self.content.remove(&subject.id);
        } else {
            self.content.insert(subject.id.clone(), hash.clone());
        }

        match baseline {
            None => {
                info!(subject_id = %subject.id, hash = %&hash[..16], "Initialized content hash.");
                ContentOutcome::Initialized { hash }
            }
            Some(previous) => {
                info!(subject_id = %subject.id, hash = %&hash[..16], "Content changed.");
                ContentOutcome::Changed { previous, hash }
            }
        }
    }

    /// Drops every in-memory baseline of `subject_id`.
    pub fn forget(&self, subject_id: &str) {
        self.liveness.remove(subject_id);
        self.content.remove(subject_id);
    }

    /// Drops baselines of subjects that are no longer in the store.
    pub fn retain_subjects<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::HashSet<&str> = ids.into_iter().collect();
        self.liveness.retain(|id, _| keep.contains(id.as_str()));
        self.content.retain(|id, _| keep.contains(id.as_str()));
    }

    /// Returns false when the baseline has to be held in memory.
    async fn persist(&self, subject_id: &str, patch: SubjectPatch) -> bool {
        match self.store.update(subject_id, patch).await {
            Ok(_) => true,
            Err(StoreError::NotFound(_)) => {
                debug!(subject_id = %subject_id, "Subject removed during evaluation; dropping its state.");
                self.forget(subject_id);
                true
            }
            Err(e) => {
                error!(subject_id = %subject_id, error = %e, "Failed to persist subject state; keeping it in memory.");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;

    async fn setup(id: &str) -> (Arc<InMemoryStore>, ChangeDetectionEngine, Subject) {
        let store = Arc::new(InMemoryStore::default());
        let subject = store.upsert(id, SubjectPatch::default()).await.unwrap();
        let engine = ChangeDetectionEngine::new(store.clone());
        (store, engine, subject)
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore(InMemoryStore);

    #[async_trait]
    impl SubjectStore for ReadOnlyStore {
        async fn get(&self, id: &str) -> Result<Option<Subject>, StoreError> {
            self.0.get(id).await
        }
        async fn upsert(&self, _id: &str, _patch: SubjectPatch) -> Result<Subject, StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
        async fn update(&self, _id: &str, _patch: SubjectPatch) -> Result<Subject, StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
        async fn delete(&self, id: &str) -> Result<(), StoreError> {
            self.0.delete(id).await
        }
        async fn list_all(&self) -> Result<Vec<Subject>, StoreError> {
            self.0.list_all().await
        }
    }

    #[tokio::test]
    async fn test_notifies_only_when_stored_status_differs() {
        let (store, engine, subject) = setup("s").await;
        let observations = [true, true, false, false, false, true, false, false];
        let mut transitions = Vec::new();

        for (i, reachable) in observations.into_iter().enumerate() {
            let current = store.get("s").await.unwrap().unwrap();
            let outcome = engine
                .observe_liveness(&current, reachable, 1_000 * i as i64)
                .await;
            if let LivenessOutcome::Transition(t) = outcome {
                transitions.push((t.previous, t.status, t.dwell_millis));
            }
        }

        assert_eq!(
            transitions,
            vec![
                (LivenessStatus::Online, LivenessStatus::Offline, 2_000),
                (LivenessStatus::Offline, LivenessStatus::Online, 3_000),
                (LivenessStatus::Online, LivenessStatus::Offline, 1_000),
            ]
        );
        assert_eq!(subject.liveness.status, LivenessStatus::Unknown);
    }

    #[tokio::test]
    async fn test_first_observation_initializes_silently() {
        let (store, engine, subject) = setup("s").await;

        let outcome = engine.observe_liveness(&subject, false, 500).await;

        assert_eq!(outcome, LivenessOutcome::Initialized(LivenessStatus::Offline));
        let stored = store.get("s").await.unwrap().unwrap();
        assert_eq!(stored.liveness.status, LivenessStatus::Offline);
        assert_eq!(stored.liveness.last_change_at, Some(500));
    }

    #[tokio::test]
    async fn test_repeated_status_does_not_touch_last_change() {
        let (store, engine, subject) = setup("s").await;
        engine.observe_liveness(&subject, true, 100).await;
        let current = store.get("s").await.unwrap().unwrap();

        let outcome = engine.observe_liveness(&current, true, 900).await;

        assert_eq!(outcome, LivenessOutcome::Unchanged(LivenessStatus::Online));
        let stored = store.get("s").await.unwrap().unwrap();
        assert_eq!(stored.liveness.last_change_at, Some(100));
    }

    #[tokio::test]
    async fn test_baseline_is_rebuilt_from_store() {
        let (store, engine, subject) = setup("s").await;
        engine.observe_liveness(&subject, true, 100).await;

        // A fresh engine, as after a restart.
        let restarted = ChangeDetectionEngine::new(store.clone());
        let current = store.get("s").await.unwrap().unwrap();
        assert_eq!(
            restarted.observe_liveness(&current, true, 200).await,
            LivenessOutcome::Unchanged(LivenessStatus::Online)
        );
        assert!(matches!(
            restarted.observe_liveness(&current, false, 300).await,
            LivenessOutcome::Transition(LivenessTransition { dwell_millis: 200, .. })
        ));
    }

    #[tokio::test]
    async fn test_same_payload_twice_notifies_once_per_change() {
        let (store, engine, _) = setup("s").await;
        let payloads: [&[u8]; 5] = [b"a", b"a", b"b", b"b", b"a"];
        let mut changes = 0;

        for payload in payloads {
            let current = store.get("s").await.unwrap().unwrap();
            if let ContentOutcome::Changed { .. } = engine.observe_content(&current, payload).await {
                changes += 1;
            }
        }

        assert_eq!(changes, 2);
        let stored = store.get("s").await.unwrap().unwrap();
        assert_eq!(stored.content.last_content_hash, Some(content_digest(b"a")));
    }

    #[tokio::test]
    async fn test_first_payload_initializes() {
        let (_, engine, subject) = setup("s").await;
        let outcome = engine.observe_content(&subject, b"png").await;
        assert_eq!(
            outcome,
            ContentOutcome::Initialized {
                hash: content_digest(b"png")
            }
        );
    }

    #[tokio::test]
    async fn test_store_failure_keeps_memory_baseline() {
        let inner = InMemoryStore::default();
        let subject = inner.upsert("s", SubjectPatch::default()).await.unwrap();
        let engine = ChangeDetectionEngine::new(Arc::new(ReadOnlyStore(inner)));

        assert!(matches!(
            engine.observe_liveness(&subject, true, 0).await,
            LivenessOutcome::Initialized(_)
        ));
        assert!(matches!(
            engine.observe_liveness(&subject, false, 10).await,
            LivenessOutcome::Transition(_)
        ));
        // The stale store copy still says Unknown; memory prevents a repeat.
        assert_eq!(
            engine.observe_liveness(&subject, false, 20).await,
            LivenessOutcome::Unchanged(LivenessStatus::Offline)
        );

        engine.observe_content(&subject, b"x").await;
        assert_eq!(
            engine.observe_content(&subject, b"x").await,
            ContentOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_deleted_subject_state_is_dropped() {
        let (store, engine, subject) = setup("s").await;
        engine.observe_content(&subject, b"x").await;
        store.delete("s").await.unwrap();

        let recreated = store.upsert("s", SubjectPatch::default()).await.unwrap();
        engine.retain_subjects(std::iter::empty::<&str>());

        assert!(matches!(
            engine.observe_content(&recreated, b"y").await,
            ContentOutcome::Initialized { .. }
        ));
    }

    #[tokio::test]
    async fn test_reset_in_store_reinitializes_silently() {
        let (store, engine, subject) = setup("s").await;
        engine.observe_liveness(&subject, true, 100).await;
        engine.observe_content(&subject, b"x").await;

        // An external edit clears the stored baselines.
        store
            .update("s", SubjectPatch::liveness(LivenessState::default()))
            .await
            .unwrap();
        store
            .update(
                "s",
                SubjectPatch {
                    content: Some(Default::default()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let current = store.get("s").await.unwrap().unwrap();

        assert_eq!(
            engine.observe_liveness(&current, false, 200).await,
            LivenessOutcome::Initialized(LivenessStatus::Offline)
        );
        assert!(matches!(
            engine.observe_content(&current, b"y").await,
            ContentOutcome::Initialized { .. }
        ));
    }

    #[tokio::test]
    async fn test_recreated_subject_starts_over_without_pruning() {
        let (store, engine, subject) = setup("s").await;
        engine.observe_liveness(&subject, true, 100).await;
        store.delete("s").await.unwrap();
        let recreated = store.upsert("s", SubjectPatch::default()).await.unwrap();

        assert_eq!(
            engine.observe_liveness(&recreated, false, 200).await,
            LivenessOutcome::Initialized(LivenessStatus::Offline)
        );
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        assert_eq!(
            content_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
