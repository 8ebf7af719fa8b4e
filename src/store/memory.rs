//! In-memory store for tests and embedders that persist elsewhere.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{StoreError, SubjectStore};
use crate::models::{Subject, SubjectDefaults, SubjectPatch};

pub struct InMemoryStore {
    defaults: SubjectDefaults,
    subjects: Mutex<BTreeMap<String, Subject>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(SubjectDefaults::default())
    }
}

impl InMemoryStore {
    pub fn new(defaults: SubjectDefaults) -> Self {
        Self {
            defaults,
            subjects: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl SubjectStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Subject>, StoreError> {
        Ok(self.subjects.lock().await.get(id).cloned())
    }

    async fn upsert(&self, id: &str, patch: SubjectPatch) -> Result<Subject, StoreError> {
        let mut subjects = self.subjects.lock().await;
        let subject = subjects
            .entry(id.to_string())
            .or_insert_with(|| Subject::new(id, &self.defaults));
        patch.apply(subject);
        Ok(subject.clone())
    }

    async fn update(&self, id: &str, patch: SubjectPatch) -> Result<Subject, StoreError> {
        let mut subjects = self.subjects.lock().await;
        let subject = subjects
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply(subject);
        Ok(subject.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut subjects = self.subjects.lock().await;
        if subjects.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Subject>, StoreError> {
        Ok(self.subjects.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LivenessState, LivenessStatus, MonitorTarget};

    #[tokio::test]
    async fn test_upsert_creates_with_defaults() {
        let store = InMemoryStore::default();
        let subject = store
            .upsert(
                "-1001",
                SubjectPatch::default().monitor_target(Some(MonitorTarget::new("1.2.3.4", 443))),
            )
            .await
            .unwrap();

        assert_eq!(subject.check_interval_liveness, 30);
        assert_eq!(subject.check_interval_content, 60);
        assert_eq!(store.get("-1001").await.unwrap(), Some(subject));
    }

    #[tokio::test]
    async fn test_patches_to_different_fields_are_kept() {
        let store = InMemoryStore::default();
        store
            .upsert("a", SubjectPatch::content_hash("abc"))
            .await
            .unwrap();
        store
            .update(
                "a",
                SubjectPatch::liveness(LivenessState {
                    status: LivenessStatus::Online,
                    last_change_at: Some(5),
                }),
            )
            .await
            .unwrap();

        let subject = store.get("a").await.unwrap().unwrap();
        assert_eq!(subject.content.last_content_hash.as_deref(), Some("abc"));
        assert_eq!(subject.liveness.status, LivenessStatus::Online);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let store = InMemoryStore::default();
        assert!(matches!(
            store.update("nope", SubjectPatch::default()).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let store = InMemoryStore::default();
        for id in ["c", "a", "b"] {
            store.upsert(id, SubjectPatch::default()).await.unwrap();
        }
        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
