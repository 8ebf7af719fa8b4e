//! Persistence contract for subjects and their last-known state.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Subject, SubjectPatch};

pub mod file;
pub mod memory;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Subject not found: {0}")]
    NotFound(String),
}

/// Key-value store of subjects, keyed by subject id.
///
/// Every mutation is a read-modify-write of a single subject performed under
/// the store's own lock, so concurrent patches to different fields of the
/// same subject never lose each other.
#[async_trait]
pub trait SubjectStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Subject>, StoreError>;

    /// Applies `patch`, creating the subject with defaults when missing.
    async fn upsert(&self, id: &str, patch: SubjectPatch) -> Result<Subject, StoreError>;

    /// Applies `patch` to an existing subject only.
    async fn update(&self, id: &str, patch: SubjectPatch) -> Result<Subject, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// All subjects ordered by id.
    async fn list_all(&self) -> Result<Vec<Subject>, StoreError>;
}
