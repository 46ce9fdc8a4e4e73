use super::domain::{Actor, ActorId, BatchId, InstanceId};
use super::instance::AdmissionInstance;
use super::registry::AdmissionBatch;

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Each call is one atomic read-modify-write; implementations never expose
/// partially applied batches.
pub trait AdmissionRepository: Send + Sync {
    fn insert_batch(&self, batch: AdmissionBatch) -> Result<AdmissionBatch, RepositoryError>;
    /// Remove a batch together with every instance it owns.
    fn delete_batch(&self, id: &BatchId) -> Result<AdmissionBatch, RepositoryError>;
    fn fetch_batch(&self, id: &BatchId) -> Result<Option<AdmissionBatch>, RepositoryError>;
    fn batches(&self) -> Result<Vec<AdmissionBatch>, RepositoryError>;
    fn fetch_instance(&self, id: &InstanceId)
        -> Result<Option<AdmissionInstance>, RepositoryError>;
    /// Replace a stored instance only if its stored version still equals
    /// `expected_version`.
    fn update_instance(
        &self,
        instance: AdmissionInstance,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, stored version is {found}")]
    VersionMismatch { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Authentication collaborator: turns a session identity into an [`Actor`].
pub trait ActorDirectory: Send + Sync {
    fn actor(&self, id: &ActorId) -> Result<Option<Actor>, DirectoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("actor directory unavailable: {0}")]
    Unavailable(String),
}
