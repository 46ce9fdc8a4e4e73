use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::access::{
    can_override, owns_current_step, require_action, require_section, require_visible,
    visible_sections, AccessError,
};
use super::domain::{Actor, ActorId, BatchId, InstanceId, Section};
use super::instance::{AdmissionInstance, TransitionError};
use super::registry::{visible_batches, AdmissionBatch, NewBatch, ValidationError};
use super::repository::{ActorDirectory, AdmissionRepository, DirectoryError, RepositoryError};

/// Body of an approve call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// Service composing the access policy, the registry and the instance state
/// machine over a repository and an actor directory.
pub struct AdmissionService<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
}

static BATCH_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_batch_id() -> BatchId {
    let id = BATCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BatchId(format!("batch-{id:06}"))
}

impl<R, D> AdmissionService<R, D>
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>) -> Self {
        Self {
            repository,
            directory,
        }
    }

    /// Look up the actor behind a session identity.
    pub fn resolve_actor(&self, actor_id: &ActorId) -> Result<Actor, AdmissionServiceError> {
        match self.directory.actor(actor_id)? {
            Some(actor) => Ok(actor),
            None => {
                warn!(actor_id = %actor_id, "unknown actor");
                Err(AccessError::Unauthenticated.into())
            }
        }
    }

    pub fn sections(&self, actor: Option<&Actor>) -> Result<Vec<Section>, AdmissionServiceError> {
        let actor = actor.ok_or(AccessError::Unauthenticated)?;
        Ok(visible_sections(Some(actor)))
    }

    pub fn create_batch(
        &self,
        actor: Option<&Actor>,
        request: NewBatch,
    ) -> Result<AdmissionBatch, AdmissionServiceError> {
        let actor = self.admissions_actor(actor)?;
        let batch = AdmissionBatch::create(next_batch_id(), request, Utc::now()).map_err(|error| {
            warn!(actor_id = %actor.id, %error, "admission batch refused");
            error
        })?;

        let stored = self.repository.insert_batch(batch)?;
        info!(
            batch_id = %stored.id,
            actor_id = %actor.id,
            instances = stored.instances.len(),
            "admission batch created"
        );
        Ok(stored)
    }

    /// Remove a batch and all of its instances. Admins only.
    pub fn delete_batch(
        &self,
        actor: Option<&Actor>,
        batch_id: &BatchId,
    ) -> Result<AdmissionBatch, AdmissionServiceError> {
        let actor = self.admissions_actor(actor)?;
        if !actor.is_admin() {
            warn!(actor_id = %actor.id, batch_id = %batch_id, "batch deletion denied");
            return Err(AccessError::ActionDenied {
                action: "delete",
                instance: batch_id.to_string(),
            }
            .into());
        }

        let removed = self
            .repository
            .delete_batch(batch_id)
            .map_err(|error| match error {
                RepositoryError::NotFound => {
                    AdmissionServiceError::NotFound(format!("admission batch {batch_id}"))
                }
                other => other.into(),
            })?;
        info!(
            batch_id = %removed.id,
            actor_id = %actor.id,
            instances = removed.instances.len(),
            "admission batch deleted"
        );
        Ok(removed)
    }

    /// Batches the actor may see, each trimmed to its visible instances.
    pub fn list_visible(
        &self,
        actor: Option<&Actor>,
    ) -> Result<Vec<AdmissionBatch>, AdmissionServiceError> {
        let actor = self.admissions_actor(actor)?;
        let batches = self.repository.batches()?;
        Ok(visible_batches(Some(actor), &batches))
    }

    /// One batch, trimmed to the instances the actor may see.
    pub fn batch(
        &self,
        actor: Option<&Actor>,
        batch_id: &BatchId,
    ) -> Result<AdmissionBatch, AdmissionServiceError> {
        let actor = self.admissions_actor(actor)?;
        let batch = self
            .repository
            .fetch_batch(batch_id)?
            .ok_or_else(|| AdmissionServiceError::NotFound(format!("admission batch {batch_id}")))?;
        batch
            .visible_to(Some(actor))
            .ok_or_else(|| AccessError::RecordDenied(batch_id.to_string()).into())
    }

    /// Per-candidate lookup with a record-level access check.
    pub fn instance(
        &self,
        actor: Option<&Actor>,
        instance_id: &InstanceId,
    ) -> Result<AdmissionInstance, AdmissionServiceError> {
        let actor = self.admissions_actor(actor)?;
        let instance = self.load(instance_id)?;
        require_visible(Some(actor), &instance)?;
        Ok(instance)
    }

    /// Only a sector user of the current step may decide it. A decided step
    /// still reports `InvalidTransition` to its owner.
    pub fn approve(
        &self,
        actor: Option<&Actor>,
        instance_id: &InstanceId,
        request: ApproveRequest,
    ) -> Result<AdmissionInstance, AdmissionServiceError> {
        let ApproveRequest {
            notes,
            expected_version,
        } = request;
        self.transition(actor, instance_id, expected_version, "approve", |actor, instance| {
            require_action(owns_current_step(Some(actor), instance), "approve", instance)?;
            instance.approve(&actor.id, notes, Utc::now())?;
            Ok(())
        })
    }

    pub fn reject(
        &self,
        actor: Option<&Actor>,
        instance_id: &InstanceId,
        request: RejectRequest,
    ) -> Result<AdmissionInstance, AdmissionServiceError> {
        let RejectRequest {
            reason,
            expected_version,
        } = request;
        self.transition(actor, instance_id, expected_version, "reject", |actor, instance| {
            require_action(owns_current_step(Some(actor), instance), "reject", instance)?;
            instance.reject(&actor.id, &reason, Utc::now())?;
            Ok(())
        })
    }

    /// Administrative correction: step back, see [`AdmissionInstance::rewind`].
    pub fn rewind(
        &self,
        actor: Option<&Actor>,
        instance_id: &InstanceId,
        expected_version: Option<u64>,
    ) -> Result<AdmissionInstance, AdmissionServiceError> {
        self.transition(actor, instance_id, expected_version, "rewind", |actor, instance| {
            require_action(can_override(Some(actor), instance), "rewind", instance)?;
            instance.rewind(Utc::now())?;
            Ok(())
        })
    }

    /// Administrative correction: approve the current step whatever its state.
    pub fn force_advance(
        &self,
        actor: Option<&Actor>,
        instance_id: &InstanceId,
        expected_version: Option<u64>,
    ) -> Result<AdmissionInstance, AdmissionServiceError> {
        self.transition(actor, instance_id, expected_version, "advance", |actor, instance| {
            require_action(can_override(Some(actor), instance), "advance", instance)?;
            instance.force_advance(&actor.id, Utc::now())?;
            Ok(())
        })
    }

    fn admissions_actor<'a>(
        &self,
        actor: Option<&'a Actor>,
    ) -> Result<&'a Actor, AdmissionServiceError> {
        require_section(actor, Section::Admissions).map_err(|error| {
            warn!(%error, "admissions section denied");
            error.into()
        })
    }

    fn load(&self, instance_id: &InstanceId) -> Result<AdmissionInstance, AdmissionServiceError> {
        self.repository
            .fetch_instance(instance_id)?
            .ok_or_else(|| AdmissionServiceError::NotFound(format!("admission {instance_id}")))
    }

    /// Load, authorize, apply and store one transition. Nothing is written
    /// unless every step succeeds.
    fn transition<F>(
        &self,
        actor: Option<&Actor>,
        instance_id: &InstanceId,
        expected_version: Option<u64>,
        action: &'static str,
        apply: F,
    ) -> Result<AdmissionInstance, AdmissionServiceError>
    where
        F: FnOnce(&Actor, &mut AdmissionInstance) -> Result<(), AdmissionServiceError>,
    {
        let actor = self.admissions_actor(actor)?;
        let mut instance = self.load(instance_id)?;
        require_visible(Some(actor), &instance)?;

        let stored_version = instance.version();
        if let Some(expected) = expected_version {
            if expected != stored_version {
                warn!(
                    instance_id = %instance_id,
                    actor_id = %actor.id,
                    expected,
                    found = stored_version,
                    action,
                    "stale admission request"
                );
                return Err(AdmissionServiceError::Conflict {
                    expected,
                    found: stored_version,
                });
            }
        }

        let step_index = instance.current_step_index();
        if let Err(error) = apply(actor, &mut instance) {
            warn!(
                instance_id = %instance_id,
                actor_id = %actor.id,
                step_index,
                action,
                %error,
                "admission transition refused"
            );
            return Err(error);
        }

        self.repository
            .update_instance(instance.clone(), stored_version)?;
        info!(
            instance_id = %instance_id,
            actor_id = %actor.id,
            step_index,
            status = %instance.status(),
            version = instance.version(),
            action,
            "admission transition applied"
        );
        Ok(instance)
    }
}

/// Error raised by the admission service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    InvalidTransition(TransitionError),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    AccessDenied(#[from] AccessError),
    #[error("admission was modified concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl From<TransitionError> for AdmissionServiceError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::EmptyRejectionReason => {
                Self::Validation(ValidationError::BlankRejectionReason)
            }
            other => Self::InvalidTransition(other),
        }
    }
}

impl From<RepositoryError> for AdmissionServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::VersionMismatch { expected, found } => {
                Self::Conflict { expected, found }
            }
            other => Self::Repository(other),
        }
    }
}
