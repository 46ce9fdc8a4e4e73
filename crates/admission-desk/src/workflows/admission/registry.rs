use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::access::is_visible;
use super::domain::{Actor, AdmissionStatus, BatchId, CandidateProfile, FormTemplate, InstanceId};
use super::instance::AdmissionInstance;
use super::sequence::SequenceError;

/// Input for creating a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBatch {
    pub name: String,
    pub template: FormTemplate,
    pub candidates: Vec<CandidateProfile>,
    /// Informational only; nothing transitions when it passes.
    pub expires_on: NaiveDate,
}

/// Malformed creation or transition input; nothing is applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("admission batch name must not be blank")]
    BlankBatchName,
    #[error("admission batch needs at least one candidate")]
    NoCandidates,
    #[error("candidate {0} is listed more than once")]
    DuplicateCandidate(String),
    #[error("template {0} has no workflow steps")]
    EmptyTemplate(String),
    #[error("rejection reason must not be blank")]
    BlankRejectionReason,
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

/// Named group of admission instances sharing a template and expiry date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionBatch {
    pub id: BatchId,
    pub name: String,
    pub template: FormTemplate,
    pub expires_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub instances: Vec<AdmissionInstance>,
}

/// Status tallies for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub total: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub rejected: usize,
}

impl AdmissionBatch {
    /// Build a batch, enrolling every candidate against its own copy of the
    /// template's steps.
    pub fn create(id: BatchId, request: NewBatch, at: DateTime<Utc>) -> Result<Self, ValidationError> {
        let NewBatch {
            name,
            template,
            candidates,
            expires_on,
        } = request;

        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::BlankBatchName);
        }
        if candidates.is_empty() {
            return Err(ValidationError::NoCandidates);
        }
        if template.steps.is_empty() {
            return Err(ValidationError::EmptyTemplate(template.id.to_string()));
        }

        let mut seen = BTreeSet::new();
        if let Some(duplicate) = candidates
            .iter()
            .find(|candidate| !seen.insert(candidate.id.clone()))
        {
            return Err(ValidationError::DuplicateCandidate(duplicate.id.to_string()));
        }

        let instances = candidates
            .iter()
            .map(|candidate| {
                let instance_id = InstanceId(format!("{}-{}", id.0, candidate.id.0));
                AdmissionInstance::enroll(instance_id, id.clone(), &template, candidate, at)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            name,
            template,
            expires_on,
            created_at: at,
            instances,
        })
    }

    pub fn instance(&self, instance_id: &InstanceId) -> Option<&AdmissionInstance> {
        self.instances
            .iter()
            .find(|instance| &instance.id == instance_id)
    }

    pub fn instance_mut(&mut self, instance_id: &InstanceId) -> Option<&mut AdmissionInstance> {
        self.instances
            .iter_mut()
            .find(|instance| &instance.id == instance_id)
    }

    pub fn counts(&self) -> BatchCounts {
        self.instances
            .iter()
            .fold(BatchCounts::default(), |mut counts, instance| {
                counts.total += 1;
                match instance.status() {
                    AdmissionStatus::InProgress => counts.in_progress += 1,
                    AdmissionStatus::Completed => counts.completed += 1,
                    AdmissionStatus::Rejected => counts.rejected += 1,
                }
                counts
            })
    }

    /// Copy of the batch holding only the instances the actor may see, or
    /// `None` when there are none (unrestricted actors always get the batch).
    pub fn visible_to(&self, actor: Option<&Actor>) -> Option<AdmissionBatch> {
        let actor_ref = actor?;
        if actor_ref.unrestricted {
            return Some(self.clone());
        }

        let instances: Vec<AdmissionInstance> = self
            .instances
            .iter()
            .filter(|instance| is_visible(actor, instance))
            .cloned()
            .collect();
        if instances.is_empty() {
            return None;
        }

        Some(AdmissionBatch {
            id: self.id.clone(),
            name: self.name.clone(),
            template: self.template.clone(),
            expires_on: self.expires_on,
            created_at: self.created_at,
            instances,
        })
    }
}

/// Batches filtered per actor, newest first.
pub fn visible_batches<'a, I>(actor: Option<&Actor>, batches: I) -> Vec<AdmissionBatch>
where
    I: IntoIterator<Item = &'a AdmissionBatch>,
{
    let mut visible: Vec<AdmissionBatch> = batches
        .into_iter()
        .filter_map(|batch| batch.visible_to(actor))
        .collect();
    visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    visible
}
