use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActorId, AdmissionStatus, BatchId, CandidateIdentity, CandidateProfile, FormResponse,
    FormTemplate, InstanceId, SectorId, StepId, StepStatus, TemplateId,
};
use super::sequence::{SequenceError, WorkflowStepDefinition};

/// Runtime state of one step inside one admission instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionStepState {
    pub step_id: StepId,
    pub step_name: String,
    pub sector: SectorId,
    pub required: bool,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<ActorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub order: u32,
}

impl AdmissionStepState {
    fn from_definition(definition: &WorkflowStepDefinition) -> Self {
        Self {
            step_id: definition.id.clone(),
            step_name: definition.name.clone(),
            sector: definition.sector.clone(),
            required: definition.required,
            status: StepStatus::Pending,
            approved_by: None,
            approved_at: None,
            notes: None,
            rejected_by: None,
            rejection_reason: None,
            order: definition.order,
        }
    }

    fn mark_approved(&mut self, approver: &ActorId, notes: Option<String>, at: DateTime<Utc>) {
        self.status = StepStatus::Approved;
        self.approved_by = Some(approver.clone());
        self.approved_at = Some(at);
        self.notes = notes.filter(|value| !value.trim().is_empty());
        self.rejected_by = None;
        self.rejection_reason = None;
    }

    fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.approved_by = None;
        self.approved_at = None;
        self.notes = None;
        self.rejected_by = None;
        self.rejection_reason = None;
    }
}

/// Transition failures; the instance is untouched whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} an admission that is {status} (current step is {step_status})")]
    InvalidTransition {
        action: &'static str,
        status: AdmissionStatus,
        step_status: StepStatus,
    },
    #[error("rejection reason must not be blank")]
    EmptyRejectionReason,
    #[error("admission is already at its first step")]
    NothingToRewind,
}

/// One candidate's run through a copied step sequence.
///
/// Step state, pointer, status and version only change through the
/// transition methods; the serialized form is [`InstanceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "InstanceRecord", into = "InstanceRecord")]
pub struct AdmissionInstance {
    pub id: InstanceId,
    pub batch_id: BatchId,
    pub candidate: CandidateIdentity,
    pub position: String,
    pub department: String,
    pub template_id: TemplateId,
    pub template_name: String,
    pub form_responses: Vec<FormResponse>,
    steps: Vec<AdmissionStepState>,
    current_step_index: usize,
    status: AdmissionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    version: u64,
}

/// Flat persistence/transport shape of an [`AdmissionInstance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub batch_id: BatchId,
    pub candidate: CandidateIdentity,
    pub position: String,
    pub department: String,
    pub template_id: TemplateId,
    pub template_name: String,
    #[serde(default)]
    pub form_responses: Vec<FormResponse>,
    pub steps: Vec<AdmissionStepState>,
    pub current_step_index: usize,
    pub status: AdmissionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstanceRecordError {
    #[error("admission record has no steps")]
    NoSteps,
    #[error("current step index {index} is outside {len} steps")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("step {index} is {found} but the record requires {expected}")]
    InconsistentStep {
        index: usize,
        expected: StepStatus,
        found: StepStatus,
    },
    #[error("record status {found} does not match its steps ({expected})")]
    InconsistentStatus {
        expected: AdmissionStatus,
        found: AdmissionStatus,
    },
}

impl TryFrom<InstanceRecord> for AdmissionInstance {
    type Error = InstanceRecordError;

    fn try_from(record: InstanceRecord) -> Result<Self, Self::Error> {
        let len = record.steps.len();
        if len == 0 {
            return Err(InstanceRecordError::NoSteps);
        }
        let index = record.current_step_index;
        if index >= len {
            return Err(InstanceRecordError::IndexOutOfRange { index, len });
        }

        for (position, step) in record.steps.iter().enumerate() {
            let expected = if position < index {
                StepStatus::Approved
            } else if position > index {
                StepStatus::Pending
            } else {
                match record.status {
                    AdmissionStatus::InProgress => StepStatus::Pending,
                    AdmissionStatus::Completed => StepStatus::Approved,
                    AdmissionStatus::Rejected => StepStatus::Rejected,
                }
            };
            if step.status != expected {
                return Err(InstanceRecordError::InconsistentStep {
                    index: position,
                    expected,
                    found: step.status,
                });
            }
        }

        let mut instance = Self {
            id: record.id,
            batch_id: record.batch_id,
            candidate: record.candidate,
            position: record.position,
            department: record.department,
            template_id: record.template_id,
            template_name: record.template_name,
            form_responses: record.form_responses,
            steps: record.steps,
            current_step_index: index,
            status: record.status,
            created_at: record.created_at,
            last_activity: record.last_activity,
            version: record.version,
        };
        instance.settle_status();
        if instance.status != record.status {
            return Err(InstanceRecordError::InconsistentStatus {
                expected: instance.status,
                found: record.status,
            });
        }

        Ok(instance)
    }
}

impl From<AdmissionInstance> for InstanceRecord {
    fn from(instance: AdmissionInstance) -> Self {
        Self {
            id: instance.id,
            batch_id: instance.batch_id,
            candidate: instance.candidate,
            position: instance.position,
            department: instance.department,
            template_id: instance.template_id,
            template_name: instance.template_name,
            form_responses: instance.form_responses,
            steps: instance.steps,
            current_step_index: instance.current_step_index,
            status: instance.status,
            created_at: instance.created_at,
            last_activity: instance.last_activity,
            version: instance.version,
        }
    }
}

/// Flat summary used by listings and status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionStatusView {
    pub instance_id: InstanceId,
    pub candidate_name: String,
    pub position: String,
    pub status: &'static str,
    pub current_step: String,
    pub current_sector: SectorId,
    pub progress_percent: u8,
    pub version: u64,
}

impl AdmissionInstance {
    /// Enroll a candidate: the template's steps are copied, all pending.
    pub fn enroll(
        id: InstanceId,
        batch_id: BatchId,
        template: &FormTemplate,
        candidate: &CandidateProfile,
        at: DateTime<Utc>,
    ) -> Result<Self, SequenceError> {
        if template.steps.is_empty() {
            return Err(SequenceError::EmptySequence);
        }

        let steps = template
            .steps
            .steps()
            .iter()
            .map(AdmissionStepState::from_definition)
            .collect();

        let department = candidate
            .department
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| template.department.clone());

        Ok(Self {
            id,
            batch_id,
            candidate: CandidateIdentity {
                candidate_id: candidate.id.clone(),
                name: candidate.full_name.clone(),
                email: candidate.email.clone(),
                phone: candidate.phone.clone(),
            },
            position: candidate.job_title.clone(),
            department,
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            form_responses: candidate.form_responses.clone(),
            steps,
            current_step_index: 0,
            status: AdmissionStatus::InProgress,
            created_at: at,
            last_activity: at,
            version: 1,
        })
    }

    pub fn steps(&self) -> &[AdmissionStepState] {
        &self.steps
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn current_step(&self) -> &AdmissionStepState {
        &self.steps[self.current_step_index]
    }

    pub fn status(&self) -> AdmissionStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Share of the checklist reached, counting the current step.
    pub fn progress_percent(&self) -> u8 {
        if self.status == AdmissionStatus::Completed {
            return 100;
        }
        let reached = (self.current_step_index + 1) as f64;
        let total = self.steps.len() as f64;
        (reached / total * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Approve the current step and advance, completing on the last one.
    pub fn approve(
        &mut self,
        approver: &ActorId,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_open("approve")?;
        if self.current_step().status != StepStatus::Pending {
            return Err(self.invalid("approve"));
        }

        self.steps[self.current_step_index].mark_approved(approver, notes, at);
        self.advance_pointer();
        self.touch(at);
        Ok(())
    }

    /// Reject the current step; the whole admission becomes rejected.
    pub fn reject(
        &mut self,
        rejected_by: &ActorId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_open("reject")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TransitionError::EmptyRejectionReason);
        }

        let step = &mut self.steps[self.current_step_index];
        step.status = StepStatus::Rejected;
        step.rejected_by = Some(rejected_by.clone());
        step.rejection_reason = Some(reason.to_string());
        self.settle_status();
        self.touch(at);
        Ok(())
    }

    /// Go back one step.
    ///
    /// In progress: the pointer moves to the previous step and that step plus
    /// every later one return to pending. Completed or rejected: the decided
    /// current step is reopened instead, which also reopens the admission.
    /// Terminal instances keep their pointer on the step that was decided, so
    /// reopening that step is the single step back; moving the pointer too
    /// would also discard the previous sector's approval.
    pub fn rewind(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        let target = match self.status {
            AdmissionStatus::InProgress => self
                .current_step_index
                .checked_sub(1)
                .ok_or(TransitionError::NothingToRewind)?,
            AdmissionStatus::Completed | AdmissionStatus::Rejected => self.current_step_index,
        };

        for step in &mut self.steps[target..] {
            step.reset();
        }
        self.current_step_index = target;
        self.settle_status();
        self.touch(at);
        Ok(())
    }

    /// Approve the current step regardless of its sub-state, overriding a
    /// rejection. Authorization is the caller's concern.
    pub fn force_advance(
        &mut self,
        approver: &ActorId,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status == AdmissionStatus::Completed {
            return Err(self.invalid("advance"));
        }

        self.steps[self.current_step_index].mark_approved(approver, None, at);
        self.advance_pointer();
        self.touch(at);
        Ok(())
    }

    pub fn status_view(&self) -> AdmissionStatusView {
        let current = self.current_step();
        AdmissionStatusView {
            instance_id: self.id.clone(),
            candidate_name: self.candidate.name.clone(),
            position: self.position.clone(),
            status: self.status.label(),
            current_step: current.step_name.clone(),
            current_sector: current.sector.clone(),
            progress_percent: self.progress_percent(),
            version: self.version,
        }
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> TransitionError {
        TransitionError::InvalidTransition {
            action,
            status: self.status,
            step_status: self.current_step().status,
        }
    }

    fn advance_pointer(&mut self) {
        if self.current_step_index + 1 < self.steps.len() {
            self.current_step_index += 1;
        }
        self.settle_status();
    }

    // completed iff last step approved, rejected iff any step rejected
    fn settle_status(&mut self) {
        self.status = if self
            .steps
            .iter()
            .any(|step| step.status == StepStatus::Rejected)
        {
            AdmissionStatus::Rejected
        } else if self
            .steps
            .last()
            .is_some_and(|step| step.status == StepStatus::Approved)
        {
            AdmissionStatus::Completed
        } else {
            AdmissionStatus::InProgress
        };
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_activity = at;
        self.version += 1;
    }
}
