//! Multi-sector admission workflow: templates hand an ordered step checklist
//! to each enrolled candidate, sectors approve or reject their step in turn,
//! and the access policy decides who sees and acts on what.

pub mod access;
pub mod domain;
pub mod instance;
pub mod registry;
pub mod repository;
pub mod router;
pub mod sequence;
pub mod service;

#[cfg(test)]
mod tests;

pub use access::{
    can_access_section, can_access_section_id, can_act, can_override, is_visible,
    owns_current_step, require_section, require_visible, visible_instances, visible_sections,
    AccessError,
};
pub use domain::{
    parse_permissions, AccessProfile, AccessProfileId, Actor, ActorId, ActorRole,
    AdmissionStatus, BatchId, CandidateId, CandidateIdentity, CandidateProfile, FieldId,
    FieldType, FormField, FormResponse, FormTemplate, FormValue, InstanceId, Section, Sector,
    SectorId, StepId, StepStatus, TemplateId,
};
pub use instance::{
    AdmissionInstance, AdmissionStatusView, AdmissionStepState, InstanceRecord,
    InstanceRecordError, TransitionError,
};
pub use registry::{visible_batches, AdmissionBatch, BatchCounts, NewBatch, ValidationError};
pub use repository::{ActorDirectory, AdmissionRepository, DirectoryError, RepositoryError};
pub use router::{admission_router, BatchView, InstanceView, OverrideRequest, ACTOR_HEADER};
pub use sequence::{SequenceError, StepDraft, StepSequence, WorkflowStepDefinition};
pub use service::{AdmissionService, AdmissionServiceError, ApproveRequest, RejectRequest};
