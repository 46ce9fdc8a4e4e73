//! Section and record visibility for authenticated actors.
//!
//! Every check takes `Option<&Actor>`: a missing actor is never an error
//! here, it simply sees nothing. Callers that need an explicit refusal use the
//! `require_*` variants.

use super::domain::{Actor, AdmissionStatus, Section, StepStatus};
use super::instance::AdmissionInstance;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("no authenticated actor")]
    Unauthenticated,
    #[error("actor may not open section {0}")]
    SectionDenied(Section),
    #[error("actor may not view admission {0}")]
    RecordDenied(String),
    #[error("actor may not {action} admission {instance}")]
    ActionDenied {
        action: &'static str,
        instance: String,
    },
    #[error("unknown section identifier '{0}'")]
    UnknownSection(String),
}

pub fn can_access_section(actor: Option<&Actor>, section: Section) -> bool {
    match actor {
        Some(actor) => actor.unrestricted || actor.permissions.contains(&section),
        None => false,
    }
}

/// Like [`can_access_section`] but for raw identifiers; unknown ids are an
/// error rather than a silent denial.
pub fn can_access_section_id(actor: Option<&Actor>, section_id: &str) -> Result<bool, AccessError> {
    let section = section_id.parse::<Section>()?;
    Ok(can_access_section(actor, section))
}

pub fn require_section(actor: Option<&Actor>, section: Section) -> Result<&Actor, AccessError> {
    let actor = actor.ok_or(AccessError::Unauthenticated)?;
    if can_access_section(Some(actor), section) {
        Ok(actor)
    } else {
        Err(AccessError::SectionDenied(section))
    }
}

/// Menu entries in canonical order.
pub fn visible_sections(actor: Option<&Actor>) -> Vec<Section> {
    Section::ordered()
        .into_iter()
        .filter(|section| can_access_section(actor, *section))
        .collect()
}

/// An instance is visible when its current step belongs to the actor's
/// sector. Completed and rejected instances keep their pointer on the last
/// decided step, so they stay with the sector that decided them.
pub fn is_visible(actor: Option<&Actor>, instance: &AdmissionInstance) -> bool {
    match actor {
        Some(actor) if actor.unrestricted => true,
        Some(actor) => instance.current_step().sector == actor.sector,
        None => false,
    }
}

pub fn visible_instances<'a, I>(actor: Option<&Actor>, instances: I) -> Vec<&'a AdmissionInstance>
where
    I: IntoIterator<Item = &'a AdmissionInstance>,
{
    instances
        .into_iter()
        .filter(|instance| is_visible(actor, instance))
        .collect()
}

pub fn require_visible(
    actor: Option<&Actor>,
    instance: &AdmissionInstance,
) -> Result<(), AccessError> {
    if actor.is_none() {
        return Err(AccessError::Unauthenticated);
    }
    if is_visible(actor, instance) {
        Ok(())
    } else {
        Err(AccessError::RecordDenied(instance.id.to_string()))
    }
}

/// Approving and rejecting belong to the sector users of the current step.
/// Admins, the unrestricted ones included, correct instances through rewind
/// and force-advance instead.
pub fn owns_current_step(actor: Option<&Actor>, instance: &AdmissionInstance) -> bool {
    match actor {
        Some(actor) => !actor.is_admin() && instance.current_step().sector == actor.sector,
        None => false,
    }
}

/// Approve/reject affordance: the actor owns the current step and that step is
/// still pending on an open admission.
pub fn can_act(actor: Option<&Actor>, instance: &AdmissionInstance) -> bool {
    owns_current_step(actor, instance)
        && instance.status() == AdmissionStatus::InProgress
        && instance.current_step().status == StepStatus::Pending
}

/// Rewind and force-advance are administrative corrections; they skip the
/// pending check, so only admins who can see the record may use them.
pub fn can_override(actor: Option<&Actor>, instance: &AdmissionInstance) -> bool {
    matches!(actor, Some(actor) if actor.is_admin()) && is_visible(actor, instance)
}

pub(crate) fn require_action(
    allowed: bool,
    action: &'static str,
    instance: &AdmissionInstance,
) -> Result<(), AccessError> {
    if allowed {
        Ok(())
    } else {
        Err(AccessError::ActionDenied {
            action,
            instance: instance.id.to_string(),
        })
    }
}
