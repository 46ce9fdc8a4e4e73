use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::domain::{SectorId, StepId};

/// One ordered, sector-owned checkpoint of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStepDefinition {
    pub id: StepId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sector: SectorId,
    pub required: bool,
    pub order: u32,
}

/// Fields accepted when appending or editing a step definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sector: SectorId,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("step sequence has no steps")]
    EmptySequence,
    #[error("step {0} not found in sequence")]
    StepNotFound(StepId),
    #[error("position {position} is outside the sequence (1..={len})")]
    PositionOutOfRange { position: usize, len: usize },
    #[error("step order must run 1..={len} without gaps or duplicates (found {found:?})")]
    NonContiguousOrder { len: usize, found: Vec<u32> },
    #[error("step name must not be blank")]
    BlankName,
}

static STEP_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_step_id() -> StepId {
    let id = STEP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    StepId(format!("step-{id:04}"))
}

/// Ordered checklist a template hands to every enrolled candidate.
///
/// `order` is always 1..=N in position order; every mutation renumbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<WorkflowStepDefinition>",
    into = "Vec<WorkflowStepDefinition>"
)]
pub struct StepSequence {
    steps: Vec<WorkflowStepDefinition>,
}

impl StepSequence {
    /// Accepts definitions in any order as long as their `order` values are
    /// exactly 1..=N.
    pub fn new(mut steps: Vec<WorkflowStepDefinition>) -> Result<Self, SequenceError> {
        steps.sort_by_key(|step| step.order);

        let contiguous = steps
            .iter()
            .enumerate()
            .all(|(index, step)| step.order as usize == index + 1);
        if !contiguous {
            return Err(SequenceError::NonContiguousOrder {
                len: steps.len(),
                found: steps.iter().map(|step| step.order).collect(),
            });
        }
        if steps.iter().any(|step| step.name.trim().is_empty()) {
            return Err(SequenceError::BlankName);
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[WorkflowStepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, step_id: &StepId) -> Option<&WorkflowStepDefinition> {
        self.steps.iter().find(|step| &step.id == step_id)
    }

    /// Append a step at the end of the sequence.
    pub fn push(&mut self, draft: StepDraft) -> Result<&WorkflowStepDefinition, SequenceError> {
        let name = validated_name(&draft.name)?;
        let order = self.steps.len() as u32 + 1;
        self.steps.push(WorkflowStepDefinition {
            id: next_step_id(),
            name,
            description: draft.description,
            sector: draft.sector,
            required: draft.required,
            order,
        });

        Ok(&self.steps[self.steps.len() - 1])
    }

    /// Edit a step in place; its position is unchanged.
    pub fn update(&mut self, step_id: &StepId, draft: StepDraft) -> Result<(), SequenceError> {
        let name = validated_name(&draft.name)?;
        let step = self
            .steps
            .iter_mut()
            .find(|step| &step.id == step_id)
            .ok_or_else(|| SequenceError::StepNotFound(step_id.clone()))?;

        step.name = name;
        step.description = draft.description;
        step.sector = draft.sector;
        step.required = draft.required;
        Ok(())
    }

    /// Remove a step and close the gap it leaves.
    pub fn remove(&mut self, step_id: &StepId) -> Result<WorkflowStepDefinition, SequenceError> {
        let index = self.position_of(step_id)?;
        let removed = self.steps.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// Move a step to a 1-based position, shifting the others the way a
    /// drag-and-drop reorder does.
    pub fn move_step(&mut self, step_id: &StepId, position: usize) -> Result<(), SequenceError> {
        let len = self.steps.len();
        if position == 0 || position > len {
            return Err(SequenceError::PositionOutOfRange { position, len });
        }

        let from = self.position_of(step_id)?;
        let step = self.steps.remove(from);
        self.steps.insert(position - 1, step);
        self.renumber();
        Ok(())
    }

    fn position_of(&self, step_id: &StepId) -> Result<usize, SequenceError> {
        self.steps
            .iter()
            .position(|step| &step.id == step_id)
            .ok_or_else(|| SequenceError::StepNotFound(step_id.clone()))
    }

    fn renumber(&mut self) {
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.order = index as u32 + 1;
        }
    }
}

fn validated_name(raw: &str) -> Result<String, SequenceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SequenceError::BlankName);
    }
    Ok(trimmed.to_string())
}

impl TryFrom<Vec<WorkflowStepDefinition>> for StepSequence {
    type Error = SequenceError;

    fn try_from(steps: Vec<WorkflowStepDefinition>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<StepSequence> for Vec<WorkflowStepDefinition> {
    fn from(sequence: StepSequence) -> Self {
        sequence.steps
    }
}
