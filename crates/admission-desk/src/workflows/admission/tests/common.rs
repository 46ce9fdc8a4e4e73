use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::admission::{
    admission_router, Actor, ActorDirectory, ActorId, ActorRole, AdmissionBatch,
    AdmissionInstance, AdmissionRepository, AdmissionService, BatchId, CandidateId,
    CandidateProfile, DirectoryError, FormTemplate, InstanceId, NewBatch, RepositoryError,
    Section, SectorId, StepDraft, StepSequence, TemplateId,
};

pub(super) fn template(sectors: &[(&str, &str)]) -> FormTemplate {
    let mut steps = StepSequence::default();
    for (name, sector) in sectors {
        steps
            .push(StepDraft {
                name: name.to_string(),
                description: String::new(),
                sector: SectorId::new(*sector),
                required: true,
            })
            .expect("valid step");
    }
    FormTemplate {
        id: TemplateId::new("1"),
        name: "Formulário Padrão RH".to_string(),
        department: "Recursos Humanos".to_string(),
        fields: Vec::new(),
        steps,
    }
}

pub(super) fn standard_template() -> FormTemplate {
    template(&[
        ("RH", "RH"),
        ("Médico", "Médico"),
        ("DP", "DP"),
        ("Finalização", "Seleção"),
    ])
}

pub(super) fn candidate(id: &str, name: &str) -> CandidateProfile {
    CandidateProfile {
        id: CandidateId::new(id),
        full_name: name.to_string(),
        email: format!("{}@email.com", id),
        phone: None,
        job_title: "Analista de Sistemas".to_string(),
        department: Some("TI".to_string()),
        birth_date: NaiveDate::from_ymd_opt(1990, 5, 15),
        form_responses: Vec::new(),
    }
}

pub(super) fn new_batch(candidates: usize) -> NewBatch {
    NewBatch {
        name: "Admissão TI - Outubro".to_string(),
        template: standard_template(),
        candidates: (1..=candidates)
            .map(|n| candidate(&format!("c{n}"), &format!("Candidato {n}")))
            .collect(),
        expires_on: NaiveDate::from_ymd_opt(2025, 10, 31).expect("valid date"),
    }
}

pub(super) fn actor(id: &str, sector: &str, role: ActorRole) -> Actor {
    Actor {
        id: ActorId::new(id),
        name: format!("Usuário {sector}"),
        sector: SectorId::new(sector),
        role,
        permissions: BTreeSet::from([Section::Dashboard, Section::Admissions]),
        unrestricted: false,
    }
}

pub(super) fn master() -> Actor {
    actor("selecao", "Seleção", ActorRole::Admin).unrestricted()
}

pub(super) fn rh() -> Actor {
    actor("rh", "RH", ActorRole::SectorUser)
}

pub(super) fn medico() -> Actor {
    actor("medico", "Médico", ActorRole::SectorUser)
}

pub(super) fn dp() -> Actor {
    actor("dp", "DP", ActorRole::SectorUser)
}

/// Recruiter of the master sector: owns the closing step but sees only it.
pub(super) fn recruiter() -> Actor {
    actor("recrutador", "Seleção", ActorRole::SectorUser)
}

pub(super) fn rh_admin() -> Actor {
    actor("rh-admin", "RH", ActorRole::Admin)
}

pub(super) fn build_service() -> (
    AdmissionService<MemoryRepository, MemoryDirectory>,
    Arc<MemoryRepository>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let directory = Arc::new(MemoryDirectory::with(vec![
        master(),
        rh(),
        medico(),
        dp(),
        recruiter(),
        rh_admin(),
    ]));
    let service = AdmissionService::new(repository.clone(), directory);
    (service, repository)
}

pub(super) fn first_instance(batch: &AdmissionBatch) -> InstanceId {
    batch.instances[0].id.clone()
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) batches: Arc<Mutex<HashMap<BatchId, AdmissionBatch>>>,
}

impl AdmissionRepository for MemoryRepository {
    fn insert_batch(&self, batch: AdmissionBatch) -> Result<AdmissionBatch, RepositoryError> {
        let mut guard = self.batches.lock().expect("repository mutex poisoned");
        if guard.contains_key(&batch.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    fn delete_batch(&self, id: &BatchId) -> Result<AdmissionBatch, RepositoryError> {
        let mut guard = self.batches.lock().expect("repository mutex poisoned");
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }

    fn fetch_batch(&self, id: &BatchId) -> Result<Option<AdmissionBatch>, RepositoryError> {
        let guard = self.batches.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn batches(&self) -> Result<Vec<AdmissionBatch>, RepositoryError> {
        let guard = self.batches.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn fetch_instance(
        &self,
        id: &InstanceId,
    ) -> Result<Option<AdmissionInstance>, RepositoryError> {
        let guard = self.batches.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find_map(|batch| batch.instance(id))
            .cloned())
    }

    fn update_instance(
        &self,
        instance: AdmissionInstance,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.batches.lock().expect("repository mutex poisoned");
        let stored = guard
            .get_mut(&instance.batch_id)
            .and_then(|batch| batch.instance_mut(&instance.id))
            .ok_or(RepositoryError::NotFound)?;
        if stored.version() != expected_version {
            return Err(RepositoryError::VersionMismatch {
                expected: expected_version,
                found: stored.version(),
            });
        }
        *stored = instance;
        Ok(())
    }
}

pub(super) struct UnavailableRepository;

impl AdmissionRepository for UnavailableRepository {
    fn insert_batch(&self, _batch: AdmissionBatch) -> Result<AdmissionBatch, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_batch(&self, _id: &BatchId) -> Result<AdmissionBatch, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_batch(&self, _id: &BatchId) -> Result<Option<AdmissionBatch>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn batches(&self) -> Result<Vec<AdmissionBatch>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_instance(
        &self,
        _id: &InstanceId,
    ) -> Result<Option<AdmissionInstance>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_instance(
        &self,
        _instance: AdmissionInstance,
        _expected_version: u64,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryDirectory {
    actors: Arc<HashMap<ActorId, Actor>>,
}

impl MemoryDirectory {
    pub(super) fn with(actors: Vec<Actor>) -> Self {
        Self {
            actors: Arc::new(
                actors
                    .into_iter()
                    .map(|actor| (actor.id.clone(), actor))
                    .collect(),
            ),
        }
    }
}

impl ActorDirectory for MemoryDirectory {
    fn actor(&self, id: &ActorId) -> Result<Option<Actor>, DirectoryError> {
        Ok(self.actors.get(id).cloned())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(
    service: AdmissionService<MemoryRepository, MemoryDirectory>,
) -> axum::Router {
    admission_router(Arc::new(service))
}
