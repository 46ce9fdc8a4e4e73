use admission_desk::config::AccessConfig;
use admission_desk::workflows::admission::{
    AccessProfile, AccessProfileId, Actor, ActorDirectory, ActorId, ActorRole, AdmissionBatch,
    AdmissionInstance, AdmissionRepository, BatchId, DirectoryError, InstanceId,
    RepositoryError, Section, Sector, SectorId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAdmissionRepository {
    batches: Arc<Mutex<HashMap<BatchId, AdmissionBatch>>>,
}

impl InMemoryAdmissionRepository {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<BatchId, AdmissionBatch>>, RepositoryError> {
        self.batches
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl AdmissionRepository for InMemoryAdmissionRepository {
    fn insert_batch(&self, batch: AdmissionBatch) -> Result<AdmissionBatch, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&batch.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    fn delete_batch(&self, id: &BatchId) -> Result<AdmissionBatch, RepositoryError> {
        self.lock()?.remove(id).ok_or(RepositoryError::NotFound)
    }

    fn fetch_batch(&self, id: &BatchId) -> Result<Option<AdmissionBatch>, RepositoryError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn batches(&self) -> Result<Vec<AdmissionBatch>, RepositoryError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn fetch_instance(
        &self,
        id: &InstanceId,
    ) -> Result<Option<AdmissionInstance>, RepositoryError> {
        let guard = self.lock()?;
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
        let mut guard = self.lock()?;
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

/// Fixed user list standing in for the authentication collaborator.
#[derive(Clone)]
pub(crate) struct StaticActorDirectory {
    actors: Arc<HashMap<ActorId, Actor>>,
}

impl StaticActorDirectory {
    /// Build actors from `(id, name, sector, role, profile)` rows; admins of
    /// the configured master sector are flagged unrestricted here, once.
    pub(crate) fn new<'a, I>(access: &AccessConfig, rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, &'a Sector, ActorRole, &'a AccessProfile)>,
    {
        let actors = rows
            .into_iter()
            .map(|(id, name, sector, role, profile)| {
                let actor = Actor::with_profile(
                    ActorId::new(id),
                    name,
                    sector.id.clone(),
                    role,
                    profile,
                );
                let actor = if role == ActorRole::Admin && access.is_master_sector(&sector.name) {
                    actor.unrestricted()
                } else {
                    actor
                };
                (actor.id.clone(), actor)
            })
            .collect();
        Self {
            actors: Arc::new(actors),
        }
    }

    /// The demo users: the master admin plus one sector user per step of the
    /// standard admission flow.
    pub(crate) fn seeded(access: &AccessConfig) -> Self {
        let sectors = default_sectors(access);
        let profiles = default_profiles();
        let rows = [
            ("selecao", "Administrador Seleção", &sectors[0], ActorRole::Admin, &profiles[0]),
            ("ana.costa", "Ana Costa Silva", &sectors[1], ActorRole::SectorUser, &profiles[1]),
            (
                "carlos.santos",
                "Dr. Carlos Santos",
                &sectors[2],
                ActorRole::SectorUser,
                &profiles[2],
            ),
            (
                "maria.oliveira",
                "Maria Oliveira Santos",
                &sectors[3],
                ActorRole::SectorUser,
                &profiles[3],
            ),
            (
                "joao.recrutador",
                "João Recrutador",
                &sectors[0],
                ActorRole::SectorUser,
                &profiles[4],
            ),
        ];
        Self::new(access, rows)
    }

    pub(crate) fn actors(&self) -> Vec<Actor> {
        let mut actors: Vec<Actor> = self.actors.values().cloned().collect();
        actors.sort_by(|a, b| a.id.cmp(&b.id));
        actors
    }
}

impl ActorDirectory for StaticActorDirectory {
    fn actor(&self, id: &ActorId) -> Result<Option<Actor>, DirectoryError> {
        Ok(self.actors.get(id).cloned())
    }
}

/// Master sector first, then the sectors of the standard admission flow.
pub(crate) fn default_sectors(access: &AccessConfig) -> Vec<Sector> {
    let master = access.master_sector.as_str();
    [
        (master, "Triagem e finalização das admissões"),
        ("RH", "Recursos Humanos"),
        ("Médico", "Exames admissionais"),
        ("DP", "Departamento Pessoal"),
    ]
    .into_iter()
    .map(|(name, description)| Sector {
        id: SectorId::new(name),
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}

pub(crate) fn default_profiles() -> Vec<AccessProfile> {
    let admissions_only = BTreeSet::from([Section::Admissions]);
    let sector_profile = |id: &str, name: &str| AccessProfile {
        id: AccessProfileId::new(id),
        name: name.to_string(),
        description: "Acesso limitado apenas às admissões".to_string(),
        permissions: admissions_only.clone(),
    };

    vec![
        AccessProfile {
            id: AccessProfileId::new("1"),
            name: "Administrador Master".to_string(),
            description: "Acesso completo a todas as funcionalidades do sistema".to_string(),
            permissions: Section::ordered().into_iter().collect(),
        },
        sector_profile("2", "Setor RH"),
        sector_profile("3", "Setor Médico"),
        sector_profile("4", "Setor DP"),
        sector_profile("5", "Setor Seleção"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access() -> AccessConfig {
        AccessConfig {
            master_sector: "Seleção".to_string(),
        }
    }

    #[test]
    fn seeded_directory_flags_only_the_master_admin() {
        let directory = StaticActorDirectory::seeded(&access());
        let actors = directory.actors();

        assert_eq!(actors.len(), 5);
        let unrestricted: Vec<&str> = actors
            .iter()
            .filter(|actor| actor.unrestricted)
            .map(|actor| actor.id.as_str())
            .collect();
        assert_eq!(unrestricted, vec!["selecao"]);

        let rh = directory
            .actor(&ActorId::new("ana.costa"))
            .expect("directory available")
            .expect("seeded user");
        assert_eq!(rh.sector, SectorId::new("RH"));
        assert_eq!(rh.permissions, BTreeSet::from([Section::Admissions]));

        let recruiter = directory
            .actor(&ActorId::new("joao.recrutador"))
            .expect("directory available")
            .expect("seeded user");
        assert_eq!(recruiter.sector, SectorId::new("Seleção"));
        assert!(!recruiter.is_admin());
        assert!(!recruiter.unrestricted);
    }

    #[test]
    fn renamed_master_sector_moves_the_override() {
        let access = AccessConfig {
            master_sector: "Triagem".to_string(),
        };
        let directory = StaticActorDirectory::seeded(&access);
        let master = directory
            .actor(&ActorId::new("selecao"))
            .expect("directory available")
            .expect("seeded user");

        assert_eq!(master.sector, SectorId::new("Triagem"));
        assert!(master.unrestricted);
    }

    #[test]
    fn sector_admins_outside_the_master_sector_stay_restricted() {
        let sectors = default_sectors(&access());
        let profiles = default_profiles();
        let directory = StaticActorDirectory::new(
            &access(),
            [("rh-admin", "Chefe RH", &sectors[1], ActorRole::Admin, &profiles[1])],
        );
        let actor = directory
            .actor(&ActorId::new("rh-admin"))
            .expect("directory available")
            .expect("seeded user");
        assert!(actor.is_admin());
        assert!(!actor.unrestricted);
    }

    #[test]
    fn stale_instance_writes_are_refused() {
        let repository = InMemoryAdmissionRepository::default();
        let batch = AdmissionBatch::create(
            BatchId::new("batch-1"),
            crate::demo::demo_request("Seleção", 2).expect("demo request is valid"),
            chrono::Utc::now(),
        )
        .expect("demo batch is valid");
        let instance = batch.instances[0].clone();
        repository.insert_batch(batch).expect("insert succeeds");

        let mut updated = instance.clone();
        updated
            .approve(&ActorId::new("ana.costa"), None, instance.created_at)
            .expect("approves");
        repository
            .update_instance(updated.clone(), 1)
            .expect("first write wins");

        assert_eq!(
            repository.update_instance(updated, 1),
            Err(RepositoryError::VersionMismatch {
                expected: 1,
                found: 2
            })
        );
    }
}
