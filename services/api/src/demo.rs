use crate::infra::{InMemoryAdmissionRepository, StaticActorDirectory};
use admission_desk::config::AppConfig;
use admission_desk::error::AppError;
use admission_desk::workflows::admission::{
    visible_sections, Actor, AdmissionService, ApproveRequest, CandidateId, CandidateProfile,
    ActorDirectory, AdmissionRepository, AdmissionServiceError, FieldId, FieldType, FormField,
    FormResponse, FormTemplate, FormValue, InstanceId, NewBatch, RejectRequest, SectorId,
    StepDraft, StepSequence, TemplateId, ValidationError,
};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of candidates enrolled in the demo batch (at least 2).
    #[arg(long, default_value_t = 3)]
    pub(crate) candidates: usize,
    /// Print the final batch listing as JSON for each actor.
    #[arg(long)]
    pub(crate) json: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            candidates: 3,
            json: false,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { candidates, json } = args;
    let config = AppConfig::load()?;

    let repository = Arc::new(InMemoryAdmissionRepository::default());
    let directory = Arc::new(StaticActorDirectory::seeded(&config.access));
    let service = AdmissionService::new(repository, directory.clone());
    let actors = directory.actors();
    let by_sector = |sector: &str| {
        actors
            .iter()
            .find(|actor| !actor.is_admin() && actor.sector.as_str() == sector)
    };
    let (Some(master), Some(rh), Some(medico), Some(dp), Some(recruiter)) = (
        actors.iter().find(|actor| actor.unrestricted),
        by_sector("RH"),
        by_sector("Médico"),
        by_sector("DP"),
        by_sector(config.access.master_sector.as_str()),
    ) else {
        println!("Demo directory is missing one of the standard sectors");
        return Ok(());
    };

    println!("Admission desk demo");
    println!("Master sector: {}", config.access.master_sector);

    let request = demo_request(&config.access.master_sector, candidates.max(2))
        .map_err(AdmissionServiceError::from)?;
    let batch = service.create_batch(Some(master), request)?;
    println!(
        "\nCreated batch {} \"{}\" with {} candidates (expires {})",
        batch.id,
        batch.name,
        batch.instances.len(),
        batch.expires_on
    );

    let walked = batch.instances[0].id.clone();
    println!("\nWalking {} through every sector", walked);
    for actor in [rh, medico, dp, recruiter] {
        let instance = service.approve(
            Some(actor),
            &walked,
            ApproveRequest {
                notes: Some(format!("Conferido por {}", actor.name)),
                expected_version: None,
            },
        )?;
        let view = instance.status_view();
        println!(
            "- {} approved -> {} at {} ({}%)",
            actor.sector, view.status, view.current_step, view.progress_percent
        );
    }

    let rejected = batch.instances[1].id.clone();
    println!("\nRejecting {} at the medical step", rejected);
    service.approve(Some(rh), &rejected, ApproveRequest::default())?;
    let instance = service.reject(
        Some(medico),
        &rejected,
        RejectRequest {
            reason: "Documento inválido".to_string(),
            expected_version: None,
        },
    )?;
    let view = instance.status_view();
    println!(
        "- {} rejected -> {} at {} (reason: {})",
        medico.sector,
        view.status,
        view.current_step,
        instance
            .current_step()
            .rejection_reason
            .as_deref()
            .unwrap_or_default()
    );

    println!("\nWhat each actor sees");
    for actor in &actors {
        render_actor_view(&service, actor, json)?;
    }

    let missing = InstanceId::new(format!("{}-missing", batch.id));
    if let Err(err) = service.instance(Some(master), &missing) {
        println!("\nLookup of {}: {}", missing, err);
    }

    Ok(())
}

fn render_actor_view<R, D>(
    service: &AdmissionService<R, D>,
    actor: &Actor,
    json: bool,
) -> Result<(), AppError>
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let sections: Vec<&str> = visible_sections(Some(actor))
        .into_iter()
        .map(|section| section.label())
        .collect();
    println!(
        "- {} ({}, {}): menu [{}]",
        actor.name,
        actor.sector,
        actor.role.label(),
        sections.join(", ")
    );

    let batches = service.list_visible(Some(actor))?;
    if batches.is_empty() {
        println!("    no admissions at this sector");
    }
    for batch in &batches {
        let counts = batch.counts();
        println!(
            "    {}: {} visible ({} in progress, {} completed, {} rejected)",
            batch.name, counts.total, counts.in_progress, counts.completed, counts.rejected
        );
        for instance in &batch.instances {
            let view = instance.status_view();
            println!(
                "      - {} [{}] {} @ {}",
                view.candidate_name, view.status, view.position, view.current_step
            );
        }
        if json {
            match serde_json::to_string_pretty(batch) {
                Ok(payload) => println!("{}", payload),
                Err(err) => println!("    batch payload unavailable: {}", err),
            }
        }
    }
    Ok(())
}

/// The standard four-sector admission template; the closing step belongs to
/// the master sector.
pub(crate) fn demo_template(master_sector: &str) -> Result<FormTemplate, ValidationError> {
    let mut steps = StepSequence::default();
    for (name, sector, description) in [
        ("RH", "RH", "Conferência de documentos pessoais"),
        ("Médico", "Médico", "Exame admissional"),
        ("DP", "DP", "Cadastro na folha de pagamento"),
        ("Finalização", master_sector, "Conferência final e integração"),
    ] {
        steps.push(StepDraft {
            name: name.to_string(),
            description: description.to_string(),
            sector: SectorId::new(sector),
            required: true,
        })?;
    }

    Ok(FormTemplate {
        id: TemplateId::new("1"),
        name: "Formulário Padrão RH".to_string(),
        department: "Recursos Humanos".to_string(),
        fields: vec![
            FormField {
                id: FieldId::new("cpf"),
                field_type: FieldType::Text,
                label: "CPF".to_string(),
                required: true,
                options: Vec::new(),
            },
            FormField {
                id: FieldId::new("vale_transporte"),
                field_type: FieldType::Checkbox,
                label: "Deseja vale-transporte?".to_string(),
                required: false,
                options: Vec::new(),
            },
        ],
        steps,
    })
}

pub(crate) fn demo_request(
    master_sector: &str,
    candidates: usize,
) -> Result<NewBatch, ValidationError> {
    let names = [
        "Maria Silva Santos",
        "João Pedro Oliveira",
        "Carlos Eduardo Lima",
        "Fernanda Costa Alves",
        "Rafael Mendes Rocha",
    ];
    let today = Local::now().date_naive();

    Ok(NewBatch {
        name: "Admissão TI - Outubro".to_string(),
        template: demo_template(master_sector)?,
        candidates: (0..candidates)
            .map(|index| {
                let name = names[index % names.len()];
                CandidateProfile {
                    id: CandidateId::new((index + 1).to_string()),
                    full_name: name.to_string(),
                    email: format!("candidato{}@email.com", index + 1),
                    phone: Some("(11) 99999-9999".to_string()),
                    job_title: "Analista de Sistemas".to_string(),
                    department: Some("TI".to_string()),
                    birth_date: NaiveDate::from_ymd_opt(1990, 5, 15),
                    form_responses: vec![
                        FormResponse {
                            field_id: FieldId::new("cpf"),
                            value: FormValue::Text("123.456.789-00".to_string()),
                        },
                        FormResponse {
                            field_id: FieldId::new("vale_transporte"),
                            value: FormValue::Flag(index % 2 == 0),
                        },
                    ],
                }
            })
            .collect(),
        expires_on: today + Duration::days(30),
    })
}
