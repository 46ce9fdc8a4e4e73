use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::access::{can_act, can_override};
use super::domain::{Actor, ActorId, BatchId, InstanceId, Section, TemplateId};
use super::instance::{AdmissionInstance, AdmissionStatusView};
use super::registry::{AdmissionBatch, BatchCounts, NewBatch};
use super::repository::{ActorDirectory, AdmissionRepository};
use super::service::{AdmissionService, AdmissionServiceError, ApproveRequest, RejectRequest};
use crate::error::AppError;

/// Header carrying the authenticated actor id, set by the session layer.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Body of rewind and force-advance calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRequest {
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub id: &'static str,
    pub label: &'static str,
}

impl From<Section> for SectionView {
    fn from(section: Section) -> Self {
        Self {
            id: section.id(),
            label: section.label(),
        }
    }
}

/// Listing shape: batch header, tallies and one summary row per instance.
#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    pub id: BatchId,
    pub name: String,
    pub template_id: TemplateId,
    pub template_name: String,
    pub expires_on: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub counts: BatchCounts,
    pub instances: Vec<AdmissionStatusView>,
}

impl From<&AdmissionBatch> for BatchView {
    fn from(batch: &AdmissionBatch) -> Self {
        Self {
            id: batch.id.clone(),
            name: batch.name.clone(),
            template_id: batch.template.id.clone(),
            template_name: batch.template.name.clone(),
            expires_on: batch.expires_on,
            created_at: batch.created_at,
            counts: batch.counts(),
            instances: batch
                .instances
                .iter()
                .map(AdmissionInstance::status_view)
                .collect(),
        }
    }
}

/// Affordances the dashboard shows for one instance.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InstanceActions {
    pub decide: bool,
    #[serde(rename = "override")]
    pub override_: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceView {
    pub summary: AdmissionStatusView,
    pub actions: InstanceActions,
    pub instance: AdmissionInstance,
}

impl InstanceView {
    fn for_actor(actor: Option<&Actor>, instance: AdmissionInstance) -> Self {
        Self {
            summary: instance.status_view(),
            actions: InstanceActions {
                decide: can_act(actor, &instance),
                override_: can_override(actor, &instance),
            },
            instance,
        }
    }
}

/// Router builder exposing the admission desk over HTTP.
pub fn admission_router<R, D>(service: Arc<AdmissionService<R, D>>) -> Router
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    Router::new()
        .route("/api/v1/access/sections", get(sections_handler::<R, D>))
        .route(
            "/api/v1/admissions/batches",
            get(list_batches_handler::<R, D>).post(create_batch_handler::<R, D>),
        )
        .route(
            "/api/v1/admissions/batches/:batch_id",
            get(batch_handler::<R, D>).delete(delete_batch_handler::<R, D>),
        )
        .route(
            "/api/v1/admissions/instances/:instance_id",
            get(instance_handler::<R, D>),
        )
        .route(
            "/api/v1/admissions/instances/:instance_id/approve",
            post(approve_handler::<R, D>),
        )
        .route(
            "/api/v1/admissions/instances/:instance_id/reject",
            post(reject_handler::<R, D>),
        )
        .route(
            "/api/v1/admissions/instances/:instance_id/rewind",
            post(rewind_handler::<R, D>),
        )
        .route(
            "/api/v1/admissions/instances/:instance_id/advance",
            post(advance_handler::<R, D>),
        )
        .with_state(service)
}

/// Missing header means "nobody signed in"; an unknown id is refused outright.
fn current_actor<R, D>(
    service: &AdmissionService<R, D>,
    headers: &HeaderMap,
) -> Result<Option<Actor>, AdmissionServiceError>
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let Some(raw) = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };

    service.resolve_actor(&ActorId::new(raw)).map(Some)
}

fn failure(error: AdmissionServiceError) -> Response {
    AppError::from(error).into_response()
}

pub(crate) async fn sections_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let result = current_actor(&service, &headers)
        .and_then(|actor| service.sections(actor.as_ref()));
    match result {
        Ok(sections) => {
            let sections: Vec<SectionView> = sections.into_iter().map(SectionView::from).collect();
            (StatusCode::OK, Json(json!({ "sections": sections }))).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn list_batches_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let result = current_actor(&service, &headers)
        .and_then(|actor| service.list_visible(actor.as_ref()));
    match result {
        Ok(batches) => {
            let views: Vec<BatchView> = batches.iter().map(BatchView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn create_batch_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
    Json(request): Json<NewBatch>,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let result = current_actor(&service, &headers)
        .and_then(|actor| service.create_batch(actor.as_ref(), request));
    match result {
        Ok(batch) => (StatusCode::CREATED, Json(BatchView::from(&batch))).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn batch_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
    Path(batch_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let batch_id = BatchId(batch_id);
    let result = current_actor(&service, &headers)
        .and_then(|actor| service.batch(actor.as_ref(), &batch_id));
    match result {
        Ok(batch) => (StatusCode::OK, Json(BatchView::from(&batch))).into_response(),
        Err(error) => failure(error),
    }
}

pub(crate) async fn delete_batch_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
    Path(batch_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let batch_id = BatchId(batch_id);
    let result = current_actor(&service, &headers)
        .and_then(|actor| service.delete_batch(actor.as_ref(), &batch_id));
    match result {
        Ok(removed) => {
            let payload = json!({
                "deleted": removed.id,
                "instances": removed.instances.len(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn instance_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
    Path(instance_id): Path<String>,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let instance_id = InstanceId(instance_id);
    let actor = match current_actor(&service, &headers) {
        Ok(actor) => actor,
        Err(error) => return failure(error),
    };
    match service.instance(actor.as_ref(), &instance_id) {
        Ok(instance) => {
            let view = InstanceView::for_actor(actor.as_ref(), instance);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn approve_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
    Path(instance_id): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let instance_id = InstanceId(instance_id);
    transition_response(&service, &headers, |actor| {
        service.approve(actor, &instance_id, request)
    })
}

pub(crate) async fn reject_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
    Path(instance_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let instance_id = InstanceId(instance_id);
    transition_response(&service, &headers, |actor| {
        service.reject(actor, &instance_id, request)
    })
}

pub(crate) async fn rewind_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
    Path(instance_id): Path<String>,
    Json(request): Json<OverrideRequest>,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let instance_id = InstanceId(instance_id);
    transition_response(&service, &headers, |actor| {
        service.rewind(actor, &instance_id, request.expected_version)
    })
}

pub(crate) async fn advance_handler<R, D>(
    State(service): State<Arc<AdmissionService<R, D>>>,
    headers: HeaderMap,
    Path(instance_id): Path<String>,
    Json(request): Json<OverrideRequest>,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
{
    let instance_id = InstanceId(instance_id);
    transition_response(&service, &headers, |actor| {
        service.force_advance(actor, &instance_id, request.expected_version)
    })
}

fn transition_response<R, D, F>(
    service: &AdmissionService<R, D>,
    headers: &HeaderMap,
    apply: F,
) -> Response
where
    R: AdmissionRepository + 'static,
    D: ActorDirectory + 'static,
    F: FnOnce(Option<&Actor>) -> Result<AdmissionInstance, AdmissionServiceError>,
{
    let actor = match current_actor(service, headers) {
        Ok(actor) => actor,
        Err(error) => return failure(error),
    };
    match apply(actor.as_ref()) {
        Ok(instance) => {
            let view = InstanceView::for_actor(actor.as_ref(), instance);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}
