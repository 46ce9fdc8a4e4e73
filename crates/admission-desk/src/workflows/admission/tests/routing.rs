use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::http::HeaderMap;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::admission::router::{
    approve_handler, reject_handler, sections_handler, ACTOR_HEADER,
};
use crate::workflows::admission::{ApproveRequest, RejectRequest};

fn request(method: &str, uri: &str, actor: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("json body")))
        .expect("valid request")
}

fn headers_for(actor: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACTOR_HEADER, actor.parse().expect("header value"));
    headers
}

#[tokio::test]
async fn sections_handler_lists_menu_for_actor() {
    let (service, _) = build_service();
    let response = sections_handler(State(Arc::new(service)), headers_for("rh")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["sections"],
        json!([
            {"id": "dashboard", "label": "Dashboard"},
            {"id": "admissions", "label": "Admissões"}
        ])
    );
}

#[tokio::test]
async fn sections_handler_requires_an_actor() {
    let (service, _) = build_service();
    let service = Arc::new(service);

    let response = sections_handler(State(service.clone()), HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = sections_handler(State(service), headers_for("ghost")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], json!("no authenticated actor"));
}

#[tokio::test]
async fn create_route_returns_created_batch() {
    let (service, _) = build_service();
    let router = router_with_service(service);

    let body = serde_json::to_value(new_batch(2)).expect("serializable batch");
    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/admissions/batches",
            Some("selecao"),
            body,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["name"], json!("Admissão TI - Outubro"));
    assert_eq!(payload["counts"]["in_progress"], json!(2));
    assert_eq!(payload["instances"][0]["current_step"], json!("RH"));
    assert_eq!(payload["instances"][0]["progress_percent"], json!(25));
}

#[tokio::test]
async fn create_route_rejects_empty_candidate_lists() {
    let (service, repository) = build_service();
    let router = router_with_service(service);

    let body = serde_json::to_value(new_batch(0)).expect("serializable batch");
    let response = router
        .oneshot(request(
            "POST",
            "/api/v1/admissions/batches",
            Some("selecao"),
            body,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(repository
        .batches
        .lock()
        .expect("repository mutex poisoned")
        .is_empty());
}

#[tokio::test]
async fn approve_handler_returns_instance_view() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    let batch = service
        .create_batch(Some(&rh()), new_batch(1))
        .expect("batch created");
    let id = first_instance(&batch);

    let response = approve_handler(
        State(service.clone()),
        headers_for("rh"),
        Path(id.to_string()),
        axum::Json(ApproveRequest {
            notes: Some("Documentos conferidos".to_string()),
            expected_version: Some(1),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["summary"]["current_step"], json!("Médico"));
    assert_eq!(payload["summary"]["version"], json!(2));
    assert_eq!(payload["actions"]["decide"], json!(false));
    assert_eq!(
        payload["instance"]["steps"][0]["notes"],
        json!("Documentos conferidos")
    );
}

#[tokio::test]
async fn reject_handler_maps_terminal_instances_to_conflict() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    let batch = service
        .create_batch(Some(&rh()), new_batch(1))
        .expect("batch created");
    let id = first_instance(&batch);

    let first = reject_handler(
        State(service.clone()),
        headers_for("rh"),
        Path(id.to_string()),
        axum::Json(RejectRequest {
            reason: "Documento inválido".to_string(),
            expected_version: None,
        }),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = reject_handler(
        State(service),
        headers_for("rh"),
        Path(id.to_string()),
        axum::Json(RejectRequest {
            reason: "Outra vez".to_string(),
            expected_version: None,
        }),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn instance_route_hides_other_sectors_records() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    let batch = service
        .create_batch(Some(&rh()), new_batch(1))
        .expect("batch created");
    let uri = format!("/api/v1/admissions/instances/{}", first_instance(&batch));
    let router = crate::workflows::admission::admission_router(service);

    let response = router
        .clone()
        .oneshot(request("GET", &uri, Some("medico"), Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(request("GET", &uri, Some("rh"), Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["actions"]["decide"], json!(true));
    assert_eq!(payload["actions"]["override"], json!(false));
}

#[tokio::test]
async fn override_routes_need_admin_and_check_versions() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    let batch = service
        .create_batch(Some(&master()), new_batch(1))
        .expect("batch created");
    let base = format!("/api/v1/admissions/instances/{}", first_instance(&batch));
    let router = crate::workflows::admission::admission_router(service);

    let response = router
        .clone()
        .oneshot(request("POST", &format!("{base}/advance"), Some("rh"), json!({})))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("{base}/advance"),
            Some("selecao"),
            json!({}),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("{base}/rewind"),
            Some("selecao"),
            json!({"expected_version": 1}),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .oneshot(request(
            "POST",
            &format!("{base}/rewind"),
            Some("selecao"),
            json!({"expected_version": 2}),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["summary"]["current_step"], json!("RH"));
}

#[tokio::test]
async fn list_and_delete_routes() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    let batch = service
        .create_batch(Some(&master()), new_batch(3))
        .expect("batch created");
    let router = crate::workflows::admission::admission_router(service);

    let response = router
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/admissions/batches",
            Some("medico"),
            Value::Null,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await, json!([]));

    let uri = format!("/api/v1/admissions/batches/{}", batch.id);
    let response = router
        .clone()
        .oneshot(request("DELETE", &uri, Some("selecao"), Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["instances"], json!(3));

    let response = router
        .oneshot(request("GET", &uri, Some("selecao"), Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn approve_route_refuses_admins() {
    let (service, _) = build_service();
    let service = Arc::new(service);
    let batch = service
        .create_batch(Some(&master()), new_batch(1))
        .expect("batch created");
    let uri = format!(
        "/api/v1/admissions/instances/{}/approve",
        first_instance(&batch)
    );
    let router = crate::workflows::admission::admission_router(service);

    for admin in ["selecao", "rh-admin"] {
        let response = router
            .clone()
            .oneshot(request("POST", &uri, Some(admin), json!({})))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let response = router
        .oneshot(request("POST", &uri, Some("rh"), json!({})))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
}
