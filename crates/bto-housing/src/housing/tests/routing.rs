use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::HousingConfig;
use crate::housing::router::{create_handler, CreateApplicationRequest};
use crate::housing::{
    housing_router, FixedClock, HousingService, MaritalStatus, Repositories, UnitType,
};

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

fn seeded_router() -> Router {
    let (service, _) = build_service();
    let project = seed_project(&service, "Tengah Gardens", &[(UnitType::TwoRoom, 1)], 2);
    let officer = seed_officer(&service, "T2000001A");
    assign_officer(&service, &officer, &project);
    seed_applicant(&service, "S1000001A", 36, MaritalStatus::Single);
    housing_router(Arc::new(service))
}

#[tokio::test]
async fn create_handler_returns_unprocessable_for_ineligible_applicant() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Tengah Gardens", &[(UnitType::ThreeRoom, 1)], 2);
    let applicant = seed_applicant(&service, "S1000001A", 36, MaritalStatus::Single);

    let response = create_handler(
        State(Arc::new(service)),
        axum::Json(CreateApplicationRequest {
            applicant,
            project,
            unit_type: UnitType::ThreeRoom,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn application_flow_over_http() {
    let router = seeded_router();

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/applications",
            json!({
                "applicant": "S1000001A",
                "project": "Tengah Gardens",
                "unit_type": "two_room",
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    assert_eq!(created["status"], "pending");
    let id = created["application_id"]
        .as_str()
        .expect("application id")
        .to_string();

    let response = router
        .clone()
        .oneshot(post_empty(&format!("/api/v1/applications/{id}/approve")))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/applications/{id}/booking"),
            json!({ "staff": "T2000001A" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let booking = read_json_body(response).await;
    let booking_id = booking["id"].as_str().expect("booking id").to_string();

    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/bookings/{booking_id}/receipt")))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let receipt = read_json_body(response).await;
    assert!(receipt["text"]
        .as_str()
        .expect("receipt text")
        .contains("UNIT BOOKING RECEIPT"));

    let response = router
        .oneshot(get("/api/v1/applicants/S1000001A/application"))
        .await
        .expect("router responds");
    let current = read_json_body(response).await;
    assert_eq!(current["status"], "booked");
    assert_eq!(current["booking_id"], booking_id.as_str());
}

#[tokio::test]
async fn missing_application_is_not_found() {
    let response = seeded_router()
        .oneshot(get("/api/v1/applications/app-999999"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn applicant_without_application_gets_no_content() {
    let response = seeded_router()
        .oneshot(get("/api/v1/applicants/S1000001A/application"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn eligibility_lists_unit_types() {
    let response = seeded_router()
        .oneshot(get("/api/v1/applicants/S1000001A/eligibility"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["unit_types"], json!(["two_room"]));
}

#[tokio::test]
async fn officer_registration_conflicts_map_to_409() {
    let router = seeded_router();

    let response = router
        .oneshot(post_json(
            "/api/v1/projects/Tengah%20Gardens/registrations",
            json!({ "staff": "T2000001A" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn storage_outage_maps_to_service_unavailable() {
    let repos = Repositories {
        people: Arc::new(UnavailableRepository),
        ..Repositories::in_memory()
    };
    let service = HousingService::with_clock(
        repos,
        &HousingConfig::default(),
        Arc::new(FixedClock::on(today())),
    );

    let response = housing_router(Arc::new(service))
        .oneshot(get("/api/v1/applicants/S1000001A/eligibility"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "storage");
}

#[tokio::test]
async fn enquiry_flow_over_http() {
    let router = seeded_router();

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/enquiries",
            json!({
                "author": "S1000001A",
                "project": "Tengah Gardens",
                "message": "Is the unit wheelchair accessible?",
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    let id = created["id"].as_str().expect("enquiry id").to_string();

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/enquiries/{id}/reply"),
            json!({ "nric": "S1000001A", "message": "Answering myself" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .clone()
        .oneshot(post_json(
            &format!("/api/v1/enquiries/{id}/reply"),
            json!({ "nric": "T2000001A", "message": "Yes, every block has ramps." }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let edit = Request::put(format!("/api/v1/enquiries/{id}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "nric": "S1000001A", "message": "Changed" }).to_string(),
        ))
        .expect("request builds");
    let response = router.clone().oneshot(edit).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(response).await["kind"], "state");

    let response = router
        .oneshot(post_json(
            "/api/v1/enquiries/search",
            json!({ "project": "Tengah Gardens", "answered": true }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let listed = read_json_body(response).await;
    assert_eq!(listed.as_array().expect("array").len(), 1);
    assert_eq!(listed[0]["reply"]["responder"], "T2000001A");
}
