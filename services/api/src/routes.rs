use crate::infra::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use bto_housing::error::AppError;
use bto_housing::housing::{
    housing_router, BookingReportFilter, BookingReportRow, HousingService, MaritalStatus,
    NewProject, Person, Project, ProjectFilter, ProjectName, ProjectUpdate, Role,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RoleKind {
    Applicant,
    Officer,
    Manager,
    Admin,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterPersonRequest {
    pub(crate) nric: String,
    pub(crate) age: u8,
    pub(crate) marital_status: MaritalStatus,
    pub(crate) role: RoleKind,
}

impl From<RegisterPersonRequest> for Person {
    fn from(request: RegisterPersonRequest) -> Self {
        let RegisterPersonRequest {
            nric,
            age,
            marital_status,
            role,
        } = request;
        match role {
            RoleKind::Applicant => Person::applicant(nric, age, marital_status),
            RoleKind::Officer => Person::officer(nric, age, marital_status),
            RoleKind::Manager => Person::manager(nric, age, marital_status),
            RoleKind::Admin => Person {
                role: Role::Admin,
                ..Person::applicant(nric, age, marital_status)
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VisibilityRequest {
    pub(crate) visible: bool,
}

/// Library routes plus the administrative and probe endpoints owned by this binary.
pub(crate) fn with_housing_routes(service: Arc<HousingService>) -> Router {
    let admin = Router::new()
        .route("/api/v1/people", post(register_person_endpoint))
        .route("/api/v1/projects", post(create_project_endpoint))
        .route("/api/v1/projects/search", post(search_projects_endpoint))
        .route("/api/v1/projects/:project", put(update_project_endpoint))
        .route(
            "/api/v1/projects/:project/visibility",
            post(visibility_endpoint),
        )
        .route("/api/v1/reports/bookings", post(booking_report_endpoint))
        .with_state(service.clone());

    housing_router(service)
        .merge(admin)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Acquire);
    if ready {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "recovering" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn register_person_endpoint(
    State(service): State<Arc<HousingService>>,
    Json(request): Json<RegisterPersonRequest>,
) -> Result<(StatusCode, Json<Person>), AppError> {
    let person = service.register_person(request.into())?;
    Ok((StatusCode::CREATED, Json(person)))
}

pub(crate) async fn create_project_endpoint(
    State(service): State<Arc<HousingService>>,
    Json(listing): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let project = service.create_project(listing)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub(crate) async fn update_project_endpoint(
    State(service): State<Arc<HousingService>>,
    Path(project): Path<String>,
    Json(changes): Json<ProjectUpdate>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(service.update_project(&ProjectName(project), changes)?))
}

pub(crate) async fn search_projects_endpoint(
    State(service): State<Arc<HousingService>>,
    Json(filter): Json<ProjectFilter>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(service.filter_projects(&filter)?))
}

pub(crate) async fn visibility_endpoint(
    State(service): State<Arc<HousingService>>,
    Path(project): Path<String>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<Project>, AppError> {
    let project = service
        .catalog()
        .set_visibility(&ProjectName(project), request.visible)?;
    Ok(Json(project))
}

pub(crate) async fn booking_report_endpoint(
    State(service): State<Arc<HousingService>>,
    Json(filter): Json<BookingReportFilter>,
) -> Result<Json<Vec<BookingReportRow>>, AppError> {
    Ok(Json(service.booking_report(&filter)?))
}
