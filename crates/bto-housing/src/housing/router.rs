use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    Application, ApplicationId, BookingId, Enquiry, EnquiryId, Nric, ProjectName, RegistrationId,
    UnitType,
};
use super::enquiries::EnquiryFilter;
use super::error::{ErrorKind, HousingError};
use super::service::HousingService;

/// Router builder exposing the housing operations as JSON endpoints.
pub fn housing_router(service: Arc<HousingService>) -> Router {
    Router::new()
        .route("/api/v1/applications", post(create_handler))
        .route("/api/v1/applications/:application_id", get(application_handler))
        .route(
            "/api/v1/applications/:application_id/approve",
            post(approve_handler),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            post(reject_handler),
        )
        .route(
            "/api/v1/applications/:application_id/withdrawal",
            post(request_withdrawal_handler),
        )
        .route(
            "/api/v1/applications/:application_id/withdrawal/approve",
            post(approve_withdrawal_handler),
        )
        .route(
            "/api/v1/applications/:application_id/booking",
            post(booking_handler),
        )
        .route(
            "/api/v1/applicants/:nric/application",
            get(current_application_handler),
        )
        .route(
            "/api/v1/applicants/:nric/eligibility",
            get(eligibility_handler),
        )
        .route(
            "/api/v1/projects/:project/applications",
            get(project_applications_handler),
        )
        .route(
            "/api/v1/projects/:project/registrations",
            post(register_officer_handler),
        )
        .route(
            "/api/v1/registrations/:registration_id/approve",
            post(approve_registration_handler),
        )
        .route(
            "/api/v1/registrations/:registration_id/reject",
            post(reject_registration_handler),
        )
        .route("/api/v1/bookings/:booking_id/receipt", get(receipt_handler))
        .route("/api/v1/enquiries", post(submit_enquiry_handler))
        .route("/api/v1/enquiries/search", post(search_enquiries_handler))
        .route(
            "/api/v1/enquiries/:enquiry_id",
            get(enquiry_handler)
                .put(edit_enquiry_handler)
                .delete(delete_enquiry_handler),
        )
        .route(
            "/api/v1/enquiries/:enquiry_id/reply",
            post(reply_enquiry_handler),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplicationRequest {
    pub applicant: Nric,
    pub project: ProjectName,
    pub unit_type: UnitType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffRequest {
    pub staff: Nric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitEnquiryRequest {
    pub author: Nric,
    pub project: ProjectName,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRequest {
    pub author: Nric,
}

/// Body for editing an enquiry or replying to one; `nric` is the author or the responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnquiryMessageRequest {
    pub nric: Nric,
    pub message: String,
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub applicant: Nric,
    pub project: ProjectName,
    pub unit_type: UnitType,
    pub status: &'static str,
    pub withdrawal_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
}

impl From<Application> for ApplicationView {
    fn from(application: Application) -> Self {
        Self {
            application_id: application.id,
            applicant: application.applicant,
            project: application.project,
            unit_type: application.unit_type,
            status: application.status.label(),
            withdrawal_requested: application.withdrawal_requested,
            booking_id: application.booking,
        }
    }
}

impl IntoResponse for HousingError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict | ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
        };
        let payload = json!({
            "error": self.to_string(),
            "kind": kind.label(),
        });
        (status, Json(payload)).into_response()
    }
}

pub(crate) async fn create_handler(
    State(service): State<Arc<HousingService>>,
    Json(request): Json<CreateApplicationRequest>,
) -> Response {
    match service.create(&request.applicant, &request.project, request.unit_type) {
        Ok(application) => {
            (StatusCode::CREATED, Json(ApplicationView::from(application))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn application_handler(
    State(service): State<Arc<HousingService>>,
    Path(application_id): Path<String>,
) -> Response {
    application_response(service.get_application(&ApplicationId(application_id)))
}

pub(crate) async fn approve_handler(
    State(service): State<Arc<HousingService>>,
    Path(application_id): Path<String>,
) -> Response {
    application_response(service.approve(&ApplicationId(application_id)))
}

pub(crate) async fn reject_handler(
    State(service): State<Arc<HousingService>>,
    Path(application_id): Path<String>,
) -> Response {
    application_response(service.reject(&ApplicationId(application_id)))
}

pub(crate) async fn request_withdrawal_handler(
    State(service): State<Arc<HousingService>>,
    Path(application_id): Path<String>,
) -> Response {
    application_response(service.request_withdrawal(&ApplicationId(application_id)))
}

pub(crate) async fn approve_withdrawal_handler(
    State(service): State<Arc<HousingService>>,
    Path(application_id): Path<String>,
) -> Response {
    match service.approve_withdrawal(&ApplicationId(application_id)) {
        Ok(outcome) => {
            let payload = json!({
                "application_id": outcome.application.id,
                "withdrawn": true,
                "unit_released": outcome.unit_released,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn booking_handler(
    State(service): State<Arc<HousingService>>,
    Path(application_id): Path<String>,
    Json(request): Json<StaffRequest>,
) -> Response {
    match service.book_flat(&ApplicationId(application_id), &request.staff) {
        Ok(booking) => (StatusCode::CREATED, Json(booking)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn current_application_handler(
    State(service): State<Arc<HousingService>>,
    Path(nric): Path<String>,
) -> Response {
    match service.get_current_application_for_applicant(&Nric(nric)) {
        Ok(Some(application)) => {
            (StatusCode::OK, Json(ApplicationView::from(application))).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn eligibility_handler(
    State(service): State<Arc<HousingService>>,
    Path(nric): Path<String>,
) -> Response {
    let nric = Nric(nric);
    match service.eligible_unit_types(&nric) {
        Ok(unit_types) => {
            let payload = json!({
                "nric": nric,
                "unit_types": unit_types,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn project_applications_handler(
    State(service): State<Arc<HousingService>>,
    Path(project): Path<String>,
) -> Response {
    match service.get_applications_for_project(&ProjectName(project)) {
        Ok(applications) => {
            let views: Vec<ApplicationView> =
                applications.into_iter().map(ApplicationView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn register_officer_handler(
    State(service): State<Arc<HousingService>>,
    Path(project): Path<String>,
    Json(request): Json<StaffRequest>,
) -> Response {
    match service.register_officer(&request.staff, &ProjectName(project)) {
        Ok(registration) => (StatusCode::CREATED, Json(registration)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn approve_registration_handler(
    State(service): State<Arc<HousingService>>,
    Path(registration_id): Path<String>,
) -> Response {
    match service.approve_officer_registration(&RegistrationId(registration_id)) {
        Ok(registration) => (StatusCode::OK, Json(registration)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn reject_registration_handler(
    State(service): State<Arc<HousingService>>,
    Path(registration_id): Path<String>,
) -> Response {
    match service.reject_officer_registration(&RegistrationId(registration_id)) {
        Ok(registration) => (StatusCode::OK, Json(registration)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn receipt_handler(
    State(service): State<Arc<HousingService>>,
    Path(booking_id): Path<String>,
) -> Response {
    match service.generate_receipt(&BookingId(booking_id)) {
        Ok(receipt) => {
            let payload = json!({
                "receipt": receipt,
                "text": receipt.to_string(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn submit_enquiry_handler(
    State(service): State<Arc<HousingService>>,
    Json(request): Json<SubmitEnquiryRequest>,
) -> Response {
    match service.submit_enquiry(&request.author, &request.project, &request.message) {
        Ok(enquiry) => (StatusCode::CREATED, Json(enquiry)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn search_enquiries_handler(
    State(service): State<Arc<HousingService>>,
    Json(filter): Json<EnquiryFilter>,
) -> Response {
    match service.list_enquiries(&filter) {
        Ok(enquiries) => (StatusCode::OK, Json(enquiries)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn enquiry_handler(
    State(service): State<Arc<HousingService>>,
    Path(enquiry_id): Path<String>,
) -> Response {
    enquiry_response(service.enquiries().get(&EnquiryId(enquiry_id)))
}

pub(crate) async fn edit_enquiry_handler(
    State(service): State<Arc<HousingService>>,
    Path(enquiry_id): Path<String>,
    Json(request): Json<EnquiryMessageRequest>,
) -> Response {
    enquiry_response(service.edit_enquiry(&EnquiryId(enquiry_id), &request.nric, &request.message))
}

pub(crate) async fn delete_enquiry_handler(
    State(service): State<Arc<HousingService>>,
    Path(enquiry_id): Path<String>,
    Json(request): Json<AuthorRequest>,
) -> Response {
    enquiry_response(service.delete_enquiry(&EnquiryId(enquiry_id), &request.author))
}

pub(crate) async fn reply_enquiry_handler(
    State(service): State<Arc<HousingService>>,
    Path(enquiry_id): Path<String>,
    Json(request): Json<EnquiryMessageRequest>,
) -> Response {
    enquiry_response(service.reply_to_enquiry(
        &EnquiryId(enquiry_id),
        &request.nric,
        &request.message,
    ))
}

fn enquiry_response(result: Result<Enquiry, HousingError>) -> Response {
    match result {
        Ok(enquiry) => (StatusCode::OK, Json(enquiry)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn application_response(result: Result<Application, HousingError>) -> Response {
    match result {
        Ok(application) => (StatusCode::OK, Json(ApplicationView::from(application))).into_response(),
        Err(err) => err.into_response(),
    }
}
