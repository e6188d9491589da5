use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::booking::{BookingProcessor, BookingReceipt, BookingReportFilter, BookingReportRow};
use super::clock::{Clock, SystemClock};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Booking, BookingId, Enquiry, EnquiryId, Nric,
    OfficerRegistration, Person, Project, ProjectName, RegistrationId, UnitType,
};
use super::eligibility::EligibilityPolicy;
use super::enquiries::{EnquiryBoard, EnquiryFilter};
use super::error::{ConflictError, HousingError, NotFoundError};
use super::inventory::UnitInventory;
use super::lifecycle::{ApplicationLifecycle, WithdrawalOutcome};
use super::locks::LockTable;
use super::projects::{NewProject, ProjectCatalog, ProjectFilter, ProjectUpdate};
use super::registry::OfficerAssignmentRegistry;
use super::repository::{Repositories, RepositoryError};
use crate::config::HousingConfig;

/// What [`HousingService::recover`] repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub withdrawals_completed: usize,
    pub holds_released: usize,
    pub officer_lists_repaired: usize,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Facade composing the lifecycle, booking, inventory, and officer components over one
/// set of repositories.
pub struct HousingService {
    repos: Repositories,
    eligibility: EligibilityPolicy,
    inventory: UnitInventory,
    registry: Arc<OfficerAssignmentRegistry>,
    lifecycle: ApplicationLifecycle,
    booking: BookingProcessor,
    catalog: ProjectCatalog,
    enquiries: EnquiryBoard,
}

impl HousingService {
    pub fn new(repos: Repositories, config: &HousingConfig) -> Self {
        Self::with_clock(repos, config, Arc::new(SystemClock))
    }

    pub fn with_clock(repos: Repositories, config: &HousingConfig, clock: Arc<dyn Clock>) -> Self {
        let locks = Arc::new(LockTable::new());
        let eligibility = EligibilityPolicy::from_config(config);
        let inventory = UnitInventory::new(repos.projects.clone(), locks.clone());
        let registry = Arc::new(OfficerAssignmentRegistry::new(
            repos.clone(),
            locks.clone(),
            clock.clone(),
        ));
        let lifecycle = ApplicationLifecycle::new(
            repos.clone(),
            locks.clone(),
            eligibility,
            inventory.clone(),
            clock.clone(),
        );
        let booking = BookingProcessor::new(
            repos.clone(),
            locks.clone(),
            inventory.clone(),
            registry.clone(),
            clock.clone(),
        );
        let enquiries = EnquiryBoard::new(repos.clone(), locks.clone(), clock);
        let catalog = ProjectCatalog::new(
            repos.clone(),
            locks,
            registry.clone(),
            eligibility,
            config.max_officer_slots,
        );

        Self {
            repos,
            eligibility,
            inventory,
            registry,
            lifecycle,
            booking,
            catalog,
            enquiries,
        }
    }

    pub fn eligibility(&self) -> &EligibilityPolicy {
        &self.eligibility
    }

    pub fn inventory(&self) -> &UnitInventory {
        &self.inventory
    }

    pub fn registry(&self) -> &OfficerAssignmentRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &ApplicationLifecycle {
        &self.lifecycle
    }

    pub fn booking(&self) -> &BookingProcessor {
        &self.booking
    }

    pub fn catalog(&self) -> &ProjectCatalog {
        &self.catalog
    }

    pub fn enquiries(&self) -> &EnquiryBoard {
        &self.enquiries
    }

    pub fn register_person(&self, person: Person) -> Result<Person, HousingError> {
        let nric = person.nric.clone();
        match self.repos.people.insert(person) {
            Ok(stored) => {
                info!(nric = %stored.nric, role = stored.role_label(), "person registered");
                Ok(stored)
            }
            Err(RepositoryError::Conflict) => Err(ConflictError::DuplicatePerson(nric).into()),
            Err(other) => Err(other.into()),
        }
    }

    pub fn get_person(&self, nric: &Nric) -> Result<Person, HousingError> {
        self.repos
            .people
            .fetch(nric)?
            .ok_or_else(|| NotFoundError::Person(nric.clone()).into())
    }

    /// Unit types `nric` may apply for.
    pub fn eligible_unit_types(&self, nric: &Nric) -> Result<BTreeSet<UnitType>, HousingError> {
        let person = self.get_person(nric)?;
        Ok(self.eligibility.eligible_for(&person))
    }

    pub fn create_project(&self, listing: NewProject) -> Result<Project, HousingError> {
        self.catalog.create_project(listing)
    }

    pub fn update_project(
        &self,
        project: &ProjectName,
        changes: ProjectUpdate,
    ) -> Result<Project, HousingError> {
        self.catalog.update_project(project, changes)
    }

    pub fn filter_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, HousingError> {
        self.catalog.filter_projects(filter)
    }

    pub fn create(
        &self,
        applicant: &Nric,
        project: &ProjectName,
        unit_type: UnitType,
    ) -> Result<Application, HousingError> {
        self.lifecycle.create(applicant, project, unit_type)
    }

    pub fn approve(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.lifecycle.approve(application_id)
    }

    pub fn reject(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.lifecycle.reject(application_id)
    }

    pub fn request_withdrawal(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.lifecycle.request_withdrawal(application_id)
    }

    pub fn approve_withdrawal(
        &self,
        application_id: &ApplicationId,
    ) -> Result<WithdrawalOutcome, HousingError> {
        self.lifecycle.approve_withdrawal(application_id)
    }

    pub fn book_flat(&self, application_id: &ApplicationId, staff: &Nric) -> Result<Booking, HousingError> {
        self.booking.book_flat(application_id, staff)
    }

    pub fn generate_receipt(&self, booking_id: &BookingId) -> Result<BookingReceipt, HousingError> {
        self.booking.generate_receipt(booking_id)
    }

    pub fn booking_report(&self, filter: &BookingReportFilter) -> Result<Vec<BookingReportRow>, HousingError> {
        self.booking.booking_report(filter)
    }

    pub fn get_application(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.lifecycle.get_application(application_id)
    }

    pub fn get_current_application_for_applicant(
        &self,
        applicant: &Nric,
    ) -> Result<Option<Application>, HousingError> {
        self.lifecycle.current_application_for_applicant(applicant)
    }

    pub fn get_applications_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<Vec<Application>, HousingError> {
        self.lifecycle.applications_for_project(project)
    }

    pub fn get_applications_for_project_with_status(
        &self,
        project: &ProjectName,
        status: ApplicationStatus,
    ) -> Result<Vec<Application>, HousingError> {
        self.lifecycle
            .applications_for_project_with_status(project, status)
    }

    pub fn register_officer(
        &self,
        staff: &Nric,
        project: &ProjectName,
    ) -> Result<OfficerRegistration, HousingError> {
        self.registry.register(staff, project)
    }

    /// Approves a registration using the officer and project recorded on it.
    pub fn approve_officer_registration(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<OfficerRegistration, HousingError> {
        let registration = self.registry.get_registration(registration_id)?;
        self.registry
            .approve(registration_id, &registration.staff, &registration.project)
    }

    pub fn reject_officer_registration(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<OfficerRegistration, HousingError> {
        self.registry.reject(registration_id)
    }

    pub fn submit_enquiry(
        &self,
        author: &Nric,
        project: &ProjectName,
        message: &str,
    ) -> Result<Enquiry, HousingError> {
        self.enquiries.submit(author, project, message)
    }

    pub fn edit_enquiry(
        &self,
        enquiry_id: &EnquiryId,
        author: &Nric,
        message: &str,
    ) -> Result<Enquiry, HousingError> {
        self.enquiries.edit(enquiry_id, author, message)
    }

    pub fn delete_enquiry(&self, enquiry_id: &EnquiryId, author: &Nric) -> Result<Enquiry, HousingError> {
        self.enquiries.delete(enquiry_id, author)
    }

    pub fn reply_to_enquiry(
        &self,
        enquiry_id: &EnquiryId,
        responder: &Nric,
        message: &str,
    ) -> Result<Enquiry, HousingError> {
        self.enquiries.reply(enquiry_id, responder, message)
    }

    pub fn list_enquiries(&self, filter: &EnquiryFilter) -> Result<Vec<Enquiry>, HousingError> {
        self.enquiries.list(filter)
    }

    /// Finishes work a crash may have interrupted: approved withdrawals whose records
    /// remain, unit holds without a booking, and officer lists that disagree with the
    /// officers' own bindings.
    ///
    /// Id sequences are advanced past stored records first, in case the repositories were
    /// unreachable when the service was built.
    pub fn recover(&self) -> Result<RecoveryReport, HousingError> {
        self.lifecycle.resume_ids()?;
        self.booking.resume_ids()?;
        self.registry.resume_ids()?;
        self.enquiries.resume_ids()?;
        let report = RecoveryReport {
            withdrawals_completed: self.lifecycle.resume_withdrawals()?,
            holds_released: self.booking.release_orphaned_holds()?,
            officer_lists_repaired: self.registry.reconcile()?,
        };
        if !report.is_clean() {
            info!(?report, "recovery repaired interrupted operations");
        }
        Ok(report)
    }
}
