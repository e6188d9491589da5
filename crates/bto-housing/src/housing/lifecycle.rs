use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock::{Clock, IdSequence};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Nric, Person, Project, ProjectName, UnitType,
};
use super::eligibility::EligibilityPolicy;
use super::error::{ConflictError, HousingError, NotFoundError, StateError, ValidationError};
use super::inventory::UnitInventory;
use super::locks::LockTable;
use super::repository::{delete_if_present, Repositories};

/// Result of an approved withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalOutcome {
    pub application: Application,
    pub unit_released: bool,
}

/// State machine for a single application, from creation to its terminal state.
///
/// ```text
/// PENDING --approve--> SUCCESSFUL --book--> BOOKED
///    \--reject--> UNSUCCESSFUL
/// any --approve withdrawal--> (deleted)
/// ```
pub struct ApplicationLifecycle {
    repos: Repositories,
    locks: Arc<LockTable>,
    eligibility: EligibilityPolicy,
    inventory: UnitInventory,
    clock: Arc<dyn Clock>,
    ids: IdSequence,
}

impl ApplicationLifecycle {
    pub(crate) fn new(
        repos: Repositories,
        locks: Arc<LockTable>,
        eligibility: EligibilityPolicy,
        inventory: UnitInventory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let lifecycle = Self {
            repos,
            locks,
            eligibility,
            inventory,
            clock,
            ids: IdSequence::new("app"),
        };
        if let Err(err) = lifecycle.resume_ids() {
            warn!(error = %err, "application ids not seeded from storage");
        }
        lifecycle
    }

    /// Advances the id sequence past every stored application.
    pub(crate) fn resume_ids(&self) -> Result<(), HousingError> {
        for application in self.repos.applications.list()? {
            self.ids.observe(application.id.as_str());
        }
        Ok(())
    }

    /// Creates a pending application and links it from the applicant.
    ///
    /// Remaining inventory is only a hint here; units are taken at booking time.
    pub fn create(
        &self,
        applicant: &Nric,
        project: &ProjectName,
        unit_type: UnitType,
    ) -> Result<Application, HousingError> {
        self.locks.people.with(applicant, || {
            let mut person = self.fetch_person(applicant)?;
            if !person.can_apply() {
                return Err(ValidationError::NotAnApplicant(applicant.clone()).into());
            }
            let handles_target = person
                .officer_profile()
                .is_some_and(|profile| profile.handling_project.as_ref() == Some(project));
            if handles_target {
                return Err(ValidationError::HandlesProject {
                    officer: applicant.clone(),
                    project: project.clone(),
                }
                .into());
            }
            let target = self.fetch_project(project)?;

            if let Some(existing) = self.active_application_of(&person)? {
                return Err(ConflictError::ActiveApplication {
                    applicant: applicant.clone(),
                    application: existing.id,
                }
                .into());
            }

            if !self
                .eligibility
                .is_eligible(person.age, person.marital_status, unit_type)
            {
                return Err(ValidationError::Ineligible {
                    applicant: applicant.clone(),
                    unit_type,
                }
                .into());
            }

            check_availability(&target, unit_type)?;

            let application = Application::new(
                ApplicationId::new(self.ids.next_id()),
                applicant.clone(),
                project.clone(),
                unit_type,
                self.clock.now(),
            );
            // A concurrent delete_project either sees this application or makes the insert fail.
            let stored = self.locks.projects.with(project, || {
                self.fetch_project(project)?;
                Ok::<_, HousingError>(self.repos.applications.insert(application)?)
            })?;

            person.set_current_application(Some(stored.id.clone()));
            if let Err(err) = self.repos.people.update(person) {
                // Undo the insert so the failed call leaves nothing behind.
                delete_if_present(self.repos.applications.as_ref(), &stored.id)?;
                return Err(err.into());
            }

            info!(
                application_id = %stored.id,
                applicant = %applicant,
                %project,
                %unit_type,
                "application created"
            );
            Ok(stored)
        })
    }

    /// PENDING to SUCCESSFUL. Inventory is not touched.
    pub fn approve(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.locks.applications.with(application_id, || {
            let mut application = self.fetch_application(application_id)?;
            ensure_status(&application, ApplicationStatus::Pending, "approve")?;

            application.status = ApplicationStatus::Successful;
            self.repos.applications.update(application.clone())?;

            info!(%application_id, project = %application.project, "application approved");
            Ok(application)
        })
    }

    /// PENDING to UNSUCCESSFUL, clearing the applicant's link so they may apply again.
    pub fn reject(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        let applicant = self.fetch_application(application_id)?.applicant;

        self.locks.people.with(&applicant, || {
            self.locks.applications.with(application_id, || {
                let mut application = self.fetch_application(application_id)?;
                ensure_status(&application, ApplicationStatus::Pending, "reject")?;

                application.status = ApplicationStatus::Unsuccessful;
                self.repos.applications.update(application.clone())?;

                if let Err(err) = self.unlink_applicant(&applicant, application_id) {
                    let mut restored = application.clone();
                    restored.status = ApplicationStatus::Pending;
                    self.repos.applications.update(restored)?;
                    return Err(err);
                }

                info!(%application_id, applicant = %applicant, "application rejected");
                Ok(application)
            })
        })
    }

    /// Flags the application as having a withdrawal request. Status is left as is.
    pub fn request_withdrawal(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.locks.applications.with(application_id, || {
            let mut application = self.fetch_application(application_id)?;
            if application.withdrawal_requested {
                return Ok(application);
            }

            application.withdrawal_requested = true;
            self.repos.applications.update(application.clone())?;

            info!(
                %application_id,
                status = %application.status,
                "withdrawal requested"
            );
            Ok(application)
        })
    }

    /// Releases any held unit, clears the applicant's link, and deletes the application
    /// together with its booking.
    ///
    /// The approval is recorded on the application before anything is removed, so an
    /// interrupted call is finished by [`ApplicationLifecycle::resume_withdrawals`].
    pub fn approve_withdrawal(
        &self,
        application_id: &ApplicationId,
    ) -> Result<WithdrawalOutcome, HousingError> {
        let applicant = self.fetch_application(application_id)?.applicant;

        self.locks.people.with(&applicant, || {
            self.locks.applications.with(application_id, || {
                let mut application = self.fetch_application(application_id)?;
                if !application.withdrawal_requested {
                    debug!(%application_id, "withdrawal approved without a prior request");
                }

                if !application.withdrawal_approved {
                    application.withdrawal_approved = true;
                    self.repos.applications.update(application.clone())?;
                }

                self.finish_withdrawal(application)
            })
        })
    }

    /// Completes withdrawals that were approved but interrupted before the record was
    /// removed. Returns the number completed.
    pub(crate) fn resume_withdrawals(&self) -> Result<usize, HousingError> {
        let approved: Vec<Application> = self
            .repos
            .applications
            .list()?
            .into_iter()
            .filter(|application| application.withdrawal_approved)
            .collect();

        let mut completed = 0;
        for pending in approved {
            let id = pending.id.clone();
            let finished = self.locks.people.with(&pending.applicant, || {
                self.locks.applications.with(&id, || {
                    match self.repos.applications.fetch(&id)? {
                        Some(application) => self.finish_withdrawal(application).map(|_| true),
                        None => Ok(false),
                    }
                })
            })?;
            if finished {
                warn!(application_id = %id, "completed interrupted withdrawal");
                completed += 1;
            }
        }
        Ok(completed)
    }

    pub fn get_application(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.fetch_application(application_id)
    }

    /// The application currently linked from the applicant, if any.
    pub fn current_application_for_applicant(
        &self,
        applicant: &Nric,
    ) -> Result<Option<Application>, HousingError> {
        let person = self.fetch_person(applicant)?;
        match person.current_application() {
            Some(id) => Ok(self.repos.applications.fetch(id)?),
            None => Ok(None),
        }
    }

    pub fn applications_for_project(&self, project: &ProjectName) -> Result<Vec<Application>, HousingError> {
        let mut applications: Vec<Application> = self
            .repos
            .applications
            .list()?
            .into_iter()
            .filter(|application| application.project == *project)
            .collect();
        applications.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        debug!(%project, count = applications.len(), "listing project applications");
        Ok(applications)
    }

    pub fn applications_for_project_with_status(
        &self,
        project: &ProjectName,
        status: ApplicationStatus,
    ) -> Result<Vec<Application>, HousingError> {
        let mut applications = self.applications_for_project(project)?;
        applications.retain(|application| application.status == status);
        Ok(applications)
    }

    /// Successful and booked applications for a project.
    pub fn successful_applications_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<Vec<Application>, HousingError> {
        let mut applications = self.applications_for_project(project)?;
        applications.retain(|application| {
            matches!(
                application.status,
                ApplicationStatus::Successful | ApplicationStatus::Booked
            )
        });
        Ok(applications)
    }

    /// Caller holds the applicant and application locks.
    fn finish_withdrawal(&self, application: Application) -> Result<WithdrawalOutcome, HousingError> {
        let unit_released = match application.status {
            ApplicationStatus::Successful | ApplicationStatus::Booked => self.inventory.increment(
                &application.project,
                application.unit_type,
                &application.id,
            )?,
            ApplicationStatus::Pending | ApplicationStatus::Unsuccessful => false,
        };

        if let Some(booking) = &application.booking {
            delete_if_present(self.repos.bookings.as_ref(), booking)?;
        }
        delete_if_present(self.repos.applications.as_ref(), &application.id)?;
        self.unlink_applicant(&application.applicant, &application.id)?;

        info!(
            application_id = %application.id,
            project = %application.project,
            unit_released,
            "withdrawal approved"
        );
        Ok(WithdrawalOutcome {
            application,
            unit_released,
        })
    }

    /// Clears the applicant's link if it still points at `application_id`.
    fn unlink_applicant(&self, applicant: &Nric, application_id: &ApplicationId) -> Result<(), HousingError> {
        let Some(mut person) = self.repos.people.fetch(applicant)? else {
            return Ok(());
        };
        if person.current_application() != Some(application_id) {
            return Ok(());
        }
        person.set_current_application(None);
        self.repos.people.update(person)?;
        Ok(())
    }

    /// The linked application if it still blocks a new one.
    fn active_application_of(&self, person: &Person) -> Result<Option<Application>, HousingError> {
        let Some(id) = person.current_application() else {
            return Ok(None);
        };
        Ok(self
            .repos
            .applications
            .fetch(id)?
            .filter(|application| application.status.is_active()))
    }

    fn fetch_person(&self, nric: &Nric) -> Result<Person, HousingError> {
        self.repos
            .people
            .fetch(nric)?
            .ok_or_else(|| NotFoundError::Person(nric.clone()).into())
    }

    fn fetch_project(&self, project: &ProjectName) -> Result<Project, HousingError> {
        self.repos
            .projects
            .fetch(project)?
            .ok_or_else(|| NotFoundError::Project(project.clone()).into())
    }

    fn fetch_application(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.repos
            .applications
            .fetch(application_id)?
            .ok_or_else(|| NotFoundError::Application(application_id.clone()).into())
    }
}

fn check_availability(project: &Project, unit_type: UnitType) -> Result<(), HousingError> {
    if !project.offers(unit_type) {
        return Err(ValidationError::UnitTypeNotOffered {
            project: project.name.clone(),
            unit_type,
        }
        .into());
    }
    if project.remaining_units(unit_type) == 0 {
        return Err(ConflictError::NoUnitsRemaining {
            project: project.name.clone(),
            unit_type,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn ensure_status(
    application: &Application,
    expected: ApplicationStatus,
    action: &'static str,
) -> Result<(), HousingError> {
    if application.withdrawal_approved {
        return Err(StateError::WithdrawalInProgress(application.id.clone()).into());
    }
    if application.status != expected {
        return Err(StateError::InvalidTransition {
            application: application.id.clone(),
            status: application.status,
            action,
        }
        .into());
    }
    Ok(())
}
