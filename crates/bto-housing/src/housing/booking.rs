use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::{Clock, IdSequence};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Booking, BookingId, MaritalStatus, Nric,
    ProjectName, UnitType,
};
use super::error::{ConflictError, HousingError, NotFoundError, StateError};
use super::inventory::UnitInventory;
use super::locks::LockTable;
use super::registry::OfficerAssignmentRegistry;
use super::repository::{delete_if_present, Repositories};

/// Turns a successful application into a finalized unit booking.
pub struct BookingProcessor {
    repos: Repositories,
    locks: Arc<LockTable>,
    inventory: UnitInventory,
    registry: Arc<OfficerAssignmentRegistry>,
    clock: Arc<dyn Clock>,
    ids: IdSequence,
}

impl BookingProcessor {
    pub(crate) fn new(
        repos: Repositories,
        locks: Arc<LockTable>,
        inventory: UnitInventory,
        registry: Arc<OfficerAssignmentRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let processor = Self {
            repos,
            locks,
            inventory,
            registry,
            clock,
            ids: IdSequence::new("bkg"),
        };
        if let Err(err) = processor.resume_ids() {
            warn!(error = %err, "booking ids not seeded from storage");
        }
        processor
    }

    /// Advances the id sequence past every stored booking.
    pub(crate) fn resume_ids(&self) -> Result<(), HousingError> {
        for booking in self.repos.bookings.list()? {
            self.ids.observe(booking.id.as_str());
        }
        Ok(())
    }

    /// Books a unit for a successful application on behalf of `staff`.
    ///
    /// Checks, in order: the application is SUCCESSFUL with no booking, `staff` is bound
    /// to the application's project, and a unit can be taken. The whole sequence runs
    /// under the application's lock, so concurrent attempts on one application cannot
    /// both succeed; any failure undoes what was done.
    pub fn book_flat(&self, application_id: &ApplicationId, staff: &Nric) -> Result<Booking, HousingError> {
        self.locks.people.with(staff, || {
            self.locks.applications.with(application_id, || {
                let mut application = self.fetch_application(application_id)?;
                ensure_bookable(&application)?;

                let assigned = self.registry.assignment_of(staff)?;
                if assigned.as_ref() != Some(&application.project) {
                    return Err(ConflictError::StaffNotAssigned {
                        staff: staff.clone(),
                        project: application.project.clone(),
                    }
                    .into());
                }

                let project = application.project.clone();
                let unit_type = application.unit_type;
                if !self.inventory.decrement(&project, unit_type, application_id)? {
                    warn!(%application_id, %project, %unit_type, "booking refused: no units remaining");
                    return Err(ConflictError::NoUnitsRemaining { project, unit_type }.into());
                }

                let booking = Booking {
                    id: BookingId::new(self.ids.next_id()),
                    application: application_id.clone(),
                    applicant: application.applicant.clone(),
                    project: project.clone(),
                    unit_type,
                    staff: staff.clone(),
                    created_at: self.clock.now(),
                };
                let booking = match self.repos.bookings.insert(booking) {
                    Ok(booking) => booking,
                    Err(err) => {
                        self.inventory.increment(&project, unit_type, application_id)?;
                        return Err(err.into());
                    }
                };

                application.booking = Some(booking.id.clone());
                application.status = ApplicationStatus::Booked;
                if let Err(err) = self.repos.applications.update(application) {
                    delete_if_present(self.repos.bookings.as_ref(), &booking.id)?;
                    self.inventory.increment(&project, unit_type, application_id)?;
                    return Err(err.into());
                }

                info!(
                    booking_id = %booking.id,
                    %application_id,
                    %project,
                    %unit_type,
                    staff = %staff,
                    "unit booked"
                );
                Ok(booking)
            })
        })
    }

    pub fn get_booking(&self, booking_id: &BookingId) -> Result<Booking, HousingError> {
        self.repos
            .bookings
            .fetch(booking_id)?
            .ok_or_else(|| NotFoundError::Booking(booking_id.clone()).into())
    }

    pub fn bookings_for_project(&self, project: &ProjectName) -> Result<Vec<Booking>, HousingError> {
        let mut bookings: Vec<Booking> = self
            .repos
            .bookings
            .list()?
            .into_iter()
            .filter(|booking| booking.project == *project)
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    /// Bookings joined with applicant attributes, narrowed by `filter`.
    pub fn booking_report(&self, filter: &BookingReportFilter) -> Result<Vec<BookingReportRow>, HousingError> {
        let mut rows = Vec::new();
        for booking in self.repos.bookings.list()? {
            if filter.project.as_ref().is_some_and(|project| *project != booking.project) {
                continue;
            }
            if filter.unit_type.is_some_and(|unit_type| unit_type != booking.unit_type) {
                continue;
            }
            let Some(applicant) = self.repos.people.fetch(&booking.applicant)? else {
                continue;
            };
            if !filter.matches_applicant(applicant.age, applicant.marital_status) {
                continue;
            }
            rows.push(BookingReportRow {
                booking_id: booking.id,
                applicant: booking.applicant,
                age: applicant.age,
                marital_status: applicant.marital_status,
                project: booking.project,
                unit_type: booking.unit_type,
                booked_at: booking.created_at,
            });
        }
        rows.sort_by(|a, b| a.booked_at.cmp(&b.booked_at).then(a.booking_id.cmp(&b.booking_id)));
        debug!(rows = rows.len(), "booking report generated");
        Ok(rows)
    }

    /// Read-side receipt for a booking.
    pub fn generate_receipt(&self, booking_id: &BookingId) -> Result<BookingReceipt, HousingError> {
        let booking = self.get_booking(booking_id)?;
        let applicant = self
            .repos
            .people
            .fetch(&booking.applicant)?
            .ok_or_else(|| NotFoundError::Person(booking.applicant.clone()))?;
        let project = self
            .repos
            .projects
            .fetch(&booking.project)?
            .ok_or_else(|| NotFoundError::Project(booking.project.clone()))?;

        Ok(BookingReceipt {
            booking_id: booking.id,
            booked_at: booking.created_at,
            applicant: applicant.nric,
            age: applicant.age,
            marital_status: applicant.marital_status,
            project: project.name,
            neighbourhood: project.neighbourhood,
            unit_type: booking.unit_type,
            staff: booking.staff,
        })
    }

    /// Releases inventory holds that no booked application accounts for.
    ///
    /// A hold without a matching booking is left behind when a booking attempt is
    /// interrupted between taking the unit and recording the booking. Returns the number
    /// of holds released.
    pub(crate) fn release_orphaned_holds(&self) -> Result<usize, HousingError> {
        let mut released = 0;
        for project in self.repos.projects.list()? {
            for (unit_type, stock) in &project.units {
                let holders: BTreeSet<ApplicationId> = stock.holders.clone();
                for holder in holders {
                    let orphaned = self.locks.applications.with(&holder, || {
                        let booked = self
                            .repos
                            .applications
                            .fetch(&holder)?
                            .and_then(|application| application.booking)
                            .map(|booking| self.repos.bookings.fetch(&booking))
                            .transpose()?
                            .flatten()
                            .is_some();
                        if booked {
                            return Ok::<_, HousingError>(false);
                        }
                        self.inventory.increment(&project.name, *unit_type, &holder)
                    })?;
                    if orphaned {
                        warn!(project = %project.name, %unit_type, application_id = %holder, "released orphaned unit hold");
                        released += 1;
                    }
                }
            }
        }
        Ok(released)
    }

    fn fetch_application(&self, application_id: &ApplicationId) -> Result<Application, HousingError> {
        self.repos
            .applications
            .fetch(application_id)?
            .ok_or_else(|| NotFoundError::Application(application_id.clone()).into())
    }
}

fn ensure_bookable(application: &Application) -> Result<(), HousingError> {
    if application.withdrawal_approved {
        return Err(StateError::WithdrawalInProgress(application.id.clone()).into());
    }
    if application.booking.is_some() || application.status == ApplicationStatus::Booked {
        return Err(ConflictError::AlreadyBooked(application.id.clone()).into());
    }
    if application.status != ApplicationStatus::Successful {
        return Err(StateError::InvalidTransition {
            application: application.id.clone(),
            status: application.status,
            action: "book",
        }
        .into());
    }
    Ok(())
}

/// Optional criteria for [`BookingProcessor::booking_report`]; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReportFilter {
    pub project: Option<ProjectName>,
    pub unit_type: Option<UnitType>,
    pub marital_status: Option<MaritalStatus>,
    pub min_age: Option<u8>,
    pub max_age: Option<u8>,
}

impl BookingReportFilter {
    fn matches_applicant(&self, age: u8, marital_status: MaritalStatus) -> bool {
        self.marital_status.map_or(true, |status| status == marital_status)
            && self.min_age.map_or(true, |min| age >= min)
            && self.max_age.map_or(true, |max| age <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReportRow {
    pub booking_id: BookingId,
    pub applicant: Nric,
    pub age: u8,
    pub marital_status: MaritalStatus,
    pub project: ProjectName,
    pub unit_type: UnitType,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReceipt {
    pub booking_id: BookingId,
    pub booked_at: DateTime<Utc>,
    pub applicant: Nric,
    pub age: u8,
    pub marital_status: MaritalStatus,
    pub project: ProjectName,
    pub neighbourhood: String,
    pub unit_type: UnitType,
    pub staff: Nric,
}

impl fmt::Display for BookingReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=============== UNIT BOOKING RECEIPT ===============")?;
        writeln!(f, "Booking ID: {}", self.booking_id)?;
        writeln!(f, "Date: {}", self.booked_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(f)?;
        writeln!(f, "Applicant")?;
        writeln!(f, "  NRIC: {}", self.applicant)?;
        writeln!(f, "  Age: {}", self.age)?;
        writeln!(f, "  Marital status: {}", self.marital_status.label())?;
        writeln!(f)?;
        writeln!(f, "Project")?;
        writeln!(f, "  Name: {}", self.project)?;
        writeln!(f, "  Neighbourhood: {}", self.neighbourhood)?;
        writeln!(f, "  Unit type: {}", self.unit_type)?;
        writeln!(f)?;
        writeln!(f, "Processed by: {}", self.staff)?;
        writeln!(f, "====================================================")
    }
}
