use std::sync::Arc;

use tracing::{info, warn};

use super::clock::{Clock, IdSequence};
use super::domain::{
    Nric, OfficerRegistration, Person, Project, ProjectName, RegistrationId, RegistrationStatus,
};
use super::error::{ConflictError, HousingError, NotFoundError, StateError, ValidationError};
use super::locks::LockTable;
use super::repository::Repositories;

/// Binds officers to the projects they process bookings for.
///
/// The officer's `handling_project` is the authoritative binding and is written first;
/// the project's `officers` list mirrors it and is repaired from it during recovery.
pub struct OfficerAssignmentRegistry {
    repos: Repositories,
    locks: Arc<LockTable>,
    clock: Arc<dyn Clock>,
    ids: IdSequence,
}

impl OfficerAssignmentRegistry {
    pub(crate) fn new(repos: Repositories, locks: Arc<LockTable>, clock: Arc<dyn Clock>) -> Self {
        let registry = Self {
            repos,
            locks,
            clock,
            ids: IdSequence::new("reg"),
        };
        if let Err(err) = registry.resume_ids() {
            warn!(error = %err, "registration ids not seeded from storage");
        }
        registry
    }

    /// Advances the id sequence past every stored registration.
    pub(crate) fn resume_ids(&self) -> Result<(), HousingError> {
        for registration in self.repos.registrations.list()? {
            self.ids.observe(registration.id.as_str());
        }
        Ok(())
    }

    /// Files a pending registration for `staff` to handle `project`.
    ///
    /// Refused while the officer's current project and the target project are both inside
    /// their application windows today, when the officer has an active application for
    /// the target, or when the target has no officer slots left.
    pub fn register(
        &self,
        staff: &Nric,
        project: &ProjectName,
    ) -> Result<OfficerRegistration, HousingError> {
        self.locks.people.with(staff, || {
            let officer = self.fetch_officer(staff)?;
            let target = self.fetch_project(project)?;
            self.ensure_not_applying(&officer, project)?;

            if let Some(current) = officer.handling_project() {
                if current == project {
                    return Err(ConflictError::AlreadyAssigned {
                        staff: staff.clone(),
                        project: project.clone(),
                    }
                    .into());
                }
                let today = self.clock.today();
                if let Some(current_project) = self.repos.projects.fetch(current)? {
                    if current_project.is_open_on(today) && target.is_open_on(today) {
                        return Err(ConflictError::OverlappingAssignment {
                            staff: staff.clone(),
                            current: current.clone(),
                        }
                        .into());
                    }
                }
            }

            if target.available_officer_slots() == 0 {
                warn!(%project, staff = %staff, "officer registration refused: no slots");
                return Err(ConflictError::NoOfficerSlots(project.clone()).into());
            }

            let duplicate = self.repos.registrations.list()?.into_iter().any(|existing| {
                existing.staff == *staff
                    && existing.project == *project
                    && existing.status == RegistrationStatus::Pending
            });
            if duplicate {
                return Err(ConflictError::DuplicateRegistration {
                    staff: staff.clone(),
                    project: project.clone(),
                }
                .into());
            }

            let registration = OfficerRegistration {
                id: RegistrationId::new(self.ids.next_id()),
                staff: staff.clone(),
                project: project.clone(),
                status: RegistrationStatus::Pending,
                registered_at: self.clock.now(),
            };
            let stored = self.repos.registrations.insert(registration)?;
            info!(registration_id = %stored.id, staff = %staff, %project, "officer registration filed");
            Ok(stored)
        })
    }

    /// Binds the officer to the project named by a pending registration.
    ///
    /// Slots, overlapping windows, and the officer's own application are re-checked because
    /// approval may come long after registration. An officer moving from an older project
    /// leaves that project's list in the same step.
    pub fn approve(
        &self,
        registration_id: &RegistrationId,
        staff: &Nric,
        project: &ProjectName,
    ) -> Result<OfficerRegistration, HousingError> {
        self.locks.people.with(staff, || {
            let mut registration = self.fetch_registration(registration_id)?;
            if registration.staff != *staff || registration.project != *project {
                return Err(ValidationError::RegistrationMismatch(registration_id.clone()).into());
            }
            ensure_pending(&registration)?;

            let mut officer = self.fetch_officer(staff)?;
            let previous = officer.handling_project().cloned();
            if previous.as_ref() == Some(project) {
                return Err(ConflictError::AlreadyAssigned {
                    staff: staff.clone(),
                    project: project.clone(),
                }
                .into());
            }
            self.ensure_not_applying(&officer, project)?;

            self.locks
                .with_projects(project, previous.as_ref(), || {
                    let mut target = self.fetch_project(project)?;
                    if let Some(current) = &previous {
                        let today = self.clock.today();
                        if let Some(current_project) = self.repos.projects.fetch(current)? {
                            if current_project.is_open_on(today) && target.is_open_on(today) {
                                warn!(%project, staff = %staff, %current, "officer approval refused: windows overlap");
                                return Err(ConflictError::OverlappingAssignment {
                                    staff: staff.clone(),
                                    current: current.clone(),
                                }
                                .into());
                            }
                        }
                    }
                    if target.available_officer_slots() == 0 {
                        warn!(%project, staff = %staff, "officer approval refused: no slots");
                        return Err(ConflictError::NoOfficerSlots(project.clone()).into());
                    }

                    if let Some(profile) = officer.officer_profile_mut() {
                        profile.handling_project = Some(project.clone());
                    }
                    self.repos.people.update(officer.clone())?;

                    if let Some(old) = &previous {
                        if let Some(mut old_project) = self.repos.projects.fetch(old)? {
                            old_project.officers.retain(|member| member != staff);
                            self.repos.projects.update(old_project)?;
                        }
                    }

                    if !target.has_officer(staff) {
                        target.officers.push(staff.clone());
                    }
                    let remaining_slots = target.available_officer_slots();
                    self.repos.projects.update(target)?;

                    info!(%project, staff = %staff, remaining_slots, "officer assigned");
                    Ok::<_, HousingError>(())
                })?;

            registration.status = RegistrationStatus::Approved;
            self.repos.registrations.update(registration.clone())?;
            Ok(registration)
        })
    }

    /// Closes a pending registration without touching any assignment.
    pub fn reject(&self, registration_id: &RegistrationId) -> Result<OfficerRegistration, HousingError> {
        let staff = self.fetch_registration(registration_id)?.staff;
        self.locks.people.with(&staff, || {
            let mut registration = self.fetch_registration(registration_id)?;
            ensure_pending(&registration)?;
            registration.status = RegistrationStatus::Rejected;
            self.repos.registrations.update(registration.clone())?;
            info!(%registration_id, staff = %staff, "officer registration rejected");
            Ok(registration)
        })
    }

    /// Clears the officer's binding and removes them from the project's list.
    ///
    /// Returns the project the officer was released from, if any.
    pub fn release(&self, staff: &Nric) -> Result<Option<ProjectName>, HousingError> {
        self.locks.people.with(staff, || {
            let mut officer = self.fetch_officer(staff)?;
            let Some(project) = officer.handling_project().cloned() else {
                return Ok(None);
            };

            if let Some(profile) = officer.officer_profile_mut() {
                profile.handling_project = None;
            }
            self.repos.people.update(officer)?;

            self.locks.projects.with(&project, || {
                if let Some(mut record) = self.repos.projects.fetch(&project)? {
                    record.officers.retain(|member| member != staff);
                    self.repos.projects.update(record)?;
                }
                Ok::<_, HousingError>(())
            })?;

            info!(%project, staff = %staff, "officer released");
            Ok(Some(project))
        })
    }

    /// Clears the officer's binding if it still names `project`. Used once `project` is
    /// gone, so its roster is not touched.
    pub(crate) fn unbind(&self, staff: &Nric, project: &ProjectName) -> Result<bool, HousingError> {
        self.locks.people.with(staff, || {
            let Some(mut officer) = self.repos.people.fetch(staff)? else {
                return Ok(false);
            };
            if officer.handling_project() != Some(project) {
                return Ok(false);
            }
            if let Some(profile) = officer.officer_profile_mut() {
                profile.handling_project = None;
            }
            self.repos.people.update(officer)?;
            info!(%project, staff = %staff, "officer unbound from deleted project");
            Ok(true)
        })
    }

    /// The project `staff` is currently bound to.
    pub fn assignment_of(&self, staff: &Nric) -> Result<Option<ProjectName>, HousingError> {
        Ok(self.fetch_officer(staff)?.handling_project().cloned())
    }

    pub fn get_registration(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<OfficerRegistration, HousingError> {
        self.fetch_registration(registration_id)
    }

    pub fn registrations_for_project(
        &self,
        project: &ProjectName,
    ) -> Result<Vec<OfficerRegistration>, HousingError> {
        self.filter_registrations(|registration| registration.project == *project)
    }

    pub fn registrations_for_staff(&self, staff: &Nric) -> Result<Vec<OfficerRegistration>, HousingError> {
        self.filter_registrations(|registration| registration.staff == *staff)
    }

    /// Rebuilds every project's officer list from the officers' own bindings, after
    /// clearing bindings that point at a project which no longer exists.
    ///
    /// Returns the number of records whose officer data changed.
    pub(crate) fn reconcile(&self) -> Result<usize, HousingError> {
        let mut repaired = self.clear_dangling_bindings()?;

        let officers: Vec<Person> = self
            .repos
            .people
            .list()?
            .into_iter()
            .filter(|person| person.officer_profile().is_some())
            .collect();

        for project in self.repos.projects.list()? {
            let name = project.name.clone();
            let changed = self.locks.projects.with(&name, || {
                let Some(mut record) = self.repos.projects.fetch(&name)? else {
                    return Ok::<_, HousingError>(false);
                };
                let mut expected: Vec<Nric> = record
                    .officers
                    .iter()
                    .filter(|member| {
                        officers.iter().any(|officer| {
                            officer.nric == **member && officer.handling_project() == Some(&name)
                        })
                    })
                    .cloned()
                    .collect();
                for officer in &officers {
                    if officer.handling_project() == Some(&name) && !expected.contains(&officer.nric) {
                        expected.push(officer.nric.clone());
                    }
                }
                if expected == record.officers {
                    return Ok(false);
                }
                warn!(project = %name, "officer list out of step with bindings; repairing");
                record.officers = expected;
                self.repos.projects.update(record)?;
                Ok(true)
            })?;
            if changed {
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    /// Unbinds officers whose project was deleted. Returns how many were unbound.
    pub(crate) fn clear_dangling_bindings(&self) -> Result<usize, HousingError> {
        let mut cleared = 0;
        for person in self.repos.people.list()? {
            if person.handling_project().is_none() {
                continue;
            }
            let staff = person.nric;
            let unbound = self.locks.people.with(&staff, || {
                let mut officer = self.fetch_officer(&staff)?;
                let Some(project) = officer.handling_project().cloned() else {
                    return Ok::<_, HousingError>(false);
                };
                let exists = self
                    .locks
                    .projects
                    .with(&project, || self.repos.projects.fetch(&project))?
                    .is_some();
                if exists {
                    return Ok(false);
                }
                if let Some(profile) = officer.officer_profile_mut() {
                    profile.handling_project = None;
                }
                self.repos.people.update(officer)?;
                warn!(%project, staff = %staff, "officer bound to a missing project; unbound");
                Ok(true)
            })?;
            if unbound {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Refuses when `officer` holds an active application for `project`.
    fn ensure_not_applying(&self, officer: &Person, project: &ProjectName) -> Result<(), HousingError> {
        let Some(application_id) = officer.current_application() else {
            return Ok(());
        };
        let applied = self
            .repos
            .applications
            .fetch(application_id)?
            .is_some_and(|application| {
                application.project == *project && application.status.is_active()
            });
        if applied {
            return Err(ConflictError::AppliedToProject {
                staff: officer.nric.clone(),
                project: project.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn filter_registrations(
        &self,
        keep: impl Fn(&OfficerRegistration) -> bool,
    ) -> Result<Vec<OfficerRegistration>, HousingError> {
        let mut registrations: Vec<_> = self
            .repos
            .registrations
            .list()?
            .into_iter()
            .filter(|registration| keep(registration))
            .collect();
        registrations.sort_by(|a, b| a.registered_at.cmp(&b.registered_at).then(a.id.cmp(&b.id)));
        Ok(registrations)
    }

    fn fetch_officer(&self, staff: &Nric) -> Result<Person, HousingError> {
        let person = self
            .repos
            .people
            .fetch(staff)?
            .ok_or_else(|| NotFoundError::Person(staff.clone()))?;
        if person.officer_profile().is_none() {
            return Err(ValidationError::NotAnOfficer(staff.clone()).into());
        }
        Ok(person)
    }

    fn fetch_project(&self, project: &ProjectName) -> Result<Project, HousingError> {
        self.repos
            .projects
            .fetch(project)?
            .ok_or_else(|| NotFoundError::Project(project.clone()).into())
    }

    fn fetch_registration(
        &self,
        registration_id: &RegistrationId,
    ) -> Result<OfficerRegistration, HousingError> {
        self.repos
            .registrations
            .fetch(registration_id)?
            .ok_or_else(|| NotFoundError::Registration(registration_id.clone()).into())
    }
}

fn ensure_pending(registration: &OfficerRegistration) -> Result<(), HousingError> {
    if registration.status != RegistrationStatus::Pending {
        return Err(StateError::RegistrationClosed {
            registration: registration.id.clone(),
            status: registration.status,
        }
        .into());
    }
    Ok(())
}
