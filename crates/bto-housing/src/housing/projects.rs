use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{Nric, Person, Project, ProjectName, UnitStock, UnitType};
use super::eligibility::EligibilityPolicy;
use super::error::{ConflictError, HousingError, NotFoundError, ValidationError};
use super::locks::LockTable;
use super::registry::OfficerAssignmentRegistry;
use super::repository::{Repositories, RepositoryError};

/// Listing details supplied by a manager when a project is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: ProjectName,
    pub neighbourhood: String,
    pub opening_date: NaiveDate,
    pub closing_date: NaiveDate,
    pub units: BTreeMap<UnitType, u32>,
    pub officer_slots: u32,
    pub manager: Nric,
}

/// Changes a manager may make to an existing listing; `None` keeps the current value.
///
/// Unit types named in `units` get that provisioned count; unit types not named keep theirs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub neighbourhood: Option<String>,
    pub opening_date: Option<NaiveDate>,
    pub closing_date: Option<NaiveDate>,
    #[serde(default)]
    pub units: BTreeMap<UnitType, u32>,
    pub officer_slots: Option<u32>,
}

/// Listing criteria; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFilter {
    /// Compared ignoring case.
    pub neighbourhood: Option<String>,
    pub unit_type: Option<UnitType>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        self.neighbourhood
            .as_ref()
            .map_or(true, |wanted| project.neighbourhood.eq_ignore_ascii_case(wanted.trim()))
            && self.unit_type.map_or(true, |unit_type| project.offers(unit_type))
    }
}

/// Project listings and their lifecycle outside of inventory and officer bookkeeping.
pub struct ProjectCatalog {
    repos: Repositories,
    locks: Arc<LockTable>,
    registry: Arc<OfficerAssignmentRegistry>,
    eligibility: EligibilityPolicy,
    max_officer_slots: u32,
}

impl ProjectCatalog {
    pub(crate) fn new(
        repos: Repositories,
        locks: Arc<LockTable>,
        registry: Arc<OfficerAssignmentRegistry>,
        eligibility: EligibilityPolicy,
        max_officer_slots: u32,
    ) -> Self {
        Self {
            repos,
            locks,
            registry,
            eligibility,
            max_officer_slots,
        }
    }

    /// Creates a hidden project and provisions its unit inventory.
    pub fn create_project(&self, listing: NewProject) -> Result<Project, HousingError> {
        if listing.name.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyField("project name").into());
        }
        if listing.closing_date < listing.opening_date {
            return Err(ValidationError::InvalidWindow {
                opening: listing.opening_date,
                closing: listing.closing_date,
            }
            .into());
        }
        if listing.officer_slots > self.max_officer_slots {
            return Err(ValidationError::SlotLimitExceeded {
                requested: listing.officer_slots,
                maximum: self.max_officer_slots,
            }
            .into());
        }

        self.locks.people.with(&listing.manager, || {
            let mut manager = self
                .repos
                .people
                .fetch(&listing.manager)?
                .ok_or_else(|| NotFoundError::Person(listing.manager.clone()))?;
            let Some(profile) = manager.manager_profile_mut() else {
                return Err(ValidationError::NotAManager(listing.manager.clone()).into());
            };
            profile.managed_projects.insert(listing.name.clone());

            let project = Project {
                name: listing.name.clone(),
                neighbourhood: listing.neighbourhood.clone(),
                opening_date: listing.opening_date,
                closing_date: listing.closing_date,
                units: listing
                    .units
                    .iter()
                    .map(|(unit_type, total)| (*unit_type, UnitStock::new(*total)))
                    .collect(),
                officer_slots: listing.officer_slots,
                officers: Vec::new(),
                visible: false,
                manager: listing.manager.clone(),
            };

            let stored = match self.repos.projects.insert(project) {
                Ok(stored) => stored,
                Err(RepositoryError::Conflict) => {
                    return Err(ConflictError::DuplicateProject(listing.name.clone()).into())
                }
                Err(other) => return Err(other.into()),
            };
            if let Err(err) = self.repos.people.update(manager) {
                self.repos.projects.delete(&stored.name)?;
                return Err(err.into());
            }

            info!(project = %stored.name, manager = %stored.manager, "project created");
            Ok(stored)
        })
    }

    pub fn set_visibility(&self, project: &ProjectName, visible: bool) -> Result<Project, HousingError> {
        self.locks.projects.with(project, || {
            let mut record = self.fetch_project(project)?;
            record.visible = visible;
            self.repos.projects.update(record.clone())?;
            info!(%project, visible, "project visibility changed");
            Ok(record)
        })
    }

    /// Edits a listing in place.
    ///
    /// A unit type's provisioned count may not drop below the units already held for it,
    /// and officer slots may not drop below the officers already assigned. Available
    /// counts are recomputed from the holders so the inventory stays consistent.
    pub fn update_project(
        &self,
        project: &ProjectName,
        changes: ProjectUpdate,
    ) -> Result<Project, HousingError> {
        if changes
            .neighbourhood
            .as_ref()
            .is_some_and(|neighbourhood| neighbourhood.trim().is_empty())
        {
            return Err(ValidationError::EmptyField("neighbourhood").into());
        }
        if let Some(requested) = changes.officer_slots {
            if requested > self.max_officer_slots {
                return Err(ValidationError::SlotLimitExceeded {
                    requested,
                    maximum: self.max_officer_slots,
                }
                .into());
            }
        }

        self.locks.projects.with(project, || {
            let mut record = self.fetch_project(project)?;

            let opening = changes.opening_date.unwrap_or(record.opening_date);
            let closing = changes.closing_date.unwrap_or(record.closing_date);
            if closing < opening {
                return Err(ValidationError::InvalidWindow { opening, closing }.into());
            }

            if let Some(requested) = changes.officer_slots {
                let assigned = u32::try_from(record.officers.len()).unwrap_or(u32::MAX);
                if requested < assigned {
                    return Err(ValidationError::SlotsBelowAssigned { requested, assigned }.into());
                }
                record.officer_slots = requested;
            }

            for (unit_type, provisioned) in &changes.units {
                let stock = record
                    .units
                    .entry(*unit_type)
                    .or_insert_with(|| UnitStock::new(0));
                let held = u32::try_from(stock.holders.len()).unwrap_or(u32::MAX);
                if *provisioned < held {
                    return Err(ConflictError::UnitsBelowHeld {
                        project: project.clone(),
                        unit_type: *unit_type,
                        held,
                    }
                    .into());
                }
                stock.provisioned = *provisioned;
                stock.available = provisioned - held;
            }

            if let Some(neighbourhood) = &changes.neighbourhood {
                record.neighbourhood = neighbourhood.trim().to_string();
            }
            record.opening_date = opening;
            record.closing_date = closing;

            self.repos.projects.update(record.clone())?;
            info!(%project, "project updated");
            Ok(record)
        })
    }

    pub fn get_project(&self, project: &ProjectName) -> Result<Project, HousingError> {
        self.fetch_project(project)
    }

    pub fn list_projects(&self) -> Result<Vec<Project>, HousingError> {
        Ok(self.repos.projects.list()?)
    }

    /// Every project matching `filter`, in name order.
    pub fn filter_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, HousingError> {
        let mut projects = self.list_projects()?;
        projects.retain(|project| filter.matches(project));
        Ok(projects)
    }

    pub fn projects_for_manager(&self, manager: &Nric) -> Result<Vec<Project>, HousingError> {
        let mut projects = self.list_projects()?;
        projects.retain(|project| project.manager == *manager);
        Ok(projects)
    }

    /// Visible projects offering at least one unit type `applicant` is eligible for.
    pub fn visible_projects_for(&self, applicant: &Nric) -> Result<Vec<Project>, HousingError> {
        self.visible_projects_matching(applicant, &ProjectFilter::default())
    }

    /// [`visible_projects_for`](Self::visible_projects_for), further narrowed by `filter`.
    pub fn visible_projects_matching(
        &self,
        applicant: &Nric,
        filter: &ProjectFilter,
    ) -> Result<Vec<Project>, HousingError> {
        let person: Person = self
            .repos
            .people
            .fetch(applicant)?
            .ok_or_else(|| NotFoundError::Person(applicant.clone()))?;
        let eligible = self.eligibility.eligible_for(&person);

        let mut projects = self.list_projects()?;
        projects.retain(|project| {
            project.visible
                && filter.matches(project)
                && eligible.iter().any(|unit_type| project.offers(*unit_type))
        });
        Ok(projects)
    }

    /// Deletes a project with no applications, releasing every officer bound to it.
    ///
    /// The application check and the delete happen under the project lock, which
    /// [`ApplicationLifecycle::create`](super::lifecycle::ApplicationLifecycle::create) and
    /// officer approval also take. Officer bindings are cleared afterwards; any left behind
    /// by a crash are cleared by recovery.
    pub fn delete_project(&self, project: &ProjectName) -> Result<Project, HousingError> {
        let removed = self.locks.projects.with(project, || {
            self.fetch_project(project)?;
            self.ensure_no_applications(project)?;
            Ok::<_, HousingError>(self.repos.projects.delete(project)?)
        })?;

        for staff in &removed.officers {
            self.registry.unbind(staff, project)?;
        }

        self.locks.people.with(&removed.manager, || {
            if let Some(mut manager) = self.repos.people.fetch(&removed.manager)? {
                if let Some(profile) = manager.manager_profile_mut() {
                    profile.managed_projects.remove(project);
                    self.repos.people.update(manager)?;
                }
            }
            Ok::<_, HousingError>(())
        })?;

        info!(%project, officers = removed.officers.len(), "project deleted");
        Ok(removed)
    }

    fn ensure_no_applications(&self, project: &ProjectName) -> Result<(), HousingError> {
        let in_use = self
            .repos
            .applications
            .list()?
            .iter()
            .any(|application| application.project == *project);
        if in_use {
            return Err(ConflictError::ProjectHasApplications(project.clone()).into());
        }
        Ok(())
    }

    fn fetch_project(&self, project: &ProjectName) -> Result<Project, HousingError> {
        self.repos
            .projects
            .fetch(project)?
            .ok_or_else(|| NotFoundError::Project(project.clone()).into())
    }
}
