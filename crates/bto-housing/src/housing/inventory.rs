use std::sync::Arc;

use tracing::{debug, info, warn};

use super::domain::{ApplicationId, Project, ProjectName, UnitStock, UnitType};
use super::error::{HousingError, NotFoundError, ValidationError};
use super::locks::LockTable;
use super::repository::Repository;

/// Guarded per-project, per-unit-type counters.
///
/// Every unit taken out of a project is recorded against the application holding it, so a
/// unit can only be returned by its holder and `available` never exceeds `provisioned`.
#[derive(Clone)]
pub struct UnitInventory {
    projects: Arc<dyn Repository<Project>>,
    locks: Arc<LockTable>,
}

impl UnitInventory {
    pub(crate) fn new(projects: Arc<dyn Repository<Project>>, locks: Arc<LockTable>) -> Self {
        Self { projects, locks }
    }

    /// Current stock for a unit type. Unlocked read, suitable as an availability hint.
    pub fn stock(&self, project: &ProjectName, unit_type: UnitType) -> Result<UnitStock, HousingError> {
        let record = self.fetch_project(project)?;
        debug!(%project, %unit_type, "reading unit stock");
        stock_of(&record, unit_type).cloned()
    }

    pub fn remaining(&self, project: &ProjectName, unit_type: UnitType) -> Result<u32, HousingError> {
        Ok(self.stock(project, unit_type)?.available)
    }

    /// Takes one unit for `holder` if any remain.
    ///
    /// Returns `Ok(false)` and leaves the counter untouched when none remain. A holder that
    /// already has a unit keeps it and the call reports success without taking another.
    pub fn decrement(
        &self,
        project: &ProjectName,
        unit_type: UnitType,
        holder: &ApplicationId,
    ) -> Result<bool, HousingError> {
        self.locks.projects.with(project, || {
            let mut record = self.fetch_project(project)?;
            let stock = stock_of_mut(&mut record, unit_type)?;

            if stock.holders.contains(holder) {
                return Ok(true);
            }
            if stock.available == 0 {
                warn!(%project, %unit_type, application_id = %holder, "no units remaining");
                return Ok(false);
            }

            stock.available -= 1;
            stock.holders.insert(holder.clone());
            let remaining = stock.available;
            self.projects.update(record)?;

            info!(%project, %unit_type, application_id = %holder, remaining, "unit taken");
            Ok(true)
        })
    }

    /// Returns the unit held by `holder`.
    ///
    /// Returns `Ok(false)` when `holder` holds no unit of this type, so repeated or
    /// out-of-order releases cannot push the counter past its provisioned total.
    pub fn increment(
        &self,
        project: &ProjectName,
        unit_type: UnitType,
        holder: &ApplicationId,
    ) -> Result<bool, HousingError> {
        self.locks.projects.with(project, || {
            let mut record = self.fetch_project(project)?;
            let stock = stock_of_mut(&mut record, unit_type)?;

            if !stock.holders.remove(holder) {
                debug!(%project, %unit_type, application_id = %holder, "holder has no unit to return");
                return Ok(false);
            }
            stock.available = (stock.available + 1).min(stock.provisioned);
            let remaining = stock.available;
            self.projects.update(record)?;

            info!(%project, %unit_type, application_id = %holder, remaining, "unit returned");
            Ok(true)
        })
    }

    fn fetch_project(&self, project: &ProjectName) -> Result<Project, HousingError> {
        self.projects
            .fetch(project)?
            .ok_or_else(|| NotFoundError::Project(project.clone()).into())
    }
}

fn stock_of(project: &Project, unit_type: UnitType) -> Result<&UnitStock, HousingError> {
    project.units.get(&unit_type).ok_or_else(|| {
        ValidationError::UnitTypeNotOffered {
            project: project.name.clone(),
            unit_type,
        }
        .into()
    })
}

fn stock_of_mut(project: &mut Project, unit_type: UnitType) -> Result<&mut UnitStock, HousingError> {
    let name = project.name.clone();
    project.units.get_mut(&unit_type).ok_or_else(|| {
        ValidationError::UnitTypeNotOffered {
            project: name,
            unit_type,
        }
        .into()
    })
}
