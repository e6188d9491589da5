use bto_housing::housing::{
    HousingError, HousingService, MaritalStatus, NewProject, Nric, Person, ProjectName, UnitType,
};
use chrono::{Duration, NaiveDate};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Identities created by [`seed_sample_data`].
#[derive(Debug, Clone)]
pub(crate) struct SampleData {
    pub(crate) manager: Nric,
    pub(crate) officer: Nric,
    pub(crate) applicants: Vec<Nric>,
    pub(crate) project: ProjectName,
}

/// Registers a manager, an officer bound to one open project, and three applicants.
pub(crate) fn seed_sample_data(
    service: &HousingService,
    today: NaiveDate,
) -> Result<SampleData, HousingError> {
    let manager = service
        .register_person(Person::manager("S8000001M", 45, MaritalStatus::Married))?
        .nric;
    let officer = service
        .register_person(Person::officer("T8000001O", 32, MaritalStatus::Married))?
        .nric;

    let mut applicants = Vec::new();
    for (nric, age, status) in [
        ("S8100001A", 36, MaritalStatus::Single),
        ("S8100002B", 29, MaritalStatus::Married),
        ("S8100003C", 24, MaritalStatus::Single),
    ] {
        applicants.push(service.register_person(Person::applicant(nric, age, status))?.nric);
    }

    let project = service
        .create_project(NewProject {
            name: ProjectName::from("Sunrise Residences"),
            neighbourhood: "Yishun".to_string(),
            opening_date: today - Duration::days(7),
            closing_date: today + Duration::days(60),
            units: BTreeMap::from([(UnitType::TwoRoom, 2), (UnitType::ThreeRoom, 3)]),
            officer_slots: 3,
            manager: manager.clone(),
        })?
        .name;
    service.catalog().set_visibility(&project, true)?;

    let registration = service.register_officer(&officer, &project)?;
    service.approve_officer_registration(&registration.id)?;

    Ok(SampleData {
        manager,
        officer,
        applicants,
        project,
    })
}
