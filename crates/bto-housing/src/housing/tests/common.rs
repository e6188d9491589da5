use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::HousingConfig;
use crate::housing::{
    ApplicationId, Entity, FixedClock, HousingService, InMemoryRepository, MaritalStatus,
    NewProject, Nric, Person, ProjectName, Repositories, Repository, RepositoryError, UnitType,
};

pub(super) const MANAGER: &str = "S9000001M";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Service over fresh in-memory repositories with the manager already registered.
pub(super) fn build_service() -> (HousingService, Repositories) {
    let repos = Repositories::in_memory();
    let service = service_over(repos.clone());
    (service, repos)
}

pub(super) fn service_over(repos: Repositories) -> HousingService {
    let service = service_over_existing(repos);
    service
        .register_person(Person::manager(MANAGER, 45, MaritalStatus::Married))
        .expect("manager registers");
    service
}

/// Service over repositories that already hold the fixture manager.
pub(super) fn service_over_existing(repos: Repositories) -> HousingService {
    HousingService::with_clock(
        repos,
        &HousingConfig::default(),
        Arc::new(FixedClock::on(today())),
    )
}

/// Listing open from January to December of the fixture year.
pub(super) fn listing(name: &str, units: &[(UnitType, u32)], officer_slots: u32) -> NewProject {
    NewProject {
        name: ProjectName::from(name),
        neighbourhood: "Tampines".to_string(),
        opening_date: date(2025, 1, 1),
        closing_date: date(2025, 12, 31),
        units: units.iter().copied().collect::<BTreeMap<_, _>>(),
        officer_slots,
        manager: Nric::from(MANAGER),
    }
}

pub(super) fn seed_project(
    service: &HousingService,
    name: &str,
    units: &[(UnitType, u32)],
    officer_slots: u32,
) -> ProjectName {
    service
        .create_project(listing(name, units, officer_slots))
        .expect("project created")
        .name
}

pub(super) fn seed_applicant(
    service: &HousingService,
    nric: &str,
    age: u8,
    marital_status: MaritalStatus,
) -> Nric {
    service
        .register_person(Person::applicant(nric, age, marital_status))
        .expect("applicant registers")
        .nric
}

pub(super) fn seed_officer(service: &HousingService, nric: &str) -> Nric {
    service
        .register_person(Person::officer(nric, 30, MaritalStatus::Married))
        .expect("officer registers")
        .nric
}

/// Registers `staff` for `project` and approves it.
pub(super) fn assign_officer(service: &HousingService, staff: &Nric, project: &ProjectName) {
    let registration = service
        .register_officer(staff, project)
        .expect("registration filed");
    service
        .approve_officer_registration(&registration.id)
        .expect("registration approved");
}

/// Creates and approves an application.
pub(super) fn successful_application(
    service: &HousingService,
    applicant: &Nric,
    project: &ProjectName,
    unit_type: UnitType,
) -> ApplicationId {
    let application = service
        .create(applicant, project, unit_type)
        .expect("application created");
    service.approve(&application.id).expect("approved");
    application.id
}

/// In-memory repository whose updates can be switched to fail.
pub(super) struct FlakyRepository<E: Entity> {
    inner: InMemoryRepository<E>,
    fail_updates: AtomicBool,
}

impl<E: Entity> Default for FlakyRepository<E> {
    fn default() -> Self {
        Self {
            inner: InMemoryRepository::default(),
            fail_updates: AtomicBool::new(false),
        }
    }
}

impl<E: Entity> FlakyRepository<E> {
    pub(super) fn fail_updates(&self, failing: bool) {
        self.fail_updates.store(failing, Ordering::SeqCst);
    }
}

impl<E: Entity> Repository<E> for FlakyRepository<E> {
    fn fetch(&self, key: &E::Key) -> Result<Option<E>, RepositoryError> {
        self.inner.fetch(key)
    }

    fn insert(&self, entity: E) -> Result<E, RepositoryError> {
        self.inner.insert(entity)
    }

    fn update(&self, entity: E) -> Result<(), RepositoryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("write timed out".to_string()));
        }
        self.inner.update(entity)
    }

    fn delete(&self, key: &E::Key) -> Result<E, RepositoryError> {
        self.inner.delete(key)
    }

    fn list(&self) -> Result<Vec<E>, RepositoryError> {
        self.inner.list()
    }
}

pub(super) struct UnavailableRepository;

impl<E: Entity> Repository<E> for UnavailableRepository {
    fn fetch(&self, _key: &E::Key) -> Result<Option<E>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _entity: E) -> Result<E, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _entity: E) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _key: &E::Key) -> Result<E, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<E>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
