use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use super::domain::{
    Application, ApplicationId, Booking, BookingId, Enquiry, EnquiryId, Nric, OfficerRegistration,
    Person, Project, ProjectName, RegistrationId,
};

pub mod memory;

pub use memory::InMemoryRepository;

/// Record type persisted under a unique key.
pub trait Entity: Clone + Send + Sync + 'static {
    type Key: Clone + Eq + Ord + Hash + fmt::Display + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

/// Storage abstraction with per-key atomic operations and no cross-key transactions.
pub trait Repository<E: Entity>: Send + Sync {
    fn fetch(&self, key: &E::Key) -> Result<Option<E>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the key is taken.
    fn insert(&self, entity: E) -> Result<E, RepositoryError>;
    /// Fails with [`RepositoryError::NotFound`] when the key is absent.
    fn update(&self, entity: E) -> Result<(), RepositoryError>;
    fn delete(&self, key: &E::Key) -> Result<E, RepositoryError>;
    fn list(&self) -> Result<Vec<E>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl Entity for Person {
    type Key = Nric;

    fn key(&self) -> Nric {
        self.nric.clone()
    }
}

impl Entity for Project {
    type Key = ProjectName;

    fn key(&self) -> ProjectName {
        self.name.clone()
    }
}

impl Entity for Application {
    type Key = ApplicationId;

    fn key(&self) -> ApplicationId {
        self.id.clone()
    }
}

impl Entity for Booking {
    type Key = BookingId;

    fn key(&self) -> BookingId {
        self.id.clone()
    }
}

impl Entity for OfficerRegistration {
    type Key = RegistrationId;

    fn key(&self) -> RegistrationId {
        self.id.clone()
    }
}

impl Entity for Enquiry {
    type Key = EnquiryId;

    fn key(&self) -> EnquiryId {
        self.id.clone()
    }
}

/// One repository per entity kind, shared by every housing component.
#[derive(Clone)]
pub struct Repositories {
    pub people: Arc<dyn Repository<Person>>,
    pub projects: Arc<dyn Repository<Project>>,
    pub applications: Arc<dyn Repository<Application>>,
    pub bookings: Arc<dyn Repository<Booking>>,
    pub registrations: Arc<dyn Repository<OfficerRegistration>>,
    pub enquiries: Arc<dyn Repository<Enquiry>>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            people: Arc::new(InMemoryRepository::<Person>::default()),
            projects: Arc::new(InMemoryRepository::<Project>::default()),
            applications: Arc::new(InMemoryRepository::<Application>::default()),
            bookings: Arc::new(InMemoryRepository::<Booking>::default()),
            registrations: Arc::new(InMemoryRepository::<OfficerRegistration>::default()),
            enquiries: Arc::new(InMemoryRepository::<Enquiry>::default()),
        }
    }
}

/// Treats a missing record as already removed.
pub(crate) fn delete_if_present<E: Entity>(
    repository: &dyn Repository<E>,
    key: &E::Key,
) -> Result<Option<E>, RepositoryError> {
    match repository.delete(key) {
        Ok(entity) => Ok(Some(entity)),
        Err(RepositoryError::NotFound) => Ok(None),
        Err(other) => Err(other),
    }
}
