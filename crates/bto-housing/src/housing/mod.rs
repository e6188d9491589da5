//! Housing-unit applications, bookings, unit inventory, and officer assignments.
//!
//! Components, leaves first: [`eligibility`] decides which unit types a person may apply
//! for, [`inventory`] guards the per-project unit counters, [`registry`] binds officers to
//! projects, [`lifecycle`] drives an application from creation to its terminal state, and
//! [`booking`] turns a successful application into a booked unit. [`enquiries`] holds the
//! questions raised about projects. [`HousingService`] wires them over a shared set of
//! [`Repositories`].

pub mod booking;
pub mod clock;
pub mod domain;
pub mod eligibility;
pub mod enquiries;
pub mod error;
pub mod inventory;
pub mod lifecycle;
mod locks;
pub mod projects;
pub mod registry;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use booking::{BookingProcessor, BookingReceipt, BookingReportFilter, BookingReportRow};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    ApplicantProfile, Application, ApplicationId, ApplicationStatus, Booking, BookingId, Enquiry,
    EnquiryId, EnquiryReply, ManagerProfile, MaritalStatus, Nric, OfficerProfile,
    OfficerRegistration, Person, Project, ProjectName, RegistrationId, RegistrationStatus, Role,
    UnitStock, UnitType,
};
pub use eligibility::EligibilityPolicy;
pub use enquiries::{EnquiryBoard, EnquiryFilter};
pub use error::{
    ConflictError, ErrorKind, HousingError, NotFoundError, StateError, ValidationError,
};
pub use inventory::UnitInventory;
pub use lifecycle::{ApplicationLifecycle, WithdrawalOutcome};
pub use projects::{NewProject, ProjectCatalog, ProjectFilter, ProjectUpdate};
pub use registry::OfficerAssignmentRegistry;
pub use repository::{Entity, InMemoryRepository, Repositories, Repository, RepositoryError};
pub use router::housing_router;
pub use service::{HousingService, RecoveryReport};
