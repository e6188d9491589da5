use chrono::NaiveDate;

use super::domain::{
    ApplicationId, ApplicationStatus, BookingId, EnquiryId, Nric, ProjectName, RegistrationId,
    RegistrationStatus, UnitType,
};
use super::repository::RepositoryError;

/// Failure returned by every housing operation.
///
/// Only [`HousingError::Storage`] originates outside the core; the rest are decisions the
/// core made and left no state behind.
#[derive(Debug, thiserror::Error)]
pub enum HousingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("storage failure: {0}")]
    Storage(#[from] RepositoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    State,
    Storage,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::State => "state",
            ErrorKind::Storage => "storage",
        }
    }
}

impl HousingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HousingError::Validation(_) => ErrorKind::Validation,
            HousingError::NotFound(_) => ErrorKind::NotFound,
            HousingError::Conflict(_) => ErrorKind::Conflict,
            HousingError::State(_) => ErrorKind::State,
            HousingError::Storage(_) => ErrorKind::Storage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("applicant {applicant} is not eligible for {unit_type} units")]
    Ineligible { applicant: Nric, unit_type: UnitType },
    #[error("project {project} does not offer {unit_type} units")]
    UnitTypeNotOffered {
        project: ProjectName,
        unit_type: UnitType,
    },
    #[error("{0} cannot hold a unit application")]
    NotAnApplicant(Nric),
    #[error("{0} is not an officer")]
    NotAnOfficer(Nric),
    #[error("officer {officer} handles {project} and cannot apply to it")]
    HandlesProject { officer: Nric, project: ProjectName },
    #[error("{0} is not a manager")]
    NotAManager(Nric),
    #[error("application window closes ({closing}) before it opens ({opening})")]
    InvalidWindow {
        opening: NaiveDate,
        closing: NaiveDate,
    },
    #[error("{requested} officer slots requested, at most {maximum} allowed")]
    SlotLimitExceeded { requested: u32, maximum: u32 },
    #[error("registration {0} does not match the given officer and project")]
    RegistrationMismatch(RegistrationId),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("enquiry {enquiry} was not written by {nric}")]
    NotEnquiryAuthor { enquiry: EnquiryId, nric: Nric },
    #[error("{responder} does not manage or handle project {project}")]
    CannotReply {
        responder: Nric,
        project: ProjectName,
    },
    #[error("{requested} officer slots requested but {assigned} officers are assigned")]
    SlotsBelowAssigned { requested: u32, assigned: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("person {0} not found")]
    Person(Nric),
    #[error("project {0} not found")]
    Project(ProjectName),
    #[error("application {0} not found")]
    Application(ApplicationId),
    #[error("booking {0} not found")]
    Booking(BookingId),
    #[error("officer registration {0} not found")]
    Registration(RegistrationId),
    #[error("enquiry {0} not found")]
    Enquiry(EnquiryId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("applicant {applicant} already has active application {application}")]
    ActiveApplication {
        applicant: Nric,
        application: ApplicationId,
    },
    #[error("no {unit_type} units remaining in project {project}")]
    NoUnitsRemaining {
        project: ProjectName,
        unit_type: UnitType,
    },
    #[error("project {0} has no officer slots remaining")]
    NoOfficerSlots(ProjectName),
    #[error("application {0} is already booked")]
    AlreadyBooked(ApplicationId),
    #[error("officer {staff} is not assigned to project {project}")]
    StaffNotAssigned { staff: Nric, project: ProjectName },
    #[error("officer {staff} already handles {current}, whose application window is open")]
    OverlappingAssignment { staff: Nric, current: ProjectName },
    #[error("officer {staff} has an active application for project {project}")]
    AppliedToProject { staff: Nric, project: ProjectName },
    #[error("officer {staff} is already assigned to project {project}")]
    AlreadyAssigned { staff: Nric, project: ProjectName },
    #[error("officer {staff} already has a pending registration for project {project}")]
    DuplicateRegistration { staff: Nric, project: ProjectName },
    #[error("project {0} already exists")]
    DuplicateProject(ProjectName),
    #[error("person {0} already exists")]
    DuplicatePerson(Nric),
    #[error("project {0} still has applications")]
    ProjectHasApplications(ProjectName),
    #[error("project {project} cannot hold fewer than {held} {unit_type} units")]
    UnitsBelowHeld {
        project: ProjectName,
        unit_type: UnitType,
        held: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("cannot {action} application {application} while it is {status}")]
    InvalidTransition {
        application: ApplicationId,
        status: ApplicationStatus,
        action: &'static str,
    },
    #[error("application {0} is being withdrawn")]
    WithdrawalInProgress(ApplicationId),
    #[error("enquiry {0} has already been answered")]
    EnquiryAnswered(EnquiryId),
    #[error("registration {registration} was already {}", .status.label())]
    RegistrationClosed {
        registration: RegistrationId,
        status: RegistrationStatus,
    },
}
