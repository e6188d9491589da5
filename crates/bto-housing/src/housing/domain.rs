use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id! {
    /// National registration identity; unique per person.
    Nric
}

string_id! {
    /// Project names are unique and double as the project key.
    ProjectName
}

string_id! {
    ApplicationId
}

string_id! {
    BookingId
}

string_id! {
    RegistrationId
}

string_id! {
    EnquiryId
}

/// Category of housing unit offered by a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    TwoRoom,
    ThreeRoom,
}

impl UnitType {
    pub const ALL: [UnitType; 2] = [UnitType::TwoRoom, UnitType::ThreeRoom];

    pub const fn smallest() -> Self {
        UnitType::TwoRoom
    }

    pub const fn label(self) -> &'static str {
        match self {
            UnitType::TwoRoom => "2-Room",
            UnitType::ThreeRoom => "3-Room",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
}

impl MaritalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MaritalStatus::Single => "Single",
            MaritalStatus::Married => "Married",
        }
    }
}

/// A person known to the system. Role-specific state lives in [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub nric: Nric,
    pub age: u8,
    pub marital_status: MaritalStatus,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    Applicant(ApplicantProfile),
    Officer(OfficerProfile),
    Manager(ManagerProfile),
    Admin,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub current_application: Option<ApplicationId>,
}

/// Officers can apply for units themselves, so they carry their own application link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerProfile {
    pub current_application: Option<ApplicationId>,
    pub handling_project: Option<ProjectName>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerProfile {
    pub managed_projects: BTreeSet<ProjectName>,
}

impl Person {
    pub fn applicant(nric: impl Into<String>, age: u8, marital_status: MaritalStatus) -> Self {
        Self {
            nric: Nric::new(nric),
            age,
            marital_status,
            role: Role::Applicant(ApplicantProfile::default()),
        }
    }

    pub fn officer(nric: impl Into<String>, age: u8, marital_status: MaritalStatus) -> Self {
        Self {
            nric: Nric::new(nric),
            age,
            marital_status,
            role: Role::Officer(OfficerProfile::default()),
        }
    }

    pub fn manager(nric: impl Into<String>, age: u8, marital_status: MaritalStatus) -> Self {
        Self {
            nric: Nric::new(nric),
            age,
            marital_status,
            role: Role::Manager(ManagerProfile::default()),
        }
    }

    pub const fn role_label(&self) -> &'static str {
        match self.role {
            Role::Applicant(_) => "applicant",
            Role::Officer(_) => "officer",
            Role::Manager(_) => "manager",
            Role::Admin => "admin",
        }
    }

    /// Whether this person may hold a unit application.
    pub fn can_apply(&self) -> bool {
        matches!(self.role, Role::Applicant(_) | Role::Officer(_))
    }

    pub fn current_application(&self) -> Option<&ApplicationId> {
        match &self.role {
            Role::Applicant(profile) => profile.current_application.as_ref(),
            Role::Officer(profile) => profile.current_application.as_ref(),
            Role::Manager(_) | Role::Admin => None,
        }
    }

    /// Returns `false` when the role cannot hold an application.
    pub fn set_current_application(&mut self, application: Option<ApplicationId>) -> bool {
        match &mut self.role {
            Role::Applicant(profile) => {
                profile.current_application = application;
                true
            }
            Role::Officer(profile) => {
                profile.current_application = application;
                true
            }
            Role::Manager(_) | Role::Admin => false,
        }
    }

    pub fn officer_profile(&self) -> Option<&OfficerProfile> {
        match &self.role {
            Role::Officer(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn officer_profile_mut(&mut self) -> Option<&mut OfficerProfile> {
        match &mut self.role {
            Role::Officer(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn manager_profile_mut(&mut self) -> Option<&mut ManagerProfile> {
        match &mut self.role {
            Role::Manager(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn handling_project(&self) -> Option<&ProjectName> {
        self.officer_profile()
            .and_then(|profile| profile.handling_project.as_ref())
    }
}

/// Inventory for one unit type within a project.
///
/// `available + holders.len() == provisioned` holds after every inventory operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStock {
    pub provisioned: u32,
    pub available: u32,
    #[serde(default)]
    pub holders: BTreeSet<ApplicationId>,
}

impl UnitStock {
    pub fn new(provisioned: u32) -> Self {
        Self {
            provisioned,
            available: provisioned,
            holders: BTreeSet::new(),
        }
    }

    pub fn is_consistent(&self) -> bool {
        u64::from(self.available) + self.holders.len() as u64 == u64::from(self.provisioned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: ProjectName,
    pub neighbourhood: String,
    pub opening_date: NaiveDate,
    pub closing_date: NaiveDate,
    pub units: BTreeMap<UnitType, UnitStock>,
    /// Maximum number of officers that may be bound to the project.
    pub officer_slots: u32,
    pub officers: Vec<Nric>,
    pub visible: bool,
    pub manager: Nric,
}

impl Project {
    /// Application window check, inclusive on both ends.
    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        date >= self.opening_date && date <= self.closing_date
    }

    pub fn offers(&self, unit_type: UnitType) -> bool {
        self.units.contains_key(&unit_type)
    }

    pub fn remaining_units(&self, unit_type: UnitType) -> u32 {
        self.units
            .get(&unit_type)
            .map(|stock| stock.available)
            .unwrap_or(0)
    }

    pub fn available_officer_slots(&self) -> u32 {
        let assigned = u32::try_from(self.officers.len()).unwrap_or(u32::MAX);
        self.officer_slots.saturating_sub(assigned)
    }

    pub fn has_officer(&self, staff: &Nric) -> bool {
        self.officers.iter().any(|officer| officer == staff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Successful,
    Unsuccessful,
    Booked,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Successful => "successful",
            ApplicationStatus::Unsuccessful => "unsuccessful",
            ApplicationStatus::Booked => "booked",
        }
    }

    /// Pending, successful, and booked applications block a new application.
    pub const fn is_active(self) -> bool {
        !matches!(self, ApplicationStatus::Unsuccessful)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant: Nric,
    pub project: ProjectName,
    pub unit_type: UnitType,
    pub status: ApplicationStatus,
    pub withdrawal_requested: bool,
    /// Set once a withdrawal approval has started; the record is removed when it finishes.
    #[serde(default)]
    pub withdrawal_approved: bool,
    pub created_at: DateTime<Utc>,
    pub booking: Option<BookingId>,
}

impl Application {
    pub fn new(
        id: ApplicationId,
        applicant: Nric,
        project: ProjectName,
        unit_type: UnitType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            applicant,
            project,
            unit_type,
            status: ApplicationStatus::Pending,
            withdrawal_requested: false,
            withdrawal_approved: false,
            created_at,
            booking: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub application: ApplicationId,
    pub applicant: Nric,
    pub project: ProjectName,
    pub unit_type: UnitType,
    pub staff: Nric,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        }
    }
}

/// An officer's request to be bound to a project, awaiting a manager's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerRegistration {
    pub id: RegistrationId,
    pub staff: Nric,
    pub project: ProjectName,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
}

/// A question raised about a project, answered at most once by its staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: EnquiryId,
    pub author: Nric,
    pub project: ProjectName,
    pub message: String,
    pub reply: Option<EnquiryReply>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enquiry {
    pub fn is_answered(&self) -> bool {
        self.reply.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnquiryReply {
    pub responder: Nric,
    pub message: String,
    pub replied_at: DateTime<Utc>,
}
