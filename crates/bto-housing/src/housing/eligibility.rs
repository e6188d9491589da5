use std::collections::BTreeSet;

use super::domain::{MaritalStatus, Person, UnitType};
use crate::config::HousingConfig;

pub const DEFAULT_MARRIED_MIN_AGE: u8 = 21;
pub const DEFAULT_SINGLE_MIN_AGE: u8 = 35;

/// Age and marital-status rule deciding which unit types a person may apply for.
///
/// Married applicants at or above the married threshold may apply for every unit type.
/// Single applicants at or above the single threshold may apply for the smallest type only.
/// Everyone else is eligible for nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityPolicy {
    married_min_age: u8,
    single_min_age: u8,
}

impl EligibilityPolicy {
    pub const fn new(married_min_age: u8, single_min_age: u8) -> Self {
        Self {
            married_min_age,
            single_min_age,
        }
    }

    pub fn from_config(config: &HousingConfig) -> Self {
        Self::new(config.married_min_age, config.single_min_age)
    }

    pub fn eligible_unit_types(&self, age: u8, marital_status: MaritalStatus) -> BTreeSet<UnitType> {
        match marital_status {
            MaritalStatus::Married if age >= self.married_min_age => {
                UnitType::ALL.into_iter().collect()
            }
            MaritalStatus::Single if age >= self.single_min_age => {
                BTreeSet::from([UnitType::smallest()])
            }
            _ => BTreeSet::new(),
        }
    }

    pub fn is_eligible(&self, age: u8, marital_status: MaritalStatus, unit_type: UnitType) -> bool {
        self.eligible_unit_types(age, marital_status)
            .contains(&unit_type)
    }

    pub fn eligible_for(&self, person: &Person) -> BTreeSet<UnitType> {
        self.eligible_unit_types(person.age, person.marital_status)
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MARRIED_MIN_AGE, DEFAULT_SINGLE_MIN_AGE)
    }
}
