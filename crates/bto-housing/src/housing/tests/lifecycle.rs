use std::sync::Arc;

use super::common::*;
use crate::housing::{
    ApplicationStatus, ConflictError, HousingError, MaritalStatus, NotFoundError, Person,
    Repositories, Repository, StateError, UnitType, ValidationError,
};

#[test]
fn single_applicants_are_limited_to_the_smallest_unit_type() {
    let (service, _) = build_service();
    let project = seed_project(
        &service,
        "Punggol Breeze",
        &[(UnitType::TwoRoom, 5), (UnitType::ThreeRoom, 5)],
        2,
    );
    let applicant = seed_applicant(&service, "S1000001A", 36, MaritalStatus::Single);

    let eligible = service.eligible_unit_types(&applicant).expect("eligibility");
    assert_eq!(eligible.into_iter().collect::<Vec<_>>(), vec![UnitType::TwoRoom]);

    match service.create(&applicant, &project, UnitType::ThreeRoom) {
        Err(HousingError::Validation(ValidationError::Ineligible { unit_type, .. })) => {
            assert_eq!(unit_type, UnitType::ThreeRoom)
        }
        other => panic!("expected ineligible applicant, got {other:?}"),
    }
    assert!(service
        .get_current_application_for_applicant(&applicant)
        .expect("lookup")
        .is_none());
}

#[test]
fn create_links_the_pending_application() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::ThreeRoom, 5)], 2);
    let applicant = seed_applicant(&service, "S1000002B", 28, MaritalStatus::Married);

    let application = service
        .create(&applicant, &project, UnitType::ThreeRoom)
        .expect("created");

    assert_eq!(application.status, ApplicationStatus::Pending);
    assert_eq!(
        service
            .get_current_application_for_applicant(&applicant)
            .expect("lookup"),
        Some(application.clone())
    );
    assert_eq!(
        service.get_applications_for_project(&project).expect("list"),
        vec![application]
    );
    assert_eq!(
        service
            .inventory()
            .remaining(&project, UnitType::ThreeRoom)
            .expect("read"),
        5,
        "creation must not reserve a unit"
    );
}

#[test]
fn second_active_application_is_refused() {
    let (service, _) = build_service();
    let first = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let second = seed_project(&service, "Sengkang Grove", &[(UnitType::TwoRoom, 5)], 2);
    let applicant = seed_applicant(&service, "S1000003C", 40, MaritalStatus::Single);

    let existing = service
        .create(&applicant, &first, UnitType::TwoRoom)
        .expect("first application");

    match service.create(&applicant, &second, UnitType::TwoRoom) {
        Err(HousingError::Conflict(ConflictError::ActiveApplication { application, .. })) => {
            assert_eq!(application, existing.id)
        }
        other => panic!("expected active application conflict, got {other:?}"),
    }
    assert!(service
        .get_applications_for_project(&second)
        .expect("list")
        .is_empty());
}

#[test]
fn rejection_frees_the_applicant_to_apply_again() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let applicant = seed_applicant(&service, "S1000004D", 50, MaritalStatus::Single);

    let first = service
        .create(&applicant, &project, UnitType::TwoRoom)
        .expect("created");
    let rejected = service.reject(&first.id).expect("rejected");
    assert_eq!(rejected.status, ApplicationStatus::Unsuccessful);
    assert!(service
        .get_current_application_for_applicant(&applicant)
        .expect("lookup")
        .is_none());

    let retry = service
        .create(&applicant, &project, UnitType::TwoRoom)
        .expect("second application");
    assert_ne!(retry.id, first.id);
    assert_eq!(
        service
            .get_applications_for_project_with_status(&project, ApplicationStatus::Unsuccessful)
            .expect("list"),
        vec![rejected]
    );
}

#[test]
fn transitions_require_a_pending_application() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let applicant = seed_applicant(&service, "S1000005E", 30, MaritalStatus::Married);
    let id = successful_application(&service, &applicant, &project, UnitType::TwoRoom);

    for attempt in [service.approve(&id), service.reject(&id)] {
        match attempt {
            Err(HousingError::State(StateError::InvalidTransition { status, .. })) => {
                assert_eq!(status, ApplicationStatus::Successful)
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }
}

#[test]
fn create_checks_the_project_offer_and_stock() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 0)], 2);
    let applicant = seed_applicant(&service, "S1000006F", 30, MaritalStatus::Married);

    assert!(matches!(
        service.create(&applicant, &project, UnitType::ThreeRoom),
        Err(HousingError::Validation(ValidationError::UnitTypeNotOffered { .. }))
    ));
    assert!(matches!(
        service.create(&applicant, &project, UnitType::TwoRoom),
        Err(HousingError::Conflict(ConflictError::NoUnitsRemaining { .. }))
    ));
}

#[test]
fn managers_cannot_apply_but_officers_can() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let officer = seed_officer(&service, "T2000001A");

    assert!(matches!(
        service.create(&MANAGER.into(), &project, UnitType::TwoRoom),
        Err(HousingError::Validation(ValidationError::NotAnApplicant(_)))
    ));
    let application = service
        .create(&officer, &project, UnitType::TwoRoom)
        .expect("officer applies");
    assert_eq!(
        service
            .get_person(&officer)
            .expect("officer")
            .current_application(),
        Some(&application.id)
    );
}

#[test]
fn officers_cannot_apply_to_the_project_they_handle() {
    let (service, _) = build_service();
    let handled = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let other = seed_project(&service, "Canberra Vista", &[(UnitType::TwoRoom, 5)], 2);
    let officer = seed_officer(&service, "T2000001A");
    assign_officer(&service, &officer, &handled);

    assert!(matches!(
        service.create(&officer, &handled, UnitType::TwoRoom),
        Err(HousingError::Validation(ValidationError::HandlesProject { .. }))
    ));
    service
        .create(&officer, &other, UnitType::TwoRoom)
        .expect("officer applies elsewhere");
}

#[test]
fn withdrawal_request_is_idempotent_and_keeps_status() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let applicant = seed_applicant(&service, "S1000007G", 30, MaritalStatus::Married);
    let id = successful_application(&service, &applicant, &project, UnitType::TwoRoom);

    let first = service.request_withdrawal(&id).expect("requested");
    let second = service.request_withdrawal(&id).expect("requested again");

    assert!(first.withdrawal_requested);
    assert_eq!(first, second);
    assert_eq!(second.status, ApplicationStatus::Successful);
}

#[test]
fn approved_withdrawal_of_pending_application_deletes_it() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let applicant = seed_applicant(&service, "S1000008H", 30, MaritalStatus::Married);
    let application = service
        .create(&applicant, &project, UnitType::TwoRoom)
        .expect("created");

    service.request_withdrawal(&application.id).expect("requested");
    let outcome = service
        .approve_withdrawal(&application.id)
        .expect("withdrawn");

    assert!(!outcome.unit_released);
    assert!(matches!(
        service.get_application(&application.id),
        Err(HousingError::NotFound(NotFoundError::Application(_)))
    ));
    assert!(service
        .get_current_application_for_applicant(&applicant)
        .expect("lookup")
        .is_none());
    assert_eq!(
        service
            .inventory()
            .remaining(&project, UnitType::TwoRoom)
            .expect("read"),
        5
    );
    service
        .create(&applicant, &project, UnitType::TwoRoom)
        .expect("may apply again");
}

#[test]
fn failed_link_leaves_no_application_behind() {
    let people = Arc::new(FlakyRepository::<Person>::default());
    let repos = Repositories {
        people: people.clone(),
        ..Repositories::in_memory()
    };
    let service = service_over(repos.clone());
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let applicant = seed_applicant(&service, "S1000009I", 30, MaritalStatus::Married);

    people.fail_updates(true);
    let result = service.create(&applicant, &project, UnitType::TwoRoom);
    people.fail_updates(false);

    assert!(matches!(result, Err(HousingError::Storage(_))));
    assert!(repos.applications.list().expect("list").is_empty());
    service
        .create(&applicant, &project, UnitType::TwoRoom)
        .expect("retry succeeds");
}

#[test]
fn listing_filters_by_status() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Punggol Breeze", &[(UnitType::TwoRoom, 5)], 2);
    let first = seed_applicant(&service, "S1000010J", 30, MaritalStatus::Married);
    let second = seed_applicant(&service, "S1000011K", 31, MaritalStatus::Married);

    let approved = successful_application(&service, &first, &project, UnitType::TwoRoom);
    let pending = service
        .create(&second, &project, UnitType::TwoRoom)
        .expect("created");

    let successful = service
        .lifecycle()
        .successful_applications_for_project(&project)
        .expect("list");
    assert_eq!(successful.len(), 1);
    assert_eq!(successful[0].id, approved);

    let waiting = service
        .get_applications_for_project_with_status(&project, ApplicationStatus::Pending)
        .expect("list");
    assert_eq!(waiting, vec![pending]);
}
