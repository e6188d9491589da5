use super::common::*;
use std::collections::BTreeMap;

use crate::housing::{
    ApplicationId, ConflictError, HousingError, MaritalStatus, NewProject, Nric, ProjectFilter,
    ProjectName, ProjectUpdate, UnitType, ValidationError,
};

#[test]
fn new_projects_start_hidden_with_full_stock() {
    let (service, _) = build_service();
    let project = service
        .create_project(listing(
            "Kallang Trio",
            &[(UnitType::TwoRoom, 4), (UnitType::ThreeRoom, 2)],
            3,
        ))
        .expect("created");

    assert!(!project.visible);
    assert!(project.units.values().all(|stock| stock.is_consistent()));
    assert_eq!(project.remaining_units(UnitType::ThreeRoom), 2);
    assert_eq!(
        service
            .catalog()
            .projects_for_manager(&Nric::from(MANAGER))
            .expect("list")
            .len(),
        1
    );
}

#[test]
fn listing_details_are_validated() {
    let (service, _) = build_service();

    let backwards = NewProject {
        opening_date: date(2025, 6, 1),
        closing_date: date(2025, 5, 1),
        ..listing("Kallang Trio", &[(UnitType::TwoRoom, 4)], 3)
    };
    assert!(matches!(
        service.create_project(backwards),
        Err(HousingError::Validation(ValidationError::InvalidWindow { .. }))
    ));

    match service.create_project(listing("Kallang Trio", &[(UnitType::TwoRoom, 4)], 11)) {
        Err(HousingError::Validation(ValidationError::SlotLimitExceeded { maximum, .. })) => {
            assert_eq!(maximum, 10)
        }
        other => panic!("expected slot limit error, got {other:?}"),
    }

    assert!(matches!(
        service.create_project(listing("  ", &[(UnitType::TwoRoom, 4)], 3)),
        Err(HousingError::Validation(ValidationError::EmptyField(_)))
    ));
}

#[test]
fn only_managers_create_projects() {
    let (service, _) = build_service();
    let officer = seed_officer(&service, "T2000001A");

    let request = NewProject {
        manager: officer,
        ..listing("Kallang Trio", &[(UnitType::TwoRoom, 4)], 3)
    };
    assert!(matches!(
        service.create_project(request),
        Err(HousingError::Validation(ValidationError::NotAManager(_)))
    ));
    assert!(service.catalog().list_projects().expect("list").is_empty());
}

#[test]
fn project_names_are_unique() {
    let (service, _) = build_service();
    seed_project(&service, "Kallang Trio", &[(UnitType::TwoRoom, 4)], 3);

    assert!(matches!(
        service.create_project(listing("Kallang Trio", &[(UnitType::ThreeRoom, 1)], 1)),
        Err(HousingError::Conflict(ConflictError::DuplicateProject(_)))
    ));
}

#[test]
fn visible_projects_match_applicant_eligibility() {
    let (service, _) = build_service();
    let family = seed_project(&service, "Kallang Trio", &[(UnitType::ThreeRoom, 4)], 3);
    let compact = seed_project(&service, "Queenstown Loft", &[(UnitType::TwoRoom, 4)], 3);
    seed_project(&service, "Hidden Ridge", &[(UnitType::TwoRoom, 4)], 3);
    for project in [&family, &compact] {
        service
            .catalog()
            .set_visibility(project, true)
            .expect("visible");
    }

    let single = seed_applicant(&service, "S1000001A", 36, MaritalStatus::Single);
    let married = seed_applicant(&service, "S1000002B", 29, MaritalStatus::Married);

    let names = |nric: &Nric| -> Vec<ProjectName> {
        service
            .catalog()
            .visible_projects_for(nric)
            .expect("list")
            .into_iter()
            .map(|project| project.name)
            .collect()
    };
    assert_eq!(names(&single), vec![compact.clone()]);
    assert_eq!(names(&married), vec![family, compact]);
}

#[test]
fn projects_with_applications_cannot_be_deleted() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Kallang Trio", &[(UnitType::TwoRoom, 4)], 3);
    let applicant = seed_applicant(&service, "S1000001A", 30, MaritalStatus::Married);
    service
        .create(&applicant, &project, UnitType::TwoRoom)
        .expect("created");

    assert!(matches!(
        service.catalog().delete_project(&project),
        Err(HousingError::Conflict(ConflictError::ProjectHasApplications(_)))
    ));
}

#[test]
fn deleting_a_project_releases_its_officers() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Kallang Trio", &[(UnitType::TwoRoom, 4)], 3);
    let officer = seed_officer(&service, "T2000001A");
    assign_officer(&service, &officer, &project);

    service.catalog().delete_project(&project).expect("deleted");

    assert_eq!(
        service.registry().assignment_of(&officer).expect("lookup"),
        None
    );
    assert!(service
        .catalog()
        .projects_for_manager(&Nric::from(MANAGER))
        .expect("list")
        .is_empty());
}

#[test]
fn editing_keeps_held_units_and_recomputes_availability() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Kallang Trio", &[(UnitType::TwoRoom, 4)], 3);
    service
        .inventory()
        .decrement(&project, UnitType::TwoRoom, &ApplicationId::from("app-held"))
        .expect("take");

    assert!(matches!(
        service.update_project(
            &project,
            ProjectUpdate {
                units: BTreeMap::from([(UnitType::TwoRoom, 0)]),
                ..ProjectUpdate::default()
            },
        ),
        Err(HousingError::Conflict(ConflictError::UnitsBelowHeld { held: 1, .. }))
    ));

    let edited = service
        .update_project(
            &project,
            ProjectUpdate {
                neighbourhood: Some("Geylang".to_string()),
                units: BTreeMap::from([(UnitType::TwoRoom, 2), (UnitType::ThreeRoom, 5)]),
                officer_slots: Some(5),
                ..ProjectUpdate::default()
            },
        )
        .expect("edited");
    assert_eq!(edited.neighbourhood, "Geylang");
    assert_eq!(edited.officer_slots, 5);

    let two_room = service
        .inventory()
        .stock(&project, UnitType::TwoRoom)
        .expect("stock");
    assert_eq!((two_room.provisioned, two_room.available), (2, 1));
    assert!(two_room.is_consistent());
    assert_eq!(
        service
            .inventory()
            .remaining(&project, UnitType::ThreeRoom)
            .expect("remaining"),
        5
    );
}

#[test]
fn editing_validates_window_and_slots() {
    let (service, _) = build_service();
    let project = seed_project(&service, "Kallang Trio", &[(UnitType::TwoRoom, 4)], 2);
    let first = seed_officer(&service, "T2000001A");
    let second = seed_officer(&service, "T2000002B");
    assign_officer(&service, &first, &project);
    assign_officer(&service, &second, &project);

    assert!(matches!(
        service.update_project(
            &project,
            ProjectUpdate {
                closing_date: Some(date(2024, 12, 1)),
                ..ProjectUpdate::default()
            },
        ),
        Err(HousingError::Validation(ValidationError::InvalidWindow { .. }))
    ));
    assert!(matches!(
        service.update_project(
            &project,
            ProjectUpdate {
                officer_slots: Some(1),
                ..ProjectUpdate::default()
            },
        ),
        Err(HousingError::Validation(ValidationError::SlotsBelowAssigned {
            requested: 1,
            assigned: 2
        }))
    ));
    assert!(matches!(
        service.update_project(
            &project,
            ProjectUpdate {
                officer_slots: Some(11),
                ..ProjectUpdate::default()
            },
        ),
        Err(HousingError::Validation(ValidationError::SlotLimitExceeded { .. }))
    ));
    assert!(matches!(
        service.update_project(&"Nowhere Heights".into(), ProjectUpdate::default()),
        Err(HousingError::NotFound(_))
    ));

    let unchanged = service.catalog().get_project(&project).expect("project");
    assert_eq!(unchanged.closing_date, date(2025, 12, 31));
    assert_eq!(unchanged.officer_slots, 2);
}

#[test]
fn projects_filter_by_neighbourhood_and_unit_type() {
    let (service, _) = build_service();
    let kallang = seed_project(&service, "Kallang Trio", &[(UnitType::TwoRoom, 4)], 3);
    let family = service
        .create_project(NewProject {
            neighbourhood: "Bedok".to_string(),
            ..listing("Bedok Reach", &[(UnitType::ThreeRoom, 2)], 3)
        })
        .expect("created")
        .name;

    let names = |filter: ProjectFilter| -> Vec<ProjectName> {
        service
            .filter_projects(&filter)
            .expect("filter")
            .into_iter()
            .map(|project| project.name)
            .collect()
    };

    assert_eq!(
        names(ProjectFilter {
            neighbourhood: Some("tampines".to_string()),
            unit_type: None,
        }),
        vec![kallang.clone()]
    );
    assert_eq!(
        names(ProjectFilter {
            neighbourhood: None,
            unit_type: Some(UnitType::ThreeRoom),
        }),
        vec![family.clone()]
    );
    assert!(names(ProjectFilter {
        neighbourhood: Some("Bedok".to_string()),
        unit_type: Some(UnitType::TwoRoom),
    })
    .is_empty());
    assert_eq!(names(ProjectFilter::default()), vec![family, kallang]);
}
