use crate::infra::{seed_sample_data, SampleData};
use bto_housing::config::AppConfig;
use bto_housing::error::AppError;
use bto_housing::housing::{
    ApplicationId, BookingReportFilter, FixedClock, HousingService, Nric, Repositories, UnitType,
};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Run the demo as if it were this date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Stop after the bookings instead of withdrawing one of them.
    #[arg(long)]
    pub(crate) skip_withdrawal: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        skip_withdrawal,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let config = AppConfig::load()?;

    let service = HousingService::with_clock(
        Repositories::in_memory(),
        &config.housing,
        Arc::new(FixedClock::on(today)),
    );
    let sample = seed_sample_data(&service, today)?;

    println!("BTO housing demo ({today})");
    render_listing(&service, &sample)?;

    println!("\nEligibility");
    for applicant in &sample.applicants {
        let person = service.get_person(applicant)?;
        let unit_types: Vec<&str> = service
            .eligible_unit_types(applicant)?
            .into_iter()
            .map(UnitType::label)
            .collect();
        let listing = if unit_types.is_empty() {
            "none".to_string()
        } else {
            unit_types.join(", ")
        };
        println!(
            "- {} ({}, {}): {}",
            applicant,
            person.age,
            person.marital_status.label(),
            listing
        );
    }

    let [single, married, young] = sample.applicants.as_slice() else {
        return Ok(());
    };

    println!("\nApplications");
    match service.create(young, &sample.project, UnitType::TwoRoom) {
        Ok(application) => println!("- {} unexpectedly accepted as {}", young, application.id),
        Err(err) => println!("- {} refused: {}", young, err),
    }

    let mut booked = Vec::new();
    for (applicant, unit_type) in [(single, UnitType::TwoRoom), (married, UnitType::ThreeRoom)] {
        let id = apply_and_book(&service, &sample, applicant, unit_type)?;
        booked.push(id);
    }
    render_remaining(&service, &sample)?;

    if let Some(first) = booked.first() {
        let application = service.get_application(first)?;
        if let Some(booking) = application.booking {
            println!("\n{}", service.generate_receipt(&booking)?);
        }
    }

    if !skip_withdrawal {
        if let Some(last) = booked.last() {
            println!("\nWithdrawal");
            service.request_withdrawal(last)?;
            let outcome = service.approve_withdrawal(last)?;
            println!(
                "- {} withdrawn from {} (unit released: {})",
                outcome.application.applicant, outcome.application.project, outcome.unit_released
            );
            render_remaining(&service, &sample)?;
        }
    }

    println!("\nBooking report");
    let rows = service.booking_report(&BookingReportFilter {
        project: Some(sample.project.clone()),
        ..BookingReportFilter::default()
    })?;
    if rows.is_empty() {
        println!("- no bookings");
    }
    for row in rows {
        println!(
            "- {} | {} | {} | {} | {}",
            row.booking_id,
            row.applicant,
            row.age,
            row.marital_status.label(),
            row.unit_type
        );
    }

    Ok(())
}

fn apply_and_book(
    service: &HousingService,
    sample: &SampleData,
    applicant: &Nric,
    unit_type: UnitType,
) -> Result<ApplicationId, AppError> {
    let application = service.create(applicant, &sample.project, unit_type)?;
    println!(
        "- {} applied for {} -> {}",
        applicant,
        unit_type,
        application.status.label()
    );
    service.approve(&application.id)?;
    let booking = service.book_flat(&application.id, &sample.officer)?;
    println!("  booked as {} by officer {}", booking.id, booking.staff);
    Ok(application.id)
}

fn render_listing(service: &HousingService, sample: &SampleData) -> Result<(), AppError> {
    let project = service.catalog().get_project(&sample.project)?;
    println!(
        "Project {} in {} ({} -> {}), managed by {}",
        project.name,
        project.neighbourhood,
        project.opening_date,
        project.closing_date,
        sample.manager
    );
    println!(
        "Officers: {} assigned, {} slots open",
        project.officers.len(),
        project.available_officer_slots()
    );
    render_remaining(service, sample)
}

fn render_remaining(service: &HousingService, sample: &SampleData) -> Result<(), AppError> {
    let mut counts = Vec::new();
    for unit_type in UnitType::ALL {
        let remaining = service.inventory().remaining(&sample.project, unit_type)?;
        counts.push(format!("{unit_type}: {remaining}"));
    }
    println!("Units remaining: {}", counts.join(" | "));
    Ok(())
}
