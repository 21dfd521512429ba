mod common;

use chrono::Duration;
use rust_decimal::Decimal;
use vetcare::VetcareError;
use vetcare_core::{
    ApplyVaccinationInput, AttendInput, ConsultationInput, CoreError, NewUserInput, OwnerInput,
    PaymentInput, PetInput, ScheduleVaccinationInput, SpeciesInput, TreatmentInput,
    VaccinationService, VaccineInput, VeterinarianInput,
};
use vetcare_domain::{
    ConsultationStatus, Findings, InvoiceStatus, PaymentMethod, PaymentOutcome, Role,
    TreatmentStatus, VaccinationStatus,
};

use common::{admin_clinic, open_clinic, temp_home, today, ADMIN_PASSWORD};

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

struct Patient {
    owner_id: uuid::Uuid,
    pet_id: uuid::Uuid,
    species_id: uuid::Uuid,
}

fn register_patient(app: &vetcare::ClinicApp) -> Patient {
    let species_id = app
        .create_species(SpeciesInput {
            name: "Dog".into(),
            description: None,
        })
        .expect("species");
    let owner_id = app
        .create_owner(OwnerInput::new("40001234", "Maria Lopez"))
        .expect("owner");
    let pet_id = app
        .create_pet(PetInput::new(owner_id, species_id, "Rex"))
        .expect("pet");
    Patient {
        owner_id,
        pet_id,
        species_id,
    }
}

#[test]
fn anonymous_writes_are_rejected() {
    let home = temp_home();
    let app = open_clinic(&home);

    let err = app
        .create_owner(OwnerInput::new("1", "Nobody"))
        .expect_err("no session");
    assert!(matches!(err, VetcareError::Core(CoreError::Unauthorized(_))));
    assert_eq!(
        err.user_message(),
        "You are not allowed to perform this action."
    );
}

#[test]
fn bootstrap_admin_can_sign_in_and_out() {
    let (app, _home) = admin_clinic();
    let actor = app.current_actor().expect("signed in");
    assert_eq!(actor.role, Role::Administrator);

    app.sign_out();
    assert!(app.current_actor().is_none());
    assert!(app.sign_in("admin", "wrong-password").is_err());
    assert!(app.current_actor().is_none());
}

#[test]
fn visit_is_invoiced_paid_and_survives_reopening() {
    let (app, home) = admin_clinic();
    let patient = register_patient(&app);
    let vet_id = app
        .create_veterinarian(VeterinarianInput::new("Ana Vega", "CMV-1001"))
        .expect("vet");

    let visit = app
        .schedule_consultation(ConsultationInput {
            pet_id: patient.pet_id,
            veterinarian_id: vet_id,
            scheduled_at: today().and_hms_opt(9, 0, 0).expect("time"),
            reason: "Vomiting".into(),
        })
        .expect("schedule");
    app.attend_consultation(
        visit,
        AttendInput {
            findings: Findings {
                diagnosis: Some("Gastritis".into()),
                cost: Some(money(6000)),
                ..Findings::default()
            },
            status: ConsultationStatus::Completed,
        },
    )
    .expect("attend");
    app.add_treatment(
        visit,
        TreatmentInput {
            description: "Antiemetic".into(),
            cost: Some(money(4000)),
            ..TreatmentInput::default()
        },
    )
    .expect("treatment");

    let invoice_id = app.invoice_consultation(visit).expect("invoice");
    let duplicate = app.invoice_consultation(visit).expect_err("second invoice");
    assert!(matches!(duplicate, VetcareError::Core(CoreError::Conflict(_))));

    // 100.00 + 18% tax
    let outcome = app
        .register_payment(
            invoice_id,
            PaymentInput {
                amount: money(11800),
                method: PaymentMethod::Transfer,
            },
        )
        .expect("pay");
    assert!(matches!(
        outcome,
        PaymentOutcome::Applied {
            status: InvoiceStatus::Paid,
            ..
        }
    ));

    let reopened = open_clinic(&home);
    let view = reopened.invoice_view("F202405-0001").expect("view");
    assert_eq!(view["status"], "Paid");
    assert_eq!(view["total_text"], "S/ 118.00");
    assert_eq!(view["balance_due_text"], "S/ 0.00");
    assert_eq!(view["owner_name"], "Maria Lopez");
    assert_eq!(view["items"].as_array().map(Vec::len), Some(2));

    let stats = reopened.billing_stats().expect("stats");
    assert_eq!(stats.paid_count, 1);
    assert_eq!(stats.paid_total, money(11800));
    let invoices = reopened
        .store()
        .read(|records| records.invoices.clone())
        .expect("read");
    assert_eq!(invoices[0].owner_id, patient.owner_id);
}

#[test]
fn reminders_and_overdue_sweep() {
    let (app, _home) = admin_clinic();
    let patient = register_patient(&app);
    let rabies = app
        .create_vaccine(VaccineInput {
            species_id: Some(patient.species_id),
            ..VaccineInput::new("Rabies")
        })
        .expect("vaccine");

    let soon = app
        .schedule_vaccination(ScheduleVaccinationInput {
            pet_id: patient.pet_id,
            vaccine_id: rabies,
            scheduled_date: today() + Duration::days(3),
            dose_number: 1,
            notes: None,
        })
        .expect("schedule soon");
    app.schedule_vaccination(ScheduleVaccinationInput {
        pet_id: patient.pet_id,
        vaccine_id: rabies,
        scheduled_date: today() - Duration::days(2),
        dose_number: 1,
        notes: None,
    })
    .expect("schedule late");

    let due = app.reminders_due().expect("reminders");
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, soon);

    app.mark_reminder_sent(soon).expect("mark sent");
    assert!(app.reminders_due().expect("reminders").is_empty());

    assert_eq!(app.sweep_overdue().expect("sweep"), 1);
    assert_eq!(app.sweep_overdue().expect("sweep again"), 0);

    let overdue = app
        .vaccination_views(VaccinationService::overdue)
        .expect("overdue views");
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0]["status_color"], "danger");
    assert_eq!(overdue[0]["pet_name"], "Rex");
}

#[test]
fn config_changes_need_an_administrator_and_apply_to_new_invoices() {
    let (mut app, home) = admin_clinic();
    let patient = register_patient(&app);

    app.register_user(NewUserInput::new(
        "front",
        "front@clinic.test",
        "Front Desk",
        "desk123",
        Role::Receptionist,
    ))
    .expect("receptionist");
    app.sign_in("front", "desk123").expect("receptionist signs in");
    let mut changed = app.config().clone();
    changed.tax_percent = 10;
    let err = app.update_config(changed.clone()).expect_err("not admin");
    assert!(matches!(err, VetcareError::Core(CoreError::Unauthorized(_))));

    app.sign_in("admin", ADMIN_PASSWORD).expect("admin signs in");
    app.update_config(changed).expect("update");
    assert_eq!(app.config_manager().list_backups().expect("list").len(), 1);

    let invoice_id = app
        .create_invoice(vetcare_core::NewInvoiceInput::for_owner(patient.owner_id))
        .expect("invoice");
    app.add_line_item(
        invoice_id,
        vetcare_core::LineItemInput::custom("Bath", 1, money(5000)),
    )
    .expect("line");
    let invoice = app
        .store()
        .read(|records| records.invoice(invoice_id).cloned())
        .expect("read")
        .expect("invoice exists");
    assert_eq!(invoice.tax, money(500));

    assert_eq!(open_clinic(&home).config().tax_percent, 10);
}

#[test]
fn backups_restore_earlier_records_for_administrators_only() {
    let (app, _home) = admin_clinic();
    register_patient(&app);
    let backup = app.backup(Some("before import")).expect("backup");

    app.create_owner(OwnerInput::new("50005555", "Luis Ramos"))
        .expect("second owner");
    assert_eq!(app.store().snapshot().expect("load").owners.len(), 2);

    app.register_user(NewUserInput::new(
        "vet",
        "vet@clinic.test",
        "Dr. Vet",
        "vet1234",
        Role::Veterinarian,
    ))
    .expect("vet user");
    app.sign_in("vet", "vet1234").expect("vet signs in");
    let err = app.restore_backup(&backup.id).expect_err("not admin");
    assert!(matches!(err, VetcareError::Core(CoreError::Unauthorized(_))));

    app.sign_in("admin", ADMIN_PASSWORD).expect("admin signs in");
    let missing = app.restore_backup("clinic_19990101_000000.json").expect_err("missing");
    assert!(matches!(
        missing,
        VetcareError::Core(CoreError::NotFound { entity: "backup", .. })
    ));

    app.restore_backup(&backup.id).expect("restore");
    assert_eq!(app.store().snapshot().expect("load").owners.len(), 1);
    assert!(app.list_backups().expect("list").iter().any(|b| b.id == backup.id));
}

#[test]
fn sole_administrator_cannot_lock_themselves_out() {
    let (app, home) = admin_clinic();
    let admin = app.current_actor().expect("signed in");
    let revision = app.store().snapshot().expect("load").revision;

    let err = app
        .set_user_active(admin.user_id, false)
        .expect_err("self deactivation");
    assert!(matches!(err, VetcareError::Core(CoreError::Precondition(_))));
    let err = app
        .update_user_role(admin.user_id, Role::Receptionist)
        .expect_err("last admin demotion");
    assert!(matches!(err, VetcareError::Core(CoreError::Unauthorized(_))));
    let err = app.delete_user(admin.user_id).expect_err("self delete");
    assert!(matches!(err, VetcareError::Core(CoreError::Precondition(_))));

    let reopened = open_clinic(&home);
    let records = reopened.store().snapshot().expect("reload");
    assert_eq!(records.revision, revision);
    let stored = records
        .users
        .iter()
        .find(|user| user.id == admin.user_id)
        .expect("admin kept");
    assert!(stored.active);
    assert_eq!(stored.role, Role::Administrator);
    reopened
        .sign_in("admin", ADMIN_PASSWORD)
        .expect("admin still signs in");
}

#[test]
fn accounts_are_managed_through_the_signed_in_session() {
    let (app, _home) = admin_clinic();
    let admin = app.current_actor().expect("signed in");
    let front = app
        .register_user(NewUserInput::new(
            "front",
            "front@clinic.test",
            "Front Desk",
            "desk123",
            Role::Receptionist,
        ))
        .expect("receptionist");

    let temporary = app.reset_user_password(front).expect("reset");
    assert_eq!(temporary.chars().count(), 10);
    assert!(app.sign_in("front", "desk123").is_err());
    app.sign_in("front", &temporary).expect("temporary password works");

    let err = app
        .set_user_active(admin.user_id, false)
        .expect_err("receptionists do not manage users");
    assert!(matches!(err, VetcareError::Core(CoreError::Unauthorized(_))));
    app.change_password(&temporary, "desk-new1").expect("change");

    app.sign_in("admin", ADMIN_PASSWORD).expect("admin signs in");
    app.update_user_role(front, Role::Veterinarian).expect("promote");
    app.set_user_active(front, false).expect("deactivate");
    assert!(app.sign_in("front", "desk-new1").is_err());

    app.sign_out();
    let err = app.set_user_active(front, true).expect_err("anonymous");
    assert!(matches!(err, VetcareError::Core(CoreError::Unauthorized(_))));
}

#[test]
fn visit_lifecycle_feeds_the_reports() {
    let (app, _home) = admin_clinic();
    let patient = register_patient(&app);
    let vet_id = app
        .create_veterinarian(VeterinarianInput::new("Ana Vega", "CMV-1001"))
        .expect("vet");
    let visit = app
        .schedule_consultation(ConsultationInput {
            pet_id: patient.pet_id,
            veterinarian_id: vet_id,
            scheduled_at: today().and_hms_opt(10, 30, 0).expect("time"),
            reason: "Check-up".into(),
        })
        .expect("schedule");

    app.start_consultation(visit).expect("start");
    app.record_findings(
        visit,
        Findings {
            diagnosis: Some("Healthy".into()),
            cost: Some(money(6000)),
            ..Findings::default()
        },
    )
    .expect("findings");
    app.complete_consultation(visit).expect("complete");

    let deworming = app
        .add_treatment(
            visit,
            TreatmentInput {
                description: "Deworming".into(),
                medication: Some("Praziquantel".into()),
                ..TreatmentInput::default()
            },
        )
        .expect("treatment");
    let drops = app
        .add_treatment(
            visit,
            TreatmentInput {
                description: "Ear drops".into(),
                ..TreatmentInput::default()
            },
        )
        .expect("treatment");
    app.complete_treatment(deworming).expect("complete treatment");
    app.suspend_treatment(drops).expect("suspend treatment");
    app.remove_treatment(drops).expect("remove unbilled treatment");

    let treatments = app
        .store()
        .read(|records| records.treatments.clone())
        .expect("read");
    assert_eq!(treatments.len(), 1);
    assert_eq!(treatments[0].status, TreatmentStatus::Completed);

    let period = app.default_report_period();
    let report = app.consultation_report(period).expect("report");
    assert_eq!(report.total, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.revenue, money(6000));
    let productivity = app.vet_productivity(period).expect("productivity");
    assert_eq!(productivity.len(), 1);
    assert_eq!(productivity[0].veterinarian_id, vet_id);
    assert_eq!(productivity[0].completed, 1);
    let frequent = app.frequent_treatments(5).expect("frequent");
    assert_eq!(frequent[0].name, "Deworming");
    let species = app.species_attended(period).expect("species");
    assert_eq!(species.consultations_per_species[0].name, "Dog");

    app.sign_out();
    let err = app.consultation_report(period).expect_err("anonymous report");
    assert!(matches!(err, VetcareError::Core(CoreError::Unauthorized(_))));
}

#[test]
fn cancelled_vaccinations_leave_the_summary() {
    let (app, _home) = admin_clinic();
    let patient = register_patient(&app);
    let rabies = app
        .create_vaccine(VaccineInput::new("Rabies"))
        .expect("vaccine");
    let dose = app
        .schedule_vaccination(ScheduleVaccinationInput {
            pet_id: patient.pet_id,
            vaccine_id: rabies,
            scheduled_date: today() + Duration::days(2),
            dose_number: 1,
            notes: None,
        })
        .expect("schedule");

    let summary = app.vaccination_summary().expect("summary");
    assert_eq!(summary["upcoming"].as_array().map(Vec::len), Some(1));

    app.cancel_vaccination(dose).expect("cancel");
    let err = app
        .apply_vaccination(dose, ApplyVaccinationInput::default())
        .expect_err("cancelled dose");
    assert!(matches!(err, VetcareError::Core(CoreError::Precondition(_))));
    let stored = app
        .store()
        .read(|records| records.vaccination(dose).map(|record| record.status))
        .expect("read");
    assert_eq!(stored, Some(VaccinationStatus::Cancelled));
    let summary = app.vaccination_summary().expect("summary");
    assert_eq!(summary["upcoming"].as_array().map(Vec::len), Some(0));
}
