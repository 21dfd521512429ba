//! Composition root: configuration, JSON persistence, the record store and
//! the signed-in session, exposed as one `ClinicApp` handle.
//!
//! Every mutation resolves the acting user from the session, runs as one
//! unit of work on the [`RecordStore`] and is logged with the ids it touched.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vetcare_config::{Config, ConfigManager};
use vetcare_core::{
    identity::require_admin,
    storage::BackupInfo,
    view::{ToView, View, ViewContext},
    ApplyVaccinationInput, AppliedVaccination, AttendInput, BillingService, BillingStats,
    CatalogService, Clock, ConsultationInput, ConsultationPeriodReport, ConsultationService,
    CoreError, CoreResult, IdentityProvider, InvoiceFilter, LineItemInput, NamedCount,
    NewInvoiceInput, NewUserInput, OwnerInput, PatientService, PaymentInput, PetInput,
    RecordStore, ReportPeriod, ReportService, ScheduleVaccinationInput, ServiceInput,
    SessionIdentity, SpeciesInput, SpeciesReport, SystemClock, TreatmentInput, UserService,
    VaccinationService, VaccineInput, VetProductivity, VeterinarianInput,
};
use vetcare_domain::{
    percent_to_rate, Actor, ClinicRecords, Findings, PaymentOutcome, Role, ScheduledVaccination,
    VoidOutcome,
};
use vetcare_storage_json::{JsonClinicStorage, StoragePaths};

use crate::errors::{VetcareError, VetcareResult};

pub struct ClinicApp {
    home: PathBuf,
    config_manager: ConfigManager,
    config: Config,
    store: RecordStore,
    identity: SessionIdentity,
}

impl ClinicApp {
    /// Opens the clinic stored under `home` using the wall clock.
    pub fn open(home: impl Into<PathBuf>) -> VetcareResult<Self> {
        Self::open_with_clock(home, Arc::new(SystemClock))
    }

    pub fn open_with_clock(home: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> VetcareResult<Self> {
        let home = home.into();
        let config_manager = ConfigManager::with_base_dir(home.clone())?;
        let config = config_manager.load()?;
        let paths = StoragePaths {
            data_root: config.resolve_data_root(&home),
            backup_root: config.resolve_backup_root(&home),
        };
        let backend = JsonClinicStorage::with_retention(paths, config.backup_retention)?;
        info!(
            home = %home.display(),
            clinic = %config.clinic_name,
            "opened clinic"
        );
        Ok(Self {
            home,
            config_manager,
            config,
            store: RecordStore::new(Arc::new(backend), clock),
            identity: SessionIdentity::new(),
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.store.clock().now()
    }

    pub fn today(&self) -> NaiveDate {
        self.store.clock().today()
    }

    pub fn tax_rate(&self) -> Decimal {
        percent_to_rate(self.config.tax_percent)
    }

    /// Saves new settings after backing up the current ones. Administrators only.
    pub fn update_config(&mut self, config: Config) -> VetcareResult<()> {
        let actor = self.actor()?;
        require_admin(&actor)?;
        let backup = self
            .config_manager
            .backup(&self.config, Some("before update"))?;
        self.config_manager.save(&config)?;
        info!(user = %actor.username, backup = %backup, "configuration updated");
        self.config = config;
        Ok(())
    }

    pub fn current_actor(&self) -> Option<Actor> {
        self.identity.current_actor()
    }

    pub fn sign_in(&self, username: &str, password: &str) -> VetcareResult<Actor> {
        let now = self.now();
        match self
            .store
            .transaction(|records| UserService::authenticate(records, username, password, now))
        {
            Ok(actor) => {
                info!(user = %actor.username, role = %actor.role, "signed in");
                self.identity.sign_in(actor.clone());
                Ok(actor)
            }
            Err(err) => {
                warn!(user = %username, error = %err, "sign-in rejected");
                Err(err.into())
            }
        }
    }

    pub fn sign_out(&self) {
        if let Some(actor) = self.current_actor() {
            info!(user = %actor.username, "signed out");
        }
        self.identity.sign_out();
    }

    /// Registers a user. On an empty clinic no session is needed and the
    /// account becomes the first Administrator.
    pub fn register_user(&self, input: NewUserInput) -> VetcareResult<Uuid> {
        let actor = self.current_actor();
        let now = self.now();
        let user_id = self.logged("register_user", || {
            self.store.transaction(|records| {
                UserService::register(records, input.clone(), actor.as_ref(), now)
            })
        })?;
        info!(%user_id, username = %input.username, "user registered");
        Ok(user_id)
    }

    pub fn update_user_role(&self, user_id: Uuid, role: Role) -> VetcareResult<()> {
        self.write("update_user_role", |records, actor, _| {
            UserService::update_role(records, actor, user_id, role)
        })?;
        info!(%user_id, %role, "user role changed");
        Ok(())
    }

    /// Activates or deactivates an account. The last active Administrator stays active.
    pub fn set_user_active(&self, user_id: Uuid, active: bool) -> VetcareResult<()> {
        self.write("set_user_active", |records, actor, _| {
            UserService::set_active(records, actor, user_id, active)
        })?;
        info!(%user_id, active, "user activation changed");
        Ok(())
    }

    pub fn delete_user(&self, user_id: Uuid) -> VetcareResult<()> {
        self.write("delete_user", |records, actor, _| {
            UserService::delete(records, actor, user_id)
        })?;
        info!(%user_id, "user deleted");
        Ok(())
    }

    /// Returns the generated temporary password.
    pub fn reset_user_password(&self, user_id: Uuid) -> VetcareResult<String> {
        let temporary = self.write("reset_user_password", |records, actor, _| {
            UserService::reset_password(records, actor, user_id)
        })?;
        info!(%user_id, "user password reset");
        Ok(temporary)
    }

    pub fn change_password(&self, current: &str, replacement: &str) -> VetcareResult<()> {
        let actor = self.write("change_password", |records, actor, _| {
            UserService::change_password(records, actor, current, replacement)?;
            Ok(actor.clone())
        })?;
        info!(user = %actor.username, "password changed");
        Ok(())
    }

    pub fn create_owner(&self, input: OwnerInput) -> VetcareResult<Uuid> {
        let owner_id = self.write("create_owner", |records, _, now| {
            PatientService::create_owner(records, input.clone(), now)
        })?;
        info!(%owner_id, "owner created");
        Ok(owner_id)
    }

    pub fn create_pet(&self, input: PetInput) -> VetcareResult<Uuid> {
        let pet_id = self.write("create_pet", |records, _, _| {
            PatientService::create_pet(records, input.clone())
        })?;
        info!(%pet_id, owner_id = %input.owner_id, "pet registered");
        Ok(pet_id)
    }

    pub fn create_species(&self, input: SpeciesInput) -> VetcareResult<Uuid> {
        let species_id = self.write("create_species", |records, _, _| {
            CatalogService::create_species(records, input.clone())
        })?;
        info!(%species_id, name = %input.name, "species created");
        Ok(species_id)
    }

    pub fn create_vaccine(&self, input: VaccineInput) -> VetcareResult<Uuid> {
        let vaccine_id = self.write("create_vaccine", |records, _, _| {
            CatalogService::create_vaccine(records, input.clone())
        })?;
        info!(%vaccine_id, name = %input.name, "vaccine created");
        Ok(vaccine_id)
    }

    pub fn create_service(&self, input: ServiceInput) -> VetcareResult<Uuid> {
        let service_id = self.write("create_service", |records, _, _| {
            CatalogService::create_service(records, input.clone())
        })?;
        info!(%service_id, name = %input.name, "service created");
        Ok(service_id)
    }

    pub fn create_veterinarian(&self, input: VeterinarianInput) -> VetcareResult<Uuid> {
        let veterinarian_id = self.write("create_veterinarian", |records, _, _| {
            CatalogService::create_veterinarian(records, input.clone())
        })?;
        info!(%veterinarian_id, "veterinarian created");
        Ok(veterinarian_id)
    }

    pub fn schedule_consultation(&self, input: ConsultationInput) -> VetcareResult<Uuid> {
        let consultation_id = self.write("schedule_consultation", |records, actor, now| {
            ConsultationService::schedule(records, input.clone(), actor, now)
        })?;
        info!(%consultation_id, pet_id = %input.pet_id, "consultation scheduled");
        Ok(consultation_id)
    }

    pub fn attend_consultation(&self, consultation_id: Uuid, input: AttendInput) -> VetcareResult<()> {
        self.write("attend_consultation", |records, _, _| {
            ConsultationService::attend(records, consultation_id, input.clone())
        })?;
        info!(%consultation_id, status = %input.status, "consultation attended");
        Ok(())
    }

    pub fn start_consultation(&self, consultation_id: Uuid) -> VetcareResult<()> {
        self.write("start_consultation", |records, _, _| {
            ConsultationService::start(records, consultation_id)
        })?;
        info!(%consultation_id, "consultation started");
        Ok(())
    }

    pub fn complete_consultation(&self, consultation_id: Uuid) -> VetcareResult<()> {
        self.write("complete_consultation", |records, _, _| {
            ConsultationService::complete(records, consultation_id)
        })?;
        info!(%consultation_id, "consultation completed");
        Ok(())
    }

    pub fn record_findings(&self, consultation_id: Uuid, findings: Findings) -> VetcareResult<()> {
        self.write("record_findings", |records, _, _| {
            ConsultationService::record_findings(records, consultation_id, findings.clone())
        })?;
        info!(%consultation_id, "consultation findings recorded");
        Ok(())
    }

    pub fn cancel_consultation(&self, consultation_id: Uuid) -> VetcareResult<()> {
        self.write("cancel_consultation", |records, _, _| {
            ConsultationService::cancel(records, consultation_id)
        })?;
        info!(%consultation_id, "consultation cancelled");
        Ok(())
    }

    pub fn add_treatment(&self, consultation_id: Uuid, input: TreatmentInput) -> VetcareResult<Uuid> {
        let today = self.today();
        let treatment_id = self.write("add_treatment", |records, _, _| {
            ConsultationService::add_treatment(records, consultation_id, input.clone(), today)
        })?;
        info!(%treatment_id, %consultation_id, "treatment added");
        Ok(treatment_id)
    }

    pub fn update_treatment(&self, treatment_id: Uuid, input: TreatmentInput) -> VetcareResult<()> {
        self.write("update_treatment", |records, _, _| {
            ConsultationService::update_treatment(records, treatment_id, input.clone())
        })?;
        info!(%treatment_id, "treatment updated");
        Ok(())
    }

    pub fn complete_treatment(&self, treatment_id: Uuid) -> VetcareResult<()> {
        let today = self.today();
        self.write("complete_treatment", |records, _, _| {
            ConsultationService::complete_treatment(records, treatment_id, today)
        })?;
        info!(%treatment_id, "treatment completed");
        Ok(())
    }

    pub fn suspend_treatment(&self, treatment_id: Uuid) -> VetcareResult<()> {
        let today = self.today();
        self.write("suspend_treatment", |records, _, _| {
            ConsultationService::suspend_treatment(records, treatment_id, today)
        })?;
        info!(%treatment_id, "treatment suspended");
        Ok(())
    }

    pub fn remove_treatment(&self, treatment_id: Uuid) -> VetcareResult<()> {
        let removed = self.write("remove_treatment", |records, _, _| {
            ConsultationService::remove_treatment(records, treatment_id)
        })?;
        info!(%treatment_id, consultation_id = %removed.consultation_id, "treatment removed");
        Ok(())
    }

    pub fn create_invoice(&self, input: NewInvoiceInput) -> VetcareResult<Uuid> {
        let tax_rate = self.tax_rate();
        let invoice_id = self.write("create_invoice", |records, actor, now| {
            BillingService::create_invoice(records, input.clone(), tax_rate, actor, now)
        })?;
        info!(%invoice_id, owner_id = %input.owner_id, "invoice created");
        Ok(invoice_id)
    }

    pub fn invoice_consultation(&self, consultation_id: Uuid) -> VetcareResult<Uuid> {
        let tax_rate = self.tax_rate();
        let invoice_id = self.write("invoice_consultation", |records, actor, now| {
            BillingService::from_consultation(records, consultation_id, tax_rate, actor, now)
        })?;
        info!(%invoice_id, %consultation_id, "consultation invoiced");
        Ok(invoice_id)
    }

    pub fn add_line_item(&self, invoice_id: Uuid, input: LineItemInput) -> VetcareResult<Uuid> {
        let line_item_id = self.write("add_line_item", |records, _, _| {
            BillingService::add_line_item(records, invoice_id, input.clone())
        })?;
        info!(%invoice_id, %line_item_id, "line item added");
        Ok(line_item_id)
    }

    pub fn remove_line_item(&self, invoice_id: Uuid, line_item_id: Uuid) -> VetcareResult<()> {
        self.write("remove_line_item", |records, _, _| {
            BillingService::remove_line_item(records, invoice_id, line_item_id)
        })?;
        info!(%invoice_id, %line_item_id, "line item removed");
        Ok(())
    }

    pub fn set_invoice_discount(&self, invoice_id: Uuid, discount: Decimal) -> VetcareResult<()> {
        let totals = self.write("set_invoice_discount", |records, _, _| {
            BillingService::set_discount(records, invoice_id, discount)
        })?;
        info!(%invoice_id, %discount, total = %totals.total, "invoice discount set");
        Ok(())
    }

    pub fn set_invoice_tax(&self, invoice_id: Uuid, apply_tax: bool) -> VetcareResult<()> {
        let totals = self.write("set_invoice_tax", |records, _, _| {
            BillingService::set_tax(records, invoice_id, apply_tax)
        })?;
        info!(%invoice_id, apply_tax, total = %totals.total, "invoice tax toggled");
        Ok(())
    }

    pub fn register_payment(
        &self,
        invoice_id: Uuid,
        payment: PaymentInput,
    ) -> VetcareResult<PaymentOutcome> {
        let outcome = self.write("register_payment", |records, _, now| {
            BillingService::register_payment(records, invoice_id, payment, now)
        })?;
        match &outcome {
            PaymentOutcome::Applied {
                status,
                amount_paid,
                balance_due,
            } => info!(
                %invoice_id,
                amount = %payment.amount,
                %status,
                %amount_paid,
                %balance_due,
                "payment registered"
            ),
            PaymentOutcome::AlreadyPaid => info!(%invoice_id, "invoice was already paid"),
        }
        Ok(outcome)
    }

    pub fn void_invoice(&self, invoice_id: Uuid) -> VetcareResult<VoidOutcome> {
        let outcome = self.write("void_invoice", |records, _, _| {
            BillingService::void(records, invoice_id)
        })?;
        match outcome {
            VoidOutcome::Voided => info!(%invoice_id, "invoice voided"),
            VoidOutcome::AlreadyVoided => info!(%invoice_id, "invoice was already voided"),
        }
        Ok(outcome)
    }

    pub fn invoice_view(&self, number: &str) -> VetcareResult<View> {
        self.view(|records, ctx| BillingService::find_by_number(records, number)?.to_view(ctx))
    }

    pub fn invoice_views(&self, filter: &InvoiceFilter) -> VetcareResult<Vec<View>> {
        self.view(|records, ctx| {
            BillingService::search(records, filter)
                .into_iter()
                .map(|invoice| invoice.to_view(ctx))
                .collect()
        })
    }

    pub fn billing_stats(&self) -> VetcareResult<BillingStats> {
        debug!("reading billing stats");
        Ok(self
            .store
            .read(|records| BillingService::stats(&records.invoices))?)
    }

    pub fn schedule_vaccination(&self, input: ScheduleVaccinationInput) -> VetcareResult<Uuid> {
        let vaccination_id = self.write("schedule_vaccination", |records, actor, now| {
            VaccinationService::schedule(records, input.clone(), actor, now)
        })?;
        info!(
            %vaccination_id,
            pet_id = %input.pet_id,
            date = %input.scheduled_date,
            "vaccination scheduled"
        );
        Ok(vaccination_id)
    }

    pub fn apply_vaccination(
        &self,
        vaccination_id: Uuid,
        input: ApplyVaccinationInput,
    ) -> VetcareResult<AppliedVaccination> {
        let applied = self.write("apply_vaccination", |records, _, now| {
            VaccinationService::apply(records, vaccination_id, input.clone(), now)
        })?;
        info!(
            %vaccination_id,
            next_due = ?applied.next_due_date,
            "vaccination applied"
        );
        Ok(applied)
    }

    pub fn mark_reminder_sent(&self, vaccination_id: Uuid) -> VetcareResult<()> {
        self.write("mark_reminder_sent", |records, _, _| {
            VaccinationService::mark_reminder_sent(records, vaccination_id)
        })?;
        info!(%vaccination_id, "reminder marked as sent");
        Ok(())
    }

    pub fn cancel_vaccination(&self, vaccination_id: Uuid) -> VetcareResult<()> {
        self.write("cancel_vaccination", |records, _, _| {
            VaccinationService::cancel(records, vaccination_id)
        })?;
        info!(%vaccination_id, "vaccination cancelled");
        Ok(())
    }

    /// Maintenance task; runs without a session.
    pub fn sweep_overdue(&self) -> VetcareResult<usize> {
        let today = self.today();
        let swept = self.logged("sweep_overdue", || {
            self.store
                .transaction(|records| Ok(VaccinationService::sweep_overdue(records, today)))
        })?;
        info!(swept, %today, "overdue vaccinations swept");
        Ok(swept)
    }

    pub fn reminders_due(&self) -> VetcareResult<Vec<ScheduledVaccination>> {
        let today = self.today();
        let window = i64::from(self.config.reminder_window_days);
        debug!(%today, window, "reading reminders due");
        Ok(self.store.read(|records| {
            VaccinationService::reminders_due(records, today, window)
                .into_iter()
                .cloned()
                .collect()
        })?)
    }

    pub fn vaccination_views(
        &self,
        select: impl FnOnce(&ClinicRecords, NaiveDate) -> Vec<&ScheduledVaccination>,
    ) -> VetcareResult<Vec<View>> {
        let today = self.today();
        self.view(|records, ctx| {
            select(records, today)
                .into_iter()
                .map(|record| record.to_view(ctx))
                .collect()
        })
    }

    /// Trailing period from the configured report default, ending today.
    pub fn default_report_period(&self) -> ReportPeriod {
        ReportPeriod::trailing(self.today(), self.config.report_default_days)
    }

    pub fn consultation_report(&self, period: ReportPeriod) -> VetcareResult<ConsultationPeriodReport> {
        self.report("consultation_report", |records, _| {
            ReportService::consultations_in_period(records, period)
        })
    }

    pub fn vet_productivity(&self, period: ReportPeriod) -> VetcareResult<Vec<VetProductivity>> {
        self.report("vet_productivity", |records, _| {
            ReportService::vet_productivity(records, period)
        })
    }

    /// Upcoming and overdue doses plus application counts, as a JSON view.
    pub fn vaccination_summary(&self) -> VetcareResult<View> {
        let window = i64::from(self.config.upcoming_window_days);
        let summary = self.report("vaccination_summary", |records, today| {
            serde_json::to_value(ReportService::vaccination_summary(records, today, window))
        })?;
        match summary.map_err(CoreError::from)? {
            serde_json::Value::Object(view) => Ok(view),
            _ => Err(CoreError::Serde("vaccination summary is not an object".into()).into()),
        }
    }

    pub fn frequent_treatments(&self, limit: usize) -> VetcareResult<Vec<NamedCount>> {
        self.report("frequent_treatments", |records, _| {
            ReportService::frequent_treatments(records, limit)
        })
    }

    pub fn species_attended(&self, period: ReportPeriod) -> VetcareResult<SpeciesReport> {
        self.report("species_attended", |records, _| {
            ReportService::species_attended(records, period)
        })
    }

    pub fn backup(&self, note: Option<&str>) -> VetcareResult<BackupInfo> {
        let backup = self.logged("backup", || self.store.backend().backup(note))?;
        info!(backup = %backup.id, "clinic backup created");
        Ok(backup)
    }

    pub fn list_backups(&self) -> VetcareResult<Vec<BackupInfo>> {
        debug!("listing clinic backups");
        Ok(self.store.backend().list_backups()?)
    }

    /// Replaces the clinic records with a backup. Administrators only.
    pub fn restore_backup(&self, backup_id: &str) -> VetcareResult<()> {
        let actor = self.actor()?;
        require_admin(&actor)?;
        let backups = self.list_backups()?;
        let backup = backups
            .iter()
            .find(|entry| entry.id == backup_id)
            .ok_or_else(|| CoreError::not_found("backup", backup_id))?;
        let restored = self.logged("restore_backup", || {
            self.store.backend().restore_backup(backup)
        })?;
        warn!(
            backup = %backup.id,
            revision = restored.revision,
            user = %actor.username,
            "clinic records restored from backup"
        );
        Ok(())
    }

    fn actor(&self) -> VetcareResult<Actor> {
        Ok(self.identity.require_actor()?)
    }

    /// Runs `work` as the signed-in user inside one unit of work.
    fn write<T>(
        &self,
        operation: &'static str,
        mut work: impl FnMut(&mut ClinicRecords, &Actor, DateTime<Utc>) -> CoreResult<T>,
    ) -> VetcareResult<T> {
        let actor = self.actor().map_err(|err| {
            warn!(operation, "rejected anonymous write");
            err
        })?;
        let now = self.now();
        self.logged(operation, || {
            self.store.transaction(|records| work(records, &actor, now))
        })
    }

    /// Read-only query for a signed-in user.
    fn report<T>(
        &self,
        operation: &'static str,
        build: impl FnOnce(&ClinicRecords, NaiveDate) -> T,
    ) -> VetcareResult<T> {
        let actor = self.actor().map_err(|err| {
            warn!(operation, "rejected anonymous report");
            err
        })?;
        debug!(operation, user = %actor.username, "building report");
        let today = self.today();
        Ok(self.store.read(|records| build(records, today))?)
    }

    fn logged<T>(
        &self,
        operation: &'static str,
        run: impl FnOnce() -> CoreResult<T>,
    ) -> VetcareResult<T> {
        run().map_err(|err| {
            warn!(operation, error = %err, "operation rejected");
            VetcareError::from(err)
        })
    }

    fn view<T>(
        &self,
        build: impl FnOnce(&ClinicRecords, &ViewContext<'_>) -> CoreResult<T>,
    ) -> VetcareResult<T> {
        let records = self.store.snapshot()?;
        let ctx = ViewContext::new(&records, self.today(), &self.config.currency_symbol);
        Ok(build(&records, &ctx)?)
    }
}
