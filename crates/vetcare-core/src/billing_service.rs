//! Invoice lifecycle operations over the clinic records.
//!
//! Each function mutates a draft [`ClinicRecords`] handed out by
//! [`crate::RecordStore::transaction`]; totals are recomputed by the
//! invoice itself inside the same call, so the commit either carries a
//! consistent invoice or nothing at all.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use vetcare_domain::{
    billable_lines, clean_text, Actor, ClinicRecords, Consultation, ConsultationStatus, Invoice,
    InvoiceLineItem, InvoiceNumber, InvoiceStatus, InvoiceTotals, PaymentMethod, PaymentOutcome,
    VoidOutcome,
};

use crate::{
    input::{FieldError, FormInput},
    CoreError, CoreResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoiceInput {
    pub owner_id: Uuid,
    pub pet_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub apply_tax: bool,
}

impl NewInvoiceInput {
    pub fn for_owner(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            pet_id: None,
            consultation_id: None,
            due_date: None,
            notes: None,
            apply_tax: true,
        }
    }
}

impl TryFrom<&FormInput> for NewInvoiceInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            owner_id: form.id("owner_id")?,
            pet_id: form.optional_id("pet_id")?,
            consultation_id: form.optional_id("consultation_id")?,
            due_date: form.optional_date("due_date")?,
            notes: form.optional_text("notes"),
            apply_tax: form.raw("apply_tax").map_or(true, |_| form.flag("apply_tax")),
        })
    }
}

/// A line to append; catalog services fill in missing description and price.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemInput {
    pub service_id: Option<Uuid>,
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
    pub discount: Decimal,
}

impl LineItemInput {
    pub fn custom(description: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            service_id: None,
            description: Some(description.into()),
            quantity,
            unit_price: Some(unit_price),
            discount: Decimal::ZERO,
        }
    }

    pub fn from_service(service_id: Uuid, quantity: u32) -> Self {
        Self {
            service_id: Some(service_id),
            description: None,
            quantity,
            unit_price: None,
            discount: Decimal::ZERO,
        }
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }
}

impl TryFrom<&FormInput> for LineItemInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            service_id: form.optional_id("service_id")?,
            description: form.optional_text("description"),
            quantity: form.quantity("quantity")?,
            unit_price: form.optional_decimal("unit_price")?,
            discount: form.decimal_or("discount", Decimal::ZERO)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentInput {
    pub amount: Decimal,
    pub method: PaymentMethod,
}

impl TryFrom<&FormInput> for PaymentInput {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            amount: form.decimal("amount")?,
            method: form
                .optional_choice("payment_method")?
                .unwrap_or(PaymentMethod::Cash),
        })
    }
}

/// Header edits for an open invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceEdit {
    pub notes: Option<String>,
    pub discount: Decimal,
    pub apply_tax: bool,
}

impl TryFrom<&FormInput> for InvoiceEdit {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            notes: form.optional_text("notes"),
            discount: form.decimal_or("discount", Decimal::ZERO)?,
            apply_tax: form.flag("apply_tax"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceFilter {
    /// Matches invoice number, owner name or owner document.
    pub text: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TryFrom<&FormInput> for InvoiceFilter {
    type Error = FieldError;

    fn try_from(form: &FormInput) -> Result<Self, Self::Error> {
        Ok(Self {
            text: form.optional_text("q"),
            status: form.optional_choice("status")?,
            from: form.optional_date("from")?,
            to: form.optional_date("to")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BillingStats {
    pub pending_balance: Decimal,
    pub paid_total: Decimal,
    pub pending_count: usize,
    pub partially_paid_count: usize,
    pub paid_count: usize,
    pub voided_count: usize,
}

pub struct BillingService;

impl BillingService {
    /// Next free number for the month of `today`.
    pub fn next_number(records: &ClinicRecords, today: NaiveDate) -> CoreResult<InvoiceNumber> {
        Ok(InvoiceNumber::next_for(
            records.invoices.iter().map(|invoice| invoice.number.as_str()),
            today,
        )?)
    }

    /// Opens a Pending invoice for an active owner and allocates its number.
    pub fn create_invoice(
        records: &mut ClinicRecords,
        input: NewInvoiceInput,
        tax_rate: Decimal,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> CoreResult<Uuid> {
        let owner = records
            .owner(input.owner_id)
            .ok_or_else(|| CoreError::not_found("owner", input.owner_id))?;
        if !owner.active {
            return Err(CoreError::Precondition(format!(
                "owner {} is inactive",
                owner.full_name
            )));
        }
        if let Some(pet_id) = input.pet_id {
            let pet = records
                .pet(pet_id)
                .ok_or_else(|| CoreError::not_found("pet", pet_id))?;
            if pet.owner_id != input.owner_id {
                return Err(CoreError::Validation(format!(
                    "pet {} does not belong to owner {}",
                    pet.name, owner.full_name
                )));
            }
        }
        if let Some(consultation_id) = input.consultation_id {
            Self::ensure_unbilled(records, consultation_id)?;
        }

        let number = Self::next_number(records, now.date_naive())?;
        let mut invoice = Invoice::new(number.to_string(), input.owner_id, now)
            .with_pet(input.pet_id)
            .with_tax_rate(tax_rate)
            .with_due_date(input.due_date)
            .with_notes(input.notes)
            .registered_by(actor.user_id);
        if let Some(consultation_id) = input.consultation_id {
            invoice = invoice.with_consultation(consultation_id);
        }
        if !input.apply_tax {
            invoice.recompute_totals(false)?;
        }
        let id = invoice.id;
        records.invoices.push(invoice);
        Ok(id)
    }

    pub fn add_line_item(
        records: &mut ClinicRecords,
        invoice_id: Uuid,
        input: LineItemInput,
    ) -> CoreResult<Uuid> {
        let (description, unit_price) = match input.service_id {
            Some(service_id) => {
                let service = records
                    .service(service_id)
                    .ok_or_else(|| CoreError::not_found("service", service_id))?;
                if !service.active {
                    return Err(CoreError::Precondition(format!(
                        "service {} is inactive",
                        service.code
                    )));
                }
                (
                    input.description.unwrap_or_else(|| service.name.clone()),
                    input.unit_price.unwrap_or(service.price),
                )
            }
            None => {
                let description = input.description.ok_or_else(|| {
                    CoreError::Validation("a line item needs a description or a service".into())
                })?;
                let unit_price = input.unit_price.ok_or_else(|| {
                    CoreError::Validation(format!("line item `{}` needs a unit price", description))
                })?;
                (description, unit_price)
            }
        };
        if unit_price < Decimal::ZERO || input.discount < Decimal::ZERO {
            return Err(CoreError::Validation(
                "unit price and discount cannot be negative".into(),
            ));
        }
        let gross = unit_price * Decimal::from(input.quantity.max(1));
        if input.discount > gross {
            return Err(CoreError::Validation(format!(
                "discount {} exceeds the line amount {}",
                input.discount, gross
            )));
        }

        let invoice = Self::invoice_mut(records, invoice_id)?;
        let id = invoice.add_line_item(
            description,
            input.quantity,
            unit_price,
            input.discount,
            input.service_id,
        )?;
        Ok(id)
    }

    pub fn remove_line_item(
        records: &mut ClinicRecords,
        invoice_id: Uuid,
        line_item_id: Uuid,
    ) -> CoreResult<InvoiceLineItem> {
        let invoice = Self::invoice_mut(records, invoice_id)?;
        if invoice.line_item(line_item_id).is_none() {
            return Err(CoreError::not_found("line item", line_item_id));
        }
        Ok(invoice.remove_line_item(line_item_id)?)
    }

    pub fn set_discount(
        records: &mut ClinicRecords,
        invoice_id: Uuid,
        discount: Decimal,
    ) -> CoreResult<InvoiceTotals> {
        Ok(Self::invoice_mut(records, invoice_id)?.set_discount(discount)?)
    }

    /// Turns tax on or off; the choice sticks for later line edits.
    pub fn set_tax(
        records: &mut ClinicRecords,
        invoice_id: Uuid,
        apply_tax: bool,
    ) -> CoreResult<InvoiceTotals> {
        Ok(Self::invoice_mut(records, invoice_id)?.recompute_totals(apply_tax)?)
    }

    /// Applies notes, discount and tax setting together.
    pub fn edit(
        records: &mut ClinicRecords,
        invoice_id: Uuid,
        changes: InvoiceEdit,
    ) -> CoreResult<InvoiceTotals> {
        let invoice = Self::invoice_mut(records, invoice_id)?;
        if !invoice.is_editable() {
            return Err(CoreError::Precondition(format!(
                "invoice {} is {} and cannot be edited",
                invoice.number, invoice.status
            )));
        }
        invoice.notes = clean_text(changes.notes);
        invoice.set_discount(changes.discount)?;
        Ok(invoice.recompute_totals(changes.apply_tax)?)
    }

    pub fn register_payment(
        records: &mut ClinicRecords,
        invoice_id: Uuid,
        payment: PaymentInput,
        at: DateTime<Utc>,
    ) -> CoreResult<PaymentOutcome> {
        let invoice = Self::invoice_mut(records, invoice_id)?;
        Ok(invoice.register_payment(payment.amount, payment.method, at)?)
    }

    pub fn void(records: &mut ClinicRecords, invoice_id: Uuid) -> CoreResult<VoidOutcome> {
        Ok(Self::invoice_mut(records, invoice_id)?.void())
    }

    /// Bills a consultation and its costed treatments in one invoice.
    pub fn from_consultation(
        records: &mut ClinicRecords,
        consultation_id: Uuid,
        tax_rate: Decimal,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> CoreResult<Uuid> {
        Self::ensure_unbilled(records, consultation_id)?;
        let consultation = records
            .consultation(consultation_id)
            .ok_or_else(|| CoreError::not_found("consultation", consultation_id))?;
        if consultation.status == ConsultationStatus::Cancelled {
            return Err(CoreError::Precondition(
                "a cancelled consultation cannot be billed".into(),
            ));
        }
        let owner_id = records
            .pet(consultation.pet_id)
            .map(|pet| pet.owner_id)
            .filter(|owner_id| records.owner(*owner_id).is_some())
            .ok_or_else(|| {
                CoreError::Precondition("the consultation has no owner to bill".into())
            })?;
        let pet_id = consultation.pet_id;
        let lines = billable_lines(consultation, records.treatments_for(consultation_id));

        let mut input = NewInvoiceInput::for_owner(owner_id);
        input.pet_id = Some(pet_id);
        input.consultation_id = Some(consultation_id);
        let invoice_id = Self::create_invoice(records, input, tax_rate, actor, now)?;
        for line in lines {
            Self::add_line_item(
                records,
                invoice_id,
                LineItemInput::custom(line.description, 1, line.unit_price),
            )?;
        }
        Ok(invoice_id)
    }

    /// Invoices matching every set criterion, newest first.
    pub fn search<'a>(records: &'a ClinicRecords, filter: &InvoiceFilter) -> Vec<&'a Invoice> {
        let needle = filter
            .text
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .filter(|text| !text.is_empty());
        let mut found: Vec<&Invoice> = records
            .invoices
            .iter()
            .filter(|invoice| filter.status.map_or(true, |status| invoice.status == status))
            .filter(|invoice| {
                let day = invoice.issued_at.date_naive();
                filter.from.map_or(true, |from| day >= from)
                    && filter.to.map_or(true, |to| day <= to)
            })
            .filter(|invoice| match &needle {
                None => true,
                Some(needle) => {
                    invoice.number.to_lowercase().contains(needle.as_str())
                        || records.owner(invoice.owner_id).is_some_and(|owner| {
                            owner.full_name.to_lowercase().contains(needle.as_str())
                                || owner.document_number.to_lowercase().contains(needle.as_str())
                        })
                }
            })
            .collect();
        Self::newest_first(&mut found);
        found
    }

    pub fn by_owner(records: &ClinicRecords, owner_id: Uuid) -> Vec<&Invoice> {
        let mut found: Vec<&Invoice> = records
            .invoices
            .iter()
            .filter(|invoice| invoice.owner_id == owner_id)
            .collect();
        Self::newest_first(&mut found);
        found
    }

    /// Open invoices (Pending or PartiallyPaid), oldest first.
    pub fn pending(records: &ClinicRecords) -> Vec<&Invoice> {
        let mut found: Vec<&Invoice> = records
            .invoices
            .iter()
            .filter(|invoice| invoice.status.is_open())
            .collect();
        found.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        found
    }

    pub fn find_by_number<'a>(records: &'a ClinicRecords, number: &str) -> CoreResult<&'a Invoice> {
        records
            .invoice_by_number(number)
            .ok_or_else(|| CoreError::not_found("invoice", number.trim()))
    }

    /// Consultations of a pet that have no invoice yet, newest first.
    pub fn unbilled_consultations(records: &ClinicRecords, pet_id: Uuid) -> Vec<&Consultation> {
        let mut found: Vec<&Consultation> = records
            .consultations
            .iter()
            .filter(|consultation| consultation.pet_id == pet_id)
            .filter(|consultation| consultation.status != ConsultationStatus::Cancelled)
            .filter(|consultation| records.invoice_for_consultation(consultation.id).is_none())
            .collect();
        found.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        found
    }

    pub fn stats<'a>(invoices: impl IntoIterator<Item = &'a Invoice>) -> BillingStats {
        invoices
            .into_iter()
            .fold(BillingStats::default(), |mut stats, invoice| {
                match invoice.status {
                    InvoiceStatus::Pending => {
                        stats.pending_count += 1;
                        stats.pending_balance += invoice.balance_due();
                    }
                    InvoiceStatus::PartiallyPaid => {
                        stats.partially_paid_count += 1;
                        stats.pending_balance += invoice.balance_due();
                    }
                    InvoiceStatus::Paid => {
                        stats.paid_count += 1;
                        stats.paid_total += invoice.amount_paid;
                    }
                    InvoiceStatus::Voided => stats.voided_count += 1,
                }
                stats
            })
    }

    fn invoice_mut(records: &mut ClinicRecords, invoice_id: Uuid) -> CoreResult<&mut Invoice> {
        records
            .invoice_mut(invoice_id)
            .ok_or_else(|| CoreError::not_found("invoice", invoice_id))
    }

    fn ensure_unbilled(records: &ClinicRecords, consultation_id: Uuid) -> CoreResult<()> {
        if records.consultation(consultation_id).is_none() {
            return Err(CoreError::not_found("consultation", consultation_id));
        }
        match records.invoice_for_consultation(consultation_id) {
            Some(existing) => Err(CoreError::Conflict(format!(
                "consultation already billed on invoice {}",
                existing.number
            ))),
            None => Ok(()),
        }
    }

    fn newest_first(invoices: &mut [&Invoice]) {
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then_with(|| b.number.cmp(&a.number)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use vetcare_domain::{
        default_tax_rate, Owner, Pet, Role, Service, ServiceCategory, Treatment,
    };

    fn actor() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            username: "front-desk".into(),
            role: Role::Receptionist,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 15, 30, 0).unwrap()
    }

    fn money(units: i64) -> Decimal {
        Decimal::new(units, 2)
    }

    fn records_with_owner() -> (ClinicRecords, Uuid, Uuid) {
        let mut records = ClinicRecords::new();
        let owner = Owner::new("40112233", "Lucia Rojas", now());
        let pet = Pet::new(owner.id, Uuid::new_v4(), "Toby");
        let ids = (owner.id, pet.id);
        records.owners.push(owner);
        records.pets.push(pet);
        (records, ids.0, ids.1)
    }

    #[test]
    fn numbers_continue_within_the_month() {
        let (mut records, owner_id, _) = records_with_owner();
        let first = BillingService::create_invoice(
            &mut records,
            NewInvoiceInput::for_owner(owner_id),
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect("first invoice");
        let second = BillingService::create_invoice(
            &mut records,
            NewInvoiceInput::for_owner(owner_id),
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect("second invoice");
        assert_eq!(records.invoice(first).unwrap().number, "F202405-0001");
        assert_eq!(records.invoice(second).unwrap().number, "F202405-0002");
    }

    #[test]
    fn service_lines_default_to_catalog_price() {
        let (mut records, owner_id, _) = records_with_owner();
        let service = Service::new("SRV-0001", "Bath", ServiceCategory::Grooming, money(3500));
        let service_id = service.id;
        records.services.push(service);
        let invoice_id = BillingService::create_invoice(
            &mut records,
            NewInvoiceInput::for_owner(owner_id),
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect("invoice");

        BillingService::add_line_item(
            &mut records,
            invoice_id,
            LineItemInput::from_service(service_id, 2),
        )
        .expect("line");
        let invoice = records.invoice(invoice_id).unwrap();
        assert_eq!(invoice.items[0].description, "Bath");
        assert_eq!(invoice.subtotal, money(7000));
        assert_eq!(invoice.tax, money(1260));
    }

    #[test]
    fn custom_lines_need_a_description_and_price() {
        let (mut records, owner_id, _) = records_with_owner();
        let invoice_id = BillingService::create_invoice(
            &mut records,
            NewInvoiceInput::for_owner(owner_id),
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect("invoice");
        let mut input = LineItemInput::custom("Collar", 1, money(1000));
        input.unit_price = None;
        let err = BillingService::add_line_item(&mut records, invoice_id, input)
            .expect_err("price required");
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn line_discount_cannot_exceed_the_line_amount() {
        let (mut records, owner_id, _) = records_with_owner();
        let invoice_id = BillingService::create_invoice(
            &mut records,
            NewInvoiceInput::for_owner(owner_id),
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect("invoice");
        BillingService::add_line_item(
            &mut records,
            invoice_id,
            LineItemInput::custom("Surgery", 1, money(20000)),
        )
        .expect("first line");

        let mut bath = LineItemInput::custom("Bath", 1, money(1000));
        bath.discount = money(5000);
        let err = BillingService::add_line_item(&mut records, invoice_id, bath)
            .expect_err("negative subtotal");
        assert!(matches!(err, CoreError::Validation(_)));

        // A full discount on two units is still allowed.
        let mut free = LineItemInput::custom("Nail trim", 2, money(1000));
        free.discount = money(2000);
        BillingService::add_line_item(&mut records, invoice_id, free).expect("free line");

        let invoice = records.invoice(invoice_id).unwrap();
        let subtotals: Vec<Decimal> = invoice.items.iter().map(|item| item.subtotal).collect();
        assert_eq!(subtotals, vec![money(20000), money(0)]);
        assert_eq!(invoice.subtotal, money(20000));
    }

    #[test]
    fn invoice_from_consultation_bills_costed_records_once() {
        let (mut records, _, pet_id) = records_with_owner();
        let at = NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut consultation =
            Consultation::new(pet_id, Uuid::new_v4(), at, "Limping", now());
        consultation.cost = Some(money(6000));
        let consultation_id = consultation.id;
        records.consultations.push(consultation);
        records.treatments.push(
            Treatment::new(consultation_id, "Anti-inflammatory", at.date())
                .with_cost(Some(money(2500))),
        );
        records.treatments.push(Treatment::new(consultation_id, "Rest", at.date()));

        let invoice_id = BillingService::from_consultation(
            &mut records,
            consultation_id,
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect("invoice from consultation");
        let invoice = records.invoice(invoice_id).unwrap();
        let descriptions: Vec<&str> =
            invoice.items.iter().map(|item| item.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec!["Consultation: Limping", "Treatment: Anti-inflammatory"]
        );
        assert_eq!(invoice.subtotal, money(8500));
        assert_eq!(invoice.pet_id, Some(pet_id));

        let err = BillingService::from_consultation(
            &mut records,
            consultation_id,
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect_err("already billed");
        assert!(err.is_conflict());
        assert!(BillingService::unbilled_consultations(&records, pet_id).is_empty());
    }

    #[test]
    fn search_and_stats_cover_filters() {
        let (mut records, owner_id, _) = records_with_owner();
        let paid = BillingService::create_invoice(
            &mut records,
            NewInvoiceInput::for_owner(owner_id),
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect("invoice");
        BillingService::add_line_item(
            &mut records,
            paid,
            LineItemInput::custom("Checkup", 1, money(10000)),
        )
        .expect("line");
        BillingService::register_payment(
            &mut records,
            paid,
            PaymentInput {
                amount: money(11800),
                method: PaymentMethod::Card,
            },
            now(),
        )
        .expect("payment");
        let open = BillingService::create_invoice(
            &mut records,
            NewInvoiceInput::for_owner(owner_id),
            default_tax_rate(),
            &actor(),
            now(),
        )
        .expect("invoice");
        BillingService::add_line_item(
            &mut records,
            open,
            LineItemInput::custom("Vaccine", 1, money(5000)),
        )
        .expect("line");

        let by_name = BillingService::search(
            &records,
            &InvoiceFilter {
                text: Some("rojas".into()),
                ..InvoiceFilter::default()
            },
        );
        assert_eq!(by_name.len(), 2);
        let paid_only = BillingService::search(
            &records,
            &InvoiceFilter {
                status: Some(InvoiceStatus::Paid),
                ..InvoiceFilter::default()
            },
        );
        assert_eq!(paid_only.len(), 1);

        let stats = BillingService::stats(&records.invoices);
        assert_eq!(stats.paid_count, 1);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.paid_total, money(11800));
        assert_eq!(stats.pending_balance, money(5900));
        assert_eq!(BillingService::pending(&records).len(), 1);
    }

    #[test]
    fn payment_form_defaults_to_cash() {
        let form = FormInput::new().with("amount", "25,50");
        let payment = PaymentInput::try_from(&form).expect("payment input");
        assert_eq!(payment.amount, money(2550));
        assert_eq!(payment.method, PaymentMethod::Cash);
    }
}
