//! Field-name to value views of clinic entities, including derived fields,
//! shared by page rendering and JSON responses.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;
use vetcare_domain::{
    format_money, ClinicRecords, Consultation, Invoice, InvoiceLineItem, Owner, Pet,
    ScheduledVaccination, Service, StatusColored, Treatment, User, Vaccine, Veterinarian,
};

use crate::CoreResult;

pub type View = Map<String, Value>;

pub const DATE_TEXT_FORMAT: &str = "%d/%m/%Y";
pub const DATETIME_TEXT_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Lookups and formatting settings needed to resolve derived fields.
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub records: &'a ClinicRecords,
    pub today: NaiveDate,
    pub currency_symbol: &'a str,
}

impl<'a> ViewContext<'a> {
    pub fn new(records: &'a ClinicRecords, today: NaiveDate, currency_symbol: &'a str) -> Self {
        Self {
            records,
            today,
            currency_symbol,
        }
    }

    fn money(&self, value: rust_decimal::Decimal) -> Value {
        Value::String(format_money(self.currency_symbol, value))
    }

    fn owner_name(&self, id: Uuid) -> Value {
        name_or_null(self.records.owner(id).map(|owner| owner.full_name.as_str()))
    }

    fn pet_name(&self, id: Uuid) -> Value {
        name_or_null(self.records.pet(id).map(|pet| pet.name.as_str()))
    }

    fn species_name(&self, id: Uuid) -> Value {
        name_or_null(self.records.species_entry(id).map(|s| s.name.as_str()))
    }

    fn vet_name(&self, id: Uuid) -> Value {
        name_or_null(self.records.veterinarian(id).map(|vet| vet.full_name.as_str()))
    }

    fn vaccine_name(&self, id: Uuid) -> Value {
        name_or_null(self.records.vaccine(id).map(|vaccine| vaccine.name.as_str()))
    }
}

pub trait ToView {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View>;
}

/// Renders a slice of entities, failing on the first one that cannot be serialized.
pub fn to_views<'e, T>(
    items: impl IntoIterator<Item = &'e T>,
    ctx: &ViewContext<'_>,
) -> CoreResult<Vec<View>>
where
    T: ToView + 'e,
{
    items.into_iter().map(|item| item.to_view(ctx)).collect()
}

fn base<T: Serialize>(entity: &T) -> CoreResult<View> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            Ok(map)
        }
    }
}

fn name_or_null(name: Option<&str>) -> Value {
    name.map_or(Value::Null, |name| Value::String(name.to_string()))
}

fn text<T: ToString>(value: T) -> Value {
    Value::String(value.to_string())
}

impl ToView for InvoiceLineItem {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.insert("unit_price_text".into(), ctx.money(self.unit_price));
        view.insert("subtotal_text".into(), ctx.money(self.subtotal));
        Ok(view)
    }
}

impl ToView for Invoice {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.insert("status_color".into(), text(self.status_color()));
        view.insert(
            "issued_at_text".into(),
            text(self.issued_at.format(DATETIME_TEXT_FORMAT)),
        );
        view.insert(
            "due_date_text".into(),
            self.due_date
                .map_or(Value::Null, |day| text(day.format(DATE_TEXT_FORMAT))),
        );
        view.insert("balance_due".into(), serde_json::to_value(self.balance_due())?);
        view.insert("balance_due_text".into(), ctx.money(self.balance_due()));
        view.insert("total_text".into(), ctx.money(self.total));
        view.insert("is_editable".into(), Value::Bool(self.is_editable()));
        view.insert("owner_name".into(), ctx.owner_name(self.owner_id));
        view.insert(
            "pet_name".into(),
            self.pet_id.map_or(Value::Null, |id| ctx.pet_name(id)),
        );
        let items = to_views(&self.items, ctx)?
            .into_iter()
            .map(Value::Object)
            .collect();
        view.insert("items".into(), Value::Array(items));
        Ok(view)
    }
}

impl ToView for ScheduledVaccination {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.insert("status_color".into(), text(self.status_color()));
        view.insert(
            "scheduled_date_text".into(),
            text(self.scheduled_date.format(DATE_TEXT_FORMAT)),
        );
        view.insert(
            "days_until_due".into(),
            self.days_until_due(ctx.today).map_or(Value::Null, Value::from),
        );
        view.insert(
            "needs_reminder".into(),
            Value::Bool(self.needs_reminder(ctx.today)),
        );
        view.insert("vaccine_name".into(), ctx.vaccine_name(self.vaccine_id));
        view.insert("pet_name".into(), ctx.pet_name(self.pet_id));
        Ok(view)
    }
}

impl ToView for Vaccine {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.insert("interval_text".into(), text(self.interval_text()));
        let species_text = match self.species_id {
            Some(id) => ctx.species_name(id),
            None => text("All species"),
        };
        view.insert("species_text".into(), species_text);
        Ok(view)
    }
}

impl ToView for Consultation {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.insert("status_color".into(), text(self.status_color()));
        view.insert(
            "scheduled_at_text".into(),
            text(self.scheduled_at.format(DATETIME_TEXT_FORMAT)),
        );
        view.insert("pet_name".into(), ctx.pet_name(self.pet_id));
        view.insert("veterinarian_name".into(), ctx.vet_name(self.veterinarian_id));
        view.insert(
            "billed".into(),
            Value::Bool(ctx.records.invoice_for_consultation(self.id).is_some()),
        );
        Ok(view)
    }
}

impl ToView for Treatment {
    fn to_view(&self, _ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.insert("status_color".into(), text(self.status_color()));
        view.insert(
            "start_date_text".into(),
            text(self.start_date.format(DATE_TEXT_FORMAT)),
        );
        Ok(view)
    }
}

impl ToView for Pet {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.insert("age_text".into(), text(self.age_text(ctx.today)));
        view.insert("sex_text".into(), text(self.sex));
        view.insert("owner_name".into(), ctx.owner_name(self.owner_id));
        view.insert("species_name".into(), ctx.species_name(self.species_id));
        Ok(view)
    }
}

impl ToView for Owner {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        let pets = ctx.records.pets_of(self.id).filter(|pet| pet.active).count();
        view.insert("active_pets".into(), Value::from(pets));
        Ok(view)
    }
}

impl ToView for User {
    fn to_view(&self, _ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.remove("password_hash");
        view.insert("role_text".into(), text(self.role));
        Ok(view)
    }
}

impl ToView for Service {
    fn to_view(&self, ctx: &ViewContext<'_>) -> CoreResult<View> {
        let mut view = base(self)?;
        view.insert("price_text".into(), ctx.money(self.price));
        view.insert("category_text".into(), text(self.category));
        Ok(view)
    }
}

impl ToView for Veterinarian {
    fn to_view(&self, _ctx: &ViewContext<'_>) -> CoreResult<View> {
        base(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use vetcare_domain::{Role, Sex, Species};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn user_view_hides_password_hash() {
        let records = ClinicRecords::new();
        let ctx = ViewContext::new(&records, today(), "S/");
        let user = User::new(
            "admin",
            "admin@clinic.test",
            "Admin",
            Role::Administrator,
            "secret1",
            Utc::now(),
        );
        let view = user.to_view(&ctx).unwrap();
        assert!(!view.contains_key("password_hash"));
        assert_eq!(view["role_text"], "Administrator");
    }

    #[test]
    fn invoice_view_carries_derived_fields() {
        let mut records = ClinicRecords::new();
        let owner = Owner::new("1", "Maria Lopez", Utc::now());
        let issued = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let mut invoice = Invoice::new("F202403-0001", owner.id, issued);
        invoice
            .add_line_item("Check-up", 1, Decimal::new(5000, 2), Decimal::ZERO, None)
            .unwrap();
        records.owners.push(owner);

        let ctx = ViewContext::new(&records, today(), "S/");
        let view = invoice.to_view(&ctx).unwrap();
        assert_eq!(view["status_color"], "warning");
        assert_eq!(view["owner_name"], "Maria Lopez");
        assert_eq!(view["issued_at_text"], "05/03/2024 14:30");
        assert_eq!(view["items"].as_array().unwrap().len(), 1);
        assert!(view["balance_due_text"].as_str().unwrap().starts_with("S/ "));
        assert_eq!(view["pet_name"], Value::Null);
    }

    #[test]
    fn pet_view_has_age_and_sex_text() {
        let mut records = ClinicRecords::new();
        let dog = Species::new("Dog");
        let mut pet = Pet::new(Uuid::new_v4(), dog.id, "Luna");
        pet.sex = Sex::Female;
        pet.birth_date = NaiveDate::from_ymd_opt(2023, 1, 10);
        records.species.push(dog);

        let ctx = ViewContext::new(&records, today(), "S/");
        let view = pet.to_view(&ctx).unwrap();
        assert_eq!(view["sex_text"], "Female");
        assert_eq!(view["species_name"], "Dog");
        assert_eq!(view["age_text"], "1 year(s), 2 month(s)");
        assert_eq!(view["owner_name"], Value::Null);
    }

    #[test]
    fn vaccination_view_reports_due_days() {
        let records = ClinicRecords::new();
        let ctx = ViewContext::new(&records, today(), "S/");
        let due = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        let record =
            ScheduledVaccination::new(Uuid::new_v4(), Uuid::new_v4(), due, 1, Utc::now());
        let view = record.to_view(&ctx).unwrap();
        assert_eq!(view["days_until_due"], 3);
        assert_eq!(view["needs_reminder"], true);
        assert_eq!(view["status_color"], "warning");
        assert_eq!(view["scheduled_date_text"], "13/03/2024");
    }

    #[test]
    fn unrestricted_vaccine_applies_to_all_species() {
        let records = ClinicRecords::new();
        let ctx = ViewContext::new(&records, today(), "S/");
        let view = Vaccine::new("Rabies").to_view(&ctx).unwrap();
        assert_eq!(view["species_text"], "All species");
        assert_eq!(view["interval_text"], "Every 1 year(s)");
    }
}
