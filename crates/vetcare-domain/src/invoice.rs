//! Invoice aggregate: line items, monetary totals, payment state machine,
//! and the monthly invoice numbering scheme.
//!
//! Every mutation that touches line items, the invoice-level discount, or
//! the tax setting recomputes the aggregate before returning, so an invoice
//! never leaves a method with `total` out of sync with its items.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Default IGV rate applied to invoice subtotals (18%).
pub fn default_tax_rate() -> Decimal {
    percent_to_rate(18)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
/// Enumerates the payment lifecycle of an invoice.
pub enum InvoiceStatus {
    #[default]
    Pending,
    PartiallyPaid,
    Paid,
    Voided,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Pending,
        InvoiceStatus::PartiallyPaid,
        InvoiceStatus::Paid,
        InvoiceStatus::Voided,
    ];

    /// Paid and Voided invoices accept no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Voided)
    }

    /// Pending and partially paid invoices still carry a balance.
    pub fn is_open(self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::PartiallyPaid)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::PartiallyPaid => "Partially Paid",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Voided => "Voided",
        };
        f.write_str(label)
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(InvoiceStatus::Pending),
            "partiallypaid" | "partial" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "voided" | "void" => Ok(InvoiceStatus::Voided),
            _ => Err(DomainError::Validation(format!(
                "unknown invoice status `{}`",
                value.trim()
            ))),
        }
    }
}

impl StatusColored for InvoiceStatus {
    fn status_color(&self) -> DisplayColor {
        match self {
            InvoiceStatus::Pending => DisplayColor::Warning,
            InvoiceStatus::PartiallyPaid => DisplayColor::Info,
            InvoiceStatus::Paid => DisplayColor::Success,
            InvoiceStatus::Voided => DisplayColor::Danger,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// Payment channels accepted at the front desk.
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    MobileWallet,
    Other,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Transfer => "Transfer",
            PaymentMethod::MobileWallet => "Mobile Wallet",
            PaymentMethod::Other => "Other",
        };
        f.write_str(label)
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            "mobile-wallet" | "mobile_wallet" | "mobile wallet" | "wallet" => {
                Ok(PaymentMethod::MobileWallet)
            }
            "other" => Ok(PaymentMethod::Other),
            other => Err(DomainError::Validation(format!(
                "unknown payment method `{}`",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One billable entry on an invoice.
pub struct InvoiceLineItem {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<Uuid>,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
}

impl InvoiceLineItem {
    /// Builds a line item, flooring quantity at 1 and discount at 0.
    pub fn new(
        description: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
        discount: Decimal,
        service_id: Option<Uuid>,
    ) -> Self {
        let quantity = quantity.max(1);
        let discount = discount.max(Decimal::ZERO);
        let subtotal = round_money(unit_price * Decimal::from(quantity) - discount);
        Self {
            id: Uuid::new_v4(),
            service_id,
            description: description.into(),
            quantity,
            unit_price,
            discount,
            subtotal,
        }
    }
}

impl Identifiable for InvoiceLineItem {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Aggregate monetary figures derived from an invoice's items.
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl InvoiceTotals {
    /// Computes totals for `items` with an invoice-level discount.
    pub fn compute<'a>(
        items: impl IntoIterator<Item = &'a InvoiceLineItem>,
        discount: Decimal,
        tax_rate: Decimal,
        apply_tax: bool,
    ) -> Self {
        let subtotal = round_money(items.into_iter().map(|item| item.subtotal).sum());
        let tax = if apply_tax {
            round_money(subtotal * tax_rate)
        } else {
            Decimal::ZERO
        };
        let discount = discount.max(Decimal::ZERO);
        Self {
            subtotal,
            tax,
            discount,
            total: subtotal + tax - discount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Result of a payment registration.
pub enum PaymentOutcome {
    Applied {
        status: InvoiceStatus,
        amount_paid: Decimal,
        balance_due: Decimal,
    },
    /// The invoice was already settled; nothing changed.
    AlreadyPaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoidOutcome {
    Voided,
    AlreadyVoided,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Billing document aggregating line items and payments.
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub owner_id: Uuid,
    #[serde(default)]
    pub pet_id: Option<Uuid>,
    #[serde(default)]
    pub consultation_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<InvoiceLineItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax_rate: Decimal,
    pub apply_tax: bool,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    pub amount_paid: Decimal,
    /// Timestamp of the most recent payment.
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub registered_by: Option<Uuid>,
}

impl Invoice {
    pub fn new(number: impl Into<String>, owner_id: Uuid, issued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            owner_id,
            pet_id: None,
            consultation_id: None,
            issued_at,
            due_date: None,
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            discount: Decimal::ZERO,
            tax_rate: default_tax_rate(),
            apply_tax: true,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            status: InvoiceStatus::Pending,
            payment_method: None,
            amount_paid: Decimal::ZERO,
            paid_at: None,
            notes: None,
            registered_by: None,
        }
    }

    pub fn with_pet(mut self, pet_id: Option<Uuid>) -> Self {
        self.pet_id = pet_id;
        self
    }

    pub fn with_consultation(mut self, consultation_id: Uuid) -> Self {
        self.consultation_id = Some(consultation_id);
        self
    }

    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate.max(Decimal::ZERO);
        self
    }

    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = clean_text(notes);
        self
    }

    pub fn registered_by(mut self, user_id: Uuid) -> Self {
        self.registered_by = Some(user_id);
        self
    }

    pub fn is_editable(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Outstanding amount; never negative.
    pub fn balance_due(&self) -> Decimal {
        (self.total - self.amount_paid).max(Decimal::ZERO)
    }

    pub fn line_item(&self, id: Uuid) -> Option<&InvoiceLineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Current totals as stored on the invoice.
    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals {
            subtotal: self.subtotal,
            tax: self.tax,
            discount: self.discount,
            total: self.total,
        }
    }

    /// Appends a line item and recomputes the aggregate.
    pub fn add_line_item(
        &mut self,
        description: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
        discount: Decimal,
        service_id: Option<Uuid>,
    ) -> Result<Uuid, DomainError> {
        self.ensure_editable("add line items to")?;
        let item = InvoiceLineItem::new(description, quantity, unit_price, discount, service_id);
        let totals = InvoiceTotals::compute(
            self.items.iter().chain(std::iter::once(&item)),
            self.discount,
            self.tax_rate,
            self.apply_tax,
        );
        self.check_totals(&totals)?;
        let id = item.id;
        self.items.push(item);
        self.store_totals(totals);
        Ok(id)
    }

    /// Removes a line item and recomputes the aggregate.
    pub fn remove_line_item(&mut self, line_item_id: Uuid) -> Result<InvoiceLineItem, DomainError> {
        self.ensure_editable("remove line items from")?;
        let index = self
            .items
            .iter()
            .position(|item| item.id == line_item_id)
            .ok_or_else(|| DomainError::NotFound(format!("line item {}", line_item_id)))?;
        let totals = InvoiceTotals::compute(
            self.items
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != index)
                .map(|(_, item)| item),
            self.discount,
            self.tax_rate,
            self.apply_tax,
        );
        self.check_totals(&totals)?;
        let removed = self.items.remove(index);
        self.store_totals(totals);
        Ok(removed)
    }

    /// Changes the invoice-level discount (floored at 0) and recomputes.
    pub fn set_discount(&mut self, discount: Decimal) -> Result<InvoiceTotals, DomainError> {
        self.ensure_editable("change the discount of")?;
        let totals =
            InvoiceTotals::compute(&self.items, discount, self.tax_rate, self.apply_tax);
        self.check_totals(&totals)?;
        self.store_totals(totals);
        Ok(totals)
    }

    /// Recomputes subtotal, tax and total from the current line items.
    ///
    /// `apply_tax` becomes the invoice's tax setting for later mutations.
    pub fn recompute_totals(&mut self, apply_tax: bool) -> Result<InvoiceTotals, DomainError> {
        self.ensure_editable("recompute")?;
        let totals = InvoiceTotals::compute(&self.items, self.discount, self.tax_rate, apply_tax);
        self.check_totals(&totals)?;
        self.apply_tax = apply_tax;
        self.store_totals(totals);
        Ok(totals)
    }

    /// Registers a payment, clamping the accumulated amount to the total.
    pub fn register_payment(
        &mut self,
        amount: Decimal,
        method: PaymentMethod,
        at: DateTime<Utc>,
    ) -> Result<PaymentOutcome, DomainError> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::Validation(
                "payment amount must be greater than zero".into(),
            ));
        }
        match self.status {
            InvoiceStatus::Voided => {
                return Err(DomainError::Precondition(format!(
                    "invoice {} is voided and cannot receive payments",
                    self.number
                )))
            }
            InvoiceStatus::Paid => return Ok(PaymentOutcome::AlreadyPaid),
            InvoiceStatus::Pending | InvoiceStatus::PartiallyPaid => {}
        }

        let accumulated = round_money(self.amount_paid + amount);
        if accumulated >= self.total {
            self.amount_paid = self.total;
            self.status = InvoiceStatus::Paid;
        } else {
            self.amount_paid = accumulated;
            self.status = InvoiceStatus::PartiallyPaid;
        }
        self.payment_method = Some(method);
        self.paid_at = Some(at);
        Ok(PaymentOutcome::Applied {
            status: self.status,
            amount_paid: self.amount_paid,
            balance_due: self.balance_due(),
        })
    }

    /// Voids the invoice; a second call is a no-op.
    pub fn void(&mut self) -> VoidOutcome {
        if self.status == InvoiceStatus::Voided {
            return VoidOutcome::AlreadyVoided;
        }
        self.status = InvoiceStatus::Voided;
        VoidOutcome::Voided
    }

    fn ensure_editable(&self, action: &str) -> Result<(), DomainError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(DomainError::Precondition(format!(
                "cannot {} invoice {} in state {}",
                action, self.number, self.status
            )))
        }
    }

    fn check_totals(&self, totals: &InvoiceTotals) -> Result<(), DomainError> {
        if totals.total < Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "discount {} exceeds the invoice amount {}",
                totals.discount,
                totals.subtotal + totals.tax
            )));
        }
        if totals.total < self.amount_paid {
            return Err(DomainError::Precondition(format!(
                "invoice {} total {} would fall below the {} already paid",
                self.number, totals.total, self.amount_paid
            )));
        }
        Ok(())
    }

    fn store_totals(&mut self, totals: InvoiceTotals) {
        self.subtotal = totals.subtotal;
        self.tax = totals.tax;
        self.discount = totals.discount;
        self.total = totals.total;
        if self.status == InvoiceStatus::PartiallyPaid && self.amount_paid >= self.total {
            self.amount_paid = self.total;
            self.status = InvoiceStatus::Paid;
        }
    }
}

impl Identifiable for Invoice {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Invoice {
    fn display_label(&self) -> String {
        format!("{} [{}]", self.number, self.status)
    }
}

impl StatusColored for Invoice {
    fn status_color(&self) -> DisplayColor {
        self.status.status_color()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Human-readable invoice number `F{year}{month:02}-{sequence:04}`.
pub struct InvoiceNumber {
    pub year: i32,
    pub month: u32,
    pub sequence: u32,
}

impl InvoiceNumber {
    pub fn new(year: i32, month: u32, sequence: u32) -> Self {
        Self {
            year,
            month,
            sequence,
        }
    }

    /// Prefix shared by every invoice issued in the month of `date`.
    pub fn prefix_for(date: NaiveDate) -> String {
        format!("F{}{:02}", date.year(), date.month())
    }

    pub fn prefix(&self) -> String {
        format!("F{}{:02}", self.year, self.month)
    }

    pub fn same_month(&self, date: NaiveDate) -> bool {
        self.year == date.year() && self.month == date.month()
    }

    /// Next number for `date`'s month: highest existing sequence plus one.
    pub fn next_for<'a>(
        existing: impl IntoIterator<Item = &'a str>,
        date: NaiveDate,
    ) -> Result<Self, DomainError> {
        let highest = existing
            .into_iter()
            .filter_map(|raw| raw.parse::<InvoiceNumber>().ok())
            .filter(|number| number.same_month(date))
            .map(|number| number.sequence)
            .max()
            .unwrap_or(0);
        let sequence = highest.checked_add(1).ok_or_else(|| {
            DomainError::Validation(format!(
                "invoice numbers for {} are exhausted",
                Self::prefix_for(date)
            ))
        })?;
        Ok(Self::new(date.year(), date.month(), sequence))
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}", self.prefix(), self.sequence)
    }
}

impl FromStr for InvoiceNumber {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::Validation(format!("malformed invoice number `{}`", value));
        let rest = value.trim().strip_prefix('F').ok_or_else(invalid)?;
        let (period, sequence) = rest.split_once('-').ok_or_else(invalid)?;
        if period.len() != 6 || !period.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if sequence.is_empty() || !sequence.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = period[..4].parse().map_err(|_| invalid())?;
        let month: u32 = period[4..].parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        let sequence: u32 = sequence.parse().map_err(|_| invalid())?;
        Ok(Self::new(year, month, sequence))
    }
}
