//! Property tests for invoice arithmetic.
//!
//! 1. `total == subtotal + tax - discount` after any sequence of edits
//! 2. `subtotal` always equals the sum of line subtotals
//! 3. `amount_paid` never decreases and settles exactly at `total`
//! 4. allocated invoice numbers climb by one within a month and never repeat

use std::collections::HashSet;

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;
use vetcare_domain::{Invoice, InvoiceNumber, InvoiceStatus, PaymentMethod};

#[derive(Debug, Clone)]
enum Edit {
    Add {
        quantity: u32,
        cents: i64,
        discount_cents: i64,
    },
    RemoveFirst,
    Recompute(bool),
    Discount(i64),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0u32..5, 0i64..50_000, 0i64..2_000).prop_map(|(quantity, cents, discount_cents)| {
            Edit::Add {
                quantity,
                cents,
                discount_cents,
            }
        }),
        Just(Edit::RemoveFirst),
        any::<bool>().prop_map(Edit::Recompute),
        (0i64..5_000).prop_map(Edit::Discount),
    ]
}

/// Stored numbers for January to March 2024, with gaps and a few malformed entries.
fn stored_number_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (1u32..=3, 1u32..500).prop_map(|(month, sequence)| {
            InvoiceNumber::new(2024, month, sequence).to_string()
        }),
        1 => prop_oneof![
            Just("garbage".to_string()),
            Just("F2024-0001".to_string()),
            Just("F202413-0005".to_string()),
            Just("F202402-".to_string()),
            "[A-Z0-9-]{0,12}",
        ],
    ]
}

fn fresh_invoice() -> Invoice {
    let issued = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
    Invoice::new("F202401-0001", Uuid::new_v4(), issued)
}

proptest! {
    #[test]
    fn totals_stay_consistent(edits in prop::collection::vec(edit_strategy(), 0..25)) {
        let mut invoice = fresh_invoice();
        for edit in edits {
            // Rejected edits must leave the invoice untouched, so results are ignored.
            let _ = match edit {
                Edit::Add { quantity, cents, discount_cents } => invoice
                    .add_line_item(
                        "item",
                        quantity,
                        Decimal::new(cents, 2),
                        Decimal::new(discount_cents, 2),
                        None,
                    )
                    .map(|_| ()),
                Edit::RemoveFirst => match invoice.items.first().map(|item| item.id) {
                    Some(id) => invoice.remove_line_item(id).map(|_| ()),
                    None => Ok(()),
                },
                Edit::Recompute(apply) => invoice.recompute_totals(apply).map(|_| ()),
                Edit::Discount(cents) => invoice.set_discount(Decimal::new(cents, 2)).map(|_| ()),
            };

            let line_sum: Decimal = invoice.items.iter().map(|item| item.subtotal).sum();
            prop_assert_eq!(invoice.subtotal, line_sum);
            prop_assert_eq!(invoice.total, invoice.subtotal + invoice.tax - invoice.discount);
            prop_assert!(invoice.total >= Decimal::ZERO);
        }
    }

    #[test]
    fn payments_are_monotonic(
        price_cents in 1i64..100_000,
        payments in prop::collection::vec(1i64..60_000, 1..10),
    ) {
        let mut invoice = fresh_invoice();
        invoice
            .add_line_item("service", 1, Decimal::new(price_cents, 2), Decimal::ZERO, None)
            .expect("add item");
        let at = Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap();

        let mut previous = Decimal::ZERO;
        for cents in payments {
            invoice
                .register_payment(Decimal::new(cents, 2), PaymentMethod::Cash, at)
                .expect("positive payments are accepted");
            prop_assert!(invoice.amount_paid >= previous);
            prop_assert!(invoice.amount_paid <= invoice.total);
            if invoice.amount_paid == invoice.total {
                prop_assert_eq!(invoice.status, InvoiceStatus::Paid);
            } else {
                prop_assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
            }
            previous = invoice.amount_paid;
        }
    }

    #[test]
    fn numbers_climb_without_repeats(
        stored in prop::collection::vec(stored_number_strategy(), 0..40),
        month in 1u32..=4,
        allocations in 1usize..30,
    ) {
        let date = NaiveDate::from_ymd_opt(2024, month, 15).unwrap();
        let expected_start = stored
            .iter()
            .filter_map(|raw| raw.parse::<InvoiceNumber>().ok())
            .filter(|number| number.same_month(date))
            .map(|number| number.sequence)
            .max()
            .map_or(1, |highest| highest + 1);

        let mut issued = stored.clone();
        let mut seen: HashSet<String> = stored.iter().cloned().collect();
        let mut previous: Option<u32> = None;
        for _ in 0..allocations {
            let next = InvoiceNumber::next_for(issued.iter().map(String::as_str), date)
                .expect("sequence available");
            prop_assert_eq!((next.year, next.month), (2024, month));
            match previous {
                None => prop_assert_eq!(next.sequence, expected_start),
                Some(last) => prop_assert_eq!(next.sequence, last + 1),
            }
            let text = next.to_string();
            prop_assert!(seen.insert(text.clone()), "duplicate number {}", text);
            previous = Some(next.sequence);
            issued.push(text);
        }
        if month == 4 {
            prop_assert_eq!(expected_start, 1);
        }
    }
}
