//! Property-based tests for normalization and the XML round trips.
//!
//! Run with: `cargo test --features all --test proptest_tests`

#![cfg(feature = "xrechnung")]

use chrono::NaiveDate;
use erechnung::core::*;
use erechnung::xrechnung;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn abs(d: Decimal) -> Decimal {
    if d.is_sign_negative() { -d } else { d }
}

/// A record with all dates fixed so encoding is deterministic.
fn record_with(gross: Decimal, rate: Decimal) -> InvoiceRecord {
    InvoiceRecord {
        invoice_number: Some("RE-PROP-001".into()),
        issue_date: Some(date(2025, 6, 15)),
        seller_name: Some("ACME GmbH".into()),
        seller_address: Some("Friedrichstraße 123, 10115 Berlin".into()),
        seller_vat_id: Some("DE123456789".into()),
        buyer_name: Some("Kunde AG".into()),
        buyer_address: Some("Marienplatz 1, 80331 München".into()),
        gross_amount: Some(gross),
        vat_rate: Some(rate),
        iban: Some("DE89370400440532013000".into()),
        payment_reference: Some("RE-PROP-001".into()),
        ..Default::default()
    }
}

// ── Strategies ──────────────────────────────────────────────────────────────

/// Gross amounts from 0.01 to 999 999.99, always with 2 decimal places.
fn arb_gross() -> impl Strategy<Value = Decimal> {
    (1u64..100_000_000u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

/// German VAT rates.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    prop_oneof![Just(dec!(0)), Just(dec!(7)), Just(dec!(19))]
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    /// Derived amounts always satisfy |net + vat - gross| <= 0.02.
    #[test]
    fn normalization_preserves_tax_arithmetic(gross in arb_gross(), rate in arb_rate()) {
        let n = normalize(&record_with(gross, rate));
        let net = n.record.net_amount.unwrap();
        let vat = n.record.vat_amount.unwrap();
        let gross_out = n.record.gross_amount.unwrap();

        prop_assert_eq!(gross_out, gross);
        prop_assert!(abs(net + vat - gross_out) <= dec!(0.02),
            "net={} vat={} gross={}", net, vat, gross_out);
    }

    /// normalize() never mutates its input.
    #[test]
    fn normalization_is_pure(gross in arb_gross(), rate in arb_rate()) {
        let record = record_with(gross, rate);
        let before = record.clone();
        let _ = normalize(&record);
        prop_assert_eq!(record, before);
    }

    /// encode → decode recovers totals within a cent (CII).
    #[test]
    fn cii_roundtrip_amounts(gross in arb_gross(), rate in arb_rate()) {
        let n = normalize(&record_with(gross, rate));
        let xml = xrechnung::to_cii_xml(&n, false).unwrap();
        let parsed = xrechnung::from_cii_xml(&xml).unwrap();

        prop_assert_eq!(parsed.invoice_number.as_deref(), Some("RE-PROP-001"));
        prop_assert!(abs(parsed.net_amount.unwrap() - n.record.net_amount.unwrap()) <= dec!(0.01));
        prop_assert!(abs(parsed.vat_amount.unwrap() - n.record.vat_amount.unwrap()) <= dec!(0.01));
        prop_assert!(abs(parsed.gross_amount.unwrap() - gross) <= dec!(0.01));
    }

    /// encode → decode recovers totals within a cent (UBL).
    #[test]
    fn ubl_roundtrip_amounts(gross in arb_gross(), rate in arb_rate()) {
        let n = normalize(&record_with(gross, rate));
        let xml = xrechnung::to_ubl_xml(&n, false).unwrap();
        let parsed = xrechnung::from_ubl_xml(&xml).unwrap();

        prop_assert!(abs(parsed.net_amount.unwrap() - n.record.net_amount.unwrap()) <= dec!(0.01));
        prop_assert!(abs(parsed.gross_amount.unwrap() - gross) <= dec!(0.01));
    }

    /// Re-encoding a decoded document reproduces it byte for byte.
    #[test]
    fn cii_encode_decode_encode_is_stable(gross in arb_gross(), rate in arb_rate()) {
        let first = xrechnung::to_cii_xml(&normalize(&record_with(gross, rate)), false).unwrap();
        let decoded = xrechnung::from_cii_xml(&first).unwrap();
        let second = xrechnung::to_cii_xml(&normalize(&decoded), false).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Generated documents always pass the structural validator.
    #[test]
    fn generated_cii_always_validates(gross in arb_gross(), rate in arb_rate()) {
        let xml = xrechnung::to_cii_xml(&normalize(&record_with(gross, rate)), false).unwrap();
        let report = xrechnung::validate_xrechnung(&xml);
        prop_assert!(report.is_valid, "issues: {:?}", report.issues);
    }

    /// Country detection is total and always yields a two-letter code.
    #[test]
    fn detect_country_is_total(text in "\\PC{0,80}") {
        let code = detect_country(&text);
        prop_assert_eq!(code.len(), 2);
        prop_assert!(code.chars().all(|c| c.is_ascii_uppercase()));
    }

    /// Address parsing never panics and always retains the raw input.
    #[test]
    fn parse_address_is_total(text in "\\PC{0,120}") {
        let a = parse_address(&text);
        prop_assert_eq!(a.raw.as_str(), text.as_str());
    }
}

// ── Edge cases ──────────────────────────────────────────────────────────────

#[test]
fn zero_gross_invoice_encodes_cleanly() {
    let record = InvoiceRecord {
        invoice_number: Some("RE-ZERO".into()),
        issue_date: Some(date(2025, 6, 15)),
        gross_amount: Some(dec!(0)),
        vat_rate: Some(dec!(19)),
        ..Default::default()
    };
    let xml = xrechnung::to_cii_xml(&normalize(&record), false).unwrap();
    let parsed = xrechnung::from_cii_xml(&xml).unwrap();
    assert_eq!(parsed.gross_amount, Some(dec!(0.00)));
}

#[test]
fn one_cent_invoice_keeps_the_invariant() {
    let n = normalize(&InvoiceRecord {
        gross_amount: Some(dec!(0.01)),
        vat_rate: Some(dec!(19)),
        ..Default::default()
    });
    let net = n.record.net_amount.unwrap();
    let vat = n.record.vat_amount.unwrap();
    assert!(abs(net + vat - dec!(0.01)) <= dec!(0.02));
}

#[test]
fn long_invoice_number_roundtrips() {
    let long_number = "R".repeat(200);
    let record = InvoiceRecord {
        invoice_number: Some(long_number.clone()),
        issue_date: Some(date(2025, 6, 15)),
        net_amount: Some(dec!(100)),
        ..Default::default()
    };
    let xml = xrechnung::to_ubl_xml(&normalize(&record), false).unwrap();
    let parsed = xrechnung::from_ubl_xml(&xml).unwrap();
    assert_eq!(parsed.invoice_number, Some(long_number));
}

#[test]
fn many_line_items_roundtrip() {
    let lines: Vec<LineItem> = (1..=100)
        .map(|i| LineItem {
            description: Some(format!("Position {i}")),
            quantity: Some(dec!(1)),
            unit_net_price: Some(dec!(10)),
            line_net_total: Some(dec!(10)),
            ..Default::default()
        })
        .collect();
    let record = InvoiceRecord {
        invoice_number: Some("RE-MANY".into()),
        issue_date: Some(date(2025, 6, 15)),
        net_amount: Some(dec!(1000)),
        line_items: lines,
        ..Default::default()
    };
    let n = normalize(&record);

    let cii = xrechnung::to_cii_xml(&n, false).unwrap();
    assert_eq!(xrechnung::from_cii_xml(&cii).unwrap().line_items.len(), 100);

    let ubl = xrechnung::to_ubl_xml(&n, false).unwrap();
    assert_eq!(xrechnung::from_ubl_xml(&ubl).unwrap().line_items.len(), 100);
}
