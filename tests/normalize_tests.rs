#![cfg(feature = "core")]

use erechnung::core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn abs(d: Decimal) -> Decimal {
    if d.is_sign_negative() { -d } else { d }
}

// ---------------------------------------------------------------------------
// Amount derivation
// ---------------------------------------------------------------------------

#[test]
fn gross_only_derives_net_and_vat() {
    let record = InvoiceRecord {
        gross_amount: Some(dec!(1880.20)),
        vat_rate: Some(dec!(19)),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.record.net_amount, Some(dec!(1580.00)));
    assert_eq!(n.record.vat_amount, Some(dec!(300.20)));
    assert_eq!(n.record.gross_amount, Some(dec!(1880.20)));
}

#[test]
fn net_only_derives_vat_and_gross() {
    let record = InvoiceRecord {
        net_amount: Some(dec!(1580.00)),
        vat_rate: Some(dec!(19)),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.record.vat_amount, Some(dec!(300.20)));
    assert_eq!(n.record.gross_amount, Some(dec!(1880.20)));
}

#[test]
fn missing_rate_defaults_to_19() {
    let record = InvoiceRecord {
        gross_amount: Some(dec!(119.00)),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.record.vat_rate, Some(dec!(19)));
    assert_eq!(n.record.net_amount, Some(dec!(100.00)));
}

#[test]
fn zero_rate_keeps_net_equal_gross() {
    let record = InvoiceRecord {
        gross_amount: Some(dec!(500.00)),
        vat_rate: Some(dec!(0)),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.record.net_amount, Some(dec!(500.00)));
    assert_eq!(n.record.vat_amount, Some(dec!(0.00)));
}

#[test]
fn both_sides_present_are_left_alone() {
    // Inconsistent input stays inconsistent; source values win
    let record = InvoiceRecord {
        net_amount: Some(dec!(100)),
        gross_amount: Some(dec!(200)),
        vat_rate: Some(dec!(19)),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.record.net_amount, Some(dec!(100)));
    assert_eq!(n.record.gross_amount, Some(dec!(200)));
}

#[test]
fn tax_invariant_holds_at_boundaries() {
    for cents in [1u32, 3, 7, 99, 100, 9999, 123456] {
        for rate in [dec!(0), dec!(7), dec!(19)] {
            let record = InvoiceRecord {
                gross_amount: Some(Decimal::new(cents as i64, 2)),
                vat_rate: Some(rate),
                ..Default::default()
            };
            let n = normalize(&record);
            let net = n.record.net_amount.unwrap();
            let vat = n.record.vat_amount.unwrap();
            let gross = n.record.gross_amount.unwrap();
            assert!(
                abs(net + vat - gross) <= dec!(0.02),
                "invariant broken for gross={gross} rate={rate}: net={net} vat={vat}"
            );
        }
    }
}

#[test]
fn currency_defaults_to_eur() {
    let n = normalize(&InvoiceRecord::default());
    assert_eq!(n.record.currency.as_deref(), Some("EUR"));

    let record = InvoiceRecord {
        currency: Some("CHF".into()),
        ..Default::default()
    };
    assert_eq!(normalize(&record).record.currency.as_deref(), Some("CHF"));
}

// ---------------------------------------------------------------------------
// Line synthesis and derivation
// ---------------------------------------------------------------------------

#[test]
fn empty_lines_synthesize_one_position() {
    let record = InvoiceRecord {
        gross_amount: Some(dec!(1880.20)),
        vat_rate: Some(dec!(19)),
        payment_reference: Some("IT2025032".into()),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.lines.len(), 1);
    let line = &n.lines[0];
    assert_eq!(line.position, 1);
    assert_eq!(line.description, "IT2025032");
    assert_eq!(line.quantity, Decimal::ONE);
    assert_eq!(line.unit, "C62");
    assert_eq!(line.unit_net_price, dec!(1580.00));
    assert_eq!(line.line_net_total, dec!(1580.00));
}

#[test]
fn synthesized_line_falls_back_to_generic_description() {
    let record = InvoiceRecord {
        net_amount: Some(dec!(100)),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.lines[0].description, "Rechnungsposition");
}

#[test]
fn gross_unit_price_is_converted_to_net() {
    let record = InvoiceRecord {
        vat_rate: Some(dec!(19)),
        net_amount: Some(dec!(100)),
        line_items: vec![LineItem {
            description: Some("Beratung".into()),
            quantity: Some(dec!(1)),
            unit_price: Some(dec!(119.00)),
            ..Default::default()
        }],
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.lines[0].unit_net_price, dec!(100.00));
    assert_eq!(n.lines[0].line_net_total, dec!(100.00));
}

#[test]
fn explicit_net_values_are_not_rederived() {
    let record = InvoiceRecord {
        vat_rate: Some(dec!(19)),
        net_amount: Some(dec!(150)),
        line_items: vec![LineItem {
            quantity: Some(dec!(3)),
            unit_net_price: Some(dec!(50)),
            line_net_total: Some(dec!(150)),
            ..Default::default()
        }],
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.lines[0].unit_net_price, dec!(50));
    assert_eq!(n.lines[0].line_net_total, dec!(150));
}

#[test]
fn positions_and_defaults_are_filled_per_line() {
    let record = InvoiceRecord {
        net_amount: Some(dec!(30)),
        line_items: vec![
            LineItem {
                line_net_total: Some(dec!(10)),
                ..Default::default()
            },
            LineItem {
                position: Some(7),
                line_net_total: Some(dec!(20)),
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.lines[0].position, 1);
    assert_eq!(n.lines[0].description, "Artikel/Dienstleistung");
    assert_eq!(n.lines[0].unit, "C62");
    assert_eq!(n.lines[1].position, 7);
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

#[test]
fn addresses_are_parsed_during_normalization() {
    let record = InvoiceRecord {
        seller_address: Some("In der Dell 19, 69469 Weinheim".into()),
        buyer_address: Some("Marienplatz 1, 80331 München".into()),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.seller_address.city, "Weinheim");
    assert_eq!(n.buyer_address.city, "München");
}

#[test]
fn record_survives_json_roundtrip() {
    let record = InvoiceRecord {
        invoice_number: Some("RE-JSON-1".into()),
        seller_address: Some("In der Dell 19, 69469 Weinheim".into()),
        gross_amount: Some(dec!(1880.20)),
        vat_rate: Some(dec!(19)),
        line_items: vec![LineItem {
            description: Some("Beratung".into()),
            quantity: Some(dec!(2)),
            unit_net_price: Some(dec!(790)),
            ..Default::default()
        }],
        ..Default::default()
    };
    let json = serde_json::to_string(&record).unwrap();
    let back: InvoiceRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn seller_vat_id_overrides_address_country() {
    let record = InvoiceRecord {
        seller_address: Some("Hauptstr. 5, 1010 Wien".into()),
        seller_vat_id: Some("DE123456789".into()),
        ..Default::default()
    };
    let n = normalize(&record);
    assert_eq!(n.seller_address.country_code, "DE");
}
