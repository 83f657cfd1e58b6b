#![cfg(feature = "xrechnung")]

use erechnung::core::*;
use erechnung::xrechnung;
use rust_decimal_macros::dec;

fn sample_record() -> InvoiceRecord {
    InvoiceRecord {
        invoice_number: Some("RE-2025-001".into()),
        seller_name: Some("ACME GmbH".into()),
        seller_vat_id: Some("DE123456789".into()),
        buyer_name: Some("Kunde AG".into()),
        gross_amount: Some(dec!(1190.00)),
        vat_rate: Some(dec!(19)),
        ..Default::default()
    }
}

#[test]
fn generated_cii_passes_validation() {
    let xml = xrechnung::to_cii_xml(&normalize(&sample_record()), false).unwrap();
    let report = xrechnung::validate_xrechnung(&xml);

    assert!(report.is_valid, "unexpected issues: {:?}", report.issues);
    assert!(report.issues.is_empty());
    assert_eq!(report.profile, "XRechnung 3.0");
}

#[test]
fn generated_ubl_passes_validation() {
    let xml = xrechnung::to_ubl_xml(&normalize(&sample_record()), false).unwrap();
    let report = xrechnung::validate_xrechnung(&xml);

    assert!(report.is_valid, "unexpected issues: {:?}", report.issues);
    assert_eq!(report.profile, "XRechnung 3.0");
}

#[test]
fn missing_buyer_is_fatal_and_named_in_german() {
    let xml = xrechnung::to_cii_xml(&normalize(&sample_record()), false).unwrap();
    let broken = xml.replace("BuyerTradeParty", "SonstigePartei");

    let report = xrechnung::validate_xrechnung(&broken);
    assert!(!report.is_valid);
    assert!(
        report.issues.iter().any(|i| i.contains("Käufer (BG-7)")),
        "no buyer finding in {:?}",
        report.issues
    );
}

#[test]
fn missing_grand_total_is_fatal() {
    let xml = xrechnung::to_cii_xml(&normalize(&sample_record()), false).unwrap();
    let broken = xml.replace("GrandTotalAmount", "SummeFehlt");

    let report = xrechnung::validate_xrechnung(&broken);
    assert!(!report.is_valid);
    assert!(
        report.issues.iter().any(|i| i.contains("Gesamtbetrag (BT-112)")),
        "no grand total finding in {:?}",
        report.issues
    );
}

#[test]
fn missing_line_items_are_fatal() {
    let xml = xrechnung::to_cii_xml(&normalize(&sample_record()), false).unwrap();
    let broken = xml.replace("IncludedSupplyChainTradeLineItem", "KeinePosition");

    let report = xrechnung::validate_xrechnung(&broken);
    assert!(!report.is_valid);
    assert!(
        report.issues.iter().any(|i| i.contains("Rechnungsposition (BG-25)")),
        "no line item finding in {:?}",
        report.issues
    );
}

#[test]
fn missing_invoice_number_and_date_are_fatal() {
    let xml = xrechnung::to_cii_xml(&normalize(&sample_record()), false).unwrap();
    let broken = xml
        .replace(
            "<ram:ID>RE-2025-001</ram:ID>",
            "<ram:Kennung>RE-2025-001</ram:Kennung>",
        )
        .replace("udt:DateTimeString", "udt:Zeitangabe");

    let report = xrechnung::validate_xrechnung(&broken);
    assert!(!report.is_valid);
    assert!(report.issues.iter().any(|i| i.contains("Rechnungsnummer (BT-1)")));
    assert!(report.issues.iter().any(|i| i.contains("Rechnungsdatum (BT-2)")));
}

#[test]
fn missing_tax_registration_is_a_warning_only() {
    let record = InvoiceRecord {
        invoice_number: Some("RE-KLEIN-1".into()),
        seller_name: Some("Kleinunternehmer".into()),
        buyer_name: Some("Kunde".into()),
        net_amount: Some(dec!(100)),
        vat_rate: Some(dec!(0)),
        ..Default::default()
    };
    let xml = xrechnung::to_cii_xml(&normalize(&record), false).unwrap();
    let report = xrechnung::validate_xrechnung(&xml);

    assert!(report.is_valid);
    assert_eq!(report.issues.len(), 1);
    assert!(report.issues[0].starts_with("Warnung:"));
    assert!(report.issues[0].contains("BT-31/BT-32"));
}

#[test]
fn ubl_missing_tax_registration_is_a_warning_only() {
    let record = InvoiceRecord {
        invoice_number: Some("RE-KLEIN-2".into()),
        seller_name: Some("Kleinunternehmer".into()),
        buyer_name: Some("Kunde".into()),
        net_amount: Some(dec!(100)),
        vat_rate: Some(dec!(0)),
        ..Default::default()
    };
    let xml = xrechnung::to_ubl_xml(&normalize(&record), false).unwrap();
    let report = xrechnung::validate_xrechnung(&xml);

    assert!(report.is_valid, "unexpected issues: {:?}", report.issues);
    assert_eq!(report.issues.len(), 1);
    assert!(report.issues[0].starts_with("Warnung:"));
}

#[test]
fn malformed_xml_is_invalid() {
    let report = xrechnung::validate_xrechnung("<a><b></a>");
    assert!(!report.is_valid);
    assert!(report.issues[0].starts_with("XML nicht wohlgeformt"));
}

#[test]
fn empty_input_is_invalid() {
    let report = xrechnung::validate_xrechnung("   ");
    assert!(!report.is_valid);
    assert_eq!(report.issues, vec!["Kein XML übergeben".to_string()]);
}

#[test]
fn foreign_root_is_scanned_for_required_content() {
    // Unknown roots are not rejected outright; the content scan decides
    let report = xrechnung::validate_xrechnung("<Bestellung/>");
    assert!(!report.is_valid);
    assert!(report.issues.iter().any(|i| i.contains("Pflichtfeld")));
    assert!(
        !report.issues.iter().any(|i| i.contains("Bestellung")),
        "root element must not be reported as an error"
    );
}

#[test]
fn zugferd_10_root_with_required_content_passes() {
    // ZUGFeRD 1.0 uses a CrossIndustryDocument root with the older
    // element names; the scan only cares about the content
    let xml = "<rsm:CrossIndustryDocument>\
        <rsm:HeaderExchangedDocument>\
        <ram:ID>RE-Z1-001</ram:ID>\
        <ram:IssueDateTime><udt:DateTimeString format=\"102\">20250615</udt:DateTimeString></ram:IssueDateTime>\
        </rsm:HeaderExchangedDocument>\
        <rsm:SpecifiedSupplyChainTradeTransaction>\
        <ram:SellerTradeParty><ram:SpecifiedTaxRegistration/></ram:SellerTradeParty>\
        <ram:BuyerTradeParty/>\
        <ram:InvoiceCurrencyCode>EUR</ram:InvoiceCurrencyCode>\
        <ram:GrandTotalAmount>119.00</ram:GrandTotalAmount>\
        <ram:IncludedSupplyChainTradeLineItem/>\
        </rsm:SpecifiedSupplyChainTradeTransaction>\
        </rsm:CrossIndustryDocument>";

    let report = xrechnung::validate_xrechnung(xml);
    assert!(report.is_valid, "unexpected issues: {:?}", report.issues);
    assert!(report.issues.is_empty());
}

#[test]
fn structural_wrappers_alone_are_not_enough() {
    // Every header/settlement wrapper present, but no totals, number,
    // date, or line items anywhere
    let xml = "<rsm:CrossIndustryInvoice>\
        <rsm:ExchangedDocumentContext>\
        <ram:GuidelineSpecifiedDocumentContextParameter/>\
        </rsm:ExchangedDocumentContext>\
        <rsm:ExchangedDocument/>\
        <ram:SellerTradeParty/>\
        <ram:BuyerTradeParty/>\
        <ram:ApplicableHeaderTradeSettlement>\
        <ram:InvoiceCurrencyCode>EUR</ram:InvoiceCurrencyCode>\
        <ram:SpecifiedTradeSettlementHeaderMonetarySummation/>\
        </ram:ApplicableHeaderTradeSettlement>\
        </rsm:CrossIndustryInvoice>";

    let report = xrechnung::validate_xrechnung(xml);
    assert!(!report.is_valid, "wrappers without content must not validate");
    assert!(report.issues.iter().any(|i| i.contains("SupplyChainTradeTransaction")));
    assert!(report.issues.iter().any(|i| i.contains("Gesamtbetrag (BT-112)")));
    assert!(report.issues.iter().any(|i| i.contains("Rechnungsnummer (BT-1)")));
    assert!(report.issues.iter().any(|i| i.contains("Rechnungsdatum (BT-2)")));
    assert!(report.issues.iter().any(|i| i.contains("Rechnungsposition (BG-25)")));
}

#[test]
fn profile_detection_without_guideline() {
    // Hand-built fragments without any XRechnung/EN 16931 marker
    let cii = "<CrossIndustryInvoice><ExchangedDocument/></CrossIndustryInvoice>";
    assert_eq!(
        xrechnung::validate_xrechnung(cii).profile,
        "CII (Cross Industry Invoice)"
    );

    let ubl = "<Invoice><ID>1</ID></Invoice>";
    assert_eq!(xrechnung::validate_xrechnung(ubl).profile, "UBL");

    let facturx = "<CrossIndustryInvoice><ID>urn:factur-x.eu:1p0:basic</ID></CrossIndustryInvoice>";
    assert_eq!(
        xrechnung::validate_xrechnung(facturx).profile,
        "ZUGFeRD/Factur-X"
    );
}

#[test]
fn validation_reports_every_missing_block() {
    let cii = "<CrossIndustryInvoice></CrossIndustryInvoice>";
    let report = xrechnung::validate_xrechnung(cii);
    assert!(!report.is_valid);
    // Six required blocks, number, date, line items, plus the tax
    // registration warning at the end
    assert_eq!(report.issues.len(), 10);
    assert!(report.issues[9].starts_with("Warnung:"));
}
