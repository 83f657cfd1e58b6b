//! Lightweight structural validation of generated e-invoice XML.
//!
//! This is a pre-flight check, not a schematron run: well-formedness plus
//! a substring scan for the required blocks. The scan is deliberately
//! root-agnostic for CII-family documents, so older profiles (ZUGFeRD 1.0
//! `CrossIndustryDocument`) pass as long as the required content is there.
//! Documents that pass here can still fail a full KoSIT validation.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use super::{Syntax, root_local_name, sniff_syntax};

/// Outcome of [`validate_xrechnung`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// True when no fatal issue was found. Warnings do not count.
    pub is_valid: bool,
    /// Human-readable findings, fatal first, warnings prefixed `"Warnung:"`.
    pub issues: Vec<String>,
    /// Detected document profile, e.g. `"XRechnung 3.0"`.
    pub profile: String,
}

/// Required CII blocks, matched case-insensitively anywhere in the
/// document, with the finding reported when absent.
const CII_REQUIRED: &[(&str, &str)] = &[
    ("exchangeddocument", "Rechnungskopf (ExchangedDocument)"),
    (
        "supplychaintradetransaction",
        "Transaktionsdaten (SupplyChainTradeTransaction)",
    ),
    ("sellertradeparty", "Verkäufer (BG-4)"),
    ("buyertradeparty", "Käufer (BG-7)"),
    ("invoicecurrencycode", "Währung (BT-5)"),
    ("grandtotalamount", "Gesamtbetrag (BT-112)"),
];

const UBL_REQUIRED: &[(&str, &str)] = &[
    ("customizationid", "CustomizationID (BT-24)"),
    ("accountingsupplierparty", "Verkäufer (BG-4)"),
    ("accountingcustomerparty", "Käufer (BG-7)"),
    ("documentcurrencycode", "Währung (BT-5)"),
    ("taxtotal", "Steuerangaben (TaxTotal)"),
    ("legalmonetarytotal", "Summenblock (LegalMonetaryTotal)"),
];

const TAX_REGISTRATION_WARNING: &str = "Warnung: Keine Steuer-ID des Verkäufers (BT-31/BT-32)";

/// Validate e-invoice XML: well-formedness, profile detection, and the
/// presence of required content.
///
/// A missing seller tax registration is reported as a warning only — it is
/// legitimate for Kleinunternehmer invoices.
pub fn validate_xrechnung(xml: &str) -> ValidationReport {
    if xml.trim().is_empty() {
        return ValidationReport {
            is_valid: false,
            issues: vec!["Kein XML übergeben".to_string()],
            profile: String::new(),
        };
    }

    let profile = detect_profile(xml);

    if let Err(e) = check_well_formed(xml) {
        return ValidationReport {
            is_valid: false,
            issues: vec![format!("XML nicht wohlgeformt: {e}")],
            profile,
        };
    }

    let lower = xml.to_lowercase();
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    match sniff_syntax(xml) {
        Some(Syntax::Ubl) => {
            for (needle, field) in UBL_REQUIRED {
                if !lower.contains(needle) {
                    issues.push(format!("Fehlendes Pflichtfeld: {field}"));
                }
            }
            if !xml.contains("PartyTaxScheme") {
                warnings.push(TAX_REGISTRATION_WARNING.to_string());
            }
            if !xml.contains("InvoiceLine") {
                issues.push("Mindestens eine Rechnungsposition (BG-25) erforderlich".to_string());
            }
        }
        // CII documents of any vintage, and anything unrecognized:
        // scan content rather than reject by root element
        _ => {
            for (needle, field) in CII_REQUIRED {
                if !lower.contains(needle) {
                    issues.push(format!("Fehlendes Pflichtfeld: {field}"));
                }
            }
            // BT-1 / BT-2
            if !xml.contains("<ram:ID>") {
                issues.push("Rechnungsnummer (BT-1) fehlt".to_string());
            }
            if !xml.contains("<udt:DateTimeString") {
                issues.push("Rechnungsdatum (BT-2) fehlt".to_string());
            }
            if !xml.contains("SpecifiedTaxRegistration") {
                warnings.push(TAX_REGISTRATION_WARNING.to_string());
            }
            if !xml.contains("IncludedSupplyChainTradeLineItem") {
                issues.push("Mindestens eine Rechnungsposition (BG-25) erforderlich".to_string());
            }
        }
    }

    debug!(
        profile = %profile,
        fatal = issues.len(),
        warnings = warnings.len(),
        "validated document"
    );

    let is_valid = issues.is_empty();
    issues.extend(warnings);

    ValidationReport {
        is_valid,
        issues,
        profile,
    }
}

fn check_well_formed(xml: &str) -> Result<(), quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = true;
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(e),
        }
    }
}

fn detect_profile(xml: &str) -> String {
    let lower = xml.to_lowercase();
    if lower.contains("xrechnung") || lower.contains("urn:cen.eu:en16931") {
        return "XRechnung 3.0".to_string();
    }
    if lower.contains("zugferd") || lower.contains("factur-x") {
        return "ZUGFeRD/Factur-X".to_string();
    }
    match root_local_name(xml).as_deref() {
        Some("CrossIndustryInvoice") => "CII (Cross Industry Invoice)".to_string(),
        Some("Invoice") | Some("CreditNote") => "UBL".to_string(),
        _ => "Unbekannt".to_string(),
    }
}
