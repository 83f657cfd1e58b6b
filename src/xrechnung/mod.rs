//! XRechnung XML generation, parsing, and validation (CII + UBL).
//!
//! Implements the German XRechnung standard (v3.0) based on EN 16931.
//!
//! # Supported syntaxes
//!
//! - **CII** — UN/CEFACT Cross Industry Invoice (`to_cii_xml`, `from_cii_xml`)
//! - **UBL 2.1** — OASIS Universal Business Language (`to_ubl_xml`, `from_ubl_xml`)
//!
//! Both encoders map the same canonical record; [`decode`] sniffs the
//! syntax of received XML and dispatches to the matching parser.

mod cii;
mod ubl;
mod validate;
pub(crate) mod xml_utils;

pub use cii::{from_cii_xml, to_cii_xml};
pub use ubl::{from_ubl_xml, to_ubl_xml};
pub use validate::{ValidationReport, validate_xrechnung};

use tracing::debug;

use crate::core::{DecodeError, InvoiceRecord};

/// XRechnung 3.0 guideline identifier (BT-24).
pub const XRECHNUNG_GUIDELINE_ID: &str =
    "urn:cen.eu:en16931:2017#compliant#urn:xoev-de:kosit:standard:xrechnung_3.0";

/// CII namespace URIs. These are an external interoperability contract and
/// must match character for character.
pub mod cii_ns {
    pub const RSM: &str = "urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100";
    pub const RAM: &str =
        "urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100";
    pub const QDT: &str = "urn:un:unece:uncefact:data:standard:QualifiedDataType:100";
    pub const UDT: &str = "urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100";
}

/// UBL 2.1 namespace URIs.
pub mod ubl_ns {
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
}

/// Wire syntax of a received e-invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Cii,
    Ubl,
}

/// Sniff the syntax from the document's root element, if recognizable.
pub fn sniff_syntax(xml: &str) -> Option<Syntax> {
    // Root tag only: an embedded attachment may mention the other syntax.
    let root = root_local_name(xml)?;
    match root.as_str() {
        "CrossIndustryInvoice" => Some(Syntax::Cii),
        "Invoice" | "CreditNote" => Some(Syntax::Ubl),
        _ => None,
    }
}

/// Local name of the first start tag.
pub(crate) fn root_local_name(xml: &str) -> Option<String> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let local = name.local_name();
                return Some(String::from_utf8_lossy(local.as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Decode received e-invoice XML (CII or UBL) into the canonical record.
///
/// The syntax is chosen from the root element; when ambiguous, CII is
/// attempted first with a UBL fallback. Malformed XML or an unrecognized
/// root yields a [`DecodeError`] value — decoding never panics, and
/// missing optional elements never fail.
pub fn decode(xml: &str) -> Result<InvoiceRecord, DecodeError> {
    match sniff_syntax(xml) {
        Some(Syntax::Cii) => {
            debug!(syntax = "cii", "decoding e-invoice");
            from_cii_xml(xml)
        }
        Some(Syntax::Ubl) => {
            debug!(syntax = "ubl", "decoding e-invoice");
            from_ubl_xml(xml)
        }
        None => {
            let root = root_local_name(xml)
                .ok_or_else(|| DecodeError::Parse("no root element found".to_string()))?;
            debug!(root = %root, "ambiguous root, trying CII then UBL");
            // The lenient parsers do not raise on foreign documents, so an
            // empty result counts as a miss.
            let meaningful =
                |r: &InvoiceRecord| r.invoice_number.is_some() || !r.line_items.is_empty();
            if let Ok(record) = from_cii_xml(xml) {
                if meaningful(&record) {
                    return Ok(record);
                }
            }
            match from_ubl_xml(xml) {
                Ok(record) if meaningful(&record) => Ok(record),
                _ => Err(DecodeError::UnsupportedProfile(root)),
            }
        }
    }
}
