use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One e-invoice as exchanged with the surrounding application.
///
/// This is the canonical record shape: the upstream extraction pipeline
/// produces it, [`normalize`](crate::core::normalize) makes it consistent,
/// the encoders serialize it, and the decoders reproduce it from received
/// XML. Every field the source may omit is an `Option`; the encoders
/// degrade to defaults rather than fail on missing optional data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// BT-1: Invoice number. Encodes as the literal `"UNKNOWN"` when absent.
    pub invoice_number: Option<String>,
    /// BT-2: Issue date.
    pub issue_date: Option<NaiveDate>,
    /// BT-9: Payment due date.
    pub due_date: Option<NaiveDate>,
    /// BT-72: Actual delivery date (Leistungsdatum).
    pub delivery_date: Option<NaiveDate>,
    /// BT-27: Seller name.
    pub seller_name: Option<String>,
    /// BG-5: Seller postal address.
    pub seller_address: Option<Address>,
    /// BT-32: Seller tax registration number (Steuernummer).
    pub seller_tax_number: Option<String>,
    /// BT-31: Seller VAT identifier (USt-IdNr, e.g. "DE123456789").
    pub seller_vat_id: Option<String>,
    /// BT-44: Buyer name.
    pub buyer_name: Option<String>,
    /// BG-8: Buyer postal address.
    pub buyer_address: Option<Address>,
    /// BT-10: Buyer reference (Leitweg-ID for public-sector XRechnung).
    pub leitweg_id: Option<String>,
    /// BT-5: Invoice currency (ISO 4217). Defaults to "EUR".
    pub currency: Option<String>,
    /// BT-109: Total without VAT.
    pub net_amount: Option<Decimal>,
    /// BT-110: Total VAT amount.
    pub vat_amount: Option<Decimal>,
    /// BT-119: VAT rate percentage. Defaults to 19.
    pub vat_rate: Option<Decimal>,
    /// BT-112: Total with VAT.
    pub gross_amount: Option<Decimal>,
    /// BT-84: IBAN.
    pub iban: Option<String>,
    /// BT-86: BIC.
    pub bic: Option<String>,
    /// BT-20: Payment terms free text.
    pub payment_terms_text: Option<String>,
    /// Payment target in days; rendered as free-text terms when no due date.
    pub payment_due_days: Option<u32>,
    /// BT-83: Payment reference (Verwendungszweck).
    pub payment_reference: Option<String>,
    /// BG-25: Invoice positions, in document order.
    pub line_items: Vec<LineItem>,
}

/// BG-25: One invoice position.
///
/// `line_net_total ≈ quantity × unit_net_price` is deliberately not
/// enforced — source values win, mismatches are tolerated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// BT-126: 1-based position; insertion order is document order.
    pub position: Option<u32>,
    /// BT-153: Item name / description.
    pub description: Option<String>,
    /// BT-129: Billed quantity.
    pub quantity: Option<Decimal>,
    /// BT-130: Unit of measure (UNECE Rec 20). Defaults to "C62" (piece).
    pub unit: Option<String>,
    /// Unit price as supplied by the source — may be gross.
    pub unit_price: Option<Decimal>,
    /// BT-146: Net unit price. Derived from `unit_price` when absent.
    pub unit_net_price: Option<Decimal>,
    /// Line total as supplied by the source — may be gross.
    pub line_total: Option<Decimal>,
    /// BT-131: Net line total. Derived from `line_total` when absent.
    pub line_net_total: Option<Decimal>,
}

/// BG-5 / BG-8: Parsed or raw postal address.
///
/// Owned exclusively by the record that contains it and created fresh on
/// every parse — never cached or shared. `raw` always retains the original
/// input unmodified so the encoders can fall back to it when the structured
/// fields stayed empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// BT-35 / BT-50: Street + house number.
    pub street: String,
    /// BT-38 / BT-53: Postal code.
    pub postcode: String,
    /// BT-37 / BT-52: City.
    pub city: String,
    /// BT-40 / BT-55: Country code (ISO 3166-1 alpha-2). Defaults to "DE".
    pub country_code: String,
    /// Detected country name literal, if one was stripped from the input.
    pub country_name: String,
    /// Original input string, unmodified.
    pub raw: String,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            street: String::new(),
            postcode: String::new(),
            city: String::new(),
            country_code: "DE".to_string(),
            country_name: String::new(),
            raw: String::new(),
        }
    }
}

impl Address {
    /// Wrap a free-text address without parsing it. The normalizer runs
    /// the full parse later; `raw` carries the text until then.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Default::default()
        }
    }

    /// True if no structured component was extracted.
    pub fn is_unstructured(&self) -> bool {
        self.street.is_empty() && self.postcode.is_empty() && self.city.is_empty()
    }

    /// Single-line rendering of the structured fields, used when a decoder
    /// rebuilds `raw` from received XML.
    pub fn to_single_line(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.street.is_empty() {
            parts.push(&self.street);
        }
        let locality = format!("{} {}", self.postcode, self.city);
        let locality = locality.trim().to_string();
        if !locality.is_empty() {
            parts.push(&locality);
        }
        parts.join(", ")
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Address::from_raw(raw)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Address::from_raw(raw)
    }
}
