//! # erechnung
//!
//! German/European e-invoice exchange codec: converts an internal invoice
//! record into standards-compliant XRechnung 3.0 / EN 16931 XML (UN/CEFACT
//! CII or OASIS UBL) and parses received e-invoices — including XML embedded
//! in ZUGFeRD/Factur-X PDFs — back into the same record shape.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//! The codec is stateless: every encode, decode, and validate call is a pure
//! function of its input and may run concurrently without coordination.
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "xrechnung")] {
//! use chrono::NaiveDate;
//! use erechnung::core::*;
//! use erechnung::xrechnung;
//! use rust_decimal_macros::dec;
//!
//! let record = InvoiceRecord {
//!     invoice_number: Some("RE-2025-042".into()),
//!     issue_date: NaiveDate::from_ymd_opt(2025, 6, 15),
//!     seller_name: Some("ACME GmbH".into()),
//!     seller_address: Some("Friedrichstraße 123, 10115 Berlin".into()),
//!     seller_vat_id: Some("DE123456789".into()),
//!     buyer_name: Some("Kunde AG".into()),
//!     buyer_address: Some("Marienplatz 1, 80331 München".into()),
//!     gross_amount: Some(dec!(1190.00)),
//!     vat_rate: Some(dec!(19)),
//!     ..Default::default()
//! };
//!
//! let normalized = normalize(&record);
//! let xml = xrechnung::to_cii_xml(&normalized, false).unwrap();
//! let report = xrechnung::validate_xrechnung(&xml);
//! assert!(report.is_valid);
//!
//! let roundtripped = xrechnung::decode(&xml).unwrap();
//! assert_eq!(roundtripped.invoice_number.as_deref(), Some("RE-2025-042"));
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Record types, address parsing, country detection, normalization |
//! | `xrechnung` | XRechnung CII/UBL generation, parsing, validation |
//! | `zugferd` | ZUGFeRD/Factur-X PDF embed/extract |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "xrechnung")]
pub mod xrechnung;

#[cfg(feature = "zugferd")]
pub mod zugferd;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
