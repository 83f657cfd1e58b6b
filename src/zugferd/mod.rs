//! ZUGFeRD / Factur-X PDF/A-3 embedding and extraction.
//!
//! A hybrid invoice is a human-readable PDF with the machine-readable CII
//! XML attached as `factur-x.xml`. [`embed_in_pdf`] turns an existing PDF
//! into such a hybrid; [`extract_from_pdf`] recovers the XML from one.

mod embed;
mod extract;
mod xmp;

pub use embed::embed_in_pdf;
pub use extract::extract_from_pdf;

/// The embedded XML filename per Factur-X 1.0+ specification.
pub const FACTURX_FILENAME: &str = "factur-x.xml";
