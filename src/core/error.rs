use thiserror::Error;

/// Errors from XML generation or the PDF attachment boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// XML writing or serialization failed.
    #[error("XML error: {0}")]
    Xml(String),

    /// PDF embed/extract failed.
    #[error("PDF error: {0}")]
    Pdf(String),
}

/// Errors from decoding received e-invoice XML.
///
/// Always returned as a value so batch importers can skip a broken
/// document and continue. Missing optional elements never produce an
/// error — they decode to `None`/empty.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The input is not well-formed XML.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// The input parses but is neither recognizable CII nor UBL.
    #[error("unsupported e-invoice profile: root element <{0}>")]
    UnsupportedProfile(String),
}
