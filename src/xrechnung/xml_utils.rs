use chrono::NaiveDate;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;
use std::str::FromStr;

use crate::core::{CodecError, round2};

pub type XmlResult = Result<String, CodecError>;

fn xml_io(e: std::io::Error) -> CodecError {
    CodecError::Xml(format!("XML write error: {e}"))
}

/// Thin stateful wrapper over the quick-xml event writer.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    /// Compact output, no insignificant whitespace.
    pub fn new() -> Result<Self, CodecError> {
        Self::with_writer(Writer::new(Cursor::new(Vec::new())))
    }

    /// Pretty-printed output, two-space indentation.
    pub fn new_indented() -> Result<Self, CodecError> {
        Self::with_writer(Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2))
    }

    fn with_writer(mut writer: Writer<Cursor<Vec<u8>>>) -> Result<Self, CodecError> {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, CodecError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| CodecError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, CodecError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, CodecError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, CodecError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, CodecError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, CodecError> {
        self.start_element_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }
}

/// Serialize a monetary amount: exactly 2 decimal digits, `.` separator,
/// regardless of locale.
pub fn format_amount(d: Decimal) -> String {
    format!("{:.2}", round2(d))
}

/// Serialize a VAT rate: like amounts, two digits are always unambiguous.
pub fn format_rate(d: Decimal) -> String {
    format_amount(d)
}

/// Compact EN 16931 format-102 date (`YYYYMMDD`).
pub fn format_102(date: &NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Parse a numeric value tolerating German formatting.
///
/// Both `,` and `.` present → `.` is the thousands separator and `,` the
/// decimal mark ("1.880,20"); a lone `,` is a decimal comma ("1880,20");
/// otherwise plain decimal-point parsing.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    let normalized = if t.contains(',') && t.contains('.') {
        t.replace('.', "").replace(',', ".")
    } else if t.contains(',') {
        t.replace(',', ".")
    } else {
        t.to_string()
    };
    Decimal::from_str(&normalized).ok()
}

/// Parse a date from the wire: 8-digit compact (`YYYYMMDD`), ISO
/// (`YYYY-MM-DD`, datetimes split on `T`), or German `DD.MM.YYYY`.
pub fn parse_xml_date(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    let t = t.split('T').next().unwrap_or(t);
    if t.len() == 8 && t.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(t, "%Y%m%d").ok();
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(t, "%d.%m.%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_have_two_digits() {
        assert_eq!(format_amount(dec!(100)), "100.00");
        assert_eq!(format_amount(dec!(1500.0)), "1500.00");
        assert_eq!(format_amount(dec!(49.90)), "49.90");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
        assert_eq!(format_amount(dec!(1880.2)), "1880.20");
    }

    #[test]
    fn german_number_formats() {
        assert_eq!(parse_amount("1.880,20"), Some(dec!(1880.20)));
        assert_eq!(parse_amount("1880,20"), Some(dec!(1880.20)));
        assert_eq!(parse_amount("1880.20"), Some(dec!(1880.20)));
        assert_eq!(parse_amount(" 19 "), Some(dec!(19)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 9, 29);
        assert_eq!(parse_xml_date("20250929"), expected);
        assert_eq!(parse_xml_date("2025-09-29"), expected);
        assert_eq!(parse_xml_date("2025-09-29T14:30:00"), expected);
        assert_eq!(parse_xml_date("29.09.2025"), expected);
        assert_eq!(parse_xml_date("not a date"), None);
    }
}
