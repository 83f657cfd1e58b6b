//! Heuristic free-text address parsing.
//!
//! Upstream extraction delivers addresses as a single line of text
//! ("In der Dell 19, 69469 Weinheim"). The parser recovers street,
//! postcode, city, and country without ever inventing a field: anything
//! it cannot place stays an empty string, and [`Address::raw`] always
//! retains the original input for fallback rendering.

use lazy_static::lazy_static;
use regex::Regex;

use super::country::detect_country;
use super::types::Address;

/// Country names recognized (and stripped) at the end of an address line.
pub const TRAILING_COUNTRY_NAMES: &[&str] = &[
    "Germany",
    "Deutschland",
    "Austria",
    "Österreich",
    "Switzerland",
    "Schweiz",
    "United States",
    "USA",
    "United Kingdom",
    "UK",
    "France",
    "Frankreich",
    "Netherlands",
    "Niederlande",
];

lazy_static! {
    /// German-style "<PLZ> <city>" anywhere in the line.
    static ref DE_PLZ_CITY: Regex =
        Regex::new(r"\b(\d{5})\s+([A-Za-zäöüÄÖÜß\-\s]+)").unwrap();
    /// Bare 4-5 digit postcode token.
    static ref PLZ_TOKEN: Regex = Regex::new(r"\b(\d{4,5})\b").unwrap();
    /// "<PLZ> <city>" at the start of a comma segment.
    static ref PLZ_THEN_CITY: Regex = Regex::new(r"\b(\d{4,5})\s+(.+)").unwrap();
    /// Country leftovers after an extracted city.
    static ref CITY_TRAILER: Regex =
        Regex::new(r"(?i),?\s*(Germany|Deutschland|DE)?\s*$").unwrap();
    static ref TRAILING_COUNTRY: Regex = Regex::new(&format!(
        r"(?i)[,\s]\b({})\s*$",
        TRAILING_COUNTRY_NAMES.join("|")
    ))
    .unwrap();
}

/// Parse a free-text address line into structured components.
///
/// The algorithm is ordered and first-match-wins:
///
/// 1. empty input → empty fields, country `"DE"`;
/// 2. strip a trailing known country name;
/// 3. German-style `<5-digit PLZ> <city>` anywhere in the line — everything
///    before the match is the street;
/// 4. comma-split fallback (3+, 2, or 1 segments, scanning for a 4-5 digit
///    postcode token).
pub fn parse_address(input: &str) -> Address {
    if input.is_empty() {
        return Address::default();
    }

    let mut result = Address {
        country_code: detect_country(input),
        raw: input.to_string(),
        ..Default::default()
    };

    let mut addr = input.trim().to_string();

    // Strip trailing country name
    if let Some(caps) = TRAILING_COUNTRY.captures(&addr) {
        let m = caps.get(0).unwrap();
        result.country_name = caps[1].to_string();
        addr = addr[..m.start()]
            .trim()
            .trim_end_matches(',')
            .trim()
            .to_string();
    }

    if let Some(caps) = DE_PLZ_CITY.captures(&addr) {
        let m = caps.get(0).unwrap();
        result.postcode = caps[1].to_string();
        let city_raw = caps[2].trim();
        result.city = CITY_TRAILER.replace(city_raw, "").trim().to_string();
        result.street = addr[..m.start()]
            .trim()
            .trim_end_matches(',')
            .trim()
            .to_string();
        return result;
    }

    // Fallback: split on commas
    let parts: Vec<&str> = addr.split(',').map(str::trim).collect();
    match parts.len() {
        n if n >= 3 => {
            result.street = parts[0].to_string();
            let mut found = false;
            for part in &parts[1..n - 1] {
                if let Some(caps) = PLZ_TOKEN.captures(part) {
                    result.postcode = caps[1].to_string();
                    result.city = PLZ_TOKEN.replace(part, "").trim().to_string();
                    found = true;
                    break;
                }
            }
            if !found {
                result.city = parts[n - 1].to_string();
            }
        }
        2 => {
            result.street = parts[0].to_string();
            // Second segment may be "PLZ City" or just "City"
            if let Some(caps) = PLZ_THEN_CITY.captures(parts[1]) {
                result.postcode = caps[1].to_string();
                result.city = caps[2].trim().to_string();
            } else {
                result.city = parts[1].to_string();
            }
        }
        _ => {
            result.street = addr.to_string();
        }
    }

    result
}

/// Parse the raw text of an [`Address`] unless structured fields are
/// already present (e.g. produced by a decoder).
pub fn ensure_parsed(address: &Address) -> Address {
    if address.is_unstructured() && !address.raw.is_empty() {
        parse_address(&address.raw)
    } else {
        address.clone()
    }
}
