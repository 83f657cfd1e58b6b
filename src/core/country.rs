//! Country detection from free text (addresses, VAT IDs).
//!
//! The detection order is a fixed, externally visible contract:
//!
//! 1. a VAT-ID-shaped substring whose prefix is on [`VAT_PREFIX_ALLOW_LIST`]
//!    (the most reliable signal, always wins);
//! 2. the per-country pattern sets in [`COUNTRY_RULES`], first match wins,
//!    evaluated top to bottom;
//! 3. fallback `"DE"`.
//!
//! Reordering [`COUNTRY_RULES`] silently changes behavior — the order is
//! pinned by tests and must never change accidentally.

use lazy_static::lazy_static;
use regex::Regex;

/// VAT-ID prefixes accepted as a country signal.
pub const VAT_PREFIX_ALLOW_LIST: &[&str] =
    &["DE", "AT", "CH", "FR", "NL", "GB", "IT", "ES", "BE", "PL"];

/// Per-country detection patterns: country name literals, postal-code
/// shapes, and VAT-ID shapes. Evaluated case-insensitively, in this order.
pub const COUNTRY_RULES: &[(&str, &[&str])] = &[
    (
        "DE",
        &[
            r"\bGermany\b",
            r"\bDeutschland\b",
            r"\b\d{5}\s+\w+",
            r"\bDE\d{9}\b",
        ],
    ),
    (
        "AT",
        &[
            r"\bAustria\b",
            r"\bÖsterreich\b",
            r"\b\d{4}\s+\w+",
            r"\bATU\d{8}\b",
        ],
    ),
    (
        "CH",
        &[
            r"\bSwitzerland\b",
            r"\bSchweiz\b",
            r"\bSuisse\b",
            r"\bCH-\d{4}\b",
            r"\bCHE-\d{3}\.\d{3}\.\d{3}\b",
        ],
    ),
    (
        "US",
        &[
            r"\bUnited States\b",
            r"\bUSA\b",
            r"\bU\.S\.A\.",
            r"\b[A-Z]{2}\s+\d{5}(-\d{4})?\b",
            r"\bCalifornia\b",
            r"\bNew York\b",
            r"\bTexas\b",
        ],
    ),
    (
        "GB",
        &[
            r"\bUnited Kingdom\b",
            r"\bUK\b",
            r"\bEngland\b",
            r"\b[A-Z]{1,2}\d{1,2}[A-Z]?\s*\d[A-Z]{2}\b",
        ],
    ),
    ("FR", &[r"\bFrance\b", r"\bFrankreich\b", r"\bFR\d{2}\s?\d{9}\b"]),
    (
        "NL",
        &[r"\bNetherlands\b", r"\bNiederlande\b", r"\bHolland\b", r"\bNL\d{9}B\d{2}\b"],
    ),
];

lazy_static! {
    static ref VAT_ID_SHAPE: Regex = Regex::new(r"\b([A-Z]{2})\d{8,12}\b").unwrap();
    static ref COMPILED_RULES: Vec<(&'static str, Vec<Regex>)> = COUNTRY_RULES
        .iter()
        .map(|(code, patterns)| {
            let compiled = patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){p}")).expect("invalid country pattern"))
                .collect();
            (*code, compiled)
        })
        .collect();
}

/// Detect a country code from arbitrary text (an address or a tax-ID
/// string). Returns an ISO 3166-1 alpha-2 code, defaulting to `"DE"`.
pub fn detect_country(text: &str) -> String {
    if text.is_empty() {
        return "DE".to_string();
    }

    // VAT-ID prefix first: a USt-IdNr is the most reliable signal and
    // must win over generic postal-code heuristics.
    let upper = text.to_uppercase();
    if let Some(caps) = VAT_ID_SHAPE.captures(&upper) {
        let prefix = &caps[1];
        if VAT_PREFIX_ALLOW_LIST.contains(&prefix) {
            return prefix.to_string();
        }
    }

    for (code, patterns) in COMPILED_RULES.iter() {
        if patterns.iter().any(|p| p.is_match(text)) {
            return (*code).to_string();
        }
    }

    "DE".to_string()
}
