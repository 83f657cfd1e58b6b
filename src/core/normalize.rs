use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::address::ensure_parsed;
use super::country::detect_country;
use super::types::{Address, InvoiceRecord};

/// A raw record made consistent, ready for encoding.
///
/// Computed values live here, beside an untouched copy of the caller's
/// record with the monetary fields filled in — they are never merged back
/// into the caller's input.
#[derive(Debug, Clone)]
pub struct NormalizedInvoice {
    /// The record with net/VAT/gross, rate, and currency guaranteed present.
    pub record: InvoiceRecord,
    /// Seller address, parsed; country overridden by the VAT-ID when present.
    pub seller_address: Address,
    /// Buyer address, parsed.
    pub buyer_address: Address,
    /// At least one line, positions assigned, net values derived.
    pub lines: Vec<NormalizedLine>,
}

/// One consistent invoice position.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLine {
    pub position: u32,
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_net_price: Decimal,
    pub line_net_total: Decimal,
}

/// Round to 2 decimal places, half away from zero.
///
/// Every monetary derivation in the crate goes through this — mixing
/// rounding modes breaks the `|net + vat - gross| <= 0.02` invariant at
/// boundary values.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn is_set(value: Option<Decimal>) -> bool {
    value.is_some_and(|d| !d.is_zero())
}

/// Turn a raw, possibly-incomplete record into a consistent one.
///
/// Derives missing net/VAT/gross from whichever side is present, parses
/// both addresses, and guarantees at least one line item (synthesized from
/// the header totals if the source supplied none).
pub fn normalize(input: &InvoiceRecord) -> NormalizedInvoice {
    let mut record = input.clone();

    let vat_rate = record.vat_rate.unwrap_or(dec!(19));
    let mut net = record.net_amount.unwrap_or(Decimal::ZERO);
    let mut vat = record.vat_amount.unwrap_or(Decimal::ZERO);
    let mut gross = record.gross_amount.unwrap_or(Decimal::ZERO);

    let rate_factor = Decimal::ONE + vat_rate / dec!(100);

    if is_set(record.gross_amount) && !is_set(record.net_amount) {
        net = round2(gross / rate_factor);
        vat = round2(gross - net);
    } else if is_set(record.net_amount) && !is_set(record.gross_amount) {
        vat = round2(net * vat_rate / dec!(100));
        gross = round2(net + vat);
    }

    record.net_amount = Some(net);
    record.vat_amount = Some(vat);
    record.gross_amount = Some(gross);
    record.vat_rate = Some(vat_rate);
    record.currency = Some(
        record
            .currency
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "EUR".to_string()),
    );

    // Addresses: parse free text; a seller VAT-ID is a stronger country
    // signal than anything the address itself contains.
    let mut seller_address = ensure_parsed(&record.seller_address.clone().unwrap_or_default());
    if let Some(vat_id) = record.seller_vat_id.as_deref().filter(|v| !v.is_empty()) {
        seller_address.country_code = detect_country(vat_id);
    }
    let buyer_address = ensure_parsed(&record.buyer_address.clone().unwrap_or_default());

    let lines = if record.line_items.is_empty() {
        vec![NormalizedLine {
            position: 1,
            description: record
                .payment_reference
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "Rechnungsposition".to_string()),
            quantity: Decimal::ONE,
            unit: "C62".to_string(),
            unit_net_price: net,
            line_net_total: net,
        }]
    } else {
        record
            .line_items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let unit_net_price = item.unit_net_price.unwrap_or_else(|| {
                    round2(item.unit_price.unwrap_or(Decimal::ZERO) / rate_factor)
                });
                let line_net_total = item.line_net_total.unwrap_or_else(|| {
                    let total = item
                        .line_total
                        .or(item.unit_price)
                        .unwrap_or(Decimal::ZERO);
                    round2(total / rate_factor)
                });
                NormalizedLine {
                    position: item.position.unwrap_or(idx as u32 + 1),
                    description: item
                        .description
                        .clone()
                        .filter(|d| !d.is_empty())
                        .unwrap_or_else(|| "Artikel/Dienstleistung".to_string()),
                    quantity: item.quantity.unwrap_or(Decimal::ONE),
                    unit: item
                        .unit
                        .clone()
                        .filter(|u| !u.is_empty())
                        .unwrap_or_else(|| "C62".to_string()),
                    unit_net_price,
                    line_net_total,
                }
            })
            .collect()
    };

    NormalizedInvoice {
        record,
        seller_address,
        buyer_address,
        lines,
    }
}
