use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;

use super::xml_utils::{
    XmlResult, XmlWriter, format_102, format_amount, format_rate, parse_amount, parse_xml_date,
};
use super::{XRECHNUNG_GUIDELINE_ID, cii_ns};
use crate::core::{
    Address, CodecError, DecodeError, InvoiceRecord, LineItem, NormalizedInvoice, NormalizedLine,
};

/// Generate XRechnung-compliant CII (Cross Industry Invoice) XML.
///
/// Never fails on missing optional data: absent fields degrade to
/// defaults (a missing invoice number becomes the literal `"UNKNOWN"`,
/// a missing country becomes `"DE"`).
pub fn to_cii_xml(invoice: &NormalizedInvoice, pretty: bool) -> XmlResult {
    let record = &invoice.record;
    let currency = record.currency.as_deref().unwrap_or("EUR");
    let net = record.net_amount.unwrap_or(Decimal::ZERO);
    let vat = record.vat_amount.unwrap_or(Decimal::ZERO);
    let gross = record.gross_amount.unwrap_or(Decimal::ZERO);
    let vat_rate = record.vat_rate.unwrap_or(Decimal::ZERO);

    let mut w = if pretty {
        XmlWriter::new_indented()?
    } else {
        XmlWriter::new()?
    };

    w.start_element_with_attrs(
        "rsm:CrossIndustryInvoice",
        &[
            ("xmlns:rsm", cii_ns::RSM),
            ("xmlns:ram", cii_ns::RAM),
            ("xmlns:qdt", cii_ns::QDT),
            ("xmlns:udt", cii_ns::UDT),
        ],
    )?;

    // --- ExchangedDocumentContext ---
    w.start_element("rsm:ExchangedDocumentContext")?;
    w.start_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.text_element("ram:ID", XRECHNUNG_GUIDELINE_ID)?;
    w.end_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.end_element("rsm:ExchangedDocumentContext")?;

    // --- ExchangedDocument ---
    w.start_element("rsm:ExchangedDocument")?;
    // BT-1
    w.text_element("ram:ID", record.invoice_number.as_deref().unwrap_or("UNKNOWN"))?;
    // BT-3: 380 = commercial invoice
    w.text_element("ram:TypeCode", "380")?;
    // BT-2
    write_cii_date(&mut w, "ram:IssueDateTime", &issue_date_or_today(record))?;
    // BT-22
    if let Some(terms) = record.payment_terms_text.as_deref().filter(|t| !t.is_empty()) {
        w.start_element("ram:IncludedNote")?;
        w.text_element("ram:Content", terms)?;
        w.end_element("ram:IncludedNote")?;
    }
    w.end_element("rsm:ExchangedDocument")?;

    // --- SupplyChainTradeTransaction ---
    w.start_element("rsm:SupplyChainTradeTransaction")?;

    // BG-25: lines come first per CII schema order
    for line in &invoice.lines {
        write_cii_line(&mut w, line, vat_rate)?;
    }

    // --- ApplicableHeaderTradeAgreement ---
    w.start_element("ram:ApplicableHeaderTradeAgreement")?;
    // BT-10: Leitweg-ID
    if let Some(leitweg) = record.leitweg_id.as_deref().filter(|l| !l.is_empty()) {
        w.text_element("ram:BuyerReference", leitweg)?;
    }
    // BG-4
    write_cii_party(
        &mut w,
        "ram:SellerTradeParty",
        record.seller_name.as_deref().unwrap_or("Unbekannter Aussteller"),
        &invoice.seller_address,
        record.seller_vat_id.as_deref(),
        record.seller_tax_number.as_deref(),
    )?;
    // BG-7
    write_cii_party(
        &mut w,
        "ram:BuyerTradeParty",
        record.buyer_name.as_deref().unwrap_or("Unbekannter Empfänger"),
        &invoice.buyer_address,
        None,
        None,
    )?;
    w.end_element("ram:ApplicableHeaderTradeAgreement")?;

    // --- ApplicableHeaderTradeDelivery ---
    w.start_element("ram:ApplicableHeaderTradeDelivery")?;
    if let Some(delivery) = &record.delivery_date {
        w.start_element("ram:ActualDeliverySupplyChainEvent")?;
        write_cii_date(&mut w, "ram:OccurrenceDateTime", delivery)?;
        w.end_element("ram:ActualDeliverySupplyChainEvent")?;
    }
    w.end_element("ram:ApplicableHeaderTradeDelivery")?;

    // --- ApplicableHeaderTradeSettlement ---
    w.start_element("ram:ApplicableHeaderTradeSettlement")?;
    // BT-83: fall back to the invoice number as Verwendungszweck
    let payment_ref = record
        .payment_reference
        .as_deref()
        .filter(|r| !r.is_empty())
        .or(record.invoice_number.as_deref());
    if let Some(pr) = payment_ref {
        w.text_element("ram:PaymentReference", pr)?;
    }
    // BT-5
    w.text_element("ram:InvoiceCurrencyCode", currency)?;

    // BG-16: 58 = SEPA credit transfer, 1 = instrument not defined
    w.start_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
    match record.iban.as_deref().filter(|i| !i.is_empty()) {
        Some(iban) => {
            w.text_element("ram:TypeCode", "58")?;
            w.start_element("ram:PayeePartyCreditorFinancialAccount")?;
            w.text_element("ram:IBANID", &iban.replace(' ', ""))?;
            w.end_element("ram:PayeePartyCreditorFinancialAccount")?;
            if let Some(bic) = record.bic.as_deref().filter(|b| !b.is_empty()) {
                w.start_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
                w.text_element("ram:BICID", bic)?;
                w.end_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
            }
        }
        None => {
            w.text_element("ram:TypeCode", "1")?;
        }
    }
    w.end_element("ram:SpecifiedTradeSettlementPaymentMeans")?;

    // BG-23
    w.start_element("ram:ApplicableTradeTax")?;
    w.text_element("ram:CalculatedAmount", &format_amount(vat))?;
    w.text_element("ram:TypeCode", "VAT")?;
    w.text_element("ram:CategoryCode", tax_category(vat_rate))?;
    w.text_element("ram:BasisAmount", &format_amount(net))?;
    w.text_element("ram:RateApplicablePercent", &format_rate(vat_rate))?;
    w.end_element("ram:ApplicableTradeTax")?;

    // BT-9 / BT-20
    if let Some(due) = &record.due_date {
        w.start_element("ram:SpecifiedTradePaymentTerms")?;
        write_cii_date(&mut w, "ram:DueDateDateTime", due)?;
        w.end_element("ram:SpecifiedTradePaymentTerms")?;
    } else if let Some(days) = record.payment_due_days {
        w.start_element("ram:SpecifiedTradePaymentTerms")?;
        w.text_element(
            "ram:Description",
            &format!("Zahlbar innerhalb von {days} Tagen"),
        )?;
        w.end_element("ram:SpecifiedTradePaymentTerms")?;
    }

    // BG-22
    w.start_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;
    w.text_element("ram:LineTotalAmount", &format_amount(net))?;
    w.text_element("ram:TaxBasisTotalAmount", &format_amount(net))?;
    w.text_element_with_attrs(
        "ram:TaxTotalAmount",
        &format_amount(vat),
        &[("currencyID", currency)],
    )?;
    w.text_element("ram:GrandTotalAmount", &format_amount(gross))?;
    w.text_element("ram:DuePayableAmount", &format_amount(gross))?;
    w.end_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;

    w.end_element("ram:ApplicableHeaderTradeSettlement")?;
    w.end_element("rsm:SupplyChainTradeTransaction")?;
    w.end_element("rsm:CrossIndustryInvoice")?;

    w.into_string()
}

fn issue_date_or_today(record: &InvoiceRecord) -> NaiveDate {
    record
        .issue_date
        .unwrap_or_else(|| chrono::Local::now().date_naive())
}

pub(super) fn tax_category(vat_rate: Decimal) -> &'static str {
    if vat_rate.is_zero() { "Z" } else { "S" }
}

fn write_cii_date(w: &mut XmlWriter, element: &str, date: &NaiveDate) -> Result<(), CodecError> {
    w.start_element(element)?;
    w.text_element_with_attrs("udt:DateTimeString", &format_102(date), &[("format", "102")])?;
    w.end_element(element)?;
    Ok(())
}

fn write_cii_party(
    w: &mut XmlWriter,
    element: &str,
    name: &str,
    address: &Address,
    vat_id: Option<&str>,
    tax_number: Option<&str>,
) -> Result<(), CodecError> {
    // CII schema order within TradeParty:
    // Name → PostalTradeAddress → SpecifiedTaxRegistration
    w.start_element(element)?;
    w.text_element("ram:Name", name)?;

    w.start_element("ram:PostalTradeAddress")?;
    if !address.postcode.is_empty() {
        w.text_element("ram:PostcodeCode", &address.postcode)?;
    }
    if !address.street.is_empty() {
        w.text_element("ram:LineOne", &address.street)?;
    } else if !address.raw.is_empty() {
        // Unparseable address: carry the raw line rather than drop it
        w.text_element("ram:LineOne", &address.raw)?;
    }
    if !address.city.is_empty() {
        w.text_element("ram:CityName", &address.city)?;
    }
    // BT-40/BT-55 is mandatory, even when nothing was detected
    let country = if address.country_code.is_empty() {
        "DE"
    } else {
        &address.country_code
    };
    w.text_element("ram:CountryID", country)?;
    w.end_element("ram:PostalTradeAddress")?;

    if let Some(vat_id) = vat_id.filter(|v| !v.is_empty()) {
        w.start_element("ram:SpecifiedTaxRegistration")?;
        w.text_element_with_attrs("ram:ID", vat_id, &[("schemeID", "VA")])?;
        w.end_element("ram:SpecifiedTaxRegistration")?;
    }
    if let Some(tax_number) = tax_number.filter(|t| !t.is_empty()) {
        w.start_element("ram:SpecifiedTaxRegistration")?;
        w.text_element_with_attrs("ram:ID", tax_number, &[("schemeID", "FC")])?;
        w.end_element("ram:SpecifiedTaxRegistration")?;
    }

    w.end_element(element)?;
    Ok(())
}

fn write_cii_line(
    w: &mut XmlWriter,
    line: &NormalizedLine,
    vat_rate: Decimal,
) -> Result<(), CodecError> {
    w.start_element("ram:IncludedSupplyChainTradeLineItem")?;

    // BT-126
    w.start_element("ram:AssociatedDocumentLineDocument")?;
    w.text_element("ram:LineID", &line.position.to_string())?;
    w.end_element("ram:AssociatedDocumentLineDocument")?;

    // BG-31
    w.start_element("ram:SpecifiedTradeProduct")?;
    w.text_element("ram:Name", &line.description)?;
    w.end_element("ram:SpecifiedTradeProduct")?;

    // BT-146: always the net price, never gross
    w.start_element("ram:SpecifiedLineTradeAgreement")?;
    w.start_element("ram:NetPriceProductTradePrice")?;
    w.text_element("ram:ChargeAmount", &format_amount(line.unit_net_price))?;
    w.end_element("ram:NetPriceProductTradePrice")?;
    w.end_element("ram:SpecifiedLineTradeAgreement")?;

    // BT-129/BT-130
    w.start_element("ram:SpecifiedLineTradeDelivery")?;
    w.text_element_with_attrs(
        "ram:BilledQuantity",
        &format_amount(line.quantity),
        &[("unitCode", line.unit.as_str())],
    )?;
    w.end_element("ram:SpecifiedLineTradeDelivery")?;

    // BG-30 + BT-131
    w.start_element("ram:SpecifiedLineTradeSettlement")?;
    w.start_element("ram:ApplicableTradeTax")?;
    w.text_element("ram:TypeCode", "VAT")?;
    w.text_element("ram:CategoryCode", tax_category(vat_rate))?;
    w.text_element("ram:RateApplicablePercent", &format_rate(vat_rate))?;
    w.end_element("ram:ApplicableTradeTax")?;
    w.start_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
    w.text_element("ram:LineTotalAmount", &format_amount(line.line_net_total))?;
    w.end_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
    w.end_element("ram:SpecifiedLineTradeSettlement")?;

    w.end_element("ram:IncludedSupplyChainTradeLineItem")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse CII XML into the canonical record.
///
/// Lookup is namespace-tolerant: elements are matched on local names, so
/// documents that alias or omit the standard prefixes decode identically.
/// Missing optional elements yield `None`/empty, never an error.
pub fn from_cii_xml(xml: &str) -> Result<InvoiceRecord, DecodeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = CiiParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local = local_name(e.name().as_ref());

                if local == "ID" || local == "BilledQuantity" {
                    for attr in e.attributes().flatten() {
                        let key = local_name(attr.key.as_ref());
                        let val = String::from_utf8_lossy(&attr.value).into_owned();
                        match key.as_str() {
                            "schemeID" => p.current_scheme_id = Some(val),
                            "unitCode" => p.current_unit_code = Some(val),
                            _ => {}
                        }
                    }
                }

                path.push(local);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if !text.is_empty() {
                    p.handle_text(&path, &text);
                }
            }
            Ok(Event::End(_)) => {
                let ended = path.pop().unwrap_or_default();
                if ended == "IncludedSupplyChainTradeLineItem" {
                    if let Some(line) = p.current_line.take() {
                        p.lines.push(line);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DecodeError::Parse(e.to_string())),
            _ => {}
        }
    }

    Ok(p.into_record())
}

/// Strip any namespace prefix from a qualified tag name.
pub(super) fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    match s.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => s.into_owned(),
    }
}

#[derive(Default)]
struct CiiParsed {
    number: Option<String>,
    issue_date: Option<String>,
    due_date: Option<String>,
    delivery_date: Option<String>,
    note: Option<String>,
    buyer_reference: Option<String>,
    currency: Option<String>,
    payment_reference: Option<String>,
    payment_terms: Option<String>,
    iban: Option<String>,
    bic: Option<String>,

    seller_name: Option<String>,
    seller_vat_id: Option<String>,
    seller_tax_number: Option<String>,
    seller_street: Option<String>,
    seller_postcode: Option<String>,
    seller_city: Option<String>,
    seller_country: Option<String>,

    buyer_name: Option<String>,
    buyer_street: Option<String>,
    buyer_postcode: Option<String>,
    buyer_city: Option<String>,
    buyer_country: Option<String>,

    vat_amount: Option<String>,
    net_amount: Option<String>,
    vat_rate: Option<String>,
    tax_basis_total: Option<String>,
    tax_total: Option<String>,
    grand_total: Option<String>,

    lines: Vec<CiiLine>,
    current_line: Option<CiiLine>,

    current_scheme_id: Option<String>,
    current_unit_code: Option<String>,
}

#[derive(Default, Clone)]
struct CiiLine {
    id: Option<String>,
    name: Option<String>,
    quantity: Option<String>,
    unit: Option<String>,
    net_price: Option<String>,
    line_total: Option<String>,
}

impl CiiParsed {
    fn handle_text(&mut self, path: &[String], text: &str) {
        let leaf = path.last().map(String::as_str).unwrap_or("");
        let parent = if path.len() >= 2 {
            path[path.len() - 2].as_str()
        } else {
            ""
        };

        let in_seller = path.iter().any(|p| p == "SellerTradeParty");
        let in_buyer = path.iter().any(|p| p == "BuyerTradeParty");
        let in_line = path.iter().any(|p| p == "IncludedSupplyChainTradeLineItem");
        let in_monetary = path
            .iter()
            .any(|p| p == "SpecifiedTradeSettlementHeaderMonetarySummation");

        // Document level
        if leaf == "ID" && parent == "ExchangedDocument" {
            self.number = Some(text.to_string());
        }
        if leaf == "DateTimeString" {
            match parent {
                "IssueDateTime" => self.issue_date = Some(text.to_string()),
                "DueDateDateTime" => self.due_date = Some(text.to_string()),
                "OccurrenceDateTime" => self.delivery_date = Some(text.to_string()),
                _ => {}
            }
        }
        if leaf == "Content" && parent == "IncludedNote" && !in_line {
            self.note = Some(text.to_string());
        }
        if leaf == "BuyerReference" {
            self.buyer_reference = Some(text.to_string());
        }
        if leaf == "InvoiceCurrencyCode" {
            self.currency = Some(text.to_string());
        }
        if leaf == "PaymentReference" {
            self.payment_reference = Some(text.to_string());
        }
        if leaf == "Description" && parent == "SpecifiedTradePaymentTerms" {
            self.payment_terms = Some(text.to_string());
        }
        if leaf == "IBANID" {
            self.iban = Some(text.to_string());
        }
        if leaf == "BICID" {
            self.bic = Some(text.to_string());
        }

        // Parties
        if in_seller && !in_line {
            match leaf {
                "Name" if parent == "SellerTradeParty" => {
                    self.seller_name = Some(text.to_string());
                }
                "ID" if parent == "SpecifiedTaxRegistration" => {
                    match self.current_scheme_id.take().as_deref() {
                        Some("FC") => self.seller_tax_number = Some(text.to_string()),
                        // VA and unlabelled registrations both read as VAT-ID
                        _ => self.seller_vat_id = Some(text.to_string()),
                    }
                }
                "LineOne" => self.seller_street = Some(text.to_string()),
                "PostcodeCode" => self.seller_postcode = Some(text.to_string()),
                "CityName" => self.seller_city = Some(text.to_string()),
                "CountryID" => self.seller_country = Some(text.to_string()),
                _ => {}
            }
        }
        if in_buyer && !in_line {
            match leaf {
                "Name" if parent == "BuyerTradeParty" => {
                    self.buyer_name = Some(text.to_string());
                }
                "LineOne" => self.buyer_street = Some(text.to_string()),
                "PostcodeCode" => self.buyer_postcode = Some(text.to_string()),
                "CityName" => self.buyer_city = Some(text.to_string()),
                "CountryID" => self.buyer_country = Some(text.to_string()),
                _ => {}
            }
        }

        // Header trade tax
        if path.iter().any(|p| p == "ApplicableTradeTax") && !in_line {
            match leaf {
                "CalculatedAmount" => self.vat_amount = Some(text.to_string()),
                "BasisAmount" => self.net_amount = Some(text.to_string()),
                "RateApplicablePercent" => self.vat_rate = Some(text.to_string()),
                _ => {}
            }
        }

        // Monetary summation
        if in_monetary {
            match leaf {
                "TaxBasisTotalAmount" => self.tax_basis_total = Some(text.to_string()),
                "TaxTotalAmount" => self.tax_total = Some(text.to_string()),
                "GrandTotalAmount" => self.grand_total = Some(text.to_string()),
                _ => {}
            }
        }

        // Lines
        if in_line {
            let line = self.current_line.get_or_insert_with(Default::default);
            match leaf {
                "LineID" => line.id = Some(text.to_string()),
                "Name" if parent == "SpecifiedTradeProduct" => {
                    line.name = Some(text.to_string());
                }
                "BilledQuantity" => {
                    line.quantity = Some(text.to_string());
                    line.unit = self.current_unit_code.take();
                }
                "ChargeAmount" if parent == "NetPriceProductTradePrice" => {
                    line.net_price = Some(text.to_string());
                }
                "LineTotalAmount" => line.line_total = Some(text.to_string()),
                _ => {}
            }
        }
    }

    fn into_record(self) -> InvoiceRecord {
        let seller_address = build_address(
            self.seller_street,
            self.seller_postcode,
            self.seller_city,
            self.seller_country,
        );
        let buyer_address = build_address(
            self.buyer_street,
            self.buyer_postcode,
            self.buyer_city,
            self.buyer_country,
        );

        let line_items: Vec<LineItem> = self
            .lines
            .into_iter()
            .map(|l| LineItem {
                position: l.id.as_deref().and_then(|s| s.trim().parse().ok()),
                description: l.name,
                quantity: l.quantity.as_deref().and_then(parse_amount),
                unit: l.unit,
                unit_price: None,
                unit_net_price: l.net_price.as_deref().and_then(parse_amount),
                line_total: None,
                line_net_total: l.line_total.as_deref().and_then(parse_amount),
            })
            .collect();

        InvoiceRecord {
            invoice_number: self.number,
            issue_date: self.issue_date.as_deref().and_then(parse_xml_date),
            due_date: self.due_date.as_deref().and_then(parse_xml_date),
            delivery_date: self.delivery_date.as_deref().and_then(parse_xml_date),
            seller_name: self.seller_name,
            seller_address,
            seller_tax_number: self.seller_tax_number,
            seller_vat_id: self.seller_vat_id,
            buyer_name: self.buyer_name,
            buyer_address,
            leitweg_id: self.buyer_reference,
            currency: self.currency,
            net_amount: self
                .tax_basis_total
                .or(self.net_amount)
                .as_deref()
                .and_then(parse_amount),
            vat_amount: self
                .tax_total
                .or(self.vat_amount)
                .as_deref()
                .and_then(parse_amount),
            vat_rate: self.vat_rate.as_deref().and_then(parse_amount),
            gross_amount: self.grand_total.as_deref().and_then(parse_amount),
            iban: self.iban,
            bic: self.bic,
            payment_terms_text: self.payment_terms.or(self.note),
            payment_due_days: None,
            payment_reference: self.payment_reference,
            line_items,
        }
    }
}

/// Assemble a decoded [`Address`]; `raw` is rebuilt from the structured
/// fields so downstream fallback rendering keeps working.
pub(super) fn build_address(
    street: Option<String>,
    postcode: Option<String>,
    city: Option<String>,
    country: Option<String>,
) -> Option<Address> {
    if street.is_none() && postcode.is_none() && city.is_none() && country.is_none() {
        return None;
    }
    let mut address = Address {
        street: street.unwrap_or_default(),
        postcode: postcode.unwrap_or_default(),
        city: city.unwrap_or_default(),
        country_code: country.unwrap_or_else(|| "DE".to_string()),
        country_name: String::new(),
        raw: String::new(),
    };
    address.raw = address.to_single_line();
    Some(address)
}
