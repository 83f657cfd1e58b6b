use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;

use super::cii::{build_address, local_name, tax_category};
use super::xml_utils::{
    XmlResult, XmlWriter, format_amount, format_rate, parse_amount, parse_xml_date,
};
use super::{XRECHNUNG_GUIDELINE_ID, ubl_ns};
use crate::core::{Address, CodecError, DecodeError, InvoiceRecord, LineItem, NormalizedInvoice};

/// Generate XRechnung-compliant UBL 2.1 invoice XML.
///
/// Same canonical mapping as the CII encoder, same degradation rules for
/// missing data.
pub fn to_ubl_xml(invoice: &NormalizedInvoice, pretty: bool) -> XmlResult {
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
        "Invoice",
        &[
            ("xmlns", ubl_ns::INVOICE),
            ("xmlns:cac", ubl_ns::CAC),
            ("xmlns:cbc", ubl_ns::CBC),
        ],
    )?;

    // BT-24
    w.text_element("cbc:CustomizationID", XRECHNUNG_GUIDELINE_ID)?;
    // BT-1
    w.text_element("cbc:ID", record.invoice_number.as_deref().unwrap_or("UNKNOWN"))?;
    // BT-2: schema order requires IssueDate before type code
    let issue = record
        .issue_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    w.text_element("cbc:IssueDate", &issue.format("%Y-%m-%d").to_string())?;
    // BT-9
    if let Some(due) = &record.due_date {
        w.text_element("cbc:DueDate", &due.format("%Y-%m-%d").to_string())?;
    }
    // BT-3
    w.text_element("cbc:InvoiceTypeCode", "380")?;
    // BT-22
    if let Some(terms) = record.payment_terms_text.as_deref().filter(|t| !t.is_empty()) {
        w.text_element("cbc:Note", terms)?;
    }
    // BT-5
    w.text_element("cbc:DocumentCurrencyCode", currency)?;
    // BT-10
    if let Some(leitweg) = record.leitweg_id.as_deref().filter(|l| !l.is_empty()) {
        w.text_element("cbc:BuyerReference", leitweg)?;
    }

    // BG-4
    w.start_element("cac:AccountingSupplierParty")?;
    write_ubl_party(
        &mut w,
        record.seller_name.as_deref().unwrap_or("Unbekannter Aussteller"),
        &invoice.seller_address,
        record.seller_vat_id.as_deref(),
        record.seller_tax_number.as_deref(),
    )?;
    w.end_element("cac:AccountingSupplierParty")?;

    // BG-7
    w.start_element("cac:AccountingCustomerParty")?;
    write_ubl_party(
        &mut w,
        record.buyer_name.as_deref().unwrap_or("Unbekannter Empfänger"),
        &invoice.buyer_address,
        None,
        None,
    )?;
    w.end_element("cac:AccountingCustomerParty")?;

    // BT-72
    if let Some(delivery) = &record.delivery_date {
        w.start_element("cac:Delivery")?;
        w.text_element(
            "cbc:ActualDeliveryDate",
            &delivery.format("%Y-%m-%d").to_string(),
        )?;
        w.end_element("cac:Delivery")?;
    }

    // BG-16
    w.start_element("cac:PaymentMeans")?;
    let payment_ref = record
        .payment_reference
        .as_deref()
        .filter(|r| !r.is_empty())
        .or(record.invoice_number.as_deref());
    match record.iban.as_deref().filter(|i| !i.is_empty()) {
        Some(iban) => {
            w.text_element("cbc:PaymentMeansCode", "58")?;
            if let Some(pr) = payment_ref {
                w.text_element("cbc:PaymentID", pr)?;
            }
            w.start_element("cac:PayeeFinancialAccount")?;
            w.text_element("cbc:ID", &iban.replace(' ', ""))?;
            if let Some(bic) = record.bic.as_deref().filter(|b| !b.is_empty()) {
                w.start_element("cac:FinancialInstitutionBranch")?;
                w.text_element("cbc:ID", bic)?;
                w.end_element("cac:FinancialInstitutionBranch")?;
            }
            w.end_element("cac:PayeeFinancialAccount")?;
        }
        None => {
            w.text_element("cbc:PaymentMeansCode", "1")?;
            if let Some(pr) = payment_ref {
                w.text_element("cbc:PaymentID", pr)?;
            }
        }
    }
    w.end_element("cac:PaymentMeans")?;

    // BT-20
    if let Some(days) = record.payment_due_days.filter(|_| record.due_date.is_none()) {
        w.start_element("cac:PaymentTerms")?;
        w.text_element("cbc:Note", &format!("Zahlbar innerhalb von {days} Tagen"))?;
        w.end_element("cac:PaymentTerms")?;
    }

    // BG-22 / BG-23
    w.start_element("cac:TaxTotal")?;
    w.text_element_with_attrs(
        "cbc:TaxAmount",
        &format_amount(vat),
        &[("currencyID", currency)],
    )?;
    w.start_element("cac:TaxSubtotal")?;
    w.text_element_with_attrs(
        "cbc:TaxableAmount",
        &format_amount(net),
        &[("currencyID", currency)],
    )?;
    w.text_element_with_attrs(
        "cbc:TaxAmount",
        &format_amount(vat),
        &[("currencyID", currency)],
    )?;
    write_ubl_tax_category(&mut w, vat_rate)?;
    w.end_element("cac:TaxSubtotal")?;
    w.end_element("cac:TaxTotal")?;

    w.start_element("cac:LegalMonetaryTotal")?;
    w.text_element_with_attrs(
        "cbc:LineExtensionAmount",
        &format_amount(net),
        &[("currencyID", currency)],
    )?;
    w.text_element_with_attrs(
        "cbc:TaxExclusiveAmount",
        &format_amount(net),
        &[("currencyID", currency)],
    )?;
    w.text_element_with_attrs(
        "cbc:TaxInclusiveAmount",
        &format_amount(gross),
        &[("currencyID", currency)],
    )?;
    w.text_element_with_attrs(
        "cbc:PayableAmount",
        &format_amount(gross),
        &[("currencyID", currency)],
    )?;
    w.end_element("cac:LegalMonetaryTotal")?;

    // BG-25
    for line in &invoice.lines {
        w.start_element("cac:InvoiceLine")?;
        w.text_element("cbc:ID", &line.position.to_string())?;
        w.text_element_with_attrs(
            "cbc:InvoicedQuantity",
            &format_amount(line.quantity),
            &[("unitCode", line.unit.as_str())],
        )?;
        w.text_element_with_attrs(
            "cbc:LineExtensionAmount",
            &format_amount(line.line_net_total),
            &[("currencyID", currency)],
        )?;
        w.start_element("cac:Item")?;
        w.text_element("cbc:Name", &line.description)?;
        w.start_element("cac:ClassifiedTaxCategory")?;
        w.text_element("cbc:ID", tax_category(vat_rate))?;
        w.text_element("cbc:Percent", &format_rate(vat_rate))?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "VAT")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:ClassifiedTaxCategory")?;
        w.end_element("cac:Item")?;
        w.start_element("cac:Price")?;
        w.text_element_with_attrs(
            "cbc:PriceAmount",
            &format_amount(line.unit_net_price),
            &[("currencyID", currency)],
        )?;
        w.end_element("cac:Price")?;
        w.end_element("cac:InvoiceLine")?;
    }

    w.end_element("Invoice")?;
    w.into_string()
}

fn write_ubl_tax_category(w: &mut XmlWriter, vat_rate: Decimal) -> Result<(), CodecError> {
    w.start_element("cac:TaxCategory")?;
    w.text_element("cbc:ID", tax_category(vat_rate))?;
    w.text_element("cbc:Percent", &format_rate(vat_rate))?;
    w.start_element("cac:TaxScheme")?;
    w.text_element("cbc:ID", "VAT")?;
    w.end_element("cac:TaxScheme")?;
    w.end_element("cac:TaxCategory")?;
    Ok(())
}

fn write_ubl_party(
    w: &mut XmlWriter,
    name: &str,
    address: &Address,
    vat_id: Option<&str>,
    tax_number: Option<&str>,
) -> Result<(), CodecError> {
    // UBL Party order: PartyName → PostalAddress → PartyTaxScheme →
    // PartyLegalEntity
    w.start_element("cac:Party")?;

    w.start_element("cac:PartyName")?;
    w.text_element("cbc:Name", name)?;
    w.end_element("cac:PartyName")?;

    w.start_element("cac:PostalAddress")?;
    if !address.street.is_empty() {
        w.text_element("cbc:StreetName", &address.street)?;
    } else if !address.raw.is_empty() {
        w.text_element("cbc:StreetName", &address.raw)?;
    }
    if !address.city.is_empty() {
        w.text_element("cbc:CityName", &address.city)?;
    }
    if !address.postcode.is_empty() {
        w.text_element("cbc:PostalZone", &address.postcode)?;
    }
    let country = if address.country_code.is_empty() {
        "DE"
    } else {
        &address.country_code
    };
    w.start_element("cac:Country")?;
    w.text_element("cbc:IdentificationCode", country)?;
    w.end_element("cac:Country")?;
    w.end_element("cac:PostalAddress")?;

    // BT-31: scheme VAT; BT-32: scheme FC
    if let Some(vat_id) = vat_id.filter(|v| !v.is_empty()) {
        w.start_element("cac:PartyTaxScheme")?;
        w.text_element("cbc:CompanyID", vat_id)?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "VAT")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:PartyTaxScheme")?;
    }
    if let Some(tax_number) = tax_number.filter(|t| !t.is_empty()) {
        w.start_element("cac:PartyTaxScheme")?;
        w.text_element("cbc:CompanyID", tax_number)?;
        w.start_element("cac:TaxScheme")?;
        w.text_element("cbc:ID", "FC")?;
        w.end_element("cac:TaxScheme")?;
        w.end_element("cac:PartyTaxScheme")?;
    }

    w.start_element("cac:PartyLegalEntity")?;
    w.text_element("cbc:RegistrationName", name)?;
    w.end_element("cac:PartyLegalEntity")?;

    w.end_element("cac:Party")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse a UBL 2.1 invoice into the canonical record.
///
/// Namespace-tolerant like the CII parser; unknown elements are skipped.
pub fn from_ubl_xml(xml: &str) -> Result<InvoiceRecord, DecodeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = UblParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local = local_name(e.name().as_ref());
                if local == "InvoicedQuantity" {
                    for attr in e.attributes().flatten() {
                        if local_name(attr.key.as_ref()) == "unitCode" {
                            p.current_unit_code =
                                Some(String::from_utf8_lossy(&attr.value).into_owned());
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
                if ended == "InvoiceLine" {
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

#[derive(Default)]
struct UblParsed {
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
    tax_exclusive: Option<String>,
    tax_inclusive: Option<String>,

    lines: Vec<UblLine>,
    current_line: Option<UblLine>,

    // CompanyID precedes its TaxScheme/ID in document order
    pending_company_id: Option<String>,
    current_unit_code: Option<String>,
}

#[derive(Default, Clone)]
struct UblLine {
    id: Option<String>,
    name: Option<String>,
    quantity: Option<String>,
    unit: Option<String>,
    price: Option<String>,
    line_total: Option<String>,
}

impl UblParsed {
    fn handle_text(&mut self, path: &[String], text: &str) {
        let leaf = path.last().map(String::as_str).unwrap_or("");
        let parent = if path.len() >= 2 {
            path[path.len() - 2].as_str()
        } else {
            ""
        };

        let in_supplier = path.iter().any(|p| p == "AccountingSupplierParty");
        let in_customer = path.iter().any(|p| p == "AccountingCustomerParty");
        let in_line = path.iter().any(|p| p == "InvoiceLine");

        // Document level
        match leaf {
            "ID" if parent == "Invoice" || parent == "CreditNote" => {
                self.number = Some(text.to_string());
            }
            "IssueDate" => self.issue_date = Some(text.to_string()),
            "DueDate" => self.due_date = Some(text.to_string()),
            "ActualDeliveryDate" => self.delivery_date = Some(text.to_string()),
            "Note" if parent == "Invoice" || parent == "CreditNote" => {
                self.note = Some(text.to_string());
            }
            "Note" if parent == "PaymentTerms" => {
                self.payment_terms = Some(text.to_string());
            }
            "DocumentCurrencyCode" => self.currency = Some(text.to_string()),
            "BuyerReference" => self.buyer_reference = Some(text.to_string()),
            "PaymentID" => self.payment_reference = Some(text.to_string()),
            "ID" if parent == "PayeeFinancialAccount" => {
                self.iban = Some(text.to_string());
            }
            "ID" if parent == "FinancialInstitutionBranch" => {
                self.bic = Some(text.to_string());
            }
            _ => {}
        }

        // Parties
        if in_supplier && !in_line {
            match leaf {
                "Name" if parent == "PartyName" => {
                    self.seller_name = Some(text.to_string());
                }
                "RegistrationName" => {
                    if self.seller_name.is_none() {
                        self.seller_name = Some(text.to_string());
                    }
                }
                "CompanyID" if parent == "PartyTaxScheme" => {
                    self.pending_company_id = Some(text.to_string());
                }
                "ID" if parent == "TaxScheme" => {
                    if let Some(company_id) = self.pending_company_id.take() {
                        if text == "VAT" {
                            self.seller_vat_id = Some(company_id);
                        } else {
                            self.seller_tax_number = Some(company_id);
                        }
                    }
                }
                "StreetName" => self.seller_street = Some(text.to_string()),
                "PostalZone" => self.seller_postcode = Some(text.to_string()),
                "CityName" => self.seller_city = Some(text.to_string()),
                "IdentificationCode" => self.seller_country = Some(text.to_string()),
                _ => {}
            }
        }
        if in_customer && !in_line {
            match leaf {
                "Name" if parent == "PartyName" => {
                    self.buyer_name = Some(text.to_string());
                }
                "RegistrationName" => {
                    if self.buyer_name.is_none() {
                        self.buyer_name = Some(text.to_string());
                    }
                }
                "StreetName" => self.buyer_street = Some(text.to_string()),
                "PostalZone" => self.buyer_postcode = Some(text.to_string()),
                "CityName" => self.buyer_city = Some(text.to_string()),
                "IdentificationCode" => self.buyer_country = Some(text.to_string()),
                _ => {}
            }
        }

        // Header tax breakdown
        if path.iter().any(|p| p == "TaxSubtotal") && !in_line {
            match leaf {
                "TaxableAmount" => self.net_amount = Some(text.to_string()),
                "TaxAmount" if parent == "TaxSubtotal" => {
                    self.vat_amount = Some(text.to_string());
                }
                "Percent" => self.vat_rate = Some(text.to_string()),
                _ => {}
            }
        }

        if path.iter().any(|p| p == "LegalMonetaryTotal") {
            match leaf {
                "TaxExclusiveAmount" => self.tax_exclusive = Some(text.to_string()),
                "TaxInclusiveAmount" => self.tax_inclusive = Some(text.to_string()),
                "PayableAmount" => {
                    if self.tax_inclusive.is_none() {
                        self.tax_inclusive = Some(text.to_string());
                    }
                }
                _ => {}
            }
        }

        // Lines
        if in_line {
            let line = self.current_line.get_or_insert_with(Default::default);
            match leaf {
                "ID" if parent == "InvoiceLine" => line.id = Some(text.to_string()),
                "InvoicedQuantity" => {
                    line.quantity = Some(text.to_string());
                    line.unit = self.current_unit_code.take();
                }
                "LineExtensionAmount" if parent == "InvoiceLine" => {
                    line.line_total = Some(text.to_string());
                }
                "Name" if parent == "Item" => line.name = Some(text.to_string()),
                "PriceAmount" => line.price = Some(text.to_string()),
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
                unit_net_price: l.price.as_deref().and_then(parse_amount),
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
                .tax_exclusive
                .or(self.net_amount)
                .as_deref()
                .and_then(parse_amount),
            vat_amount: self.vat_amount.as_deref().and_then(parse_amount),
            vat_rate: self.vat_rate.as_deref().and_then(parse_amount),
            gross_amount: self.tax_inclusive.as_deref().and_then(parse_amount),
            iban: self.iban,
            bic: self.bic,
            payment_terms_text: self.payment_terms.or(self.note),
            payment_due_days: None,
            payment_reference: self.payment_reference,
            line_items,
        }
    }
}
