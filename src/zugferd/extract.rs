use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::core::CodecError;

/// Extract the embedded e-invoice XML from a hybrid PDF.
///
/// Looks for `factur-x.xml` (or `zugferd-invoice.xml` from older profiles)
/// among the PDF's embedded files, preferring the `EmbeddedFiles` name tree
/// over the catalog's `AF` array.
pub fn extract_from_pdf(pdf_bytes: &[u8]) -> Result<String, CodecError> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| CodecError::Pdf(format!("failed to load PDF: {e}")))?;

    let filespec = find_invoice_filespec(&doc)
        .ok_or_else(|| CodecError::Pdf("no ZUGFeRD/Factur-X XML found in PDF".to_string()))?;

    read_attached_xml(&doc, filespec)
}

fn find_invoice_filespec(doc: &Document) -> Option<&Dictionary> {
    if let Some(fs) = filespec_from_name_tree(doc) {
        debug!(lookup = "name-tree", "found embedded invoice filespec");
        return Some(fs);
    }
    if let Some(fs) = filespec_from_af_array(doc) {
        debug!(lookup = "af-array", "found embedded invoice filespec");
        return Some(fs);
    }
    debug!("no matching embedded file in name tree or AF array");
    None
}

fn filespec_from_name_tree(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.catalog().ok()?;
    let names = deref_dict(doc, catalog.get(b"Names").ok()?)?;
    let tree = deref_dict(doc, names.get(b"EmbeddedFiles").ok()?)?;
    let entries = tree.get(b"Names").ok()?.as_array().ok()?;

    // flat name tree: [name, filespec, name, filespec, ...]
    for pair in entries.chunks(2) {
        if let [name, spec] = pair {
            if text_of(name).is_some_and(|n| is_invoice_attachment(&n)) {
                if let Some(fs) = deref_dict(doc, spec) {
                    return Some(fs);
                }
            }
        }
    }
    None
}

fn filespec_from_af_array(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.catalog().ok()?;
    let af = catalog.get(b"AF").ok()?.as_array().ok()?;

    af.iter().filter_map(|obj| deref_dict(doc, obj)).find(|fs| {
        fs.get(b"UF")
            .or_else(|_| fs.get(b"F"))
            .ok()
            .and_then(text_of)
            .is_some_and(|n| is_invoice_attachment(&n))
    })
}

fn read_attached_xml(doc: &Document, filespec: &Dictionary) -> Result<String, CodecError> {
    let ef = filespec
        .get(b"EF")
        .ok()
        .and_then(|obj| deref_dict(doc, obj))
        .ok_or_else(|| CodecError::Pdf("filespec has no EF dictionary".to_string()))?;

    let stream = ef
        .get(b"F")
        .ok()
        .and_then(|obj| deref(doc, obj))
        .and_then(|obj| obj.as_stream().ok())
        .ok_or_else(|| CodecError::Pdf("embedded file stream is missing".to_string()))?;

    // decompressed_content() fails on streams without a Filter key, so
    // fall back to the raw bytes
    let bytes = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    String::from_utf8(bytes).map_err(|e| CodecError::Pdf(format!("attachment is not UTF-8: {e}")))
}

fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn deref_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match deref(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

fn text_of(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

fn is_invoice_attachment(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("factur-x") || lower.contains("zugferd")
}
