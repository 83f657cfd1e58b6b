use lopdf::{Document, Object, Stream, dictionary};
use tracing::warn;

use super::FACTURX_FILENAME;
use super::xmp;
use crate::core::CodecError;
use crate::xrechnung::validate_xrechnung;

/// Embed e-invoice XML into a PDF, producing a PDF/A-3 style hybrid.
///
/// Takes existing PDF bytes and the XML string to embed. Returns the
/// modified PDF bytes with the XML attached as `factur-x.xml`. The XML is
/// checked before embedding; findings are logged but never block the embed.
pub fn embed_in_pdf(pdf_bytes: &[u8], xml: &str) -> Result<Vec<u8>, CodecError> {
    let report = validate_xrechnung(xml);
    if !report.is_valid {
        warn!(issues = ?report.issues, "embedding XML that fails validation");
    }

    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| CodecError::Pdf(format!("failed to load PDF: {e}")))?;

    embed_xml_into_document(&mut doc, xml.as_bytes())?;

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| CodecError::Pdf(format!("failed to save PDF: {e}")))?;

    Ok(output)
}

fn embed_xml_into_document(doc: &mut Document, xml_bytes: &[u8]) -> Result<(), CodecError> {
    let ef_stream = Stream::new(
        dictionary! {
            "Type" => "EmbeddedFile",
            "Subtype" => Object::Name(b"text#2Fxml".to_vec()),
            "Params" => dictionary! {
                "Size" => Object::Integer(xml_bytes.len() as i64),
            },
        },
        xml_bytes.to_vec(),
    );
    let ef_stream_id = doc.add_object(ef_stream);

    // AFRelationship "Data": the attachment is machine-readable data
    // equivalent to the visible pages
    let filespec = dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(FACTURX_FILENAME),
        "UF" => Object::string_literal(FACTURX_FILENAME),
        "Desc" => Object::string_literal("Factur-X XML invoice"),
        "AFRelationship" => Object::Name(b"Data".to_vec()),
        "EF" => dictionary! {
            "F" => Object::Reference(ef_stream_id),
            "UF" => Object::Reference(ef_stream_id),
        },
    };
    let filespec_id = doc.add_object(filespec);

    let ef_name_tree = dictionary! {
        "Names" => Object::Array(vec![
            Object::string_literal(FACTURX_FILENAME),
            Object::Reference(filespec_id),
        ]),
    };
    let ef_name_tree_id = doc.add_object(ef_name_tree);

    let names_dict = dictionary! {
        "EmbeddedFiles" => Object::Reference(ef_name_tree_id),
    };
    let names_id = doc.add_object(names_dict);

    // XMP must stay uncompressed per PDF/A
    let xmp_bytes = xmp::build_xmp().into_bytes();
    let metadata_stream = Stream::new(
        dictionary! {
            "Type" => "Metadata",
            "Subtype" => "XML",
        },
        xmp_bytes,
    )
    .with_compression(false);
    let metadata_id = doc.add_object(metadata_stream);

    let catalog = doc
        .catalog_mut()
        .map_err(|e| CodecError::Pdf(format!("failed to get catalog: {e}")))?;

    catalog.set("AF", Object::Array(vec![Object::Reference(filespec_id)]));
    catalog.set("Names", Object::Reference(names_id));
    catalog.set("Metadata", Object::Reference(metadata_id));
    catalog.set(
        "MarkInfo",
        dictionary! { "Marked" => Object::Boolean(true) },
    );

    Ok(())
}
