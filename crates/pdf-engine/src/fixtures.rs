//! In-memory PDFs for tests.
//!
//! Each page shows `Page N` in Helvetica under the resource name `F1`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// A PDF with `page_count` pages, each carrying its own `MediaBox` and
/// `Resources`.
pub fn blank_pdf(page_count: u32, width: f32, height: f32) -> Vec<u8> {
    serialize(build(page_count, width, height, false))
}

/// Like [`blank_pdf`], but `MediaBox` and `Resources` live on the page tree
/// root and are inherited by every page.
pub fn inherited_attributes_pdf(page_count: u32, width: f32, height: f32) -> Vec<u8> {
    serialize(build(page_count, width, height, true))
}

/// A one-page PDF whose trailer names a standard security handler. The
/// objects themselves are left in the clear.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut doc = build(1, 612.0, 792.0, false);
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "P" => -4,
        "O" => Object::string_literal(vec![0u8; 32]),
        "U" => Object::string_literal(vec![0u8; 32]),
    });
    doc.trailer.set("Encrypt", encrypt_id);
    serialize(doc)
}

fn serialize(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture PDF should serialize");
    bytes
}

fn build(page_count: u32, width: f32, height: f32, inherit: bool) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources = || dictionary! { "Font" => dictionary! { "F1" => font_id } };
    let media_box = || -> Object {
        vec![Object::Integer(0), Object::Integer(0), width.into(), height.into()].into()
    };

    let kids: Vec<Object> = (1..=page_count)
        .map(|number| {
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                page_label(number).encode().expect("fixture content should encode"),
            ));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if !inherit {
                page.set("MediaBox", media_box());
                page.set("Resources", resources());
            }
            Object::Reference(doc.add_object(page))
        })
        .collect();

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => i64::from(page_count),
    };
    if inherit {
        pages.set("MediaBox", media_box());
        pages.set("Resources", resources());
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id: ObjectId = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn page_label(number: u32) -> Content {
    Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
            Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
            Operation::new("Tj", vec![Object::string_literal(format!("Page {number}"))]),
            Operation::new("ET", vec![]),
        ],
    }
}
