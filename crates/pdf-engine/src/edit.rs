//! Text burn-in over lopdf.
//!
//! Drawn text is buffered per page and written on [`EditableDocument::save`]:
//! the page's existing content is wrapped in `q`/`Q` so its graphics state
//! cannot leak into the appended overlay stream.

use doc_model::Color;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;

use crate::{
    inherited_attribute, load_unencrypted, page_size_of, resolve, PageSize, PdfEngineError,
};

const FONT_RESOURCE: &str = "AnnotHelv";

/// Where and how to draw one run of text, in PDF user space (bottom-left
/// origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: Color,
}

/// Loads documents for editing.
pub trait PdfMutator {
    type Document: EditableDocument;

    fn load(&self, bytes: &[u8]) -> Result<Self::Document, PdfEngineError>;
}

/// A loaded document that accepts text drawing. Page indices are 0-based.
pub trait EditableDocument {
    fn page_count(&self) -> u32;
    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError>;
    fn draw_text(
        &mut self,
        page_index: u32,
        text: &str,
        placement: TextPlacement,
    ) -> Result<(), PdfEngineError>;
    fn save(&mut self) -> Result<Vec<u8>, PdfEngineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfMutator;

impl PdfMutator for LopdfMutator {
    type Document = LopdfDocument;

    fn load(&self, bytes: &[u8]) -> Result<LopdfDocument, PdfEngineError> {
        LopdfDocument::from_bytes(bytes)
    }
}

#[derive(Debug)]
struct PendingPage {
    font_name: Vec<u8>,
    operations: Vec<Operation>,
}

#[derive(Debug)]
pub struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    font_id: Option<ObjectId>,
    pending: BTreeMap<ObjectId, PendingPage>,
}

impl LopdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        let doc = load_unencrypted(bytes)?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(Self { doc, pages, font_id: None, pending: BTreeMap::new() })
    }

    fn page_id(&self, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        self.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }

    fn font_id(&mut self) -> ObjectId {
        match self.font_id {
            Some(id) => id,
            None => {
                let id = self.doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                self.font_id = Some(id);
                id
            }
        }
    }

    /// Register the annotation font on the page and return its resource name.
    /// Inherited or referenced resources are copied onto the page so other
    /// pages sharing them are left untouched.
    fn register_font(&mut self, page_id: ObjectId) -> Result<Vec<u8>, PdfEngineError> {
        let font_id = self.font_id();

        let mut resources = inherited_attribute(&self.doc, page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);
        let mut fonts = resources
            .get(b"Font")
            .ok()
            .and_then(|obj| resolve(&self.doc, obj))
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);

        let font_name = free_font_name(&fonts, font_id);
        fonts.set(font_name.clone(), Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        self.doc.get_object_mut(page_id)?.as_dict_mut()?.set("Resources", resources);
        Ok(font_name)
    }

    fn pending_page(&mut self, page_id: ObjectId) -> Result<&mut PendingPage, PdfEngineError> {
        if !self.pending.contains_key(&page_id) {
            let font_name = self.register_font(page_id)?;
            self.pending.insert(page_id, PendingPage { font_name, operations: Vec::new() });
        }
        self.pending
            .get_mut(&page_id)
            .ok_or_else(|| PdfEngineError::Backend("pending page vanished".to_owned()))
    }

    fn add_stream(&mut self, content: Vec<u8>) -> Object {
        Object::Reference(self.doc.add_object(Stream::new(Dictionary::new(), content)))
    }
}

impl EditableDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError> {
        Ok(page_size_of(&self.doc, self.page_id(page_index)?))
    }

    fn draw_text(
        &mut self,
        page_index: u32,
        text: &str,
        placement: TextPlacement,
    ) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        let encoded = encode_win_ansi(text)?;
        let (r, g, b) = placement.color.to_normalized();

        let page = self.pending_page(page_id)?;
        page.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(page.font_name.clone()), placement.size.into()],
            ),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("Td", vec![placement.x.into(), placement.y.into()]),
            Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);

        Ok(())
    }

    fn save(&mut self) -> Result<Vec<u8>, PdfEngineError> {
        let pending = std::mem::take(&mut self.pending);

        for (page_id, page) in pending {
            let existing = self.doc.get_page_contents(page_id);
            let overlay = Content { operations: page.operations }.encode()?;

            let mut contents = Vec::with_capacity(existing.len() + 3);
            contents.push(self.add_stream(b"q\n".to_vec()));
            contents.extend(existing.into_iter().map(Object::Reference));
            contents.push(self.add_stream(b"\nQ\n".to_vec()));
            contents.push(self.add_stream(overlay));

            self.doc.get_object_mut(page_id)?.as_dict_mut()?.set("Contents", contents);
        }

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

fn free_font_name(fonts: &Dictionary, font_id: ObjectId) -> Vec<u8> {
    let mut candidate = FONT_RESOURCE.as_bytes().to_vec();
    let mut suffix = 1;
    loop {
        match fonts.get(&candidate) {
            Err(_) => return candidate,
            Ok(Object::Reference(id)) if *id == font_id => return candidate,
            Ok(_) => {
                candidate = format!("{FONT_RESOURCE}{suffix}").into_bytes();
                suffix += 1;
            }
        }
    }
}

/// Printable Latin-1 maps 1:1 onto WinAnsi; everything else is rejected.
fn encode_win_ansi(text: &str) -> Result<Vec<u8>, PdfEngineError> {
    text.chars()
        .map(|ch| match u32::from(ch) {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => Ok(code as u8),
            _ => Err(PdfEngineError::UnencodableText(ch)),
        })
        .collect()
}
