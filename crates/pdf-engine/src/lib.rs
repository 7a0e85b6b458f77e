//! PDF collaborators backed by `lopdf`.
//!
//! [`PdfEngine`] is the read-only side: page geometry and preview rasters.
//! The write side lives in [`edit`].

use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub mod edit;
#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;

pub use edit::{EditableDocument, LopdfDocument, LopdfMutator, PdfMutator, TextPlacement};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// US Letter, used when a page carries no readable `MediaBox`.
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

// Bounds the `Parent` walk on malformed page trees.
const MAX_TREE_DEPTH: usize = 32;

const THUMBNAIL_SCALE: f32 = 0.25;
const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const EDGE: Rgba<u8> = Rgba([214, 214, 220, 255]);
const GUIDE: Rgba<u8> = Rgba([238, 238, 244, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// Raster dimensions at `scale`, never smaller than one pixel.
    pub fn pixels_at(self, scale: f32) -> (u32, u32) {
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        let px = |pt: f32| (pt * scale).round().max(1.0) as u32;
        (px(self.width_pt), px(self.height_pt))
    }
}

/// Zero-based page and zoom factor for a page raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("document has no pages")]
    NoPages,
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("character {0:?} cannot be encoded with the standard font")]
    UnencodableText(char),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Read-only rendering collaborator.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(&self, handle: DocumentHandle, page_index: u32)
        -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

/// Parse `bytes`, refusing documents whose trailer names a security handler.
pub(crate) fn load_unencrypted(bytes: &[u8]) -> Result<Document, PdfEngineError> {
    let doc = Document::load_mem(bytes)?;
    if doc.trailer.has(b"Encrypt") {
        return Err(PdfEngineError::EncryptedUnsupported);
    }
    Ok(doc)
}

pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, following `Parent` links for inheritable keys
/// such as `MediaBox` and `Resources`.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn page_size_of(doc: &Document, page_id: ObjectId) -> PageSize {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let mut coords = [0.0f32; 4];
            for (slot, value) in coords.iter_mut().zip(array) {
                *slot = resolve(doc, value)?.as_float().ok()?;
            }
            let [x0, y0, x1, y1] = coords;
            Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
        })
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// Blank sheet with a one-pixel edge and faint ruled lines every 24pt.
fn placeholder_sheet(width: u32, height: u32, scale: f32) -> RgbaImage {
    let spacing = ((24.0 * scale).round() as u32).max(4);
    RgbaImage::from_fn(width, height, |x, y| {
        let on_edge = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
        if width >= 4 && height >= 4 && on_edge {
            EDGE
        } else if y > 0 && y % spacing == 0 {
            GUIDE
        } else {
            PAPER
        }
    })
}

/// Geometry-only engine: pages are parsed for their sizes and rendered as
/// placeholder sheets.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    pages: HashMap<DocumentHandle, Vec<PageSize>>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn sizes(&self, handle: DocumentHandle) -> Result<&[PageSize], PdfEngineError> {
        self.pages
            .get(&handle)
            .map(Vec::as_slice)
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };
        let doc = load_unencrypted(&bytes)?;
        let sizes: Vec<PageSize> =
            doc.get_pages().into_values().map(|page_id| page_size_of(&doc, page_id)).collect();
        if sizes.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        log::debug!("Opened document {} with {} pages", handle.raw(), sizes.len());
        self.pages.insert(handle, sizes);
        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.sizes(handle)?.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let sizes = self.sizes(handle)?;
        sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let (width, height) = self.page_size(handle, request.page_index)?.pixels_at(request.scale);
        Ok(placeholder_sheet(width, height, request.scale))
    }

    fn render_thumbnail(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        target: ThumbnailSize,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = self.render_page(handle, RenderRequest { page_index, scale: THUMBNAIL_SCALE })?;
        Ok(image::imageops::thumbnail(&page, target.width_px.max(1), target.height_px.max(1)))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        match self.pages.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(PdfEngineError::InvalidHandle(handle.raw())),
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
