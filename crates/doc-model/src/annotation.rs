//! Annotation data model
//!
//! Text annotations positioned in document coordinates: unscaled page units,
//! origin at the top-left of the page, y increasing downward.

use serde::{Deserialize, Serialize};

use crate::transform::DocPoint;

/// Unique identifier for an annotation
///
/// Stable for the lifetime of a session and persisted with it.
/// Generated using UUID v4.
pub type AnnotationId = uuid::Uuid;

pub const DEFAULT_FONT_SIZE: f32 = 14.0;
pub const DEFAULT_COLOR: &str = "#8B5CF6";
pub const DEFAULT_TEXT: &str = "Click to edit";

/// RGB color with 8-bit channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#RRGGBB` value. Anything else (missing marker, wrong length,
    /// non-hex digits) yields `None`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self { r: channel(0..2)?, g: channel(2..4)?, b: channel(4..6)? })
    }

    /// Convert to normalized RGB values (0.0 to 1.0)
    pub fn to_normalized(&self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }
}

/// Named annotation colors.
pub const PALETTE: [(&str, &str); 8] = [
    ("Ruby", "#ef4444"),
    ("Emerald", "#10b981"),
    ("Sapphire", "#3b82f6"),
    ("Amethyst", "#8b5cf6"),
    ("Amber", "#f59e0b"),
    ("Rose", "#ec4899"),
    ("Teal", "#14b8a6"),
    ("Orange", "#f97316"),
];

/// Hex value of the palette entry called `name`, ignoring case.
pub fn palette_color(name: &str) -> Option<&'static str> {
    PALETTE
        .iter()
        .find(|(entry, _)| entry.eq_ignore_ascii_case(name))
        .map(|&(_, value)| value)
}

/// A text annotation placed on one page of the document.
///
/// `page` is 1-based. `color` is kept as entered; it is only interpreted at
/// export time, where malformed values fall back to a fixed color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub page: u32,
    pub font_size: f32,
    pub color: String,
}

impl Annotation {
    pub fn position(&self) -> DocPoint {
        DocPoint::new(self.x, self.y)
    }

    /// True when there is nothing printable to export.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Everything needed to create an annotation except its id.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDraft {
    pub page: u32,
    pub position: DocPoint,
    pub text: String,
    pub font_size: f32,
    pub color: String,
}

impl AnnotationDraft {
    /// Draft with the stock placeholder text, size and color.
    pub fn at(page: u32, position: DocPoint) -> Self {
        Self {
            page,
            position,
            text: DEFAULT_TEXT.to_owned(),
            font_size: DEFAULT_FONT_SIZE,
            color: DEFAULT_COLOR.to_owned(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub(crate) fn into_annotation(self, id: AnnotationId) -> Annotation {
        Annotation {
            id,
            x: self.position.x,
            y: self.position.y,
            text: self.text,
            page: self.page,
            font_size: self.font_size,
            color: self.color,
        }
    }
}

/// Partial update merged into an existing annotation. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub text: Option<String>,
    pub page: Option<u32>,
    pub font_size: Option<f32>,
    pub color: Option<String>,
}

impl AnnotationPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn color(color: impl Into<String>) -> Self {
        Self { color: Some(color.into()), ..Self::default() }
    }

    pub fn position(position: DocPoint) -> Self {
        Self { x: Some(position.x), y: Some(position.y), ..Self::default() }
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = Some(font_size);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, annotation: &mut Annotation) {
        if let Some(x) = self.x {
            annotation.x = x;
        }
        if let Some(y) = self.y {
            annotation.y = y;
        }
        if let Some(text) = &self.text {
            annotation.text.clone_from(text);
        }
        if let Some(page) = self.page {
            annotation.page = page;
        }
        if let Some(font_size) = self.font_size {
            annotation.font_size = font_size;
        }
        if let Some(color) = &self.color {
            annotation.color.clone_from(color);
        }
    }
}
