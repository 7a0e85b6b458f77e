//! Burn annotations into a copy of the source PDF.
//!
//! Export is all-or-nothing at the document level (load and save) and
//! best-effort per annotation: an annotation that cannot be drawn is
//! recorded as skipped and the rest still go through.

use chrono::{DateTime, Utc};
use doc_model::{Annotation, AnnotationId, Color, Snapshot};
use pdf_engine::{EditableDocument, PdfEngineError, PdfMutator, TextPlacement};
use std::fmt;

pub const MIN_EXPORT_FONT_SIZE: f32 = 8.0;
pub const MAX_EXPORT_FONT_SIZE: f32 = 72.0;

/// Used when an annotation's color does not parse; roughly (0.545, 0.361, 0.961).
pub const FALLBACK_COLOR: Color = Color::rgb(139, 92, 245);

const DRAWING_PERCENT: usize = 90;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to load PDF for export: {0}")]
    Load(#[source] PdfEngineError),
    #[error("failed to serialize edited PDF: {0}")]
    Save(#[source] PdfEngineError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    EmptyText,
    PageOutOfRange { page_count: u32 },
    DrawFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyText => f.write_str("empty text"),
            SkipReason::PageOutOfRange { page_count } => {
                write!(f, "page outside 1..={page_count}")
            }
            SkipReason::DrawFailed(reason) => write!(f, "draw failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedAnnotation {
    pub id: AnnotationId,
    pub page: u32,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportProgress {
    /// One validated annotation handled (drawn or skipped).
    Drawing { completed: usize, total: usize, percent: u8 },
    Finalizing,
    Complete,
}

impl ExportProgress {
    pub fn percent(&self) -> u8 {
        match self {
            ExportProgress::Drawing { percent, .. } => *percent,
            ExportProgress::Finalizing => DRAWING_PERCENT as u8,
            ExportProgress::Complete => 100,
        }
    }
}

/// What to export. `annotations` is captured up front so later edits cannot
/// change an export that is already running.
#[derive(Debug, Clone)]
pub struct ExportRequest<'a> {
    pub source: &'a [u8],
    pub document_name: &'a str,
    pub annotations: Snapshot,
    pub page_count: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub drawn: usize,
    pub skipped: Vec<SkippedAnnotation>,
}

/// A validated annotation mapped to PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    pub page_index: u32,
    pub text: String,
    pub placement: TextPlacement,
}

impl DrawInstruction {
    /// Flip from top-left document coordinates to the PDF's bottom-left
    /// origin, keeping the text on the page.
    pub fn for_annotation(annotation: &Annotation, page_height: f32) -> Self {
        let size = if annotation.font_size.is_finite() {
            annotation.font_size.clamp(MIN_EXPORT_FONT_SIZE, MAX_EXPORT_FONT_SIZE)
        } else {
            doc_model::DEFAULT_FONT_SIZE
        };

        Self {
            page_index: annotation.page.saturating_sub(1),
            text: annotation.text.clone(),
            placement: TextPlacement {
                x: annotation.x.max(0.0),
                y: (page_height - annotation.y - annotation.font_size).max(0.0),
                size,
                color: export_color(&annotation.color),
            },
        }
    }
}

pub fn export_color(value: &str) -> Color {
    Color::parse_hex(value).unwrap_or_else(|| {
        log::debug!("Invalid annotation color {value:?}, using fallback");
        FALLBACK_COLOR
    })
}

/// Split annotations into drawable ones and those dropped up front.
pub fn validate(
    annotations: &[Annotation],
    page_count: u32,
) -> (Vec<&Annotation>, Vec<SkippedAnnotation>) {
    let mut valid = Vec::with_capacity(annotations.len());
    let mut skipped = Vec::new();

    for annotation in annotations {
        let reason = if annotation.is_blank() {
            Some(SkipReason::EmptyText)
        } else if annotation.page < 1 || annotation.page > page_count {
            Some(SkipReason::PageOutOfRange { page_count })
        } else {
            None
        };

        match reason {
            Some(reason) => {
                log::warn!(
                    "Skipping annotation {} on page {}: {reason}",
                    annotation.id,
                    annotation.page
                );
                skipped.push(SkippedAnnotation {
                    id: annotation.id,
                    page: annotation.page,
                    reason,
                });
            }
            None => valid.push(annotation),
        }
    }

    (valid, skipped)
}

/// `<name without .pdf>_edited_<YYYY-MM-DDTHH-MM-SS>.pdf`
pub fn export_filename(document_name: &str, timestamp: DateTime<Utc>) -> String {
    let stem = document_name.strip_suffix(".pdf").unwrap_or(document_name);
    let stem = if stem.is_empty() { "document" } else { stem };

    format!("{stem}_edited_{}.pdf", timestamp.format("%Y-%m-%dT%H-%M-%S"))
}

pub fn export_pdf<M: PdfMutator>(
    mutator: &M,
    request: ExportRequest<'_>,
    mut progress: impl FnMut(ExportProgress),
) -> Result<ExportReport, ExportError> {
    let (valid, mut skipped) = validate(&request.annotations, request.page_count);
    let mut document = mutator.load(request.source).map_err(ExportError::Load)?;

    let total = valid.len();
    let mut drawn = 0;
    for (index, annotation) in valid.into_iter().enumerate() {
        match draw_one(&mut document, annotation) {
            Ok(()) => drawn += 1,
            Err(err) => {
                log::error!("Error drawing annotation {}: {err}", annotation.id);
                skipped.push(SkippedAnnotation {
                    id: annotation.id,
                    page: annotation.page,
                    reason: SkipReason::DrawFailed(err.to_string()),
                });
            }
        }

        let completed = index + 1;
        let percent = (completed * DRAWING_PERCENT + total / 2) / total;
        progress(ExportProgress::Drawing { completed, total, percent: percent as u8 });
    }

    progress(ExportProgress::Finalizing);
    let bytes = document.save().map_err(ExportError::Save)?;
    progress(ExportProgress::Complete);

    let filename = export_filename(request.document_name, request.timestamp);
    log::info!("Exported {filename}: {drawn} drawn, {} skipped", skipped.len());

    Ok(ExportReport { bytes, filename, drawn, skipped })
}

fn draw_one<D: EditableDocument>(
    document: &mut D,
    annotation: &Annotation,
) -> Result<(), PdfEngineError> {
    let page_index = annotation.page.saturating_sub(1);
    let page_size = document.page_size(page_index)?;
    let instruction = DrawInstruction::for_annotation(annotation, page_size.height_pt);

    document.draw_text(instruction.page_index, &instruction.text, instruction.placement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use doc_model::{AnnotationDraft, AnnotationStore, DocPoint};
    use lopdf::content::{Content, Operation};
    use lopdf::Document;
    use pdf_engine::{fixtures, LopdfMutator, PageSize};
    use std::sync::Arc;

    fn annotation(text: &str, page: u32) -> Annotation {
        let mut store = AnnotationStore::new();
        store.create(AnnotationDraft::at(page, DocPoint::new(72.0, 100.0)).with_text(text))
    }

    fn request<'a>(source: &'a [u8], annotations: Vec<Annotation>) -> ExportRequest<'a> {
        ExportRequest {
            source,
            document_name: "report.pdf",
            annotations: Arc::from(annotations),
            page_count: 2,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).single().expect("valid time"),
        }
    }

    fn shown_text(bytes: &[u8], page_number: u32) -> Vec<String> {
        let doc = Document::load_mem(bytes).expect("exported PDF should parse");
        let page_id = doc.get_pages()[&page_number];
        let content = doc.get_page_content(page_id).expect("page content");
        Content::decode(&content)
            .expect("content should decode")
            .operations
            .iter()
            .filter(|op: &&Operation| op.operator == "Tj")
            .filter_map(|op| op.operands.first()?.as_str().ok())
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }

    #[test]
    fn drops_invalid_annotations_and_draws_the_rest() {
        let source = fixtures::blank_pdf(2, 612.0, 792.0);
        let empty = annotation("", 1);
        let hi = annotation("Hi", 1);
        let far = annotation("X", 99);

        let report = export_pdf(
            &LopdfMutator,
            request(&source, vec![empty.clone(), hi, far.clone()]),
            |_| {},
        )
        .expect("export should succeed");

        assert_eq!(report.drawn, 1);
        assert_eq!(
            report.skipped,
            vec![
                SkippedAnnotation { id: empty.id, page: 1, reason: SkipReason::EmptyText },
                SkippedAnnotation {
                    id: far.id,
                    page: 99,
                    reason: SkipReason::PageOutOfRange { page_count: 2 }
                },
            ]
        );
        assert_eq!(shown_text(&report.bytes, 1), vec!["Page 1", "Hi"]);
        assert_eq!(shown_text(&report.bytes, 2), vec!["Page 2"]);
    }

    #[test]
    fn whitespace_only_text_is_skipped() {
        let annotations = [annotation("  \t ", 1)];
        let (valid, skipped) = validate(&annotations, 1);
        assert!(valid.is_empty());
        assert_eq!(skipped[0].reason, SkipReason::EmptyText);
    }

    #[test]
    fn invalid_color_uses_fallback() {
        let mut bad = annotation("Hi", 1);
        bad.color = "notacolor".to_owned();

        let instruction = DrawInstruction::for_annotation(&bad, 792.0);
        assert_eq!(instruction.placement.color, FALLBACK_COLOR);

        let (r, g, b) = FALLBACK_COLOR.to_normalized();
        assert!((r - 0.545).abs() < 0.005);
        assert!((g - 0.361).abs() < 0.005);
        assert!((b - 0.961).abs() < 0.005);

        let source = fixtures::blank_pdf(2, 612.0, 792.0);
        let report =
            export_pdf(&LopdfMutator, request(&source, vec![bad]), |_| {}).expect("export");
        assert_eq!(report.drawn, 1);
    }

    #[test]
    fn draw_position_flips_and_clamps() {
        let mut item = annotation("Hi", 1);
        item.x = -5.0;
        item.y = 100.0;
        item.font_size = 14.0;

        let placement = DrawInstruction::for_annotation(&item, 792.0).placement;
        assert_eq!(placement.x, 0.0);
        assert_eq!(placement.y, 678.0);
        assert_eq!(placement.size, 14.0);

        item.y = 790.0;
        assert_eq!(DrawInstruction::for_annotation(&item, 792.0).placement.y, 0.0);
    }

    #[test]
    fn font_size_is_clamped_for_export() {
        let mut item = annotation("Hi", 1);

        item.font_size = 2.0;
        assert_eq!(DrawInstruction::for_annotation(&item, 792.0).placement.size, 8.0);
        item.font_size = 200.0;
        assert_eq!(DrawInstruction::for_annotation(&item, 792.0).placement.size, 72.0);
    }

    #[test]
    fn unencodable_text_is_skipped_without_failing_export() {
        let source = fixtures::blank_pdf(2, 612.0, 792.0);
        let emoji = annotation("hello ✓", 1);
        let ok = annotation("fine", 2);

        let report = export_pdf(&LopdfMutator, request(&source, vec![emoji.clone(), ok]), |_| {})
            .expect("export should succeed");

        assert_eq!(report.drawn, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, emoji.id);
        assert!(matches!(report.skipped[0].reason, SkipReason::DrawFailed(_)));
        assert_eq!(shown_text(&report.bytes, 2), vec!["Page 2", "fine"]);
    }

    #[test]
    fn zero_annotations_re_emit_the_source() {
        let source = fixtures::blank_pdf(2, 612.0, 792.0);
        let report = export_pdf(&LopdfMutator, request(&source, Vec::new()), |_| {})
            .expect("export should succeed");

        assert_eq!(report.drawn, 0);
        assert_eq!(shown_text(&report.bytes, 1), vec!["Page 1"]);
    }

    #[test]
    fn unreadable_source_fails_the_whole_export() {
        let err = export_pdf(&LopdfMutator, request(b"garbage", vec![annotation("Hi", 1)]), |_| {})
            .expect_err("load must fail");

        assert!(matches!(err, ExportError::Load(_)));
    }

    #[test]
    fn progress_runs_to_ninety_then_finalizes() {
        let source = fixtures::blank_pdf(2, 612.0, 792.0);
        let items = vec![annotation("a", 1), annotation("b", 1), annotation("c", 2)];

        let mut events = Vec::new();
        export_pdf(&LopdfMutator, request(&source, items), |event| events.push(event))
            .expect("export should succeed");

        let percents: Vec<u8> = events.iter().map(ExportProgress::percent).collect();
        assert_eq!(percents, vec![30, 60, 90, 90, 100]);
        assert_eq!(events[3], ExportProgress::Finalizing);
        assert_eq!(events[4], ExportProgress::Complete);
    }

    #[test]
    fn filename_strips_extension_and_uses_dashed_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).single().expect("valid time");

        assert_eq!(export_filename("report.pdf", at), "report_edited_2024-03-05T14-07-09.pdf");
        assert_eq!(export_filename("notes.PDF", at), "notes.PDF_edited_2024-03-05T14-07-09.pdf");
        assert_eq!(export_filename("", at), "document_edited_2024-03-05T14-07-09.pdf");
        assert_eq!(export_filename(".pdf", at), "document_edited_2024-03-05T14-07-09.pdf");
    }

    struct FailingSave;

    struct FailingDocument;

    impl EditableDocument for FailingDocument {
        fn page_count(&self) -> u32 {
            2
        }

        fn page_size(&self, _page_index: u32) -> Result<PageSize, PdfEngineError> {
            Ok(PageSize { width_pt: 100.0, height_pt: 100.0 })
        }

        fn draw_text(
            &mut self,
            _page_index: u32,
            _text: &str,
            _placement: TextPlacement,
        ) -> Result<(), PdfEngineError> {
            Ok(())
        }

        fn save(&mut self) -> Result<Vec<u8>, PdfEngineError> {
            Err(PdfEngineError::Backend("disk full".to_owned()))
        }
    }

    impl PdfMutator for FailingSave {
        type Document = FailingDocument;

        fn load(&self, _bytes: &[u8]) -> Result<FailingDocument, PdfEngineError> {
            Ok(FailingDocument)
        }
    }

    #[test]
    fn serialization_failure_fails_the_whole_export() {
        let err = export_pdf(&FailingSave, request(b"", vec![annotation("Hi", 1)]), |_| {})
            .expect_err("save must fail");

        assert!(matches!(err, ExportError::Save(PdfEngineError::Backend(_))));
    }
}
