//! The editing session for one loaded document.
//!
//! `EditorSession` owns the annotation store, view state and persistence
//! handle. It is created when a document loads and dropped when it closes;
//! nothing here is global. Every change that touches annotations or view
//! state is mirrored to the key-value store before the call returns.

use chrono::{DateTime, Utc};
use doc_model::transform::to_document;
use doc_model::{
    apply_view_action, Annotation, AnnotationDraft, AnnotationId, AnnotationPatch,
    AnnotationStore, EditMode, HistoryStep, Preferences, ScreenPoint, Tool, ViewAction,
    ViewState,
};
use pdf_engine::{
    LopdfMutator, OpenSource, PdfEngine, PdfEngineError, PdfMutator, RenderRequest,
};
use storage::{DocumentIdentity, KeyValueStore, SessionSnapshot, SessionStore};

use crate::commands::{Command, CommandOutcome, Notice};
use crate::export::{export_pdf, ExportError, ExportProgress, ExportReport, ExportRequest};

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("{name} is not a valid PDF file")]
    NotPdf { name: String },
    #[error("failed to open PDF: {0}")]
    Engine(#[from] PdfEngineError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Source bytes of the document being edited, identified by name.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    identity: DocumentIdentity,
    bytes: Vec<u8>,
}

impl LoadedDocument {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, EditorError> {
        let name = name.into();
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(EditorError::NotPdf { name });
        }

        Ok(Self { identity: DocumentIdentity::new(name, bytes.len() as u64), bytes })
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Export even when there are no annotations, re-emitting the source.
    pub allow_unannotated: bool,
}

#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Exported(ExportReport),
    NeedsConfirmation,
}

pub struct EditorSession<S, M = LopdfMutator> {
    document: LoadedDocument,
    page_count: u32,
    store: AnnotationStore,
    view: ViewState,
    preferences: Preferences,
    persistence: SessionStore<S>,
    mutator: M,
    restored_from: Option<DateTime<Utc>>,
}

impl<S: KeyValueStore> EditorSession<S, LopdfMutator> {
    pub fn open(
        document: LoadedDocument,
        engine: &mut impl PdfEngine,
        persistence: SessionStore<S>,
    ) -> Result<Self, EditorError> {
        Self::open_with_mutator(document, engine, persistence, LopdfMutator)
    }
}

impl<S: KeyValueStore, M: PdfMutator> EditorSession<S, M> {
    /// Read the page count, restore any persisted session for this document
    /// name and record the document as recently opened.
    pub fn open_with_mutator(
        document: LoadedDocument,
        engine: &mut impl PdfEngine,
        persistence: SessionStore<S>,
        mutator: M,
    ) -> Result<Self, EditorError> {
        let handle = engine.open(OpenSource::Bytes(document.bytes.clone()))?;
        let page_count = engine.page_count(handle);
        if let Err(err) = engine.close(handle) {
            log::debug!("Closing probe handle failed: {err}");
        }
        let page_count = page_count?;

        let preferences = persistence.preferences();
        let mut session = Self {
            store: AnnotationStore::with_history_depth(preferences.history_depth),
            view: ViewState::default(),
            preferences,
            page_count,
            persistence,
            mutator,
            restored_from: None,
            document,
        };

        if let Some(snapshot) = session.persistence.load(session.document.name()) {
            session.store.restore(snapshot.annotations);
            session.view = snapshot.view;
            session.view.current_page = snapshot.view.current_page.clamp(1, page_count.max(1));
            session.restored_from = Some(snapshot.last_modified);
            log::info!(
                "Restored {} annotations for {}",
                session.store.len(),
                session.document.name()
            );
        }

        session.persist();
        Ok(session)
    }

    pub fn document(&self) -> &LoadedDocument {
        &self.document
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn persistence(&self) -> &SessionStore<S> {
        &self.persistence
    }

    /// When the restored session was last saved, if one was restored.
    pub fn restored_from(&self) -> Option<DateTime<Utc>> {
        self.restored_from
    }

    /// Notice shown after a session was recovered on open.
    pub fn restore_notice(&self) -> Option<Notice> {
        self.restored_from.map(|at| {
            Notice::success("Session restored")
                .with_detail(format!("Loaded from {}", at.format("%Y-%m-%d")))
        })
    }

    pub fn annotations(&self) -> &[Annotation] {
        self.store.all()
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.store.get(id)
    }

    pub fn annotations_on_current_page(&self) -> Vec<&Annotation> {
        self.store.list_by_page(self.view.current_page)
    }

    pub fn annotations_on_page(&self, page: u32) -> Vec<&Annotation> {
        self.store.list_by_page(page)
    }

    pub fn can_undo(&self) -> bool {
        self.store.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.store.can_redo()
    }

    /// Place a default annotation where the pointer landed on the current
    /// page. Only the text tool places annotations.
    pub fn place_annotation(
        &mut self,
        pointer: ScreenPoint,
        container_origin: ScreenPoint,
    ) -> Option<Annotation> {
        if self.view.active_tool != Tool::Text {
            return None;
        }

        let position = to_document(pointer, container_origin, self.view.scale);
        let draft = self.preferences.draft(self.view.current_page, position);
        Some(self.create_annotation(draft))
    }

    pub fn create_annotation(&mut self, draft: AnnotationDraft) -> Annotation {
        let annotation = self.store.create(draft);
        self.persist();
        annotation
    }

    /// `false` when `id` is unknown; nothing changes in that case.
    pub fn update_annotation(&mut self, id: AnnotationId, patch: AnnotationPatch) -> bool {
        let changed = self.store.update(id, patch);
        if changed {
            self.persist();
        }
        changed
    }

    pub fn delete_annotation(&mut self, id: AnnotationId) -> Option<Annotation> {
        let removed = self.store.delete(id);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    pub fn undo(&mut self) -> Notice {
        match self.store.undo() {
            HistoryStep::Applied => {
                self.persist();
                Notice::success("Undone")
            }
            _ => Notice::info("Nothing to undo"),
        }
    }

    pub fn redo(&mut self) -> Notice {
        match self.store.redo() {
            HistoryStep::Applied => {
                self.persist();
                Notice::success("Redone")
            }
            _ => Notice::info("Nothing to redo"),
        }
    }

    pub fn set_tool(&mut self, tool: Tool) -> bool {
        self.apply_view(ViewAction::SetTool(tool))
    }

    pub fn toggle_mode(&mut self) -> EditMode {
        self.apply_view(ViewAction::ToggleMode);
        self.view.active_mode
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.apply_view(ViewAction::ZoomIn);
        self.view.scale
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.apply_view(ViewAction::ZoomOut);
        self.view.scale
    }

    /// Direct assignment; not clamped.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        self.apply_view(ViewAction::SetScale(scale))
    }

    pub fn next_page(&mut self) -> u32 {
        self.apply_view(ViewAction::NextPage);
        self.view.current_page
    }

    pub fn prev_page(&mut self) -> u32 {
        self.apply_view(ViewAction::PreviousPage);
        self.view.current_page
    }

    pub fn go_to_page(&mut self, page: u32) -> u32 {
        self.apply_view(ViewAction::GoToPage(page));
        self.view.current_page
    }

    /// What the rendering collaborator should draw for the current view.
    pub fn render_request(&self) -> RenderRequest {
        RenderRequest {
            page_index: self.view.current_page.saturating_sub(1),
            scale: self.view.scale,
        }
    }

    /// Export the current annotations. Session state is never modified, so a
    /// failed export can simply be retried.
    pub fn export(
        &self,
        options: ExportOptions,
        progress: impl FnMut(ExportProgress),
    ) -> Result<ExportOutcome, EditorError> {
        if self.store.is_empty() && !options.allow_unannotated {
            return Ok(ExportOutcome::NeedsConfirmation);
        }

        let request = ExportRequest {
            source: self.document.bytes(),
            document_name: self.document.name(),
            annotations: self.store.snapshot(),
            page_count: self.page_count,
            timestamp: Utc::now(),
        };

        Ok(ExportOutcome::Exported(export_pdf(&self.mutator, request, progress)?))
    }

    pub fn dispatch(&mut self, command: Command) -> CommandOutcome {
        log::debug!("Dispatching {command}");
        match command {
            Command::Save => self.save_outcome(),
            Command::Undo => CommandOutcome::notice(self.undo()),
            Command::Redo => CommandOutcome::notice(self.redo()),
            Command::SelectTool => self.view_outcome(ViewAction::SetTool(Tool::Select)),
            Command::TextTool => self.view_outcome(ViewAction::SetTool(Tool::Text)),
            Command::ZoomIn => self.view_outcome(ViewAction::ZoomIn),
            Command::ZoomOut => self.view_outcome(ViewAction::ZoomOut),
            Command::NextPage => self.view_outcome(ViewAction::NextPage),
            Command::PrevPage => self.view_outcome(ViewAction::PreviousPage),
            Command::ToggleMode => self.view_outcome(ViewAction::ToggleMode),
        }
    }

    fn save_outcome(&self) -> CommandOutcome {
        match self.export(ExportOptions::default(), |_| {}) {
            Ok(ExportOutcome::NeedsConfirmation) => CommandOutcome {
                notices: vec![Notice::info(
                    "No annotations found. Confirm to save the original PDF anyway",
                )],
                needs_confirmation: true,
                ..CommandOutcome::default()
            },
            Ok(ExportOutcome::Exported(report)) => CommandOutcome {
                notices: vec![saved_notice(&report)],
                export: Some(report),
                ..CommandOutcome::default()
            },
            Err(err) => {
                log::error!("Export of {} failed: {err}", self.document.name());
                let notice = Notice::error("Failed to save PDF").with_detail(err.to_string());
                CommandOutcome::notice(notice)
            }
        }
    }

    fn view_outcome(&mut self, action: ViewAction) -> CommandOutcome {
        self.apply_view(action);
        CommandOutcome::default()
    }

    fn apply_view(&mut self, action: ViewAction) -> bool {
        let changed = apply_view_action(&mut self.view, action, self.page_count);
        if changed {
            self.persist();
        }
        changed
    }

    fn persist(&mut self) {
        let snapshot = SessionSnapshot::new(self.store.all().to_vec(), self.view);
        if let Err(err) = self.persistence.save(self.document.identity(), &snapshot) {
            log::warn!("Autosave for {} failed: {err}", self.document.name());
        }
    }
}

pub fn saved_notice(report: &ExportReport) -> Notice {
    Notice::success("PDF saved successfully")
        .with_detail(format!("{} annotations added, {}", report.drawn, report.filename))
}
