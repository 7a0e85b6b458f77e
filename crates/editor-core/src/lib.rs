//! Editing engine for one PDF at a time: session lifecycle, command
//! dispatch and export.

pub mod commands;
pub mod export;
pub mod session;

pub use commands::{Command, CommandOutcome, Notice, NoticeLevel, UnknownCommand};
pub use export::{
    export_filename, export_pdf, DrawInstruction, ExportError, ExportProgress, ExportReport,
    ExportRequest, SkipReason, SkippedAnnotation, FALLBACK_COLOR,
};
pub use session::{EditorError, EditorSession, ExportOptions, ExportOutcome, LoadedDocument};
