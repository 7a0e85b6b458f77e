//! Annotation editing model: annotations, coordinate transforms, undo
//! history and the view/tool state that sessions persist.

pub mod annotation;
pub mod history;
pub mod store;
pub mod transform;

use serde::{Deserialize, Serialize};

pub use annotation::{
    palette_color, Annotation, AnnotationDraft, AnnotationId, AnnotationPatch, Color,
    DEFAULT_COLOR, DEFAULT_FONT_SIZE, DEFAULT_TEXT, PALETTE,
};
pub use history::{History, HISTORY_DEPTH};
pub use store::{AnnotationStore, HistoryStep, Mutation, MutationOutcome, Snapshot};
pub use transform::{DocPoint, ScreenPoint, DEFAULT_SCALE, MAX_SCALE, MIN_SCALE, SCALE_STEP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Pen,
    Highlighter,
    Rectangle,
    Circle,
    Line,
    Text,
    Eraser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    #[default]
    Basic,
    Advanced,
}

impl EditMode {
    pub fn toggled(self) -> Self {
        match self {
            EditMode::Basic => EditMode::Advanced,
            EditMode::Advanced => EditMode::Basic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn name(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

/// Per-document view state that is persisted with the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub scale: f32,
    pub current_page: u32,
    pub active_tool: Tool,
    pub active_mode: EditMode,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            current_page: 1,
            active_tool: Tool::Select,
            active_mode: EditMode::Basic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewAction {
    ZoomIn,
    ZoomOut,
    /// Direct assignment, deliberately not clamped.
    SetScale(f32),
    NextPage,
    PreviousPage,
    GoToPage(u32),
    SetTool(Tool),
    ToggleMode,
}

/// Apply a view transition. Zoom and page navigation clamp at their bounds
/// instead of failing. Returns whether the state changed.
pub fn apply_view_action(state: &mut ViewState, action: ViewAction, page_count: u32) -> bool {
    let before = *state;
    match action {
        ViewAction::ZoomIn => state.scale = transform::zoom_in(state.scale),
        ViewAction::ZoomOut => state.scale = transform::zoom_out(state.scale),
        ViewAction::SetScale(scale) => state.scale = scale,
        ViewAction::NextPage => {
            if state.current_page < page_count {
                state.current_page += 1;
            }
        }
        ViewAction::PreviousPage => {
            if state.current_page > 1 {
                state.current_page -= 1;
            }
        }
        ViewAction::GoToPage(page) => state.current_page = page.max(1).min(page_count.max(1)),
        ViewAction::SetTool(tool) => state.active_tool = tool,
        ViewAction::ToggleMode => state.active_mode = state.active_mode.toggled(),
    }
    *state != before
}

/// User-tunable editor defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub default_font_size: f32,
    pub default_color: String,
    pub default_text: String,
    pub history_depth: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_font_size: DEFAULT_FONT_SIZE,
            default_color: DEFAULT_COLOR.to_owned(),
            default_text: DEFAULT_TEXT.to_owned(),
            history_depth: HISTORY_DEPTH,
        }
    }
}

impl Preferences {
    /// A draft at `position` using these defaults.
    pub fn draft(&self, page: u32, position: DocPoint) -> AnnotationDraft {
        AnnotationDraft::at(page, position)
            .with_text(self.default_text.clone())
            .with_font_size(self.default_font_size)
            .with_color(self.default_color.clone())
    }
}
