//! Named intents invoked by keyboard shortcuts, toolbar buttons or the CLI.

use std::fmt;
use std::str::FromStr;

use crate::export::ExportReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Save,
    Undo,
    Redo,
    SelectTool,
    TextTool,
    ZoomIn,
    ZoomOut,
    NextPage,
    PrevPage,
    ToggleMode,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::Save,
        Command::Undo,
        Command::Redo,
        Command::SelectTool,
        Command::TextTool,
        Command::ZoomIn,
        Command::ZoomOut,
        Command::NextPage,
        Command::PrevPage,
        Command::ToggleMode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Save => "save",
            Command::Undo => "undo",
            Command::Redo => "redo",
            Command::SelectTool => "select-tool",
            Command::TextTool => "text-tool",
            Command::ZoomIn => "zoom-in",
            Command::ZoomOut => "zoom-out",
            Command::NextPage => "next-page",
            Command::PrevPage => "prev-page",
            Command::ToggleMode => "toggle-mode",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.name() == value)
            .ok_or_else(|| UnknownCommand(value.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub detail: Option<String>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into(), detail: None }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into(), detail: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into(), detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    pub notices: Vec<Notice>,
    /// Set when `save` produced a file.
    pub export: Option<ExportReport>,
    /// `save` with no annotations waits for the caller to confirm.
    pub needs_confirmation: bool,
}

impl CommandOutcome {
    pub(crate) fn notice(notice: Notice) -> Self {
        Self { notices: vec![notice], ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for command in Command::ALL {
            assert_eq!(command.to_string().parse::<Command>(), Ok(command));
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!("zoom".parse::<Command>(), Err(UnknownCommand("zoom".to_owned())));
        assert!("Save".parse::<Command>().is_err());
    }

    #[test]
    fn notice_display_includes_detail() {
        let notice = Notice::error("Failed to save PDF").with_detail("disk full");
        assert_eq!(notice.to_string(), "[error] Failed to save PDF: disk full");
        assert_eq!(Notice::info("Nothing to undo").to_string(), "[info] Nothing to undo");
    }
}
