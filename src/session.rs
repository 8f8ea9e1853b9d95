//! The UI shell: which section is visible, theme, keyboard shortcuts.
//!
//! A [`Session`] wraps a [`Converter`] and derives the visible [`Section`]
//! from the converter's phase, so the four sections are mutually exclusive
//! by construction.
//!
//! | Shortcut | Action |
//! |----------|--------|
//! | `Escape` | dismiss the error section (ignored while converting) |
//! | `Ctrl+O` | open a file |
//! | `Ctrl+Shift+T` | toggle light/dark theme |

use crate::convert::Converter;
use crate::error::PdfPagesError;
use crate::output::ConversionOutput;
use crate::pipeline::input::UploadedFile;
use crate::state::ConverterPhase;
use crate::theme::{Theme, ThemeStore};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The one section of the page that is currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Upload,
    Progress,
    Results,
    Error,
}

impl Section {
    pub fn for_phase(phase: &ConverterPhase) -> Section {
        match phase {
            ConverterPhase::Idle => Section::Upload,
            ConverterPhase::Loading | ConverterPhase::Converting { .. } => Section::Progress,
            ConverterPhase::Results { .. } => Section::Results,
            ConverterPhase::Error { .. } => Section::Error,
        }
    }
}

// ── Shortcuts ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    /// A letter or digit, stored lowercase.
    Char(char),
}

/// A key plus modifiers, parsed from strings like `"ctrl+shift+t"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
    pub ctrl: bool,
    pub shift: bool,
    pub key: Key,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortcutParseError {
    #[error("empty shortcut")]
    Empty,
    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

impl FromStr for Shortcut {
    type Err = ShortcutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let mut parts: Vec<&str> = lower.split('+').map(str::trim).collect();
        let key_part = parts.pop().filter(|k| !k.is_empty()).ok_or(ShortcutParseError::Empty)?;

        let mut shortcut = Shortcut {
            ctrl: false,
            shift: false,
            key: Key::Escape,
        };
        for modifier in parts {
            match modifier {
                "ctrl" | "control" | "cmd" | "meta" => shortcut.ctrl = true,
                "shift" => shortcut.shift = true,
                other => return Err(ShortcutParseError::UnknownModifier(other.to_string())),
            }
        }

        shortcut.key = match key_part {
            "esc" | "escape" => Key::Escape,
            k => {
                let mut chars = k.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => Key::Char(c),
                    _ => return Err(ShortcutParseError::UnknownKey(k.to_string())),
                }
            }
        };
        Ok(shortcut)
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        match self.key {
            Key::Escape => f.write_str("Escape"),
            Key::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
        }
    }
}

/// What a shortcut asks the shell to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    DismissError,
    OpenFile,
    ToggleTheme,
}

impl ShortcutAction {
    /// The action bound to `shortcut`, if any.
    pub fn for_shortcut(shortcut: &Shortcut) -> Option<Self> {
        match (shortcut.ctrl, shortcut.shift, shortcut.key) {
            (false, false, Key::Escape) => Some(ShortcutAction::DismissError),
            (true, false, Key::Char('o')) => Some(ShortcutAction::OpenFile),
            (true, true, Key::Char('t')) => Some(ShortcutAction::ToggleTheme),
            _ => None,
        }
    }
}

/// Result of [`Session::handle_shortcut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutOutcome {
    /// Dismissed the error; the upload section is showing.
    ErrorDismissed,
    /// The shell should prompt for a file.
    OpenFileRequested,
    ThemeChanged(Theme),
    /// Not bound, or not applicable right now.
    Ignored,
}

// ── Session ──────────────────────────────────────────────────────────────

/// Headless counterpart of the converter page.
#[derive(Debug)]
pub struct Session {
    converter: Converter,
    theme_store: Option<ThemeStore>,
    theme: Theme,
}

impl Session {
    /// Create a session, reading the stored theme if there is a store.
    pub fn new(converter: Converter, theme_store: Option<ThemeStore>) -> Self {
        let theme = theme_store.as_ref().map(ThemeStore::load).unwrap_or_default();
        debug!("Session started with {} theme", theme);
        Self {
            converter,
            theme_store,
            theme,
        }
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn section(&self) -> Section {
        Section::for_phase(&self.converter.phase())
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Message shown in the error section, if it is visible.
    pub fn error_message(&self) -> Option<String> {
        match self.converter.phase() {
            ConverterPhase::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Flip the theme and persist it.
    ///
    /// The in-memory theme changes even if saving fails; the error is
    /// returned so the shell can mention it.
    pub fn toggle_theme(&mut self) -> Result<Theme, PdfPagesError> {
        self.theme = self.theme.toggled();
        info!("Theme → {}", self.theme);
        if let Some(store) = &self.theme_store {
            store.save(self.theme)?;
        }
        Ok(self.theme)
    }

    /// Start converting `file`. Previews from the previous run are
    /// released before the new run begins.
    pub async fn open(&self, file: &UploadedFile) -> Result<ConversionOutput, PdfPagesError> {
        self.converter.convert_file(file).await
    }

    /// Message the shell has to print for a failed [`Session::open`].
    ///
    /// Load and conversion failures are already in the error section, and
    /// cancellations are silent; anything else user-visible (validation
    /// errors) is returned here.
    pub fn failure_notice(&self, err: &PdfPagesError) -> Option<String> {
        if !err.is_user_visible() || self.error_message().is_some() {
            return None;
        }
        Some(err.to_string())
    }

    /// Hide the error section and go back to upload.
    ///
    /// Returns `false` when there is no error to dismiss or a conversion
    /// is running.
    pub fn dismiss_error(&self) -> bool {
        match self.converter.phase() {
            ConverterPhase::Error { .. } => {
                self.converter.reset();
                true
            }
            phase => {
                debug!("Nothing to dismiss while {}", phase);
                false
            }
        }
    }

    /// Cancel any run, release every preview and show the upload section.
    pub fn reset(&self) {
        self.converter.reset();
        let leftover = self.converter.previews().revoke_all();
        if leftover > 0 {
            warn!("Released {} preview handle(s) left after reset", leftover);
        }
    }

    pub fn handle_shortcut(&mut self, shortcut: &Shortcut) -> ShortcutOutcome {
        let Some(action) = ShortcutAction::for_shortcut(shortcut) else {
            return ShortcutOutcome::Ignored;
        };
        debug!("Shortcut {} → {:?}", shortcut, action);

        match action {
            ShortcutAction::DismissError => {
                if self.dismiss_error() {
                    ShortcutOutcome::ErrorDismissed
                } else {
                    ShortcutOutcome::Ignored
                }
            }
            ShortcutAction::OpenFile => ShortcutOutcome::OpenFileRequested,
            ShortcutAction::ToggleTheme => match self.toggle_theme() {
                Ok(theme) => ShortcutOutcome::ThemeChanged(theme),
                Err(e) => {
                    warn!("Could not save theme: {}", e);
                    ShortcutOutcome::ThemeChanged(self.theme)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chords_case_insensitively() {
        let s: Shortcut = "Ctrl+Shift+T".parse().unwrap();
        assert_eq!(
            s,
            Shortcut {
                ctrl: true,
                shift: true,
                key: Key::Char('t')
            }
        );
        assert_eq!("ESC".parse::<Shortcut>().unwrap().key, Key::Escape);
        assert_eq!(" ctrl + o ".parse::<Shortcut>().unwrap().to_string(), "Ctrl+O");
    }

    #[test]
    fn rejects_bad_chords() {
        assert_eq!("".parse::<Shortcut>(), Err(ShortcutParseError::Empty));
        assert!(matches!(
            "alt+x".parse::<Shortcut>(),
            Err(ShortcutParseError::UnknownModifier(_))
        ));
        assert!(matches!(
            "ctrl+enter".parse::<Shortcut>(),
            Err(ShortcutParseError::UnknownKey(_))
        ));
    }

    #[test]
    fn bindings() {
        let action = |s: &str| ShortcutAction::for_shortcut(&s.parse().unwrap());
        assert_eq!(action("escape"), Some(ShortcutAction::DismissError));
        assert_eq!(action("ctrl+o"), Some(ShortcutAction::OpenFile));
        assert_eq!(action("ctrl+shift+t"), Some(ShortcutAction::ToggleTheme));
        assert_eq!(action("ctrl+t"), None);
        assert_eq!(action("shift+o"), None);
    }

    #[test]
    fn sections_follow_phase() {
        assert_eq!(Section::for_phase(&ConverterPhase::Idle), Section::Upload);
        assert_eq!(
            Section::for_phase(&ConverterPhase::Converting { percent: 30.0 }),
            Section::Progress
        );
        assert_eq!(
            Section::for_phase(&ConverterPhase::Results { pages: 1 }),
            Section::Results
        );
        assert_eq!(
            Section::for_phase(&ConverterPhase::Error {
                message: "x".into()
            }),
            Section::Error
        );
    }
}
