//! Persisted light/dark theme preference.
//!
//! The preference is a small JSON file:
//!
//! ```json
//! { "theme": "dark" }
//! ```
//!
//! stored at `$PDFPAGES_CONFIG_DIR/preferences.json`, or under the platform
//! config directory (`~/.config/pdfpages/` on Linux) when the variable is
//! unset. A missing or unreadable file means [`Theme::Light`].

use crate::error::PdfPagesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the preferences directory.
pub const CONFIG_DIR_ENV: &str = "PDFPAGES_CONFIG_DIR";

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(default)]
    theme: Theme,
}

/// Reads and writes the preference file.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    /// Store backed by `dir/preferences.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(PREFERENCES_FILE),
        }
    }

    /// Store at the default location, or `None` if the platform has no
    /// config directory and no override is set.
    pub fn default_location() -> Option<Self> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Some(Self::in_dir(dir));
            }
        }
        dirs::config_dir().map(|d| Self::in_dir(d.join("pdfpages")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored theme, falling back to light.
    pub fn load(&self) -> Theme {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No theme preference at {}: {}", self.path.display(), e);
                return Theme::default();
            }
        };
        match serde_json::from_str::<Preferences>(&raw) {
            Ok(prefs) => prefs.theme,
            Err(e) => {
                debug!("Ignoring unreadable theme preference: {}", e);
                Theme::default()
            }
        }
    }

    /// Persist `theme`, replacing the file atomically.
    pub fn save(&self, theme: Theme) -> Result<(), PdfPagesError> {
        let write_err = |e: std::io::Error| PdfPagesError::OutputWriteFailed {
            path: self.path.clone(),
            source: e,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_err)?;
        let json = serde_json::to_string_pretty(&Preferences { theme })
            .map_err(|e| PdfPagesError::Internal(format!("serialise preferences: {}", e)))?;

        // Same directory as the target so the rename cannot cross filesystems.
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        debug!("Saved theme '{}' to {}", theme, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_light() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ThemeStore::in_dir(dir.path()).load(), Theme::Light);
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::in_dir(dir.path().join("nested"));
        store.save(Theme::Dark).unwrap();
        assert_eq!(store.load(), Theme::Dark);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"dark\""));
    }

    #[test]
    fn garbage_falls_back_to_light() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PREFERENCES_FILE), "{not json").unwrap();
        assert_eq!(ThemeStore::in_dir(dir.path()).load(), Theme::Light);
    }

    #[test]
    fn toggle_flips() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled().toggled(), Theme::Dark);
    }
}
