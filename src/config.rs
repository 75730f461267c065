use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Emerald,
    Rose,
}

impl Theme {
    pub const ALL: [Theme; 4] = [Theme::Light, Theme::Dark, Theme::Emerald, Theme::Rose];

    pub fn next(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Emerald,
            Theme::Emerald => Theme::Rose,
            Theme::Rose => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Emerald => "emerald",
            Theme::Rose => "rose",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-local settings. Loaded once at start and handed to whatever
/// renders; written back whenever a value changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(skip)]
    path: PathBuf,
}

impl Preferences {
    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "suivi") {
            proj_dirs.config_dir().join("preferences.json")
        } else {
            PathBuf::from("suivi-preferences.json")
        }
    }

    /// Reads the stored preferences. A missing or unreadable file gives the
    /// defaults; it is never an error.
    pub fn load(path: &Path) -> Self {
        let theme = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Preferences>(&raw) {
                Ok(stored) => stored.theme,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable preferences");
                    Theme::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Theme::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read preferences");
                Theme::default()
            }
        };
        debug!(%theme, "preferences loaded");
        Self { theme, path: path.to_path_buf() }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write preferences to {}", self.path.display()))?;
        Ok(())
    }

    /// Changes the theme and persists it right away.
    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        if self.theme == theme {
            return Ok(());
        }
        self.theme = theme;
        self.save()
    }
}
