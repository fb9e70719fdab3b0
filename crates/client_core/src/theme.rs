use std::fmt;

use storage::Storage;
use tracing::debug;

use crate::error::ClientError;

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Anything other than `"dark"` reads as light.
    pub fn parse_stored(value: &str) -> Self {
        if value == "dark" {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// The class put on the root document element for this mode.
    pub fn document_class(&self) -> Option<&'static str> {
        match self {
            Theme::Dark => Some("dark"),
            Theme::Light => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct ThemeStore {
    storage: Storage,
}

impl ThemeStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub async fn current(&self) -> Result<Theme, ClientError> {
        let stored = self
            .storage
            .get(THEME_KEY)
            .await
            .map_err(ClientError::Preferences)?;
        Ok(stored.as_deref().map(Theme::parse_stored).unwrap_or_default())
    }

    pub async fn set(&self, theme: Theme) -> Result<(), ClientError> {
        self.storage
            .set(THEME_KEY, theme.as_str())
            .await
            .map_err(ClientError::Preferences)
    }

    /// Persists and returns the opposite of the stored theme.
    pub async fn toggle(&self) -> Result<Theme, ClientError> {
        let next = self.current().await?.flipped();
        self.set(next).await?;
        debug!(theme = %next, "theme: toggled");
        Ok(next)
    }
}

#[cfg(test)]
#[path = "tests/theme_tests.rs"]
mod tests;
