use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use client_core::ProfileFallback;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "admin.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    pub anon_key: String,
    pub database_url: String,
    pub profile_fallback: ProfileFallback,
    pub http_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:54321".into(),
            anon_key: String::new(),
            database_url: "sqlite://./data/admin.db".into(),
            profile_fallback: ProfileFallback::default(),
            http_timeout_seconds: 30,
        }
    }
}

impl Settings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds.max(1))
    }
}

/// Every key is optional; missing keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    backend_url: Option<String>,
    anon_key: Option<String>,
    database_url: Option<String>,
    profile_fallback: Option<ProfileFallback>,
    http_timeout_seconds: Option<u64>,
}

/// Defaults, then `path` (when it exists), then the process environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
    }
    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file.backend_url {
        settings.backend_url = v;
    }
    if let Some(v) = file.anon_key {
        settings.anon_key = v;
    }
    if let Some(v) = file.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file.profile_fallback {
        settings.profile_fallback = v;
    }
    if let Some(v) = file.http_timeout_seconds {
        settings.http_timeout_seconds = v;
    }
    Ok(())
}

/// `APP__*` names win over the hosted backend's conventional names.
fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("SUPABASE_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = lookup("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = lookup("SUPABASE_ANON_KEY") {
        settings.anon_key = v;
    }
    if let Some(v) = lookup("APP__ANON_KEY") {
        settings.anon_key = v;
    }

    if let Some(v) = lookup("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = lookup("APP__PROFILE_FALLBACK") {
        settings.profile_fallback = v
            .parse()
            .map_err(|err| anyhow!("APP__PROFILE_FALLBACK: {err}"))?;
    }

    if let Some(v) = lookup("APP__HTTP_TIMEOUT_SECONDS") {
        settings.http_timeout_seconds = v
            .trim()
            .parse()
            .with_context(|| format!("APP__HTTP_TIMEOUT_SECONDS must be a whole number, got '{v}'"))?;
    }

    Ok(())
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
