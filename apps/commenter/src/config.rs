use std::fs;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "commenter.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub cache_database_url: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            cache_database_url: "sqlite://./data/commenter.db".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    cache_database_url: Option<String>,
}

/// Defaults, then `commenter.toml`, then environment. Command-line flags are
/// layered on top by the caller.
pub fn load_settings() -> Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_settings(&mut settings, &raw)
            .with_context(|| format!("failed to parse {SETTINGS_FILE}"))?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file_settings(settings: &mut ClientSettings, raw: &str) -> Result<()> {
    let file: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file.cache_database_url {
        settings.cache_database_url = v;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("COMMENTS_SERVER_URL").filter(|v| !v.trim().is_empty()) {
        settings.server_url = v;
    }
    if let Some(v) = lookup("COMMENTS_CACHE_DATABASE_URL").filter(|v| !v.trim().is_empty()) {
        settings.cache_database_url = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
