use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "merge_cli.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub output_dir: PathBuf,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            output_dir: PathBuf::from("."),
            request_timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Parses `api_url`; only http and https bases are usable.
    pub fn validated_api_url(&self) -> anyhow::Result<Url> {
        let url = Url::parse(self.api_url.trim())
            .with_context(|| format!("invalid service url '{}'", self.api_url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => anyhow::bail!("unsupported scheme '{other}' in service url '{url}'"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    output_dir: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file when present, then the environment.
/// Later sources win; for each setting the `APP__` variable beats the short one.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.api_url {
                    settings.api_url = v;
                }
                if let Some(v) = file_cfg.output_dir {
                    settings.output_dir = v;
                }
                if let Some(v) = file_cfg.request_timeout_secs {
                    settings.request_timeout_secs = Some(v);
                }
            }
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = env("MERGE_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("MERGE_OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }
    if let Some(v) = env("APP__OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = Some(parsed),
            Err(_) => warn!(value = %v, "ignoring non-numeric APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
