//! Configuration loaded from `partgen.toml`.
//!
//! [`PartgenConfig`] holds every tunable setting. Keys missing from the file
//! use defaults. `PARTGEN_SERVER_URL` takes precedence over the file for the
//! server address.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "partgen.toml";
pub const SERVER_URL_ENV: &str = "PARTGEN_SERVER_URL";

/// Top-level configuration loaded from `partgen.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PartgenConfig {
    /// Base URL of the generation server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Path of the command endpoint (Start/Check/Submit).
    #[serde(default = "default_engine_path")]
    pub engine_path: String,

    /// Path of the artifact download endpoint.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,

    /// Interval between status checks, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Timeout for a single HTTP request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Fetch the finished part after a `Ready` reply.
    #[serde(default = "default_download")]
    pub download: bool,

    /// Directory where finished parts are saved.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_engine_path() -> String {
    "engine".to_string()
}

fn default_artifact_path() -> String {
    "getmodel".to_string()
}

fn default_poll_interval_ms() -> u64 {
    700
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_download() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PartgenConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            engine_path: default_engine_path(),
            artifact_path: default_artifact_path(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            download: default_download(),
            download_dir: default_download_dir(),
        }
    }
}

impl PartgenConfig {
    /// Load `partgen.toml` from the current directory, falling back to
    /// defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;

        if let Ok(url) = std::env::var(SERVER_URL_ENV)
            && !url.is_empty()
        {
            config.server_url = url;
        }

        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str::<PartgenConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Poll interval, never shorter than one millisecond.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory to save artifacts into, or `None` when downloads are off.
    pub fn artifact_dir(&self) -> Option<PathBuf> {
        self.download.then(|| self.download_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = PartgenConfig::default();
        assert_eq!(config.server_url, "http://127.0.0.1:8081");
        assert_eq!(config.engine_path, "engine");
        assert_eq!(config.artifact_path, "getmodel");
        assert_eq!(config.poll_interval(), Duration::from_millis(700));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.download);
        assert_eq!(config.artifact_dir(), Some(PathBuf::from(".")));
    }

    #[test]
    fn download_can_be_switched_off() {
        let config: PartgenConfig = toml::from_str("download = false\n").unwrap();
        assert_eq!(config.download_dir, PathBuf::from("."));
        assert_eq!(config.artifact_dir(), None);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            server_url = "http://printer.local:9000"
            poll_interval_ms = 250
            download_dir = "parts"
        "#;
        let config: PartgenConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server_url, "http://printer.local:9000");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.artifact_dir(), Some(PathBuf::from("parts")));
        assert_eq!(config.engine_path, "engine");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = PartgenConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PartgenConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.poll_interval_ms, 700);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "request_timeout_secs = 5\n").unwrap();
        let config = PartgenConfig::load_from(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn load_from_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "poll_interval_ms = \"fast\"\n").unwrap();
        assert!(PartgenConfig::load_from(&path).is_err());
    }
}
