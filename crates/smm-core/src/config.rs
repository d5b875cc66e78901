//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
    pub thumbnails: ThumbnailConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.server.max_body_bytes < 64 * 1024 {
            warnings.push(format!(
                "server.max_body_bytes is {}; most course archives will be rejected",
                self.server.max_body_bytes
            ));
        }

        if self.delivery.cleanup_delay_secs == 0 {
            warnings.push(
                "delivery.cleanup_delay_secs is 0; zip downloads may be removed before they finish streaming"
                    .into(),
            );
        }

        if let Some(ref dir) = self.storage.uploads_dir {
            if dir.as_os_str().is_empty() {
                warnings.push("storage.uploads_dir is set but empty".into());
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Upper bound on request bodies (course uploads, thumbnails).
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3030,
            db_path: PathBuf::from("./data/smmdb.db"),
            max_body_bytes: 30 * 1024 * 1024,
        }
    }
}

/// Where accepted uploads are archived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// When set, every accepted upload body is written to
    /// `<uploads_dir>/<first course id>`.
    pub uploads_dir: Option<PathBuf>,
}

/// Download delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// How long a generated zip download stays on disk.
    pub cleanup_delay_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            cleanup_delay_secs: 20,
        }
    }
}

/// Thumbnail derivation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Derive WebP variants next to the JPEG thumbnails.
    pub webp: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self { webp: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 3030);
        assert_eq!(cfg.delivery.cleanup_delay_secs, 20);
        assert!(cfg.thumbnails.webp);
        assert!(cfg.storage.uploads_dir.is_none());
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn zero_cleanup_delay_warns() {
        let mut cfg = Config::default();
        cfg.delivery.cleanup_delay_secs = 0;
        assert!(cfg.validate().iter().any(|w| w.contains("cleanup_delay_secs")));
    }

    #[test]
    fn tiny_body_limit_warns() {
        let mut cfg = Config::default();
        cfg.server.max_body_bytes = 1024;
        assert!(cfg.validate().iter().any(|w| w.contains("max_body_bytes")));
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"server": {"port": 9090}, "storage": {"uploads_dir": "/tmp/up"}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.storage.uploads_dir, Some(PathBuf::from("/tmp/up")));
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.server.port, 3030);
        assert!(cfg.thumbnails.webp);
    }

    #[test]
    fn parse_invalid_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_or_default_with_none() {
        let cfg = Config::load_or_default(None);
        assert_eq!(cfg.server.port, 3030);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/smmdb.json")));
        assert_eq!(cfg.server.port, 3030);
    }

    #[test]
    fn load_or_default_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"delivery": {"cleanup_delay_secs": 5}}"#).unwrap();
        let cfg = Config::load_or_default(Some(&path));
        assert_eq!(cfg.delivery.cleanup_delay_secs, 5);
    }
}
