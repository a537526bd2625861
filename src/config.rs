//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$BUILDMAIL_CONFIG` (environment variable)
//! 2. `~/.config/buildmail/config.toml` (Linux/macOS)
//!    `%APPDATA%\buildmail\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AttachError, Result};
use crate::model::budget::SizeLimit;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Attachment collection settings.
    pub attachments: AttachmentsConfig,
    /// Defaults for composed messages.
    pub message: MessageConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Attachment collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    /// Ceiling for the total size of all attachments, in bytes (0 or negative = unlimited).
    pub max_attachment_size: i64,
    /// Attach the build log as `build.zip` instead of `build.log`.
    pub compress_build_log: bool,
    /// Deflate level 0-9 for the compressed log; unset uses the zip default.
    pub compression_level: Option<i64>,
    /// Skip VCS metadata and editor backups when matching workspace files.
    pub default_excludes: bool,
}

/// Defaults for composed messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            max_attachment_size: 0,
            compress_build_log: false,
            compression_level: None,
            default_excludes: true,
        }
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            from: "buildmail@localhost".to_string(),
            to: Vec::new(),
            subject: "Build notification".to_string(),
        }
    }
}

impl Config {
    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(AttachError::InvalidConfig(format!(
                "unknown log level '{}'",
                self.general.log_level
            )));
        }
        if let Some(level) = self.attachments.compression_level {
            if !(0..=9).contains(&level) {
                return Err(AttachError::InvalidConfig(format!(
                    "compression_level must be between 0 and 9, got {level}"
                )));
            }
        }
        Ok(())
    }
}

impl SizeLimit for Config {
    fn max_attachment_size(&self) -> i64 {
        self.attachments.max_attachment_size
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// File name of the rolling log inside [`cache_dir`].
pub const LOG_FILE_NAME: &str = "buildmail.log";

/// Read, parse and validate a config file.
pub fn read_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| AttachError::io(path, e))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| AttachError::InvalidConfig(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from the standard location.
///
/// Falls back to defaults when there is no file or [`read_config`] fails.
pub fn load_config() -> Config {
    let Some(path) = config_file_path().filter(|p| p.exists()) else {
        return Config::default();
    };
    match read_config(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Loaded config");
            config
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring config, using defaults");
            Config::default()
        }
    }
}

/// Write `config` as TOML to `path`, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AttachError::io(parent, e))?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| AttachError::InvalidConfig(e.to_string()))?;
    std::fs::write(path, contents).map_err(|e| AttachError::io(path, e))?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// `$BUILDMAIL_CONFIG`, else `<config dir>/buildmail/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    match std::env::var_os("BUILDMAIL_CONFIG") {
        Some(path) => Some(PathBuf::from(path)),
        None => dirs::config_dir().map(|d| d.join("buildmail").join("config.toml")),
    }
}

/// Directory holding the log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    config.general.cache_dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("buildmail")
    })
}

pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.attachments.max_attachment_size, 0);
        assert!(cfg.attachments.default_excludes);
        assert!(!cfg.attachments.compress_build_log);
        assert_eq!(cfg.max_attachment_size(), 0);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[attachments]
max_attachment_size = 10485760

[message]
to = ["dev@example.com"]
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.max_attachment_size(), 10 * 1024 * 1024);
        assert_eq!(cfg.message.to, vec!["dev@example.com"]);
        // Other fields use defaults
        assert!(cfg.attachments.default_excludes);
        assert_eq!(cfg.message.subject, "Build notification");
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_negative_ceiling_means_unlimited() {
        let cfg: Config = toml::from_str("[attachments]\nmax_attachment_size = -1\n").unwrap();
        assert!(crate::model::budget::SizeBudget::from_limit(&cfg).is_unlimited());
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());

        let cfg: Config = toml::from_str("[general]\nlog_level = \"loud\"\n").unwrap();
        assert!(matches!(cfg.validate(), Err(AttachError::InvalidConfig(_))));

        let cfg: Config = toml::from_str("[attachments]\ncompression_level = 12\n").unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("between 0 and 9"));

        let cfg: Config = toml::from_str("[attachments]\ncompression_level = 9\n").unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_save_then_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/config.toml");
        let mut cfg = Config::default();
        cfg.attachments.max_attachment_size = 4096;
        cfg.attachments.compression_level = Some(6);
        cfg.message.to = vec!["dev@example.com".to_string()];

        save_config(&cfg, &path).unwrap();
        let back = read_config(&path).unwrap();
        assert_eq!(back.max_attachment_size(), 4096);
        assert_eq!(back.attachments.compression_level, Some(6));
        assert_eq!(back.message.to, vec!["dev@example.com"]);
    }

    #[test]
    fn test_read_config_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = read_config(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, AttachError::Io { .. }));

        let bad = tmp.path().join("bad.toml");
        std::fs::write(&bad, "[attachments\n").unwrap();
        assert!(matches!(
            read_config(&bad).unwrap_err(),
            AttachError::InvalidConfig(_)
        ));
    }

    #[test]
    fn test_log_file_under_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/bm-cache"));
        assert_eq!(
            log_file_path(&cfg),
            PathBuf::from("/tmp/bm-cache/buildmail.log")
        );
    }
}
