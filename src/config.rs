use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where messages come from and who "me" is
    pub source: SourceConfig,
    /// Default extraction window
    pub extraction: ExtractionConfig,
    /// Attachment handling
    pub attachments: AttachmentConfig,
    /// Dedupe store
    pub store: StoreConfig,
    /// Output files
    pub output: OutputConfig,
    /// Logging
    pub logging: LoggingConfig,
}

/// Backup location and local user identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Path to `ChatStorage.sqlite`
    pub database_path: String,
    /// The local user's JID
    pub my_whatsapp_id: String,
    /// The local user's display name
    pub my_whatsapp_name: String,
}

/// Default extraction window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Lower bound, `YYYY-MM-DD` or RFC 3339
    pub since: Option<String>,
    /// Upper bound, `YYYY-MM-DD` or RFC 3339
    pub until: Option<String>,
    /// Maximum number of rows
    pub limit: Option<usize>,
}

/// Attachment handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Run OCR over image attachments
    pub enable_ocr: bool,
    /// OCR executable, invoked as `<command> <file> stdout`
    pub ocr_command: String,
    /// Files larger than this are not encoded
    pub max_attachment_size_mb: u64,
}

/// Dedupe store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Filter already-emitted activities
    pub enabled: bool,
    /// Directory of the sled database
    pub path: String,
}

/// Output files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `json`, `jsonl` or `csv`
    pub default_format: String,
    /// Base directory for timestamped runs
    pub output_directory: String,
    /// Records per chunk file
    pub max_records_per_file: usize,
}

/// Logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional log file, rotated daily
    pub file_path: Option<String>,
    /// "json" or "text"
    pub format: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database_path: "ChatStorage.sqlite".to_string(),
            my_whatsapp_id: String::new(),
            my_whatsapp_name: "Me".to_string(),
        }
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            enable_ocr: false,
            ocr_command: "tesseract".to_string(),
            max_attachment_size_mb: 100,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "data/store".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "json".to_string(),
            output_directory: "./output".to_string(),
            max_records_per_file: 10_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            format: "text".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false))
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix("WHATSAPP_HISTORY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.source.database_path.trim().is_empty() {
            return Err(anyhow::anyhow!("source.database_path cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        let valid_formats = ["json", "jsonl", "csv"];
        if !valid_formats.contains(&self.output.default_format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid output format: {}. Must be one of: {:?}",
                self.output.default_format,
                valid_formats
            ));
        }

        InputValidator::validate_records_per_file(self.output.max_records_per_file)
            .context("Invalid output.max_records_per_file")?;

        if self.attachments.max_attachment_size_mb == 0 {
            return Err(anyhow::anyhow!("max_attachment_size_mb must be greater than 0"));
        }

        if self.attachments.enable_ocr && self.attachments.ocr_command.trim().is_empty() {
            return Err(anyhow::anyhow!("ocr_command is required when OCR is enabled"));
        }

        if self.store.enabled && self.store.path.trim().is_empty() {
            return Err(anyhow::anyhow!("store.path is required when the store is enabled"));
        }

        if self.extraction.limit == Some(0) {
            return Err(anyhow::anyhow!("extraction.limit must be greater than 0"));
        }

        Ok(())
    }

    /// Get WhatsApp database path from environment or config
    #[must_use]
    pub fn get_database_path(&self) -> PathBuf {
        std::env::var("WHATSAPP_DB_PATH")
            .map_or_else(|_| PathBuf::from(&self.source.database_path), PathBuf::from)
    }

    /// Get log level from environment or config
    #[must_use]
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Maximum attachment size in bytes, saturating at `u64::MAX`
    #[must_use]
    pub const fn max_attachment_bytes(&self) -> u64 {
        self.attachments.max_attachment_size_mb.saturating_mul(1024 * 1024)
    }
}
