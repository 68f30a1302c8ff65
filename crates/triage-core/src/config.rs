use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TriageError};
use crate::types::Mode;

/// Top-level configuration for the triage client.
///
/// Loaded from `~/.triage/config.toml` by default. Every section falls back to
/// its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub attachment: AttachmentConfig,
}

impl TriageConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TriageConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.transport.diagnosis_url.trim().is_empty() {
            return Err(TriageError::Config("transport.diagnosis_url is empty".into()));
        }
        if self.transport.diet_url.trim().is_empty() {
            return Err(TriageError::Config("transport.diet_url is empty".into()));
        }
        if self.transport.timeout_ms == 0 {
            return Err(TriageError::Config("transport.timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Endpoints and timeouts for the diagnosis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Endpoint used while the session is in diagnosis mode.
    pub diagnosis_url: String,
    /// Endpoint used for the diet-plan sub-dialogue.
    pub diet_url: String,
    /// Whole-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            diagnosis_url: "http://localhost:8000/api/chat".to_string(),
            diet_url: "http://localhost:8000/api/diet".to_string(),
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl TransportConfig {
    /// The endpoint that serves requests in the given mode.
    pub fn endpoint(&self, mode: Mode) -> &str {
        match mode {
            Mode::Diagnosis => &self.diagnosis_url,
            Mode::Diet => &self.diet_url,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Pacing of the typed reveal of assistant replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Per-character delay for short replies.
    pub char_delay_ms: u64,
    /// Per-character delay for replies longer than `long_text_threshold`.
    pub fast_char_delay_ms: u64,
    /// Length in characters above which the fast delay applies.
    pub long_text_threshold: usize,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            char_delay_ms: 20,
            fast_char_delay_ms: 5,
            long_text_threshold: 400,
        }
    }
}

/// Speech-to-text capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Whether voice input is offered at all.
    pub enabled: bool,
    /// External program that records speech and prints the transcript on
    /// stdout. The first element is the program, the rest are arguments.
    pub command: Vec<String>,
    /// Recording is abandoned after this many seconds.
    pub max_duration_secs: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: vec![],
            max_duration_secs: 30,
        }
    }
}

/// Attachment limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    /// Largest accepted document, in bytes.
    pub max_size_bytes: u64,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
        }
    }
}
