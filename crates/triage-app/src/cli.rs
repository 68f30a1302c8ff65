//! CLI argument definitions for the triage client.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use triage_core::config::TriageConfig;

/// Triage: a conversational symptom-intake client.
#[derive(Parser, Debug)]
#[command(name = "triage", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Diagnosis endpoint URL.
    #[arg(long = "diagnosis-url")]
    pub diagnosis_url: Option<String>,

    /// Diet-plan endpoint URL.
    #[arg(long = "diet-url")]
    pub diet_url: Option<String>,

    /// Request timeout in milliseconds.
    #[arg(short = 't', long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Disable voice input even if a recorder is configured.
    #[arg(long = "no-voice")]
    pub no_voice: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TRIAGE_CONFIG env var > ~/.triage/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TRIAGE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the diagnosis endpoint.
    ///
    /// Priority: --diagnosis-url flag > TRIAGE_DIAGNOSIS_URL env var > config file value.
    pub fn resolve_diagnosis_url(&self, config_url: &str) -> String {
        pick(
            self.diagnosis_url.as_deref(),
            std::env::var("TRIAGE_DIAGNOSIS_URL").ok(),
            config_url,
        )
    }

    /// Resolve the diet endpoint.
    ///
    /// Priority: --diet-url flag > TRIAGE_DIET_URL env var > config file value.
    pub fn resolve_diet_url(&self, config_url: &str) -> String {
        pick(
            self.diet_url.as_deref(),
            std::env::var("TRIAGE_DIET_URL").ok(),
            config_url,
        )
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Fold every override into the loaded configuration.
    pub fn apply(&self, config: &mut TriageConfig) {
        config.transport.diagnosis_url = self.resolve_diagnosis_url(&config.transport.diagnosis_url);
        config.transport.diet_url = self.resolve_diet_url(&config.transport.diet_url);
        if let Some(ms) = self.timeout_ms {
            config.transport.timeout_ms = ms;
        }
        config.general.log_level = self.resolve_log_level(&config.general.log_level);
        if self.no_voice {
            config.capture.enabled = false;
        }
    }
}

/// First non-blank of flag, env value, then the config value.
fn pick(flag: Option<&str>, env: Option<String>, config_value: &str) -> String {
    if let Some(v) = flag.filter(|v| !v.trim().is_empty()) {
        return v.to_string();
    }
    if let Some(v) = env.filter(|v| !v.trim().is_empty()) {
        return v;
    }
    config_value.to_string()
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".triage").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".triage").join("config.toml");
    }
    PathBuf::from("config.toml")
}
