//! Triage Core crate - shared domain types, error taxonomy, and configuration
//! for the symptom-intake client.

pub mod config;
pub mod error;
pub mod types;

pub use config::TriageConfig;
pub use error::{Result, TriageError};
pub use types::*;
