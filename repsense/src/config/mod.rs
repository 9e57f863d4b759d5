//! Engine configuration.
//!
//! [`EngineConfig`] carries the settings shared by every exercise (frame-rate
//! control and failure escalation). Per-exercise settings live in
//! [`ExerciseProfile`](crate::exercise::ExerciseProfile). Both can be loaded
//! from an INI file through [`ConfigFile`].

mod file;

use std::path::PathBuf;

use thiserror::Error;

use crate::adaptive::RateControlConfig;
use crate::recovery::FailureConfig;

pub use file::{
    default_config_path, default_config_text, ConfigFile, EngineSection, ExerciseOverrides,
};

/// Errors raised while reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown exercise '{0}' in config file (expected squat, lunge, push_up or plank)")]
    UnknownExercise(String),

    #[error("Config file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Settings shared by every exercise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub rate: RateControlConfig,
    pub failure: FailureConfig,
}

impl EngineConfig {
    /// Checks the configuration before a session starts.
    pub fn validate(&self) -> Result<(), String> {
        self.rate
            .validate()
            .map_err(|msg| format!("rate control: {}", msg))?;
        self.failure
            .validate()
            .map_err(|msg| format!("failure handling: {}", msg))?;
        Ok(())
    }
}
