//! Common types and utilities shared across CLI commands.

use std::path::Path;

use clap::ValueEnum;
use repsense::config::default_config_path;
use repsense::{ConfigError, ConfigFile, ExerciseKind};

use crate::error::CliError;

/// Exercise selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ExerciseArg {
    /// Bodyweight squat
    Squat,
    /// Forward lunge
    Lunge,
    /// Push-up
    #[value(alias = "pushup", alias = "push_up")]
    PushUp,
    /// Plank hold
    Plank,
}

impl From<ExerciseArg> for ExerciseKind {
    fn from(arg: ExerciseArg) -> Self {
        match arg {
            ExerciseArg::Squat => ExerciseKind::Squat,
            ExerciseArg::Lunge => ExerciseKind::Lunge,
            ExerciseArg::PushUp => ExerciseKind::PushUp,
            ExerciseArg::Plank => ExerciseKind::Plank,
        }
    }
}

/// Loads the configuration file.
///
/// An explicit path must exist. Without one, the default location is used if
/// present and built-in defaults otherwise.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigFile, CliError> {
    if let Some(path) = explicit {
        return Ok(ConfigFile::load(path)?);
    }
    match default_config_path() {
        Ok(path) => Ok(ConfigFile::load_or_default(&path)?),
        Err(ConfigError::NoConfigDir) => Ok(ConfigFile::default()),
        Err(e) => Err(e.into()),
    }
}

/// Resolve the exercise from CLI args and config.
pub fn resolve_exercise(cli_exercise: Option<ExerciseArg>, config: &ConfigFile) -> ExerciseKind {
    // CLI takes precedence, then config
    cli_exercise
        .map(ExerciseKind::from)
        .or(config.engine.exercise)
        .unwrap_or(ExerciseKind::Squat)
}
