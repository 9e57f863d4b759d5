//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use repsense::persist::PersistError;
use repsense::{ConfigError, EngineError};

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be read, written or applied.
    Config(ConfigError),
    /// The engine rejected its settings or gave up on detection.
    Engine(EngineError),
    /// The recording file could not be opened or written.
    Persist(PersistError),
    /// The replay input could not be read.
    Input { path: PathBuf, source: std::io::Error },
    /// A replay line is not a valid detection result.
    Frame { line: usize, message: String },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Input { .. } | CliError::Frame { .. } => 3,
            CliError::Engine(EngineError::RecoveryExhausted { .. }) => 4,
            CliError::Engine(_) => 2,
            CliError::Persist(_) => 5,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Engine(e) => write!(f, "{}", e),
            CliError::Persist(e) => write!(f, "Recording failed: {}", e),
            CliError::Input { path, source } => {
                write!(f, "Cannot read {}: {}", path.display(), source)
            }
            CliError::Frame { line, message } => {
                write!(f, "Invalid detection result on line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::Persist(e) => Some(e),
            CliError::Input { source, .. } => Some(source),
            CliError::Frame { .. } => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<PersistError> for CliError {
    fn from(e: PersistError) -> Self {
        CliError::Persist(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_recovery_has_own_exit_code() {
        let err = CliError::from(EngineError::RecoveryExhausted { attempts: 3 });
        assert_eq!(err.exit_code(), 4);
        assert_eq!(
            CliError::from(EngineError::UnknownExercise("burpee".into())).exit_code(),
            2
        );
    }

    #[test]
    fn test_frame_error_names_line() {
        let err = CliError::Frame {
            line: 7,
            message: "missing field `detection`".to_string(),
        };
        assert!(err.to_string().contains("line 7"));
    }
}
