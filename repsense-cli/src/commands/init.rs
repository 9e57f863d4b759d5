//! Init command - write a default configuration file.

use std::path::PathBuf;

use repsense::config::default_config_path;
use repsense::ConfigFile;

use crate::error::CliError;

/// Run the init command.
pub fn run(force: bool, path: Option<PathBuf>) -> Result<(), CliError> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    ConfigFile::write_default(&path, force)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to tune thresholds, smoothing and rate control.");
    println!("Command-line arguments override config file values when specified.");
    Ok(())
}
