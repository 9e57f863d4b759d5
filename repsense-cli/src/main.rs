//! repsense CLI - Command-line interface
//!
//! Replays recorded pose detections through the repetition engine, lists the
//! built-in exercise profiles and writes a starter configuration file.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use commands::common::ExerciseArg;
use commands::replay::ReplayArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "repsense", version, about = "Exercise repetition detection from pose keypoints")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a JSON-lines file of detection results through the engine
    Replay(ReplayArgs),

    /// List the built-in exercise profiles
    Profiles {
        /// Show the full profile of one exercise, with config overrides applied
        #[arg(short, long, value_enum)]
        exercise: Option<ExerciseArg>,

        /// Configuration file (default: ~/.config/repsense/config.ini)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Where to write the file (default: ~/.config/repsense/config.ini)
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let _logging = match repsense::logging::init_logging(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging unavailable: {}", e);
            None
        }
    };

    if let Err(e) = run(cli.command) {
        e.exit();
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Replay(args) => commands::replay::run(args),
        Commands::Profiles { exercise, config } => {
            commands::profiles::run(exercise, config.as_deref())
        }
        Commands::Init { force, path } => commands::init::run(force, path),
    }
}

impl CliError {
    /// Prints the error and exits with its exit code.
    fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        process::exit(self.exit_code())
    }
}
