//! Replay command - run recorded detection results through the engine.
//!
//! Input is newline-delimited JSON, one [`FrameResult`] per line, as a host
//! would deliver them. Blank lines and lines starting with `#` are ignored.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Args;
use repsense::engine::{EngineOutput, FrameDisposition};
use repsense::persist::{JsonLinesSink, PersistenceSink, RepRecord, RetryingRecorder};
use repsense::{Engine, ExerciseKind, FrameResult, SessionStats};

use super::common::{load_config, resolve_exercise, ExerciseArg};
use crate::error::CliError;

/// Arguments of the replay command.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON-lines file of detection results ("-" reads stdin)
    pub input: PathBuf,

    /// Exercise to track (default: from config, else squat)
    #[arg(short, long, value_enum)]
    pub exercise: Option<ExerciseArg>,

    /// Configuration file (default: ~/.config/repsense/config.ini)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Append completed repetitions to this JSON-lines file
    #[arg(long, value_name = "PATH")]
    pub record: Option<PathBuf>,

    /// Drop frames the adaptive rate controller would not process
    #[arg(long)]
    pub respect_skip: bool,

    /// Print the final statistics as JSON
    #[arg(long)]
    pub json: bool,
}

/// Frame counters for one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames_read: usize,
    pub processed: usize,
    /// Dropped by the adaptive frame skip or recovery backoff before processing.
    pub skipped: usize,
    pub discarded: usize,
    pub backoff: usize,
    pub reps: usize,
}

/// Completed repetitions being written to a sink.
pub struct Recording<S> {
    session_id: String,
    recorder: RetryingRecorder<S>,
}

impl<S: PersistenceSink> Recording<S> {
    pub fn new(session_id: impl Into<String>, sink: S) -> Self {
        Self {
            session_id: session_id.into(),
            recorder: RetryingRecorder::with_defaults(sink),
        }
    }

    fn record(&mut self, output: &EngineOutput) {
        if let (Some(event), Some(angles), Some(stats)) = (&output.rep, &output.rep_angles, &output.stats)
        {
            let record = RepRecord::new(self.session_id.as_str(), event, angles, stats);
            self.recorder.record(record);
        }
    }

    /// Retries anything still queued; returns the number left unsaved.
    fn finish(&mut self) -> usize {
        self.recorder.flush();
        self.recorder.pending()
    }
}

/// Run the replay command.
pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let kind = resolve_exercise(args.exercise, &config);
    let mut engine = Engine::new(config.profile(kind)?, config.engine_config())?;

    let mut recording = match &args.record {
        Some(path) => Some(Recording::new(
            session_id(kind),
            JsonLinesSink::open(path)?,
        )),
        None => None,
    };

    let reader = open_input(&args.input)?;
    tracing::info!(
        input = %args.input.display(),
        exercise = %kind,
        respect_skip = args.respect_skip,
        "Replaying detection results"
    );
    let result = replay(reader, &mut engine, args.respect_skip, recording.as_mut());

    if let Some(recording) = recording.as_mut() {
        let unsaved = recording.finish();
        if unsaved > 0 {
            tracing::warn!(unsaved, "Repetitions left unrecorded");
            eprintln!("Warning: {} repetitions could not be recorded", unsaved);
        }
    }

    match result {
        Ok(summary) => {
            if args.json {
                print_json(engine.stats());
            } else {
                print_summary(kind, &summary, engine.stats());
            }
            Ok(())
        }
        Err(e) => {
            println!();
            println!("Replay stopped early.");
            print_stats(engine.stats());
            Err(e)
        }
    }
}

/// Feeds every frame of `reader` to `engine`, printing feedback as it is emitted.
pub fn replay<R, S>(
    reader: R,
    engine: &mut Engine,
    respect_skip: bool,
    mut recording: Option<&mut Recording<S>>,
) -> Result<ReplaySummary, CliError>
where
    R: BufRead,
    S: PersistenceSink,
{
    let mut summary = ReplaySummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|e| CliError::Frame {
            line: line_number,
            message: e.to_string(),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let frame: FrameResult = serde_json::from_str(trimmed).map_err(|e| CliError::Frame {
            line: line_number,
            message: e.to_string(),
        })?;
        summary.frames_read += 1;

        if respect_skip && !engine.should_process_next(frame.timestamp_ms) {
            summary.skipped += 1;
            continue;
        }

        let output = engine.process_frame(&frame)?;
        match output.disposition {
            FrameDisposition::Processed => summary.processed += 1,
            FrameDisposition::Discarded => summary.discarded += 1,
            FrameDisposition::Backoff => summary.backoff += 1,
        }

        if let Some(feedback) = &output.feedback {
            println!("{:>9.2}s  {}", frame.timestamp_ms as f64 / 1000.0, feedback);
        }
        if output.rep.is_some() {
            summary.reps += 1;
            if let Some(recording) = recording.as_deref_mut() {
                recording.record(&output);
            }
        }
    }

    Ok(summary)
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>, CliError> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).map_err(|source| CliError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(BufReader::new(file)))
}

fn session_id(kind: ExerciseKind) -> String {
    format!("{}-{}", kind, Utc::now().format("%Y%m%dT%H%M%SZ"))
}

fn print_summary(kind: ExerciseKind, summary: &ReplaySummary, stats: &SessionStats) {
    println!();
    println!("Session Summary ({})", kind);
    println!("================");
    println!(
        "  Frames:     {} read, {} processed, {} skipped, {} in backoff, {} discarded",
        summary.frames_read, summary.processed, summary.skipped, summary.backoff, summary.discarded
    );
    print_stats(stats);
}

fn print_stats(stats: &SessionStats) {
    println!(
        "  Reps:       {} ({} good, {} bad)",
        stats.total_reps, stats.good_reps, stats.bad_reps
    );
    println!("  Accuracy:   {}", stats.accuracy_display());
    println!(
        "  Streak:     {} current, {} best",
        stats.current_streak, stats.best_streak
    );
    if stats.total_reps > 0 {
        let rom = &stats.range_of_motion;
        println!(
            "  Range:      {:.1}° avg ({:.1}° - {:.1}°)",
            rom.avg, rom.min, rom.max
        );
    }
    if stats.hold_time_ms > 0 {
        println!("  Hold:       {:.1}s", stats.hold_time_ms as f64 / 1000.0);
    }
}

fn print_json(stats: &SessionStats) {
    match serde_json::to_string_pretty(stats) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Warning: could not serialize statistics: {}", e),
    }
}
