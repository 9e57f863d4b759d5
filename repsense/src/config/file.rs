//! INI configuration file.
//!
//! ```ini
//! [engine]
//! exercise = squat
//! smoothing_window = 5
//! keypoint_confidence = 0.3
//! jitter_threshold = 20
//!
//! [rate]
//! min_fps = 15
//! ...
//!
//! [exercise.squat]
//! high_threshold = 160
//! low_threshold = 100
//! rep_pattern = bottom>ascending>standing
//! ```
//!
//! Every key is optional. `[engine]` values apply to all exercises and the
//! `[exercise.<name>]` sections override them per exercise.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::{ConfigError, EngineConfig};
use crate::adaptive::RateControlConfig;
use crate::error::EngineResult;
use crate::exercise::{ExerciseKind, ExerciseProfile};
use crate::motion::RepPattern;
use crate::recovery::FailureConfig;

const EXERCISE_SECTION_PREFIX: &str = "exercise.";

/// Default location of the configuration file.
///
/// `~/.config/repsense/config.ini` on Linux, the platform equivalent
/// elsewhere.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("repsense").join("config.ini"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Settings from `[engine]` that apply to every exercise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSection {
    pub exercise: Option<ExerciseKind>,
    pub smoothing_window: Option<usize>,
    pub keypoint_confidence: Option<f64>,
    pub jitter_threshold_deg: Option<f64>,
}

/// Per-exercise overrides from `[exercise.<name>]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExerciseOverrides {
    pub high_threshold_deg: Option<f64>,
    pub low_threshold_deg: Option<f64>,
    pub smoothing_window: Option<usize>,
    pub keypoint_confidence: Option<f64>,
    pub jitter_threshold_deg: Option<f64>,
    pub rep_pattern: Option<RepPattern>,
}

impl ExerciseOverrides {
    fn apply(&self, profile: &mut ExerciseProfile) {
        if let Some(high) = self.high_threshold_deg {
            profile.thresholds.high_deg = high;
        }
        if let Some(low) = self.low_threshold_deg {
            profile.thresholds.low_deg = low;
        }
        if let Some(window) = self.smoothing_window {
            profile.smoothing_window = window;
        }
        if let Some(confidence) = self.keypoint_confidence {
            profile.keypoint_confidence = confidence;
        }
        if let Some(jitter) = self.jitter_threshold_deg {
            profile.set_jitter_threshold(jitter);
        }
        if let Some(pattern) = self.rep_pattern {
            profile.rep_pattern = Some(pattern);
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub rate: RateControlConfig,
    pub failure: FailureConfig,
    pub exercises: BTreeMap<String, ExerciseOverrides>,
}

impl ConfigFile {
    /// Loads the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        })?;
        let config = Self::from_ini(&ini)?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Loads the file at `path`, or defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parses configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(props) = ini.section(Some("engine")) {
            config.engine = EngineSection {
                exercise: parse_exercise(props)?,
                smoothing_window: value(props, "engine", "smoothing_window")?,
                keypoint_confidence: value(props, "engine", "keypoint_confidence")?,
                jitter_threshold_deg: value(props, "engine", "jitter_threshold")?,
            };
        }

        if let Some(props) = ini.section(Some("rate")) {
            let rate = &mut config.rate;
            set(&mut rate.ema_alpha, value(props, "rate", "ema_alpha")?);
            set(&mut rate.min_fps, value(props, "rate", "min_fps")?);
            set(&mut rate.max_fps, value(props, "rate", "max_fps")?);
            set(&mut rate.max_skip, value(props, "rate", "max_skip")?);
            set(&mut rate.slow_run_frames, value(props, "rate", "slow_run_frames")?);
            set(&mut rate.fast_run_frames, value(props, "rate", "fast_run_frames")?);
            set(
                &mut rate.evaluation_interval,
                value::<f64>(props, "rate", "evaluation_interval_secs")?
                    .map(|secs| seconds(secs, "rate", "evaluation_interval_secs"))
                    .transpose()?,
            );
            set(&mut rate.window_capacity, value(props, "rate", "window_capacity")?);
        }

        if let Some(props) = ini.section(Some("failure")) {
            let failure = &mut config.failure;
            set(
                &mut failure.warning_threshold,
                value(props, "failure", "warning_threshold")?,
            );
            set(
                &mut failure.error_threshold,
                value(props, "failure", "error_threshold")?,
            );
            set(
                &mut failure.min_overall_confidence,
                value(props, "failure", "min_overall_confidence")?,
            );
            set(
                &mut failure.max_recovery_attempts,
                value(props, "failure", "max_recovery_attempts")?,
            );
            set(
                &mut failure.base_backoff,
                value::<u64>(props, "failure", "base_backoff_ms")?.map(Duration::from_millis),
            );
            set(
                &mut failure.backoff_step,
                value::<u64>(props, "failure", "backoff_step_ms")?.map(Duration::from_millis),
            );
            set(
                &mut failure.max_backoff,
                value::<u64>(props, "failure", "max_backoff_ms")?.map(Duration::from_millis),
            );
        }

        for (name, props) in ini.iter() {
            let Some(exercise) = name.and_then(|n| n.strip_prefix(EXERCISE_SECTION_PREFIX)) else {
                continue;
            };
            let kind = ExerciseKind::from_str(exercise)
                .map_err(|_| ConfigError::UnknownExercise(exercise.to_string()))?;
            let section = format!("{}{}", EXERCISE_SECTION_PREFIX, exercise);
            let overrides = ExerciseOverrides {
                high_threshold_deg: value(props, &section, "high_threshold")?,
                low_threshold_deg: value(props, &section, "low_threshold")?,
                smoothing_window: value(props, &section, "smoothing_window")?,
                keypoint_confidence: value(props, &section, "keypoint_confidence")?,
                jitter_threshold_deg: value(props, &section, "jitter_threshold")?,
                rep_pattern: value(props, &section, "rep_pattern")?,
            };
            config.exercises.insert(kind.as_str().to_string(), overrides);
        }

        Ok(config)
    }

    /// Engine-wide settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            rate: self.rate.clone(),
            failure: self.failure.clone(),
        }
    }

    /// Built-in profile for `kind` with this file's overrides applied.
    ///
    /// # Errors
    ///
    /// [`crate::EngineError::Configuration`] if the resulting profile is invalid.
    pub fn profile(&self, kind: ExerciseKind) -> EngineResult<ExerciseProfile> {
        let mut profile = ExerciseProfile::builtin(kind);

        let global = ExerciseOverrides {
            smoothing_window: self.engine.smoothing_window,
            keypoint_confidence: self.engine.keypoint_confidence,
            jitter_threshold_deg: self.engine.jitter_threshold_deg,
            ..Default::default()
        };
        global.apply(&mut profile);

        if let Some(overrides) = self.exercises.get(kind.as_str()) {
            overrides.apply(&mut profile);
        }

        profile.validate()?;
        Ok(profile)
    }

    /// Profile for the exercise named in `[engine]`, squat if none.
    pub fn default_profile(&self) -> EngineResult<ExerciseProfile> {
        self.profile(self.engine.exercise.unwrap_or(ExerciseKind::Squat))
    }

    /// Writes a commented default configuration file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::AlreadyExists`] if `path` exists and `overwrite` is false.
    pub fn write_default(path: &Path, overwrite: bool) -> Result<(), ConfigError> {
        if path.exists() && !overwrite {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, default_config_text()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Wrote default configuration file");
        Ok(())
    }
}

/// Text of the default configuration file.
pub fn default_config_text() -> String {
    let rate = RateControlConfig::default();
    let failure = FailureConfig::default();
    let squat = ExerciseProfile::builtin(ExerciseKind::Squat);
    let push_up = ExerciseProfile::builtin(ExerciseKind::PushUp);

    format!(
        "\
; repsense configuration
; Every key is optional; removing a key restores its built-in default.

[engine]
; Exercise used when none is given on the command line
; (squat, lunge, push_up, plank)
exercise = squat
; Frames averaged per joint angle (1-30)
smoothing_window = {window}
; Minimum keypoint confidence for a joint angle to be computed
keypoint_confidence = {confidence}
; Largest second difference (degrees) a smooth rep may contain
jitter_threshold = {jitter}

[rate]
ema_alpha = {alpha}
min_fps = {min_fps}
max_fps = {max_fps}
max_skip = {max_skip}
slow_run_frames = {slow_run}
fast_run_frames = {fast_run}
evaluation_interval_secs = {interval}

[failure]
; Consecutive failed detections before the visibility warning
warning_threshold = {warning}
; Consecutive failed detections before recovery is requested
error_threshold = {error}
min_overall_confidence = {min_score}
max_recovery_attempts = {attempts}
base_backoff_ms = {base_backoff}
backoff_step_ms = {backoff_step}
max_backoff_ms = {max_backoff}

[exercise.squat]
high_threshold = {squat_high}
low_threshold = {squat_low}
rep_pattern = {pattern}

[exercise.push_up]
high_threshold = {push_high}
low_threshold = {push_low}
",
        window = squat.smoothing_window,
        confidence = squat.keypoint_confidence,
        jitter = squat.jitter_threshold_deg,
        alpha = rate.ema_alpha,
        min_fps = rate.min_fps,
        max_fps = rate.max_fps,
        max_skip = rate.max_skip,
        slow_run = rate.slow_run_frames,
        fast_run = rate.fast_run_frames,
        interval = rate.evaluation_interval.as_secs_f64(),
        warning = failure.warning_threshold,
        error = failure.error_threshold,
        min_score = failure.min_overall_confidence,
        attempts = failure.max_recovery_attempts,
        base_backoff = failure.base_backoff.as_millis(),
        backoff_step = failure.backoff_step.as_millis(),
        max_backoff = failure.max_backoff.as_millis(),
        squat_high = squat.thresholds.high_deg,
        squat_low = squat.thresholds.low_deg,
        pattern = RepPattern::canonical(),
        push_high = push_up.thresholds.high_deg,
        push_low = push_up.thresholds.low_deg,
    )
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn value<T>(props: &Properties, section: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = props.get(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn parse_exercise(props: &Properties) -> Result<Option<ExerciseKind>, ConfigError> {
    match props.get("exercise").map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => name
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::UnknownExercise(name.to_string())),
    }
}

fn seconds(secs: f64, section: &str, key: &str) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: secs.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::kinematics::Joint;
    use crate::motion::{ExercisePhase, PhaseThresholds};
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ConfigFile::parse("").unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(
            config.profile(ExerciseKind::Squat).unwrap(),
            ExerciseProfile::builtin(ExerciseKind::Squat)
        );
    }

    #[test]
    fn test_default_text_round_trips_to_defaults() {
        let config = ConfigFile::parse(&default_config_text()).unwrap();
        assert_eq!(config.rate, RateControlConfig::default());
        assert_eq!(config.failure, FailureConfig::default());
        assert_eq!(config.engine.exercise, Some(ExerciseKind::Squat));
        for kind in ExerciseKind::ALL {
            assert_eq!(
                config.profile(kind).unwrap(),
                ExerciseProfile::builtin(kind),
                "{} differs from built-in",
                kind
            );
        }
    }

    #[test]
    fn test_engine_section_applies_to_all_exercises() {
        let config = ConfigFile::parse("[engine]\nsmoothing_window = 9\njitter_threshold = 15\n")
            .unwrap();
        for kind in [ExerciseKind::Squat, ExerciseKind::PushUp] {
            let profile = config.profile(kind).unwrap();
            assert_eq!(profile.smoothing_window, 9);
            assert_eq!(profile.jitter_threshold_deg, 15.0);
        }
    }

    #[test]
    fn test_exercise_section_overrides_engine_section() {
        let text = "\
[engine]
smoothing_window = 9

[exercise.lunge]
smoothing_window = 3
high_threshold = 150
low_threshold = 95
";
        let config = ConfigFile::parse(text).unwrap();
        let lunge = config.profile(ExerciseKind::Lunge).unwrap();
        assert_eq!(lunge.smoothing_window, 3);
        assert_eq!(lunge.thresholds, PhaseThresholds::new(150.0, 95.0));
        assert_eq!(lunge.primary_joint, Joint::Knee);

        let squat = config.profile(ExerciseKind::Squat).unwrap();
        assert_eq!(squat.smoothing_window, 9);
    }

    #[test]
    fn test_rep_pattern_override() {
        let text = "[exercise.squat]\nrep_pattern = bottom>ascending>standing\n";
        let config = ConfigFile::parse(text).unwrap();
        let profile = config.profile(ExerciseKind::Squat).unwrap();
        assert_eq!(
            profile.rep_pattern.map(|p| p.phases[0]),
            Some(ExercisePhase::Bottom)
        );
    }

    #[test]
    fn test_invalid_value_reports_key() {
        let err = ConfigFile::parse("[rate]\nmin_fps = fast\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, value, .. } => {
                assert_eq!(section, "rate");
                assert_eq!(key, "min_fps");
                assert_eq!(value, "fast");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_exercise_section() {
        let err = ConfigFile::parse("[exercise.burpee]\nlow_threshold = 90\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownExercise(name) if name == "burpee"));

        let err = ConfigFile::parse("[engine]\nexercise = burpee\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownExercise(_)));
    }

    #[test]
    fn test_invalid_profile_is_configuration_error() {
        let config =
            ConfigFile::parse("[exercise.squat]\nhigh_threshold = 90\nlow_threshold = 100\n")
                .unwrap();
        let err = config.profile(ExerciseKind::Squat).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_write_and_load_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        ConfigFile::write_default(&path, false).unwrap();
        assert!(path.exists());

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.rate, RateControlConfig::default());

        let err = ConfigFile::write_default(&path, false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));
        assert!(ConfigFile::write_default(&path, true).is_ok());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_or_default(&dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ConfigFile::load(&dir.path().join("missing.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_failure_section() {
        let text = "[failure]\nwarning_threshold = 3\nbase_backoff_ms = 500\nmax_backoff_ms = 800\n";
        let config = ConfigFile::parse(text).unwrap();
        assert_eq!(config.failure.warning_threshold, 3);
        assert_eq!(config.failure.base_backoff, Duration::from_millis(500));
        assert_eq!(config.engine_config().failure.max_backoff, Duration::from_millis(800));
    }

    #[test]
    fn test_max_skip_above_cap_rejected_at_session_start() {
        let config = ConfigFile::parse("[rate]\nmax_skip = 10\n").unwrap();
        assert_eq!(config.rate.max_skip, 10);

        let msg = config.engine_config().validate().unwrap_err();
        assert!(msg.contains("max_skip"), "{}", msg);

        let err = crate::Engine::new(config.default_profile().unwrap(), config.engine_config())
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));

        let config = ConfigFile::parse("[rate]\nmax_skip = 4\n").unwrap();
        assert!(config.engine_config().validate().is_ok());
    }
}
