//! Repetition persistence.
//!
//! The engine itself performs no I/O. Hosts that keep a history turn each
//! [`RepEvent`] into a [`RepRecord`] and hand it to a [`PersistenceSink`].
//! [`RetryingRecorder`] wraps a sink with a bounded retry queue: records the
//! sink rejects are kept and retried on the next call, and when the queue is
//! full the oldest record is dropped. Persistence failures never reach the
//! engine.

use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exercise::ExerciseKind;
use crate::form::RuleKind;
use crate::motion::{AngleExtrema, JointExtrema};
use crate::session::{RepEvent, SessionStats};

/// Default number of records kept for retry.
pub const DEFAULT_RETRY_CAPACITY: usize = 64;

/// Errors raised by persistence sinks.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// One stored repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepRecord {
    pub session_id: String,
    pub exercise: ExerciseKind,
    pub rep_number: u32,
    pub is_good_form: bool,
    pub quality_score: u8,
    /// Smoothed angle extrema per joint, keyed by joint name.
    pub angles: BTreeMap<String, AngleExtrema>,
    pub form_violations: Vec<RuleKind>,
    /// Statistics right after this repetition.
    pub stats: SessionStats,
    /// Wall-clock time the record was created (RFC 3339).
    pub timestamp: String,
    /// Host frame timestamp of the repetition.
    pub frame_timestamp_ms: u64,
}

impl RepRecord {
    pub fn new(
        session_id: impl Into<String>,
        event: &RepEvent,
        angles: &JointExtrema,
        stats: &SessionStats,
    ) -> Self {
        let angles = angles
            .iter()
            .filter(|(_, extrema)| extrema.min.is_some())
            .map(|(joint, extrema)| (joint.as_str().to_string(), extrema))
            .collect();

        Self {
            session_id: session_id.into(),
            exercise: event.exercise,
            rep_number: event.rep_number,
            is_good_form: event.is_good_form,
            quality_score: event.quality_score,
            angles,
            form_violations: event.violated_rules.clone(),
            stats: stats.clone(),
            timestamp: Utc::now().to_rfc3339(),
            frame_timestamp_ms: event.timestamp_ms,
        }
    }
}

/// Destination for repetition records.
pub trait PersistenceSink {
    fn save(&mut self, record: &RepRecord) -> Result<(), PersistError>;
}

/// Appends records as newline-delimited JSON.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, PersistError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceSink for JsonLinesSink {
    fn save(&mut self, record: &RepRecord) -> Result<(), PersistError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Wraps a sink with a bounded retry queue.
#[derive(Debug)]
pub struct RetryingRecorder<S> {
    sink: S,
    queue: VecDeque<RepRecord>,
    capacity: usize,
    dropped: u64,
}

impl<S: PersistenceSink> RetryingRecorder<S> {
    pub fn new(sink: S, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sink,
            queue: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn with_defaults(sink: S) -> Self {
        Self::new(sink, DEFAULT_RETRY_CAPACITY)
    }

    /// Queues `record` and saves as many queued records as the sink accepts.
    ///
    /// Returns the number of records saved by this call.
    pub fn record(&mut self, record: RepRecord) -> usize {
        if self.queue.len() == self.capacity {
            if let Some(oldest) = self.queue.pop_front() {
                self.dropped += 1;
                tracing::warn!(
                    session = %oldest.session_id,
                    rep = oldest.rep_number,
                    dropped = self.dropped,
                    "Persistence queue full, dropping oldest record"
                );
            }
        }
        self.queue.push_back(record);
        self.flush()
    }

    /// Retries queued records in order, stopping at the first failure.
    pub fn flush(&mut self) -> usize {
        let mut saved = 0;
        while let Some(record) = self.queue.front() {
            match self.sink.save(record) {
                Ok(()) => {
                    self.queue.pop_front();
                    saved += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        pending = self.queue.len(),
                        "Failed to persist repetition, will retry"
                    );
                    break;
                }
            }
        }
        saved
    }

    /// Records waiting for retry.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Records dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::{Joint, JointAngleSet};
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    /// Sink that fails while `offline` is set.
    #[derive(Debug, Default)]
    struct FlakySink {
        offline: bool,
        saved: Vec<u32>,
    }

    impl PersistenceSink for FlakySink {
        fn save(&mut self, record: &RepRecord) -> Result<(), PersistError> {
            if self.offline {
                return Err(PersistError::Unavailable("offline".to_string()));
            }
            self.saved.push(record.rep_number);
            Ok(())
        }
    }

    fn record(rep_number: u32) -> RepRecord {
        let event = RepEvent {
            timestamp_ms: rep_number as u64 * 2000,
            exercise: ExerciseKind::Squat,
            rep_number,
            is_good_form: true,
            quality_score: 100,
            violated_rules: vec![],
            range_of_motion: 80.0,
            feedback: "Great form!".to_string(),
        };
        let mut extrema = JointExtrema::default();
        extrema.record(&JointAngleSet::empty().with(Joint::Knee, Some(90.0)));
        extrema.record(&JointAngleSet::empty().with(Joint::Knee, Some(170.0)));
        RepRecord::new("session-1", &event, &extrema, &SessionStats::default())
    }

    #[test]
    fn test_record_only_keeps_observed_joints() {
        let record = record(1);
        assert_eq!(record.angles.len(), 1);
        assert_eq!(record.angles["knee"].min, Some(90.0));
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_saves_immediately_when_sink_healthy() {
        let mut recorder = RetryingRecorder::with_defaults(FlakySink::default());
        assert_eq!(recorder.record(record(1)), 1);
        assert_eq!(recorder.pending(), 0);
        assert_eq!(recorder.sink().saved, vec![1]);
    }

    #[test]
    fn test_queues_while_sink_offline_and_retries_in_order() {
        let sink = FlakySink {
            offline: true,
            ..Default::default()
        };
        let mut recorder = RetryingRecorder::with_defaults(sink);
        assert_eq!(recorder.record(record(1)), 0);
        assert_eq!(recorder.record(record(2)), 0);
        assert_eq!(recorder.pending(), 2);

        recorder.sink.offline = false;
        assert_eq!(recorder.record(record(3)), 3);
        assert_eq!(recorder.into_sink().saved, vec![1, 2, 3]);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let sink = FlakySink {
            offline: true,
            ..Default::default()
        };
        let mut recorder = RetryingRecorder::new(sink, 2);
        for i in 1..=4 {
            recorder.record(record(i));
        }
        assert_eq!(recorder.pending(), 2);
        assert_eq!(recorder.dropped(), 2);

        recorder.sink.offline = false;
        assert_eq!(recorder.flush(), 2);
        assert_eq!(recorder.sink().saved, vec![3, 4]);
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reps.jsonl");

        let mut sink = JsonLinesSink::open(&path).unwrap();
        sink.save(&record(1)).unwrap();
        sink.save(&record(2)).unwrap();
        drop(sink);

        let mut sink = JsonLinesSink::open(&path).unwrap();
        sink.save(&record(3)).unwrap();
        assert_eq!(sink.path(), path.as_path());
        drop(sink);

        let lines: Vec<RepRecord> = BufReader::new(File::open(&path).unwrap())
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].rep_number, 3);
        assert_eq!(lines[0].session_id, "session-1");
    }
}
