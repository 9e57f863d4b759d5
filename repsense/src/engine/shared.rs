//! Thread-safe engine handle.
//!
//! Hosts that deliver detection results from a worker thread while the UI
//! thread resets or stops the session share one [`Engine`] through this
//! handle. Every call takes the lock for its whole duration, so frames are
//! processed strictly one at a time.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Engine, EngineOutput};
use crate::error::EngineResult;
use crate::motion::ExercisePhase;
use crate::pose::FrameResult;
use crate::session::SessionStats;

/// Cloneable, lock-protected [`Engine`].
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    pub fn process_frame(&self, frame: &FrameResult) -> EngineResult<EngineOutput> {
        self.inner.lock().process_frame(frame)
    }

    pub fn should_process_next(&self, now_ms: u64) -> bool {
        self.inner.lock().should_process_next(now_ms)
    }

    /// Snapshot of the current statistics.
    pub fn stats(&self) -> SessionStats {
        self.inner.lock().stats().clone()
    }

    pub fn current_phase(&self) -> ExercisePhase {
        self.inner.lock().current_phase()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation()
    }

    pub fn reset_session(&self) {
        self.inner.lock().reset_session();
    }

    pub fn stop(&self) {
        self.inner.lock().stop();
    }

    pub fn start(&self) {
        self.inner.lock().start();
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FrameDisposition;
    use crate::pose::PoseDetection;
    use std::thread;

    #[test]
    fn test_stop_from_another_thread_discards_results() {
        let shared = SharedEngine::new(Engine::for_exercise("squat").unwrap());
        let generation = shared.generation();

        let handle = {
            let shared = shared.clone();
            thread::spawn(move || shared.stop())
        };
        handle.join().unwrap();

        let late = FrameResult::pose(1000, PoseDetection::empty()).with_generation(generation);
        let output = shared.process_frame(&late).unwrap();
        assert_eq!(output.disposition, FrameDisposition::Discarded);
        assert_eq!(shared.with(|engine| engine.failure_count()), 0);
    }

    #[test]
    fn test_concurrent_frames_are_serialized() {
        let shared = SharedEngine::new(Engine::for_exercise("squat").unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..3 {
                        let frame = FrameResult::failed(t * 100 + i, "camera busy");
                        shared.process_frame(&frame).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.with(|engine| engine.failure_count()), 12);
    }
}
