//! Per-run statistics recording.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Records timing for a single pipeline run.
///
/// The engine attaches a fresh recorder to the run context under the
/// `"stats"` key. The start timestamp is taken at construction;
/// [`StatsRecorder::set_completed`] stamps the end. Safe to share across
/// concurrently running tasks.
#[derive(Debug)]
pub struct StatsRecorder {
    start_time: DateTime<Utc>,
    started: Instant,
    completed: Mutex<Option<Stat>>,
}

/// A completed run measurement.
#[derive(Debug, Clone)]
pub struct Stat {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub success: bool,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            started: Instant::now(),
            completed: Mutex::new(None),
        }
    }

    /// Wall-clock time at which the run began.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Stamp end time, duration and the success flag.
    pub fn set_completed(&self, success: bool) {
        let stat = Stat {
            start_time: self.start_time,
            end_time: Utc::now(),
            duration: self.started.elapsed(),
            success,
        };
        *self.completed.lock().unwrap() = Some(stat);
    }

    /// The completed measurement, if [`set_completed`](Self::set_completed)
    /// has been called.
    pub fn completed(&self) -> Option<Stat> {
        self.completed.lock().unwrap().clone()
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_stamps_success_and_duration() {
        let recorder = StatsRecorder::new();
        assert!(recorder.completed().is_none());

        recorder.set_completed(true);

        let stat = recorder.completed().unwrap();
        assert!(stat.success);
        assert!(stat.end_time >= stat.start_time);
    }

    #[test]
    fn recompletion_overwrites() {
        let recorder = StatsRecorder::new();
        recorder.set_completed(true);
        recorder.set_completed(false);
        assert!(!recorder.completed().unwrap().success);
    }
}
