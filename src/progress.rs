//! Progress reporting for supervised searches.
//!
//! One sample is emitted per poll tick. Reporting is one-way and must never
//! block the supervisor, so the channel reporter drops events when the
//! consumer lags instead of waiting for it.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

/// Event name understood by the framework's progress channel.
pub const PROGRESS_EVENT_NAME: &str = "task-progress";

/// Ephemeral per-tick snapshot of the supervised search.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSample {
    /// Approximate match count (lines currently in the output file).
    pub matches: u64,
    /// Wall-clock time since the child was spawned.
    pub elapsed: Duration,
    /// Matches per second, truncated. Zero at elapsed zero.
    pub rate: u64,
}

impl ProgressSample {
    pub fn new(matches: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            (matches as f64 / secs) as u64
        } else {
            0
        };
        Self {
            matches,
            elapsed,
            rate,
        }
    }
}

/// Wire form of a progress event.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub name: &'static str,
    pub extracted_strings: u64,
    pub rate: u64,
}

impl From<&ProgressSample> for ProgressEvent {
    fn from(sample: &ProgressSample) -> Self {
        Self {
            name: PROGRESS_EVENT_NAME,
            extracted_strings: sample.matches,
            rate: sample.rate,
        }
    }
}

/// Progress sink for the supervisor loop.
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, sample: &ProgressSample);
}

/// Reports progress through structured logging.
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn on_progress(&self, sample: &ProgressSample) {
        info!(
            matches = sample.matches,
            rate = sample.rate,
            elapsed_secs = sample.elapsed.as_secs(),
            "search progress"
        );
    }
}

/// Forwards progress events over a bounded channel, fire-and-forget.
pub struct ChannelReporter {
    tx: crossbeam_channel::Sender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new(capacity: usize) -> (Self, crossbeam_channel::Receiver<ProgressEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_progress(&self, sample: &ProgressSample) {
        // Dropping on a full channel keeps the supervisor non-blocking.
        let _ = self.tx.try_send(ProgressEvent::from(sample));
    }
}

/// Discards all samples. Useful when no progress channel is wired up.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn on_progress(&self, _sample: &ProgressSample) {}
}

/// Time source for the supervisor loop, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::time`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_zero_at_elapsed_zero() {
        let sample = ProgressSample::new(1000, Duration::ZERO);
        assert_eq!(sample.rate, 0);
    }

    #[test]
    fn rate_truncates_toward_zero() {
        let sample = ProgressSample::new(7, Duration::from_secs(2));
        assert_eq!(sample.rate, 3);
    }

    #[test]
    fn channel_reporter_never_blocks_when_full() {
        let (reporter, rx) = ChannelReporter::new(1);
        let sample = ProgressSample::new(5, Duration::from_secs(1));
        reporter.on_progress(&sample);
        reporter.on_progress(&sample);
        reporter.on_progress(&sample);
        assert_eq!(rx.len(), 1);
        let event = rx.recv().expect("event");
        assert_eq!(event.name, PROGRESS_EVENT_NAME);
        assert_eq!(event.extracted_strings, 5);
        assert_eq!(event.rate, 5);
    }

    #[test]
    fn event_serializes_with_framework_field_names() {
        let sample = ProgressSample::new(2, Duration::from_secs(1));
        let event = ProgressEvent::from(&sample);
        let json = serde_json::to_value(&event).expect("json");
        assert_eq!(json["name"], "task-progress");
        assert_eq!(json["extracted_strings"], 2);
    }
}
