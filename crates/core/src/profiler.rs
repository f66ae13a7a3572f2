//! Timing helpers for the frame pipeline.
//!
//! Provides RAII-style profiling scopes and a rolling frame timer.
use std::time::{Duration, Instant};
use tracing::trace;

/// A profiling scope that measures elapsed time using RAII.
///
/// The elapsed time is emitted at `trace` level when dropped.
pub struct ProfilerScope {
    start: Instant,
    name: &'static str,
}

impl ProfilerScope {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Gets elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for ProfilerScope {
    fn drop(&mut self) {
        trace!("{} took {:.3} ms", self.name, self.elapsed_ms());
    }
}

/// Last and smoothed timing of one pipeline stage.
#[derive(Debug, Clone, Copy)]
pub struct FrameTimer {
    last: Duration,
    average_ms: f64,
    samples: u64,
}

impl FrameTimer {
    /// Weight of the newest sample in the running average.
    const SMOOTHING: f64 = 0.1;

    #[must_use]
    pub fn new() -> Self {
        Self {
            last: Duration::ZERO,
            average_ms: 0.0,
            samples: 0,
        }
    }

    pub fn record(&mut self, time: Duration) {
        let ms = time.as_secs_f64() * 1000.0;
        self.average_ms = if self.samples == 0 {
            ms
        } else {
            self.average_ms + (ms - self.average_ms) * Self::SMOOTHING
        };
        self.last = time;
        self.samples += 1;
    }

    #[must_use]
    pub fn last(&self) -> Duration {
        self.last
    }

    #[must_use]
    pub fn last_frame_time_ms(&self) -> f64 {
        self.last.as_secs_f64() * 1000.0
    }

    /// Exponential moving average in milliseconds.
    #[must_use]
    pub fn average_ms(&self) -> f64 {
        self.average_ms
    }

    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::thread;

    #[test]
    fn test_profiler_scope_measures_time() {
        let scope = ProfilerScope::new("test");
        thread::sleep(Duration::from_millis(10));
        let elapsed = scope.elapsed_ms();
        assert!(elapsed >= 10.0, "Expected at least 10ms, got {elapsed}");
    }

    #[test]
    fn test_frame_timer_average() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.last_frame_time_ms(), 0.0);

        timer.record(Duration::from_millis(10));
        assert_relative_eq!(timer.average_ms(), 10.0);

        timer.record(Duration::from_millis(20));
        assert_relative_eq!(timer.last_frame_time_ms(), 20.0);
        assert_relative_eq!(timer.average_ms(), 11.0, epsilon = 1e-9);
        assert_eq!(timer.samples(), 2);
    }
}
