use std::time::{Duration, Instant};

/// Snapshot of the clock state handed to the animation each pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Seconds elapsed since the previous sample.
    pub delta: f32,
    /// Monotonic pass counter for the running loader.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(delta: f32, frame_index: u64) -> Self {
        Self { delta, frame_index }
    }
}

/// Abstraction over where frame deltas originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces the delta since the previous call.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
///
/// The delta is measured from the previous sample, or from the last
/// [`reset`](TimeSource::reset), which the worker issues whenever loading
/// resumes.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    last: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            last: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.last = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last);
        self.last = now;
        let sample = TimeSample::new(delta.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that advances by the same step on every sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedStepTimeSource {
    step: Duration,
    frame: u64,
}

impl FixedStepTimeSource {
    pub fn new(step: Duration) -> Self {
        Self { step, frame: 0 }
    }
}

impl TimeSource for FixedStepTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.step.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_step_reports_constant_delta() {
        let mut source = FixedStepTimeSource::new(Duration::from_millis(250));
        let first = source.sample();
        let second = source.sample();
        assert!((first.delta - 0.25).abs() < 1e-6);
        assert!((second.delta - 0.25).abs() < 1e-6);
        assert_eq!(second.frame_index, 1);
        source.reset();
        assert_eq!(source.sample().frame_index, 0);
    }

    #[test]
    fn system_source_deltas_are_non_negative() {
        let mut source = SystemTimeSource::new();
        std::thread::sleep(Duration::from_millis(5));
        let sample = source.sample();
        assert!(sample.delta >= 0.004);
        assert!(source.sample().delta >= 0.0);
    }
}
