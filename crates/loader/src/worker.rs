use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::gate::Directive;
use crate::loader::Shared;
use crate::surface::RenderSurface;
use crate::time::BoxedTimeSource;

/// Counters updated by the worker and readable from any thread.
#[derive(Debug, Default)]
pub(crate) struct FrameCounters {
    presented: AtomicU64,
    skipped: AtomicU64,
}

impl FrameCounters {
    pub(crate) fn snapshot(&self) -> FrameStats {
        FrameStats {
            presented: self.presented.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time copy of the worker's frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Frames drawn and presented.
    pub presented: u64,
    /// Passes abandoned because the surface could not be claimed or presented.
    pub skipped: u64,
}

/// Worker thread body: Idle until the gate opens, Active while it stays open,
/// Terminated once the gate shuts down.
pub(crate) fn run<S: RenderSurface>(
    shared: Arc<Shared<S>>,
    mut time: BoxedTimeSource,
    frame_interval: Option<Duration>,
) {
    tracing::debug!(interval = ?frame_interval, "loader worker started");
    let gate = &shared.control.gate;
    loop {
        let waking = !gate.is_active();
        if gate.wait_for_work() == Directive::Exit {
            break;
        }
        if waking {
            // Idle time is not animation time.
            time.reset();
        }
        render_pass(&shared, &mut time);
        if let Some(interval) = frame_interval {
            if gate.pace(interval) == Directive::Exit {
                break;
            }
        }
    }
    let stats = shared.counters.snapshot();
    tracing::debug!(
        presented = stats.presented,
        skipped = stats.skipped,
        "loader worker exiting"
    );
}

fn render_pass<S: RenderSurface>(shared: &Shared<S>, time: &mut BoxedTimeSource) {
    let gate = &shared.control.gate;
    if !gate.is_running() || !gate.is_active() {
        return;
    }
    let mut lease = match shared.surface.claim() {
        Ok(lease) => lease,
        Err(err) => {
            tracing::warn!(
                error = %err,
                "loader could not claim the render surface; skipping frame"
            );
            shared.counters.skipped.fetch_add(1, Ordering::AcqRel);
            return;
        }
    };

    // Loading may have stopped while we waited for the surface.
    if !gate.is_running() || !gate.is_active() {
        return;
    }

    let sample = time.sample();
    {
        let mut scene = shared.lock_scene();
        scene.advance(sample.delta);
        scene.draw(&mut *lease);
    }
    match lease.present() {
        Ok(()) => {
            shared.counters.presented.fetch_add(1, Ordering::AcqRel);
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                frame = sample.frame_index,
                "failed to present loading frame"
            );
            shared.counters.skipped.fetch_add(1, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    use crate::animation::SpinnerConfig;
    use crate::checkpoint::CheckpointRegistry;
    use crate::gate::Gate;
    use crate::loader::Control;
    use crate::scene::Scene;
    use crate::software::SoftwareSurface;
    use crate::surface::{Primitive, SurfaceCell, SurfaceError};
    use crate::time::{FixedStepTimeSource, TimeSample, TimeSource};
    use crate::types::{Color, Layout};

    /// Software surface that counts how often it was made current.
    #[derive(Debug)]
    struct CountingSurface {
        inner: SoftwareSurface,
        activations: usize,
    }

    impl RenderSurface for CountingSurface {
        fn activate(&mut self) -> Result<(), SurfaceError> {
            self.activations += 1;
            self.inner.activate()
        }

        fn deactivate(&mut self) {
            self.inner.deactivate();
        }

        fn size(&self) -> (u32, u32) {
            self.inner.size()
        }

        fn clear(&mut self, color: Color) {
            self.inner.clear(color);
        }

        fn draw(&mut self, primitive: Primitive<'_>) {
            self.inner.draw(primitive);
        }

        fn present(&mut self) -> Result<(), SurfaceError> {
            self.inner.present()
        }
    }

    fn shared() -> Shared<CountingSurface> {
        let layout = Layout::new(32, 32);
        Shared {
            control: Arc::new(Control {
                gate: Gate::new(),
                registry: CheckpointRegistry::default(),
            }),
            surface: SurfaceCell::new(CountingSurface {
                inner: SoftwareSurface::new(layout.width, layout.height),
                activations: 0,
            }),
            scene: Mutex::new(Scene::new(layout, SpinnerConfig::default(), Color::BLACK)),
            counters: FrameCounters::default(),
        }
    }

    fn step() -> BoxedTimeSource {
        Box::new(FixedStepTimeSource::new(Duration::from_millis(100)))
    }

    /// Fixed step source that counts resets.
    struct CountingClock {
        resets: Arc<AtomicU64>,
        inner: FixedStepTimeSource,
    }

    impl TimeSource for CountingClock {
        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::AcqRel);
            self.inner.reset();
        }

        fn sample(&mut self) -> TimeSample {
            self.inner.sample()
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(1);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn clock_resets_each_time_loading_resumes() {
        let shared = Arc::new(shared());
        let resets = Arc::new(AtomicU64::new(0));
        let clock = CountingClock {
            resets: Arc::clone(&resets),
            inner: FixedStepTimeSource::new(Duration::from_millis(10)),
        };
        let worker = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || run(shared, Box::new(clock), Some(Duration::from_millis(2))))
        };
        let presented = || shared.counters.snapshot().presented;

        shared.control.gate.start();
        wait_until(|| presented() >= 3);
        shared.control.gate.stop();
        // The surface lock waits out a pass that is still in flight.
        drop(shared.surface.claim().unwrap());
        // Let the worker park on the gate before loading resumes.
        thread::sleep(Duration::from_millis(30));
        assert_eq!(resets.load(Ordering::Acquire), 1);

        let before = presented();
        shared.control.gate.start();
        wait_until(|| presented() >= before + 3);
        assert_eq!(resets.load(Ordering::Acquire), 2);

        shared.control.gate.shutdown();
        worker.join().unwrap();
    }

    #[test]
    fn inactive_pass_leaves_surface_untouched() {
        let shared = shared();
        let mut time = step();

        render_pass(&shared, &mut time);
        assert_eq!(shared.counters.snapshot(), FrameStats::default());
        assert_eq!(shared.lock_scene().spinner().angle(), 0.0);

        shared.control.gate.start();
        shared.control.gate.shutdown();
        render_pass(&shared, &mut time);

        let surface = shared.surface.into_inner();
        assert_eq!(surface.activations, 0);
        assert_eq!(surface.inner.presented_frames(), 0);
    }

    #[test]
    fn active_pass_claims_draws_and_presents_once() {
        let shared = shared();
        let mut time = step();
        shared.control.gate.start();

        render_pass(&shared, &mut time);
        assert_eq!(
            shared.counters.snapshot(),
            FrameStats {
                presented: 1,
                skipped: 0
            }
        );
        assert!((shared.lock_scene().spinner().angle() - 9.0).abs() < 1e-3);

        let surface = shared.surface.into_inner();
        assert_eq!(surface.activations, 1);
        assert!(!surface.inner.is_active());
    }
}
