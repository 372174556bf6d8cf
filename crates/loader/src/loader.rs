use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::animation::SpinnerConfig;
use crate::assets::{Background, LabelText};
use crate::checkpoint::{CheckpointPolicy, CheckpointRegistry};
use crate::gate::Gate;
use crate::scene::Scene;
use crate::surface::{RenderSurface, SurfaceCell, SurfaceError, SurfaceLease};
use crate::time::{BoxedTimeSource, SystemTimeSource};
use crate::types::{Color, CropRect, Layout, Vec2};
use crate::worker::{self, FrameCounters, FrameStats};

const DEFAULT_TARGET_FPS: f32 = 60.0;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("failed to spawn loader worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("render surface belongs to the loader while loading is active")]
    SurfaceBusy,
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("loader worker thread panicked")]
    WorkerPanicked,
}

/// Construction-time settings for a [`Loader`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Layout reference dimensions; `None` uses the surface size.
    pub layout: Option<Layout>,
    pub spinner: SpinnerConfig,
    pub checkpoint_policy: CheckpointPolicy,
    /// Frame rate cap for the worker; `None` or `0` renders back-to-back.
    pub target_fps: Option<f32>,
    pub clear_color: Color,
    pub thread_name: String,
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between frames, or `None` when rendering back-to-back.
    ///
    /// Rates too small to express as a `Duration` are treated as uncapped.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .and_then(|fps| Duration::try_from_secs_f32(1.0 / fps).ok())
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            layout: None,
            spinner: SpinnerConfig::default(),
            checkpoint_policy: CheckpointPolicy::default(),
            target_fps: Some(DEFAULT_TARGET_FPS),
            clear_color: Color::BLACK,
            thread_name: "loader-worker".into(),
        }
    }
}

/// Gate plus checkpoint registry; everything a controller needs to drive
/// loading without touching the surface.
#[derive(Debug)]
pub(crate) struct Control {
    pub(crate) gate: Gate,
    pub(crate) registry: CheckpointRegistry,
}

#[derive(Debug)]
pub(crate) struct Shared<S> {
    pub(crate) control: Arc<Control>,
    pub(crate) surface: SurfaceCell<S>,
    pub(crate) scene: Mutex<Scene>,
    pub(crate) counters: FrameCounters,
}

impl<S> Shared<S> {
    pub(crate) fn lock_scene(&self) -> MutexGuard<'_, Scene> {
        self.scene
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read-only view of what the loader is currently drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSnapshot {
    pub layout: Layout,
    pub spinner_angle: f32,
    pub spinner_center: Vec2,
    pub segment_positions: Vec<Vec2>,
    /// Where the background came from, if one is set.
    pub background: Option<String>,
    pub label: Option<String>,
}

/// Animated loading indicator driven by a dedicated worker thread.
///
/// The loader owns the render surface for its whole life. While no checkpoint
/// is outstanding the host borrows it through [`Loader::claim_surface`]; while
/// loading is active only the worker draws to it. Dropping the loader stops
/// the worker and joins it.
pub struct Loader<S: RenderSurface + 'static> {
    shared: Arc<Shared<S>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: RenderSurface + 'static> Loader<S> {
    /// Takes ownership of `surface` and spawns the worker thread.
    pub fn new(surface: S, options: LoaderOptions) -> Result<Self, LoaderError> {
        Self::with_time_source(surface, options, Box::new(SystemTimeSource::new()))
    }

    /// Like [`Loader::new`] with an explicit clock for the animation.
    pub fn with_time_source(
        surface: S,
        options: LoaderOptions,
        time: BoxedTimeSource,
    ) -> Result<Self, LoaderError> {
        let layout = options.layout.unwrap_or_else(|| {
            let (width, height) = surface.size();
            Layout::new(width, height)
        });
        let frame_interval = options.frame_interval();
        let shared = Arc::new(Shared {
            control: Arc::new(Control {
                gate: Gate::new(),
                registry: CheckpointRegistry::new(options.checkpoint_policy),
            }),
            surface: SurfaceCell::new(surface),
            scene: Mutex::new(Scene::new(layout, options.spinner, options.clear_color)),
            counters: FrameCounters::default(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(options.thread_name.clone())
            .spawn(move || worker::run(worker_shared, time, frame_interval))
            .map_err(LoaderError::Spawn)?;

        tracing::debug!(
            width = layout.width,
            height = layout.height,
            policy = ?options.checkpoint_policy,
            fps = ?options.target_fps,
            "loader initialised"
        );

        Ok(Self {
            shared,
            worker: Some(handle),
        })
    }

    /// Cloneable handle for starting and stopping loading from other threads.
    pub fn handle(&self) -> LoaderHandle {
        LoaderHandle {
            control: Arc::clone(&self.shared.control),
        }
    }

    /// Sets the layout reference dimensions used for spinner placement and
    /// background scaling.
    pub fn configure(&self, height: u32, width: u32) {
        self.shared.lock_scene().set_layout(Layout::new(width, height));
        tracing::debug!(width, height, "loader layout configured");
    }

    pub fn layout(&self) -> Layout {
        self.shared.lock_scene().layout()
    }

    /// Loads the backdrop from an image file.
    ///
    /// Failures are logged and leave the current background untouched.
    pub fn set_background_image(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match Background::from_path(path) {
            Ok(background) => self.install_background(background),
            Err(err) => {
                tracing::error!(
                    path = %path.display(),
                    error = %err,
                    "failed to load loading-screen background"
                );
            }
        }
    }

    /// Loads the backdrop from encoded image bytes, keeping only `area`
    /// (an empty rectangle keeps the whole image).
    ///
    /// Failures are logged and leave the current background untouched.
    pub fn set_background_image_from_memory(&self, data: &[u8], area: CropRect) {
        match Background::from_memory(data, area) {
            Ok(background) => self.install_background(background),
            Err(err) => {
                tracing::error!(
                    bytes = data.len(),
                    error = %err,
                    "failed to load loading-screen background"
                );
            }
        }
    }

    fn install_background(&self, background: Background) {
        let (width, height) = background.dimensions();
        tracing::debug!(origin = background.origin(), width, height, "background installed");
        self.shared.lock_scene().set_background(Some(background));
    }

    pub fn clear_background_image(&self) {
        self.shared.lock_scene().set_background(None);
    }

    /// Configures the overlay text drawn every frame.
    pub fn set_label_text(&self, label: LabelText) {
        self.shared.lock_scene().set_label(Some(label));
    }

    pub fn clear_label_text(&self) {
        self.shared.lock_scene().set_label(None);
    }

    pub fn set_checkpoint(&self, label: &str) {
        self.shared.control.registry.set(label, &self.shared.control.gate);
    }

    pub fn clear_checkpoint(&self, label: &str) -> bool {
        self.shared
            .control
            .registry
            .clear(label, &self.shared.control.gate)
    }

    pub fn is_loading(&self) -> bool {
        self.shared.control.gate.is_active()
    }

    /// Borrows the surface on the calling thread.
    ///
    /// Fails with [`LoaderError::SurfaceBusy`] while loading is active. If the
    /// worker is finishing a frame the call waits for that frame to complete.
    pub fn claim_surface(&self) -> Result<SurfaceLease<'_, S>, LoaderError> {
        if self.is_loading() {
            return Err(LoaderError::SurfaceBusy);
        }
        Ok(self.shared.surface.claim()?)
    }

    pub fn stats(&self) -> FrameStats {
        self.shared.counters.snapshot()
    }

    pub fn scene_snapshot(&self) -> SceneSnapshot {
        let scene = self.shared.lock_scene();
        let spinner = scene.spinner();
        SceneSnapshot {
            layout: scene.layout(),
            spinner_angle: spinner.angle(),
            spinner_center: spinner.center(),
            segment_positions: spinner.segments().iter().map(|s| s.position).collect(),
            background: scene.background().map(|bg| bg.origin().to_string()),
            label: scene.label().map(|label| label.text.clone()),
        }
    }

    /// Stops the worker, joins it and hands the surface back.
    pub fn shutdown(mut self) -> Result<S, LoaderError> {
        let joined = self.stop_worker();
        let shared = Arc::clone(&self.shared);
        drop(self);
        joined?;
        let shared = Arc::try_unwrap(shared).map_err(|_| LoaderError::WorkerPanicked)?;
        Ok(shared.surface.into_inner())
    }

    fn stop_worker(&mut self) -> Result<(), LoaderError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        self.shared.control.gate.shutdown();
        match handle.join() {
            Ok(()) => {
                tracing::debug!("loader worker joined");
                Ok(())
            }
            Err(_) => {
                tracing::error!("loader worker thread panicked");
                Err(LoaderError::WorkerPanicked)
            }
        }
    }
}

impl<S: RenderSurface + 'static> Drop for Loader<S> {
    fn drop(&mut self) {
        let _ = self.stop_worker();
    }
}

/// Thread-safe entry point for the checkpoint API.
///
/// Handles stay valid after the loader is dropped; checkpoints set then no
/// longer have a worker to animate.
#[derive(Debug, Clone)]
pub struct LoaderHandle {
    control: Arc<Control>,
}

impl LoaderHandle {
    /// Records `label` as a reason to show the loading indicator.
    pub fn set_checkpoint(&self, label: &str) {
        self.control.registry.set(label, &self.control.gate);
        if !self.control.gate.is_running() {
            tracing::warn!(label, "checkpoint set after the loader shut down");
        }
    }

    /// Removes `label`; returns whether it was outstanding.
    pub fn clear_checkpoint(&self, label: &str) -> bool {
        self.control.registry.clear(label, &self.control.gate)
    }

    /// Sets `label` now and clears it when the guard is dropped.
    pub fn checkpoint(&self, label: impl Into<String>) -> CheckpointGuard {
        let label = label.into();
        self.set_checkpoint(&label);
        CheckpointGuard {
            handle: self.clone(),
            label,
        }
    }

    /// Runs `work` with `label` outstanding for its whole duration.
    pub fn run_checkpointed<T>(&self, label: &str, work: impl FnOnce() -> T) -> T {
        let _guard = self.checkpoint(label);
        work()
    }

    pub fn is_loading(&self) -> bool {
        self.control.gate.is_active()
    }

    /// Whether the owning loader's worker is still alive.
    pub fn is_running(&self) -> bool {
        self.control.gate.is_running()
    }

    pub fn checkpoints(&self) -> Vec<String> {
        self.control.registry.labels()
    }

    pub fn policy(&self) -> CheckpointPolicy {
        self.control.registry.policy()
    }
}

/// Clears its checkpoint when dropped, including during unwinding.
#[derive(Debug)]
#[must_use = "the checkpoint is cleared as soon as the guard is dropped"]
pub struct CheckpointGuard {
    handle: LoaderHandle,
    label: String,
}

impl CheckpointGuard {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for CheckpointGuard {
    fn drop(&mut self) {
        self.handle.clear_checkpoint(&self.label);
    }
}
