//! Background loading-screen driver.
//!
//! A [`Loader`] owns the host's render surface and a worker thread that draws
//! a rotating spinner (plus optional backdrop and label) whenever at least one
//! checkpoint is outstanding. The host thread keeps doing its blocking work;
//! the surface is handed back and forth so that exactly one thread drives it
//! at any instant:
//!
//! ```text
//!   host thread                              worker thread
//!   ───────────                              ─────────────
//!   claim_surface() ─▶ lease (host draws)     Gate::wait_for_work() (idle)
//!   drop(lease)
//!   set_checkpoint("load") ─▶ Gate::start ─▶  claim ▸ update ▸ draw ▸ present ▸ release
//!        … blocking work …                    Gate::pace(frame interval) ↺
//!   clear_checkpoint("load") ─▶ Gate::stop ─▶ back to wait_for_work()
//!   claim_surface() ─▶ lease (host draws)
//!   drop(loader) ─▶ Gate::shutdown ─▶         exit, joined
//! ```
//!
//! [`SurfaceLease`] is the only way to touch the surface, which turns the
//! "activate on one thread at a time" rule into a borrow instead of a
//! convention. [`SoftwareSurface`] is a headless implementation used by the
//! demo binary and the tests.

mod animation;
mod assets;
mod checkpoint;
mod gate;
mod loader;
mod scene;
mod software;
mod surface;
mod time;
mod types;
mod worker;

pub use animation::{Segment, SegmentStyle, SpinnerAnchor, SpinnerConfig, SpinnerState};
pub use assets::{AssetError, Background, Font, LabelText};
pub use checkpoint::{CheckpointPolicy, CheckpointRegistry};
pub use gate::{Directive, Gate};
pub use loader::{
    CheckpointGuard, Loader, LoaderError, LoaderHandle, LoaderOptions, SceneSnapshot,
};
pub use software::{FrameEvent, SoftwareSurface};
pub use surface::{Primitive, RenderSurface, SurfaceCell, SurfaceError, SurfaceLease};
pub use time::{BoxedTimeSource, FixedStepTimeSource, SystemTimeSource, TimeSample, TimeSource};
pub use types::{Color, CropRect, Layout, Vec2};
pub use worker::FrameStats;
