//! Render surface abstraction and the lease that hands it between threads.
//!
//! A surface (an OpenGL window, an offscreen canvas, ...) may be current on
//! at most one thread. [`SurfaceCell`] owns it; [`SurfaceCell::claim`] makes it
//! current on the calling thread and returns a [`SurfaceLease`] that releases
//! it again on drop. Because the lease borrows the cell's lock, a second claim
//! cannot succeed until the first lease is gone.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, TryLockError};

use image::RgbaImage;

use crate::animation::SegmentStyle;
use crate::assets::LabelText;
use crate::types::{Color, Vec2};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface is already active on thread {holder}")]
    AlreadyActive { holder: String },
    #[error("surface is not active on the calling thread")]
    NotActive,
    #[error("surface backend error: {0}")]
    Backend(String),
}

/// Something the loader can draw onto the surface.
#[derive(Debug, Clone, Copy)]
pub enum Primitive<'a> {
    /// Image stretched by `scale` with its top-left corner at `position`.
    Sprite {
        image: &'a RgbaImage,
        position: Vec2,
        scale: Vec2,
    },
    /// Filled circle centred on `center` with an outline drawn outside it.
    Circle { center: Vec2, style: SegmentStyle },
    Text(&'a LabelText),
}

/// Shared drawing target driven by exactly one thread at a time.
///
/// Implementations bind whatever per-thread context they need in
/// [`activate`](RenderSurface::activate) and unbind it in
/// [`deactivate`](RenderSurface::deactivate).
pub trait RenderSurface: Send {
    /// Makes the surface current on the calling thread.
    fn activate(&mut self) -> Result<(), SurfaceError>;
    /// Releases the surface from the calling thread.
    fn deactivate(&mut self);
    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Color);
    fn draw(&mut self, primitive: Primitive<'_>);
    /// Publishes the frame drawn since the last clear.
    fn present(&mut self) -> Result<(), SurfaceError>;
}

/// Exclusive owner of a render surface.
#[derive(Debug)]
pub struct SurfaceCell<S> {
    surface: Mutex<S>,
}

impl<S: RenderSurface> SurfaceCell<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface: Mutex::new(surface),
        }
    }

    /// Waits for the surface to be free, then activates it on this thread.
    pub fn claim(&self) -> Result<SurfaceLease<'_, S>, SurfaceError> {
        let guard = self.surface.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("render surface lock poisoned by a panicking holder; recovering");
            poisoned.into_inner()
        });
        SurfaceLease::activate(guard)
    }

    /// Activates the surface only if no lease is outstanding.
    pub fn try_claim(&self) -> Option<Result<SurfaceLease<'_, S>, SurfaceError>> {
        let guard = match self.surface.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(SurfaceLease::activate(guard))
    }

    /// Size of the surface without activating it.
    pub fn size(&self) -> (u32, u32) {
        self.surface
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .size()
    }

    pub fn into_inner(self) -> S {
        self.surface
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof that the calling thread currently owns the surface.
///
/// Dereferences to the surface; dropping it deactivates the surface.
#[derive(Debug)]
pub struct SurfaceLease<'a, S: RenderSurface> {
    guard: MutexGuard<'a, S>,
}

impl<'a, S: RenderSurface> SurfaceLease<'a, S> {
    fn activate(mut guard: MutexGuard<'a, S>) -> Result<Self, SurfaceError> {
        guard.activate()?;
        Ok(Self { guard })
    }
}

impl<S: RenderSurface> Deref for SurfaceLease<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S: RenderSurface> DerefMut for SurfaceLease<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}

impl<S: RenderSurface> Drop for SurfaceLease<'_, S> {
    fn drop(&mut self) {
        self.guard.deactivate();
    }
}
