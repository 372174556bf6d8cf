//! Geometry of the rotating loading indicator.
//!
//! The spinner is a ring of small circles ("segments") evenly spaced around a
//! center point. Each pass the whole ring is rotated by
//! `angular_speed * dt` degrees; nothing here knows about threads or surfaces.

use std::f32::consts::TAU;

use crate::types::{Color, Layout, Vec2};

/// Where the spinner ring is centred relative to the layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpinnerAnchor {
    /// Middle of the layout.
    Center,
    /// Inset from the bottom-right corner by `margin` pixels on both axes.
    BottomRight { margin: f32 },
    /// Absolute position in surface pixels.
    Fixed(Vec2),
}

impl SpinnerAnchor {
    pub fn resolve(&self, layout: Layout) -> Vec2 {
        match *self {
            SpinnerAnchor::Center => {
                Vec2::new(layout.width as f32 / 2.0, layout.height as f32 / 2.0)
            }
            SpinnerAnchor::BottomRight { margin } => {
                Vec2::new(layout.width as f32 - margin, layout.height as f32 - margin)
            }
            SpinnerAnchor::Fixed(point) => point,
        }
    }
}

impl Default for SpinnerAnchor {
    fn default() -> Self {
        Self::BottomRight { margin: 100.0 }
    }
}

/// Visual attributes of a single segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStyle {
    pub radius: f32,
    pub fill: Color,
    pub outline: Color,
    pub outline_thickness: f32,
}

/// Immutable spinner parameters fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinnerConfig {
    pub segment_count: usize,
    /// Ring radius in pixels.
    pub radius: f32,
    /// Radius of each segment circle.
    pub segment_radius: f32,
    /// Rotation speed in degrees per second.
    pub angular_speed: f32,
    pub anchor: SpinnerAnchor,
    /// Fill of odd-indexed segments.
    pub fill: Color,
    /// Alpha applied to even-indexed segments so the ring alternates.
    pub dim_alpha: u8,
    pub outline: Color,
    pub outline_thickness: f32,
}

impl SpinnerConfig {
    fn style_for(&self, index: usize) -> SegmentStyle {
        let fill = if index % 2 == 0 {
            self.fill.with_alpha(self.dim_alpha)
        } else {
            self.fill
        };
        SegmentStyle {
            radius: self.segment_radius,
            fill,
            outline: self.outline,
            outline_thickness: self.outline_thickness,
        }
    }
}

impl Default for SpinnerConfig {
    fn default() -> Self {
        Self {
            segment_count: 8,
            radius: 30.0,
            segment_radius: 5.0,
            angular_speed: 90.0,
            anchor: SpinnerAnchor::default(),
            fill: Color::WHITE,
            dim_alpha: 100,
            outline: Color::BLACK,
            outline_thickness: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub position: Vec2,
    pub style: SegmentStyle,
}

/// Mutable rotation state plus the derived segment positions.
#[derive(Debug, Clone)]
pub struct SpinnerState {
    config: SpinnerConfig,
    center: Vec2,
    angle: f32,
    segments: Vec<Segment>,
}

impl SpinnerState {
    pub fn new(config: SpinnerConfig, layout: Layout) -> Self {
        let center = config.anchor.resolve(layout);
        let segments = (0..config.segment_count)
            .map(|index| Segment {
                position: center,
                style: config.style_for(index),
            })
            .collect();
        let mut state = Self {
            config,
            center,
            angle: 0.0,
            segments,
        };
        state.place_segments();
        state
    }

    pub fn config(&self) -> &SpinnerConfig {
        &self.config
    }

    /// Current rotation in degrees, always within `[0, 360)`.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Re-anchors the ring after the layout dimensions changed.
    pub fn relayout(&mut self, layout: Layout) {
        self.center = self.config.anchor.resolve(layout);
        self.place_segments();
    }

    /// Advances the rotation by `dt` seconds and repositions every segment.
    pub fn update(&mut self, dt: f32) {
        if !dt.is_finite() {
            tracing::warn!(dt, "ignoring non-finite animation delta");
            return;
        }
        self.angle = wrap_degrees(self.angle + self.config.angular_speed * dt);
        self.place_segments();
    }

    fn place_segments(&mut self) {
        let count = self.segments.len();
        let rotation = self.angle.to_radians();
        for (index, segment) in self.segments.iter_mut().enumerate() {
            let theta = TAU * index as f32 / count as f32 + rotation;
            segment.position = Vec2::new(
                self.center.x + self.config.radius * theta.cos(),
                self.center.y + self.config.radius * theta.sin(),
            );
        }
    }
}

fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
