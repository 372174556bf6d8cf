//! Headless CPU surface.
//!
//! Rasterises loader primitives into an RGBA canvas. It enforces the same
//! single-thread activation rule a GL context would and can report every
//! presented frame over a channel, which makes it usable both for the demo
//! binary and for observing the worker from tests.

use std::path::Path;
use std::thread::{self, ThreadId};

use crossbeam_channel::{unbounded, Receiver, Sender};
use image::{Rgba, RgbaImage};

use crate::animation::SegmentStyle;
use crate::assets::LabelText;
use crate::surface::{Primitive, RenderSurface, SurfaceError};
use crate::types::{Color, Vec2};

/// Width of a block glyph relative to the character size.
const GLYPH_ASPECT: f32 = 0.6;

/// Summary of one presented frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEvent {
    pub index: u64,
    /// Thread the surface was active on when the frame was presented.
    pub thread: ThreadId,
    pub sprites: usize,
    pub circles: usize,
    pub texts: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct DrawTally {
    sprites: usize,
    circles: usize,
    texts: usize,
}

#[derive(Debug)]
pub struct SoftwareSurface {
    canvas: RgbaImage,
    active_on: Option<ThreadId>,
    presented: u64,
    tally: DrawTally,
    events: Option<Sender<FrameEvent>>,
}

impl SoftwareSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width.max(1), height.max(1)),
            active_on: None,
            presented: 0,
            tally: DrawTally::default(),
            events: None,
        }
    }

    /// Creates a surface that sends a [`FrameEvent`] for every presented frame.
    pub fn with_frame_events(width: u32, height: u32) -> (Self, Receiver<FrameEvent>) {
        let (tx, rx) = unbounded();
        let mut surface = Self::new(width, height);
        surface.events = Some(tx);
        (surface, rx)
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    pub fn is_active(&self) -> bool {
        self.active_on.is_some()
    }

    pub fn is_active_on_current_thread(&self) -> bool {
        self.active_on == Some(thread::current().id())
    }

    /// Writes the current canvas to disk; the format follows the extension.
    pub fn save(&self, path: &Path) -> Result<(), SurfaceError> {
        self.canvas.save(path).map_err(|err| {
            SurfaceError::Backend(format!("failed to save {}: {err}", path.display()))
        })
    }

    fn ensure_current(&self, operation: &str) -> bool {
        if self.is_active_on_current_thread() {
            true
        } else {
            tracing::warn!(
                operation,
                "software surface used while not active on this thread"
            );
            false
        }
    }

    fn blend(&mut self, x: i64, y: i64, color: Color) {
        if x < 0 || y < 0 || color.a == 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.canvas.width() || y >= self.canvas.height() {
            return;
        }
        let dst = self.canvas.get_pixel_mut(x, y);
        *dst = blend_over(*dst, color);
    }

    fn fill_rect(&mut self, left: f32, top: f32, width: f32, height: f32, color: Color) {
        let x0 = left.floor() as i64;
        let y0 = top.floor() as i64;
        let x1 = (left + width).ceil() as i64;
        let y1 = (top + height).ceil() as i64;
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }

    fn draw_sprite(&mut self, image: &RgbaImage, position: Vec2, scale: Vec2) {
        if scale.x <= 0.0 || scale.y <= 0.0 {
            return;
        }
        let dest_width = (image.width() as f32 * scale.x).ceil() as i64;
        let dest_height = (image.height() as f32 * scale.y).ceil() as i64;
        let origin_x = position.x.floor() as i64;
        let origin_y = position.y.floor() as i64;
        for dy in 0..dest_height {
            let src_y = ((dy as f32 + 0.5) / scale.y) as u32;
            if src_y >= image.height() {
                continue;
            }
            for dx in 0..dest_width {
                let src_x = ((dx as f32 + 0.5) / scale.x) as u32;
                if src_x >= image.width() {
                    continue;
                }
                let src = image.get_pixel(src_x, src_y).0;
                self.blend(origin_x + dx, origin_y + dy, Color::from(src));
            }
        }
    }

    fn draw_circle(&mut self, center: Vec2, style: SegmentStyle) {
        let outline = style.outline_thickness.max(0.0);
        let outer = style.radius.max(0.0) + outline;
        let x0 = (center.x - outer).floor() as i64;
        let x1 = (center.x + outer).ceil() as i64;
        let y0 = (center.y - outer).floor() as i64;
        let y1 = (center.y + outer).ceil() as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance <= style.radius {
                    self.blend(x, y, style.fill);
                } else if distance <= outer {
                    self.blend(x, y, style.outline);
                }
            }
        }
    }

    // Glyph shapes need a font rasteriser; each visible character is drawn as
    // a solid cell so the label's extent and colours still show up.
    fn draw_text(&mut self, label: &LabelText) {
        let size = label.character_size as f32;
        let advance = size * GLYPH_ASPECT;
        let inset = (size * 0.1).max(1.0);
        let outline = label.outline_thickness.max(0.0);
        for (index, ch) in label.text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let left = label.position.x + index as f32 * advance + inset / 2.0;
            let top = label.position.y;
            let width = advance - inset;
            if outline > 0.0 {
                self.fill_rect(
                    left - outline,
                    top - outline,
                    width + 2.0 * outline,
                    size + 2.0 * outline,
                    label.outline,
                );
            }
            self.fill_rect(left, top, width, size, label.fill);
        }
    }
}

impl RenderSurface for SoftwareSurface {
    fn activate(&mut self) -> Result<(), SurfaceError> {
        let current = thread::current().id();
        match self.active_on {
            Some(holder) if holder != current => Err(SurfaceError::AlreadyActive {
                holder: format!("{holder:?}"),
            }),
            _ => {
                self.active_on = Some(current);
                Ok(())
            }
        }
    }

    fn deactivate(&mut self) {
        if self.active_on.is_some() && !self.is_active_on_current_thread() {
            tracing::warn!("software surface deactivated from a thread that does not hold it");
        }
        self.active_on = None;
    }

    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn clear(&mut self, color: Color) {
        if !self.ensure_current("clear") {
            return;
        }
        let pixel = Rgba(color.to_array());
        for dst in self.canvas.pixels_mut() {
            *dst = pixel;
        }
        self.tally = DrawTally::default();
    }

    fn draw(&mut self, primitive: Primitive<'_>) {
        if !self.ensure_current("draw") {
            return;
        }
        match primitive {
            Primitive::Sprite {
                image,
                position,
                scale,
            } => {
                self.draw_sprite(image, position, scale);
                self.tally.sprites += 1;
            }
            Primitive::Circle { center, style } => {
                self.draw_circle(center, style);
                self.tally.circles += 1;
            }
            Primitive::Text(label) => {
                self.draw_text(label);
                self.tally.texts += 1;
            }
        }
    }

    fn present(&mut self) -> Result<(), SurfaceError> {
        let Some(holder) = self.active_on.filter(|_| self.is_active_on_current_thread()) else {
            return Err(SurfaceError::NotActive);
        };
        let event = FrameEvent {
            index: self.presented,
            thread: holder,
            sprites: self.tally.sprites,
            circles: self.tally.circles,
            texts: self.tally.texts,
        };
        self.presented += 1;
        self.tally = DrawTally::default();
        if let Some(events) = &self.events {
            // Nobody listening is fine.
            let _ = events.send(event);
        }
        Ok(())
    }
}

fn blend_over(dst: Rgba<u8>, src: Color) -> Rgba<u8> {
    if src.a == 255 {
        return Rgba(src.to_array());
    }
    let src_a = f32::from(src.a) / 255.0;
    let dst_a = f32::from(dst.0[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, d: u8| -> u8 {
        let s = f32::from(s) / 255.0;
        let d = f32::from(d) / 255.0;
        let value = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(src.r, dst.0[0]),
        channel(src.g, dst.0[1]),
        channel(src.b, dst.0[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Font;

    fn active_surface(width: u32, height: u32) -> SoftwareSurface {
        let mut surface = SoftwareSurface::new(width, height);
        surface.activate().unwrap();
        surface
    }

    #[test]
    fn refuses_activation_from_second_thread() {
        let mut surface = active_surface(4, 4);
        surface.activate().expect("re-activation on the same thread is allowed");

        let result = thread::spawn(move || surface.activate()).join().unwrap();
        assert!(matches!(result, Err(SurfaceError::AlreadyActive { .. })));
    }

    #[test]
    fn present_requires_activation() {
        let mut surface = SoftwareSurface::new(4, 4);
        assert!(matches!(surface.present(), Err(SurfaceError::NotActive)));
        surface.activate().unwrap();
        surface.present().unwrap();
        surface.deactivate();
        assert!(matches!(surface.present(), Err(SurfaceError::NotActive)));
        assert_eq!(surface.presented_frames(), 1);
    }

    #[test]
    fn draws_are_ignored_while_inactive() {
        let mut surface = SoftwareSurface::new(4, 4);
        surface.clear(Color::WHITE);
        assert_eq!(surface.canvas().get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn circle_has_fill_and_outline() {
        let mut surface = active_surface(40, 40);
        surface.clear(Color::BLACK);
        let style = SegmentStyle {
            radius: 5.0,
            fill: Color::WHITE,
            outline: Color::rgb(255, 0, 0),
            outline_thickness: 2.0,
        };
        surface.draw(Primitive::Circle {
            center: Vec2::new(20.0, 20.0),
            style,
        });
        assert_eq!(surface.canvas().get_pixel(20, 20).0, [255, 255, 255, 255]);
        assert_eq!(surface.canvas().get_pixel(26, 20).0, [255, 0, 0, 255]);
        assert_eq!(surface.canvas().get_pixel(30, 20).0, [0, 0, 0, 255]);
    }

    #[test]
    fn sprite_is_scaled_over_canvas() {
        let mut surface = active_surface(8, 8);
        let image = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        surface.draw(Primitive::Sprite {
            image: &image,
            position: Vec2::default(),
            scale: Vec2::new(4.0, 4.0),
        });
        assert_eq!(surface.canvas().get_pixel(7, 7).0, [0, 0, 255, 255]);
    }

    #[test]
    fn translucent_fill_blends_with_background() {
        let mut surface = active_surface(2, 2);
        surface.clear(Color::BLACK);
        surface.draw(Primitive::Circle {
            center: Vec2::new(1.0, 1.0),
            style: SegmentStyle {
                radius: 3.0,
                fill: Color::WHITE.with_alpha(100),
                outline: Color::TRANSPARENT,
                outline_thickness: 0.0,
            },
        });
        let pixel = surface.canvas().get_pixel(0, 0).0;
        assert_eq!(pixel[3], 255);
        assert!(pixel[0] > 90 && pixel[0] < 110);
    }

    #[test]
    fn text_draws_block_glyphs() {
        let mut surface = active_surface(100, 40);
        surface.clear(Color::BLACK);
        let label = LabelText::new("A B", Font::named("mono"), Vec2::new(0.0, 0.0))
            .with_character_size(20);
        surface.draw(Primitive::Text(&label));
        assert_eq!(surface.canvas().get_pixel(6, 10).0, [255, 255, 255, 255]);
        // the space between glyphs stays untouched
        assert_eq!(surface.canvas().get_pixel(18, 10).0, [0, 0, 0, 255]);
    }

    #[test]
    fn frame_events_report_draw_counts() {
        let (mut surface, events) = SoftwareSurface::with_frame_events(16, 16);
        surface.activate().unwrap();
        surface.clear(Color::BLACK);
        surface.draw(Primitive::Circle {
            center: Vec2::new(8.0, 8.0),
            style: SegmentStyle {
                radius: 2.0,
                fill: Color::WHITE,
                outline: Color::BLACK,
                outline_thickness: 1.0,
            },
        });
        surface.present().unwrap();
        let event = events.try_recv().expect("frame event");
        assert_eq!(event.index, 0);
        assert_eq!(event.circles, 1);
        assert_eq!(event.thread, thread::current().id());
    }

    #[test]
    fn saves_canvas_as_png() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        let mut surface = active_surface(4, 4);
        surface.clear(Color::rgb(1, 2, 3));
        surface.save(&path).unwrap();
        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }
}
