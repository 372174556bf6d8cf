use std::fmt;

/// RGBA colour with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Returns the same colour with a different alpha channel.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self::rgba(self.r, self.g, self.b, a)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<[u8; 4]> for Color {
    fn from(value: [u8; 4]) -> Self {
        Self::rgba(value[0], value[1], value[2], value[3])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r, self.g, self.b, self.a
        )
    }
}

/// Point or offset in surface pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Integer rectangle used to crop decoded images.
///
/// A rectangle with zero width or height selects the whole image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl CropRect {
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersects the rectangle with an image of the given size.
    ///
    /// Returns `(x, y, width, height)` in unsigned pixels, or `None` when the
    /// rectangle does not overlap the image at all.
    pub fn clamp_to(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        if self.is_empty() {
            return Some((0, 0, image_width, image_height));
        }
        let left = i64::from(self.left).max(0);
        let top = i64::from(self.top).max(0);
        let right = (i64::from(self.left) + i64::from(self.width)).min(i64::from(image_width));
        let bottom = (i64::from(self.top) + i64::from(self.height)).min(i64::from(image_height));
        if right <= left || bottom <= top {
            return None;
        }
        Some((
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// Reference dimensions used to place the spinner and scale the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
}

impl Layout {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_crop_selects_whole_image() {
        let rect = CropRect::default();
        assert!(rect.is_empty());
        assert_eq!(rect.clamp_to(64, 32), Some((0, 0, 64, 32)));
    }

    #[test]
    fn crop_is_clamped_to_image_bounds() {
        let rect = CropRect::new(-4, 10, 40, 100);
        assert_eq!(rect.clamp_to(32, 32), Some((0, 10, 32, 22)));
    }

    #[test]
    fn crop_outside_image_is_rejected() {
        let rect = CropRect::new(100, 100, 10, 10);
        assert_eq!(rect.clamp_to(32, 32), None);
    }

    #[test]
    fn color_displays_as_hex() {
        assert_eq!(Color::rgba(255, 0, 16, 128).to_string(), "#ff001080");
    }
}
