use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;

use crate::types::{Color, CropRect, Vec2};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image has no pixels")]
    EmptyImage,
    #[error("crop rectangle {rect:?} lies outside the {width}x{height} image")]
    CropOutOfBounds {
        rect: CropRect,
        width: u32,
        height: u32,
    },
    #[error("font file '{0}' is empty")]
    EmptyFont(PathBuf),
}

/// Decoded backdrop drawn behind the spinner.
#[derive(Clone)]
pub struct Background {
    image: Arc<RgbaImage>,
    origin: String,
}

impl Background {
    pub fn from_path(path: &Path) -> Result<Self, AssetError> {
        let bytes = fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = decode(&bytes, CropRect::default())?;
        Ok(Self {
            image: Arc::new(image),
            origin: path.display().to_string(),
        })
    }

    /// Decodes an in-memory image, keeping only `area` (an empty rectangle
    /// keeps the whole image).
    pub fn from_memory(data: &[u8], area: CropRect) -> Result<Self, AssetError> {
        let image = decode(data, area)?;
        Ok(Self {
            image: Arc::new(image),
            origin: format!("<memory:{} bytes>", data.len()),
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Human-readable description of where the image came from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Scale factors that stretch the image over a `width`x`height` layout.
    pub fn scale_to(&self, width: u32, height: u32) -> Vec2 {
        let (image_width, image_height) = self.dimensions();
        Vec2::new(
            width as f32 / image_width.max(1) as f32,
            height as f32 / image_height.max(1) as f32,
        )
    }
}

impl fmt::Debug for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Background")
            .field("origin", &self.origin)
            .field("dimensions", &self.dimensions())
            .finish()
    }
}

fn decode(data: &[u8], area: CropRect) -> Result<RgbaImage, AssetError> {
    let decoded = image::load_from_memory(data)?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(AssetError::EmptyImage);
    }
    let (x, y, crop_width, crop_height) = area
        .clamp_to(width, height)
        .ok_or(AssetError::CropOutOfBounds {
            rect: area,
            width,
            height,
        })?;
    Ok(decoded.crop_imm(x, y, crop_width, crop_height).to_rgba8())
}

/// Font reference handed to the surface when drawing the label.
///
/// Glyph rasterisation belongs to the surface backend; the loader only carries
/// the font's identity and, when loaded from disk, its raw bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Font {
    name: String,
    data: Option<Arc<[u8]>>,
}

impl Font {
    /// References a font the surface backend resolves by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, AssetError> {
        let bytes = fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(AssetError::EmptyFont(path.to_path_buf()));
        }
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            data: Some(bytes.into()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("name", &self.name)
            .field("bytes", &self.data.as_ref().map(|data| data.len()))
            .finish()
    }
}

/// Overlay text drawn on top of the spinner each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelText {
    pub text: String,
    pub font: Font,
    pub position: Vec2,
    pub character_size: u32,
    pub fill: Color,
    pub outline: Color,
    pub outline_thickness: f32,
}

impl LabelText {
    /// Label with the default size (24) and white-on-black styling.
    pub fn new(text: impl Into<String>, font: Font, position: Vec2) -> Self {
        Self {
            text: text.into(),
            font,
            position,
            character_size: 24,
            fill: Color::WHITE,
            outline: Color::BLACK,
            outline_thickness: 0.0,
        }
    }

    pub fn with_character_size(mut self, size: u32) -> Self {
        self.character_size = size;
        self
    }

    pub fn with_colors(mut self, fill: Color, outline: Color) -> Self {
        self.fill = fill;
        self.outline = outline;
        self
    }

    pub fn with_outline_thickness(mut self, thickness: f32) -> Self {
        self.outline_thickness = thickness;
        self
    }
}
