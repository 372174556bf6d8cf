use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointPolicy {
    #[default]
    Counted,
    Unconditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorKind {
    Center,
    #[default]
    BottomRight,
    Fixed,
}

/// RGBA colour written as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl Serialize for Rgba {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_color(&raw).map_err(de::Error::custom)
    }
}

pub fn parse_color(raw: &str) -> Result<Rgba, String> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix('#')
        .ok_or_else(|| format!("invalid color '{trimmed}'; expected #rrggbb or #rrggbbaa"))?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(format!(
            "invalid color '{trimmed}'; expected #rrggbb or #rrggbbaa"
        ));
    }
    let channel = |index: usize| u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16);
    let alpha = if hex.len() == 8 { channel(3) } else { Ok(255) };
    match (channel(0), channel(1), channel(2), alpha) {
        (Ok(r), Ok(g), Ok(b), Ok(a)) => Ok(Rgba([r, g, b, a])),
        _ => Err(format!("invalid color '{trimmed}'")),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadConfig {
    pub version: u32,
    #[serde(default)]
    pub layout: Option<LayoutSection>,
    #[serde(default)]
    pub loader: LoaderSection,
    #[serde(default)]
    pub spinner: SpinnerSection,
    #[serde(default)]
    pub background: Option<BackgroundSection>,
    #[serde(default)]
    pub label: Option<LabelSection>,
    #[serde(default)]
    pub tasks: Vec<TaskSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LayoutSection {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoaderSection {
    /// Frame cap for the loading animation; 0 renders back-to-back.
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default)]
    pub checkpoint_policy: CheckpointPolicy,
    #[serde(default = "default_clear_color")]
    pub clear_color: Rgba,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            checkpoint_policy: CheckpointPolicy::default(),
            clear_color: default_clear_color(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpinnerSection {
    #[serde(default = "default_segments")]
    pub segments: usize,
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default = "default_segment_radius")]
    pub segment_radius: f32,
    /// Degrees per second.
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub anchor: AnchorKind,
    #[serde(default = "default_margin")]
    pub margin: f32,
    #[serde(default)]
    pub position: Option<[f32; 2]>,
    #[serde(default = "default_fill")]
    pub fill: Rgba,
    #[serde(default = "default_dim_alpha")]
    pub dim_alpha: u8,
    #[serde(default = "default_outline")]
    pub outline: Rgba,
    #[serde(default = "default_outline_thickness")]
    pub outline_thickness: f32,
}

impl Default for SpinnerSection {
    fn default() -> Self {
        Self {
            segments: default_segments(),
            radius: default_radius(),
            segment_radius: default_segment_radius(),
            speed: default_speed(),
            anchor: AnchorKind::default(),
            margin: default_margin(),
            position: None,
            fill: default_fill(),
            dim_alpha: default_dim_alpha(),
            outline: default_outline(),
            outline_thickness: default_outline_thickness(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackgroundSection {
    pub path: PathBuf,
    /// `[left, top, width, height]`; omitted or zero-sized keeps the whole image.
    #[serde(default)]
    pub crop: Option<[i32; 4]>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LabelSection {
    pub text: String,
    /// Font file path or a backend font name.
    #[serde(default)]
    pub font: Option<String>,
    pub position: [f32; 2],
    #[serde(default = "default_character_size")]
    pub size: u32,
    #[serde(default = "default_fill")]
    pub fill: Rgba,
    #[serde(default = "default_outline")]
    pub outline: Rgba,
    #[serde(default)]
    pub outline_thickness: f32,
}

/// A simulated blocking job for the demo driver.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaskSection {
    pub label: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    /// Idle time after the task, during which the host owns the surface.
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub pause: Option<Duration>,
}

/// Slowest non-zero frame cap accepted for the loading animation.
pub const MIN_FPS: f32 = 1.0;

fn default_fps() -> f32 {
    60.0
}

fn default_clear_color() -> Rgba {
    Rgba::BLACK
}

fn default_segments() -> usize {
    8
}

fn default_radius() -> f32 {
    30.0
}

fn default_segment_radius() -> f32 {
    5.0
}

fn default_speed() -> f32 {
    90.0
}

fn default_margin() -> f32 {
    100.0
}

fn default_fill() -> Rgba {
    Rgba::WHITE
}

fn default_dim_alpha() -> u8 {
    100
}

fn default_outline() -> Rgba {
    Rgba::BLACK
}

fn default_outline_thickness() -> f32 {
    2.0
}

fn default_character_size() -> u32 {
    24
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer)?
        .ok_or_else(|| de::Error::custom("duration must not be empty"))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            version: 1,
            layout: None,
            loader: LoaderSection::default(),
            spinner: SpinnerSection::default(),
            background: None,
            label: None,
            tasks: Vec::new(),
        }
    }
}

impl LoadConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: LoadConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(layout) = &self.layout {
            if layout.width == 0 || layout.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "layout must be non-empty, got {}x{}",
                    layout.width, layout.height
                )));
            }
        }

        let fps = self.loader.fps;
        if !fps.is_finite() || fps < 0.0 {
            return Err(ConfigError::Invalid("loader.fps must be >= 0".into()));
        }
        if fps > 0.0 && fps < MIN_FPS {
            return Err(ConfigError::Invalid(format!(
                "loader.fps must be 0 (uncapped) or at least {MIN_FPS}, got {fps}"
            )));
        }

        let spinner = &self.spinner;
        if spinner.segments == 0 {
            return Err(ConfigError::Invalid(
                "spinner.segments must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("radius", spinner.radius),
            ("segment_radius", spinner.segment_radius),
            ("outline_thickness", spinner.outline_thickness),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "spinner.{name} must be a non-negative number"
                )));
            }
        }
        if !spinner.speed.is_finite() {
            return Err(ConfigError::Invalid("spinner.speed must be finite".into()));
        }
        if spinner.anchor == AnchorKind::Fixed && spinner.position.is_none() {
            return Err(ConfigError::Invalid(
                "spinner.anchor = \"fixed\" requires spinner.position".into(),
            ));
        }

        if let Some(background) = &self.background {
            if background.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "background.path may not be empty".into(),
                ));
            }
        }

        if let Some(label) = &self.label {
            if label.size == 0 {
                return Err(ConfigError::Invalid("label.size must be > 0".into()));
            }
            if label.outline_thickness < 0.0 {
                return Err(ConfigError::Invalid(
                    "label.outline_thickness must be >= 0".into(),
                ));
            }
        }

        for task in &self.tasks {
            if task.label.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "task label may not be empty".into(),
                ));
            }
            if task.duration.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "task '{}' duration must be > 0",
                    task.label
                )));
            }
        }

        Ok(())
    }
}
