use std::fs;
use std::path::Path;

use loadconfig::{
    AnchorKind, BackgroundSection, CheckpointPolicy as ConfigPolicy, LabelSection, LoadConfig,
    Rgba, SpinnerSection,
};
use loader::{
    CheckpointPolicy, Color, CropRect, Font, LabelText, Layout, Loader, LoaderOptions,
    RenderSurface, SpinnerAnchor, SpinnerConfig, Vec2,
};

pub fn map_color(color: Rgba) -> Color {
    Color::from(color.0)
}

pub fn map_policy(policy: ConfigPolicy) -> CheckpointPolicy {
    match policy {
        ConfigPolicy::Counted => CheckpointPolicy::Counted,
        ConfigPolicy::Unconditional => CheckpointPolicy::Unconditional,
    }
}

pub fn map_anchor(spinner: &SpinnerSection) -> SpinnerAnchor {
    match (spinner.anchor, spinner.position) {
        (AnchorKind::Center, _) => SpinnerAnchor::Center,
        (AnchorKind::BottomRight, _) => SpinnerAnchor::BottomRight {
            margin: spinner.margin,
        },
        (AnchorKind::Fixed, Some([x, y])) => SpinnerAnchor::Fixed(Vec2::new(x, y)),
        (AnchorKind::Fixed, None) => {
            tracing::warn!("fixed spinner anchor without a position; centring instead");
            SpinnerAnchor::Center
        }
    }
}

pub fn spinner_config(spinner: &SpinnerSection) -> SpinnerConfig {
    SpinnerConfig {
        segment_count: spinner.segments,
        radius: spinner.radius,
        segment_radius: spinner.segment_radius,
        angular_speed: spinner.speed,
        anchor: map_anchor(spinner),
        fill: map_color(spinner.fill),
        dim_alpha: spinner.dim_alpha,
        outline: map_color(spinner.outline),
        outline_thickness: spinner.outline_thickness,
    }
}

pub fn loader_options(config: &LoadConfig) -> LoaderOptions {
    LoaderOptions {
        layout: config
            .layout
            .map(|layout| Layout::new(layout.width, layout.height)),
        spinner: spinner_config(&config.spinner),
        checkpoint_policy: map_policy(config.loader.checkpoint_policy),
        target_fps: Some(config.loader.fps),
        clear_color: map_color(config.loader.clear_color),
        ..LoaderOptions::default()
    }
}

pub fn crop_rect(crop: Option<[i32; 4]>) -> CropRect {
    crop.map(|[left, top, width, height]| CropRect::new(left, top, width, height))
        .unwrap_or_default()
}

/// Resolves `font` as a file first and falls back to a backend font name.
pub fn resolve_font(font: Option<&str>) -> Font {
    let Some(font) = font else {
        return Font::named("default");
    };
    let path = Path::new(font);
    if !path.is_file() {
        return Font::named(font);
    }
    match Font::from_file(path) {
        Ok(font) => font,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to load label font; using name"
            );
            Font::named(font)
        }
    }
}

pub fn label_text(label: &LabelSection) -> LabelText {
    let [x, y] = label.position;
    LabelText::new(
        label.text.clone(),
        resolve_font(label.font.as_deref()),
        Vec2::new(x, y),
    )
    .with_character_size(label.size)
    .with_colors(map_color(label.fill), map_color(label.outline))
    .with_outline_thickness(label.outline_thickness)
}

pub fn apply_background<S: RenderSurface + 'static>(
    loader: &Loader<S>,
    background: &BackgroundSection,
) {
    let crop = crop_rect(background.crop);
    if crop.is_empty() {
        loader.set_background_image(&background.path);
        return;
    }
    match fs::read(&background.path) {
        Ok(data) => loader.set_background_image_from_memory(&data, crop),
        Err(err) => tracing::error!(
            path = %background.path.display(),
            error = %err,
            "failed to read background image"
        ),
    }
}

/// Installs the configured backdrop and label on a freshly built loader.
pub fn apply_scene<S: RenderSurface + 'static>(loader: &Loader<S>, config: &LoadConfig) {
    if let Some(background) = &config.background {
        apply_background(loader, background);
    }
    if let Some(label) = &config.label {
        loader.set_label_text(label_text(label));
    }
}
