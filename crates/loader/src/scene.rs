use crate::animation::{SpinnerConfig, SpinnerState};
use crate::assets::{Background, LabelText};
use crate::surface::{Primitive, RenderSurface};
use crate::types::{Color, Layout, Vec2};

/// Everything the worker draws in one pass.
///
/// Controllers mutate the scene through the loader's setters; the worker reads
/// it while holding the surface lease.
#[derive(Debug)]
pub(crate) struct Scene {
    layout: Layout,
    clear_color: Color,
    spinner: SpinnerState,
    background: Option<Background>,
    label: Option<LabelText>,
}

impl Scene {
    pub(crate) fn new(layout: Layout, spinner: SpinnerConfig, clear_color: Color) -> Self {
        Self {
            layout,
            clear_color,
            spinner: SpinnerState::new(spinner, layout),
            background: None,
            label: None,
        }
    }

    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
        self.spinner.relayout(layout);
    }

    pub(crate) fn spinner(&self) -> &SpinnerState {
        &self.spinner
    }

    pub(crate) fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    pub(crate) fn set_background(&mut self, background: Option<Background>) {
        self.background = background;
    }

    pub(crate) fn label(&self) -> Option<&LabelText> {
        self.label.as_ref()
    }

    pub(crate) fn set_label(&mut self, label: Option<LabelText>) {
        self.label = label;
    }

    pub(crate) fn advance(&mut self, dt: f32) {
        self.spinner.update(dt);
    }

    /// Clears the surface and draws background, segments and label, in that
    /// order. Presenting is left to the caller.
    pub(crate) fn draw<S: RenderSurface + ?Sized>(&self, surface: &mut S) {
        surface.clear(self.clear_color);
        if let Some(background) = &self.background {
            surface.draw(Primitive::Sprite {
                image: background.image(),
                position: Vec2::default(),
                scale: background.scale_to(self.layout.width, self.layout.height),
            });
        }
        for segment in self.spinner.segments() {
            surface.draw(Primitive::Circle {
                center: segment.position,
                style: segment.style,
            });
        }
        if let Some(label) = &self.label {
            surface.draw(Primitive::Text(label));
        }
    }
}
