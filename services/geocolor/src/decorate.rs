//! Branding applied to the display image.

use chrono::{DateTime, Utc};
use renderer::RenderedImage;

use crate::config::DecoratorKind;

/// Title block contents for a display frame.
#[derive(Debug, Clone)]
pub struct DecorationRequest {
    pub title: String,
    pub valid_time: DateTime<Utc>,
    pub notice: String,
    pub width: usize,
    pub height: usize,
}

pub trait Decorator: Send + Sync {
    fn decorate(&self, image: &mut RenderedImage, request: &DecorationRequest)
        -> anyhow::Result<()>;
}

/// Leaves the image untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDecorator;

impl Decorator for NoopDecorator {
    fn decorate(
        &self,
        _image: &mut RenderedImage,
        _request: &DecorationRequest,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The decorator selected by configuration.
pub fn from_config(kind: DecoratorKind) -> Box<dyn Decorator> {
    match kind {
        DecoratorKind::None => Box::new(NoopDecorator),
    }
}
