//! Decoded frame values handed to completion callbacks.

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;

/// A decoded image, shared cheaply between the frame that carries it and
/// any script values that reference it.
#[derive(Debug, Clone)]
pub struct CanvasImage {
    image: Arc<DynamicImage>,
}

impl CanvasImage {
    /// Take ownership of a decoded image.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// One decoded frame and how long it should be presented.
///
/// Immutable once built. Still images always carry a zero duration.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    image: CanvasImage,
    duration: Duration,
}

impl FrameInfo {
    pub fn new(image: CanvasImage, duration: Duration) -> Self {
        Self { image, duration }
    }

    /// Package a single still image: zero presentation duration.
    pub fn still(image: DynamicImage) -> Self {
        Self::new(CanvasImage::new(image), Duration::ZERO)
    }

    pub fn image(&self) -> &CanvasImage {
        &self.image
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
