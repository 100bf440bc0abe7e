//! Decode and context configuration.
//!
//! [`DecodeOptions`] carries the per-descriptor decode parameters (target
//! resolution and output pixel format), and [`ContextOptions`] is a builder
//! for spawning an [`ExecutionContext`](crate::ExecutionContext).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use frame_bridge::{ContextOptions, DecodeOptions, PixelFormat, PooledDecoder};
//!
//! let decoder = PooledDecoder::new(2)?;
//! let options = ContextOptions::new()
//!     .with_name("ui")
//!     .with_decoder(Arc::new(decoder));
//!
//! let decode = DecodeOptions::new()
//!     .with_pixel_format(PixelFormat::Rgba8)
//!     .with_resolution(Some(320), None);
//! # Ok::<(), frame_bridge::BridgeError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use image::DynamicImage;

use crate::decoder::DecoderService;

/// Output pixel format for decoded images.
///
/// Controls the colour model and depth of the [`DynamicImage`] a decoder
/// hands back to the completion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Whatever the encoded source decodes to, without conversion.
    #[default]
    Native,
    /// 8-bit RGB (24 bpp).
    Rgb8,
    /// 8-bit RGBA (32 bpp).
    Rgba8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl PixelFormat {
    /// Convert `image` into this pixel format.
    pub(crate) fn convert(self, image: DynamicImage) -> DynamicImage {
        match self {
            PixelFormat::Native => image,
            PixelFormat::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
            PixelFormat::Rgba8 => DynamicImage::ImageRgba8(image.to_rgba8()),
            PixelFormat::Gray8 => DynamicImage::ImageLuma8(image.to_luma8()),
        }
    }

    /// Bytes per pixel of the converted output, if the format is fixed.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Native => None,
            PixelFormat::Rgb8 => Some(3),
            PixelFormat::Rgba8 => Some(4),
            PixelFormat::Gray8 => Some(1),
        }
    }
}

/// Decode parameters attached to an [`ImageDescriptor`](crate::ImageDescriptor).
///
/// When no dimensions are set the source resolution is used. Setting one
/// dimension together with
/// [`maintain_aspect_ratio`](DecodeOptions::maintain_aspect_ratio) computes
/// the other dimension automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Output pixel format.
    pub pixel_format: PixelFormat,
    /// Target width. `None` keeps the source width.
    pub width: Option<u32>,
    /// Target height. `None` keeps the source height.
    pub height: Option<u32>,
    /// When `true` and only one dimension is specified, the other is
    /// computed to preserve the source aspect ratio.
    pub maintain_aspect_ratio: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeOptions {
    /// Source resolution, native pixel format, aspect ratio preserved.
    pub fn new() -> Self {
        Self {
            pixel_format: PixelFormat::Native,
            width: None,
            height: None,
            maintain_aspect_ratio: true,
        }
    }

    /// Set the output pixel format.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set a target resolution. Pass `None` for either dimension to keep
    /// the source value.
    #[must_use]
    pub fn with_resolution(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Control whether aspect ratio is preserved when only one dimension is
    /// specified. Defaults to `true`.
    #[must_use]
    pub fn with_maintain_aspect_ratio(mut self, maintain: bool) -> Self {
        self.maintain_aspect_ratio = maintain;
        self
    }

    /// Resolve the final output dimensions given the source size.
    ///
    /// Returns `(width, height)`.
    pub fn resolve_dimensions(&self, source_width: u32, source_height: u32) -> (u32, u32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) if self.maintain_aspect_ratio && source_width > 0 => {
                let ratio = w as f64 / source_width as f64;
                let h = (source_height as f64 * ratio).round() as u32;
                (w, h.max(1))
            }
            (Some(w), None) => (w, source_height),
            (None, Some(h)) if self.maintain_aspect_ratio && source_height > 0 => {
                let ratio = h as f64 / source_height as f64;
                let w = (source_width as f64 * ratio).round() as u32;
                (w.max(1), h)
            }
            (None, Some(h)) => (source_width, h),
            (None, None) => (source_width, source_height),
        }
    }
}

/// Settings for spawning an [`ExecutionContext`](crate::ExecutionContext).
///
/// A context without a decoder is valid; requesting a frame from it fails
/// with [`BridgeError::ServiceUnavailable`](crate::BridgeError::ServiceUnavailable).
#[derive(Clone, Default)]
pub struct ContextOptions {
    /// Thread name for the context. `None` derives one from the context id.
    pub(crate) name: Option<String>,
    /// Decoder service resolvable from the context.
    pub(crate) decoder: Option<Arc<dyn DecoderService>>,
}

impl Debug for ContextOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ContextOptions")
            .field("name", &self.name)
            .field("has_decoder", &self.decoder.is_some())
            .finish()
    }
}

impl ContextOptions {
    /// Create options with no name and no decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the context (and its thread).
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach the decoder service the context resolves for codecs.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn DecoderService>) -> Self {
        self.decoder = Some(decoder);
        self
    }
}
