//! Decoder services.
//!
//! A [`DecoderService`] accepts an [`ImageDescriptor`] and a single-use
//! [`DecodeCompletion`], decodes off the caller's thread, and invokes the
//! completion at most once, on whatever thread finished the work. A service
//! that shuts down may drop a completion without calling it.
//!
//! [`PooledDecoder`] is the built-in service: it decodes with the
//! [`image`] crate on a dedicated [`rayon`] thread pool.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use image::{DynamicImage, Limits, imageops::FilterType};

use crate::descriptor::ImageDescriptor;
use crate::error::BridgeError;

/// Single-use handler receiving the outcome of one decode.
pub type DecodeCompletion = Box<dyn FnOnce(Result<DynamicImage, BridgeError>) + Send + 'static>;

/// An asynchronous image decoder.
///
/// Implementations must be [`Send`] and [`Sync`] because a context hands
/// out shared references to its decoder and completions are invoked from
/// worker threads.
pub trait DecoderService: Send + Sync {
    /// Decode `descriptor` and hand the result to `on_complete`.
    ///
    /// Must not block the calling thread on the decode itself.
    fn decode(&self, descriptor: ImageDescriptor, on_complete: DecodeCompletion);
}

/// Decode a descriptor synchronously on the current thread.
///
/// Applies the descriptor's target resolution and pixel format.
///
/// # Errors
///
/// Returns [`BridgeError::DecodeError`] if the descriptor carries no bytes
/// or its target resolution exceeds the `image` crate's default
/// [`Limits`], or [`BridgeError::ImageError`] if the bytes cannot be
/// decoded.
pub fn decode_descriptor(descriptor: &ImageDescriptor) -> Result<DynamicImage, BridgeError> {
    let data = descriptor
        .data()
        .filter(|data| !data.is_empty())
        .ok_or_else(|| BridgeError::DecodeError("descriptor has no encoded data".to_string()))?;

    let image = image::load_from_memory(data)?;
    let options = descriptor.options();

    let (width, height) = options.resolve_dimensions(image.width(), image.height());
    let image = if (width, height) == (image.width(), image.height()) {
        image
    } else {
        check_resize_limits(&image, width, height)?;
        image.resize_exact(width, height, FilterType::Triangle)
    };

    Ok(options.pixel_format.convert(image))
}

/// Reject resize targets that `load_from_memory` would have refused to
/// allocate.
///
/// Counts the output buffer and the `f32` RGBA intermediate of the
/// separable filter against [`Limits::max_alloc`].
fn check_resize_limits(source: &DynamicImage, width: u32, height: u32) -> Result<(), BridgeError> {
    let limits = Limits::default();
    let too_large = || {
        BridgeError::DecodeError(format!(
            "target resolution {width}x{height} exceeds decoder limits"
        ))
    };

    if limits.max_image_width.is_some_and(|max| width > max)
        || limits.max_image_height.is_some_and(|max| height > max)
    {
        return Err(too_large());
    }

    let output_bpp = u64::from(source.color().bytes_per_pixel());
    let buffers = [
        (width, height, output_bpp),
        (source.width(), height, 16),
        (width, source.height(), 16),
    ];
    for (w, h, bpp) in buffers {
        let bytes = u64::from(w)
            .checked_mul(u64::from(h))
            .and_then(|pixels| pixels.checked_mul(bpp))
            .ok_or_else(too_large)?;
        if limits.max_alloc.is_some_and(|max| bytes > max) {
            return Err(too_large());
        }
    }
    Ok(())
}

/// Run `decode`, turning a panic into [`BridgeError::DecodeError`].
pub(crate) fn catch_decode_panic<F>(decode: F) -> Result<DynamicImage, BridgeError>
where
    F: FnOnce() -> Result<DynamicImage, BridgeError>,
{
    panic::catch_unwind(AssertUnwindSafe(decode)).unwrap_or_else(|payload| {
        Err(BridgeError::DecodeError(format!(
            "decoder panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// A [`DecoderService`] backed by a dedicated rayon thread pool.
pub struct PooledDecoder {
    pool: rayon::ThreadPool,
}

impl PooledDecoder {
    /// Build a decoder with `threads` workers. Zero lets rayon pick.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DecoderSetup`] if the pool cannot be built.
    pub fn new(threads: usize) -> Result<Self, BridgeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("frame-decode-{index}"))
            .panic_handler(|payload| {
                log::error!("Decoder pool job panicked: {}", panic_message(payload.as_ref()));
            })
            .build()
            .map_err(|error| BridgeError::DecoderSetup(error.to_string()))?;
        log::debug!("Decoder pool started with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl DecoderService for PooledDecoder {
    fn decode(&self, descriptor: ImageDescriptor, on_complete: DecodeCompletion) {
        self.pool.spawn(move || {
            let result = catch_decode_panic(|| decode_descriptor(&descriptor));
            if let Err(error) = &result {
                log::debug!("Decode of {} bytes failed: {error}", descriptor.byte_len());
            }
            on_complete(result);
        });
    }
}
