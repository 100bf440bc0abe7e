//! Image codecs.
//!
//! A [`Codec`] hands out decoded frames through script callbacks.
//! [`SingleFrameCodec`] is the still-image implementation: one frame, no
//! repetitions, decoded asynchronously by the context's
//! [`DecoderService`](crate::DecoderService).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use frame_bridge::{
//!     ContextOptions, ExecutionContext, ImageDescriptor, PooledDecoder, SingleFrameCodec, Value,
//! };
//!
//! let options = ContextOptions::new().with_decoder(Arc::new(PooledDecoder::new(0)?));
//! let context = ExecutionContext::spawn(options)?;
//! let codec = Arc::new(SingleFrameCodec::new(ImageDescriptor::new(std::fs::read("photo.png")?)));
//!
//! context.call(move |scope| {
//!     let callback = Value::function(|_scope, frame| {
//!         if let Some(frame) = frame.as_frame() {
//!             println!("decoded {}x{}", frame.image().width(), frame.image().height());
//!         }
//!         Ok(Value::Null)
//!     });
//!     codec.get_next_frame(scope, &callback)
//! })??;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::mem;

use image::DynamicImage;

use crate::context::ContextScope;
use crate::descriptor::ImageDescriptor;
use crate::error::BridgeError;
use crate::frame::FrameInfo;
use crate::handle::{CompletionHandle, Delivery};
use crate::value::Value;

/// A source of decoded frames for script code.
pub trait Codec: Send + Sync {
    /// Number of frames the codec produces.
    fn frame_count(&self) -> u32;

    /// How many times the frame sequence repeats after the first pass.
    fn repetition_count(&self) -> i32;

    /// Request the next frame; `callback` receives it asynchronously.
    fn get_next_frame(&self, scope: &mut ContextScope<'_>, callback: &Value)
    -> Result<(), BridgeError>;

    /// Bytes attributable to this codec, for external memory accounting.
    fn allocation_size(&self) -> usize;

    /// [`get_next_frame`](Codec::get_next_frame) in script calling
    /// convention: `Null` on success, the error message as a string value
    /// otherwise.
    fn get_next_frame_value(&self, scope: &mut ContextScope<'_>, callback: &Value) -> Value {
        match self.get_next_frame(scope, callback) {
            Ok(()) => Value::Null,
            Err(error) => Value::String(error.to_string()),
        }
    }
}

/// A codec over a single still image.
///
/// Every call to [`get_next_frame`](SingleFrameCodec::get_next_frame)
/// submits an independent decode of the same descriptor; results are not
/// shared between calls.
#[derive(Debug, Clone)]
pub struct SingleFrameCodec {
    descriptor: ImageDescriptor,
}

impl SingleFrameCodec {
    /// Fixed per-instance footprint counted by
    /// [`allocation_size`](SingleFrameCodec::allocation_size).
    pub const OVERHEAD: usize = mem::size_of::<Self>();

    pub fn new(descriptor: ImageDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Always 1.
    pub fn frame_count(&self) -> u32 {
        1
    }

    /// Always 0: a still image never loops.
    pub fn repetition_count(&self) -> i32 {
        0
    }

    /// Submit a decode whose result is delivered to `callback`.
    ///
    /// Returns as soon as the decode is submitted. The callback later runs
    /// on the context thread with a [`Value::Frame`] argument, or with
    /// [`Value::Null`] if the decoder reported a failure. `Null` is the only
    /// failure signal the callback receives; the decoder's error is logged
    /// at warn level. If the context is torn down first the callback is
    /// silently dropped.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::InvalidArgument`] if `callback` is not a function.
    /// - [`BridgeError::ServiceUnavailable`] if the context has no decoder.
    ///
    /// In both cases no decode is started.
    pub fn get_next_frame(
        &self,
        scope: &mut ContextScope<'_>,
        callback: &Value,
    ) -> Result<(), BridgeError> {
        if !callback.is_function() {
            return Err(BridgeError::InvalidArgument(
                "Callback must be a function".to_string(),
            ));
        }

        let decoder = scope
            .context()
            .decoder()
            .ok_or(BridgeError::ServiceUnavailable)?;

        let handle = CompletionHandle::new(scope, callback.clone());
        log::debug!(
            "Submitting decode of {} bytes on context {}",
            self.descriptor.byte_len(),
            scope.context().id(),
        );
        decoder.decode(
            self.descriptor.clone(),
            Box::new(move |result: Result<DynamicImage, BridgeError>| {
                complete(handle, result);
            }),
        );
        Ok(())
    }

    /// Encoded byte length plus [`OVERHEAD`](SingleFrameCodec::OVERHEAD).
    pub fn allocation_size(&self) -> usize {
        self.descriptor.byte_len() + Self::OVERHEAD
    }
}

impl Codec for SingleFrameCodec {
    fn frame_count(&self) -> u32 {
        SingleFrameCodec::frame_count(self)
    }

    fn repetition_count(&self) -> i32 {
        SingleFrameCodec::repetition_count(self)
    }

    fn get_next_frame(
        &self,
        scope: &mut ContextScope<'_>,
        callback: &Value,
    ) -> Result<(), BridgeError> {
        SingleFrameCodec::get_next_frame(self, scope, callback)
    }

    fn allocation_size(&self) -> usize {
        SingleFrameCodec::allocation_size(self)
    }
}

/// Completion path: runs on the decoder's thread.
fn complete(handle: CompletionHandle, result: Result<DynamicImage, BridgeError>) {
    let delivery = handle.deliver(move |scope, callback| {
        let argument = match result {
            Ok(image) => Value::Frame(FrameInfo::still(image)),
            Err(error) => {
                log::warn!("Image decode failed: {error}");
                Value::Null
            }
        };

        let Some(function) = callback.as_function() else {
            return;
        };
        if let Err(error) = function.call(scope, argument) {
            log::error!("Frame callback failed: {error}");
        }
    });

    if delivery == Delivery::Dropped {
        log::debug!("Decoded frame discarded: owning context is gone");
    }
}
