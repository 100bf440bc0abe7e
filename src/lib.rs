//! # frame-bridge
//!
//! Deliver asynchronously decoded still images into thread-affine execution
//! contexts.
//!
//! A script runtime typically runs each isolate on its own thread and only
//! lets callbacks run (and be destroyed) there, while image decoding happens
//! on worker threads. `frame-bridge` connects the two: a
//! [`SingleFrameCodec`] submits a decode to the context's
//! [`DecoderService`], moves a [`CompletionHandle`] into the job, and on
//! completion marshals the decoded [`FrameInfo`] back onto the context
//! thread, or drops it silently if the context has been torn down.
//!
//! ## Quick Start
//!
//! ```
//! use std::io::Cursor;
//! use std::sync::{Arc, mpsc};
//! use std::time::Duration;
//!
//! use frame_bridge::{
//!     ContextOptions, ExecutionContext, ImageDescriptor, PooledDecoder, SingleFrameCodec, Value,
//! };
//! use image::{DynamicImage, ImageFormat, RgbImage};
//!
//! let mut png = Vec::new();
//! DynamicImage::ImageRgb8(RgbImage::new(4, 3)).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
//!
//! let decoder = Arc::new(PooledDecoder::new(1)?);
//! let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(decoder))?;
//! let codec = Arc::new(SingleFrameCodec::new(ImageDescriptor::new(png)));
//!
//! let (sender, receiver) = mpsc::channel();
//! context.call(move |scope| {
//!     let callback = Value::function(move |_scope, frame| {
//!         let frame = frame.as_frame().expect("decoded frame");
//!         sender.send((frame.image().width(), frame.duration())).ok();
//!         Ok(Value::Null)
//!     });
//!     codec.get_next_frame(scope, &callback)
//! })??;
//!
//! let (width, duration) = receiver.recv_timeout(Duration::from_secs(5))?;
//! assert_eq!(width, 4);
//! assert_eq!(duration, Duration::ZERO);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Guarantees
//!
//! - **Thread affinity**: script [`Value`]s are `!Send`; callbacks are
//!   created, invoked, and dropped on their context's thread only.
//! - **Teardown safety**: in-flight decodes hold only a weak reference to
//!   the context; a decode that finishes after teardown is discarded
//!   without invoking anything and without leaking.
//! - **Value-based errors**: precondition failures come back as
//!   [`BridgeError`] values, never panics.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`TokioDecoder`], decoding on a tokio runtime's blocking pool |
//! | `full` | Enables all of the above |

pub mod codec;
pub mod configuration;
pub mod context;
pub mod decoder;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod handle;
#[cfg(feature = "async")]
pub mod runtime;
pub mod value;

pub use codec::{Codec, SingleFrameCodec};
pub use configuration::{ContextOptions, DecodeOptions, PixelFormat};
pub use context::{ContextId, ContextScope, ExecutionContext, Persistent};
pub use decoder::{DecodeCompletion, DecoderService, PooledDecoder, decode_descriptor};
pub use descriptor::ImageDescriptor;
pub use error::BridgeError;
pub use frame::{CanvasImage, FrameInfo};
pub use handle::{CompletionHandle, Delivery};
#[cfg(feature = "async")]
pub use runtime::TokioDecoder;
pub use value::{Function, Value};
