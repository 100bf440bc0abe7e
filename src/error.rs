//! Error types for the `frame-bridge` crate.
//!
//! This module defines [`BridgeError`], the unified error type returned by all
//! fallible operations in the crate. Precondition failures of
//! [`SingleFrameCodec::get_next_frame`](crate::SingleFrameCodec::get_next_frame)
//! are reported through this type as ordinary values, never as panics.

use std::io::Error as IoError;

use image::ImageError;
use thiserror::Error;

/// The unified error type for all `frame-bridge` operations.
///
/// Every public method that can fail returns `Result<T, BridgeError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeError {
    /// A supplied argument has the wrong shape, e.g. a callback that is not
    /// a function value.
    #[error("{0}")]
    InvalidArgument(String),

    /// No decoder service could be resolved from the execution context.
    #[error("Image decoder not available.")]
    ServiceUnavailable,

    /// The execution context was destroyed before the operation could run.
    ///
    /// The completion path handles this internally by dropping the pending
    /// callback; it is only surfaced by
    /// [`ExecutionContext::post`](crate::ExecutionContext::post) and
    /// [`ExecutionContext::call`](crate::ExecutionContext::call).
    #[error("Execution context has been destroyed")]
    ContextGone,

    /// [`ExecutionContext::call`](crate::ExecutionContext::call) was invoked
    /// from the context's own thread, which would wait on itself.
    #[error("Blocking call issued from the context's own thread")]
    Reentrant,

    /// A task submitted through
    /// [`ExecutionContext::call`](crate::ExecutionContext::call) panicked
    /// before producing a result.
    #[error("Context task aborted before replying")]
    TaskAborted,

    /// The encoded bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    /// An error from the `image` crate while decoding or converting.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// A script callback reported an error while handling a delivered frame.
    #[error("Uncaught error in callback: {0}")]
    ScriptError(String),

    /// A decoder service could not be constructed.
    #[error("Decoder setup failed: {0}")]
    DecoderSetup(String),

    /// An I/O error, e.g. the context thread could not be spawned.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}
