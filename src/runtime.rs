//! Tokio-backed decoding.
//!
//! [`TokioDecoder`] runs [`decode_descriptor`] through
//! `tokio::task::spawn_blocking`, so CPU-heavy decoding never ties up the
//! runtime's cooperative task budget. Completions are invoked from the
//! blocking thread that finished the decode.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use frame_bridge::{ContextOptions, ExecutionContext, TokioDecoder};
//!
//! # fn example() -> Result<(), frame_bridge::BridgeError> {
//! let runtime = tokio::runtime::Runtime::new()?;
//! let decoder = TokioDecoder::new(runtime.handle().clone());
//! let context = ExecutionContext::spawn(ContextOptions::new().with_decoder(Arc::new(decoder)))?;
//! # Ok(())
//! # }
//! ```

use tokio::runtime::Handle;

use crate::decoder::{DecodeCompletion, DecoderService, catch_decode_panic, decode_descriptor};
use crate::descriptor::ImageDescriptor;
use crate::error::BridgeError;

/// A [`DecoderService`] that decodes on a tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioDecoder {
    handle: Handle,
}

impl TokioDecoder {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is currently running in.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DecoderSetup`] outside a tokio runtime.
    pub fn current() -> Result<Self, BridgeError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|error| BridgeError::DecoderSetup(error.to_string()))
    }
}

impl DecoderService for TokioDecoder {
    fn decode(&self, descriptor: ImageDescriptor, on_complete: DecodeCompletion) {
        // Dropping the join handle detaches the task; the completion is the
        // only way results come back.
        drop(self.handle.spawn_blocking(move || {
            on_complete(catch_decode_panic(|| decode_descriptor(&descriptor)));
        }));
    }
}
