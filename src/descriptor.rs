//! Encoded image descriptors.

use std::sync::Arc;

use crate::configuration::DecodeOptions;

/// Encoded image bytes plus the parameters to decode them with.
///
/// The byte buffer is shared and immutable, so cloning a descriptor (as the
/// codec does for every decode it submits) never copies the encoded data.
#[derive(Debug, Clone, Default)]
pub struct ImageDescriptor {
    data: Option<Arc<[u8]>>,
    options: DecodeOptions,
}

impl ImageDescriptor {
    /// Create a descriptor over `data` with default decode options.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: Some(data.into()),
            options: DecodeOptions::default(),
        }
    }

    /// A descriptor with no encoded buffer attached.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the decode options.
    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    /// The encoded bytes, if any.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Length of the encoded buffer, or 0 when absent.
    pub fn byte_len(&self) -> usize {
        self.data.as_ref().map_or(0, |data| data.len())
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }
}
