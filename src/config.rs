//! Codec configuration

use crate::io::ByteOrder;

/// Default size above which byte swapping runs on the rayon pool (1 MiB)
pub const DEFAULT_PARALLEL_SWAP_THRESHOLD: usize = 1 << 20;

/// Options shared by every codec created through the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Byte order of newly written LUM, BSQ and RAD files
    pub write_byte_order: ByteOrder,
    /// Buffers larger than this many bytes are swapped in parallel
    pub parallel_swap_threshold: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            write_byte_order: ByteOrder::host(),
            parallel_swap_threshold: DEFAULT_PARALLEL_SWAP_THRESHOLD,
        }
    }
}

impl CodecOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the byte order used when creating files
    pub fn write_byte_order(mut self, order: ByteOrder) -> Self {
        self.write_byte_order = order;
        self
    }

    /// Sets the parallel byte-swap threshold in bytes
    pub fn parallel_swap_threshold(mut self, bytes: usize) -> Self {
        self.parallel_swap_threshold = bytes;
        self
    }
}
