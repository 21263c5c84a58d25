//! Frame container.
//!
//! A `Frame` is an owned RGB snapshot pulled from a camera source. The same
//! instance flows through the motion gate (sampled pixel comparison) and the
//! scan session (decode attempts), so it carries a monotonic sequence number
//! that lets the session tell "newly available frame" apart from a re-pull
//! of the same capture.

use anyhow::{anyhow, Result};

/// Bytes per pixel. Sources produce packed RGB.
pub const CHANNELS: usize = 3;

/// Owned RGB frame with capture metadata.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    /// Per-source monotonic capture counter.
    seq: u64,
}

impl Frame {
    /// Create a frame, validating that the pixel buffer matches the
    /// declared dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, seq: u64) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer size mismatch: {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            seq,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Packed RGB pixel data, row-major.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}
