use std::time::{Duration, Instant};

use super::pixel_buffer::PixelBuffer;

/// One captured image plus its arrival metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: PixelBuffer,
    /// Capture stamp from the transport, relative to when it opened
    timestamp: Duration,
    arrived_at: Instant,
}

impl Frame {
    pub fn new(pixels: PixelBuffer, timestamp: Duration) -> Self {
        Self {
            pixels,
            timestamp,
            arrived_at: Instant::now(),
        }
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn size(&self) -> (u32, u32) {
        (self.pixels.width(), self.pixels.height())
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn arrived_at(&self) -> Instant {
        self.arrived_at
    }
}
