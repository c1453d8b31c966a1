use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::frame::Frame;
use super::frame_buffer::FrameRelay;
use super::pixel_buffer::PixelBuffer;
use crate::sync::FrameClock;
use crate::transport::{FrameSink, RawImage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCounters {
    pub accepted: u64,
    pub malformed: u64,
    /// Frames replaced in the relay before the UI took them
    pub superseded: u64,
}

/// Entry point for frames coming off the transport thread.
///
/// Normalizes channel order, deep-copies, and hands the frame to the relay.
/// While frozen every arrival is discarded before any allocation.
pub struct FrameSource {
    frozen: Arc<AtomicBool>,
    relay: Arc<FrameRelay>,
    clock: Arc<FrameClock>,
    accepted: AtomicU64,
    malformed: AtomicU64,
    superseded: AtomicU64,
}

impl FrameSource {
    pub fn new(relay: Arc<FrameRelay>, clock: Arc<FrameClock>, frozen: Arc<AtomicBool>) -> Self {
        Self {
            frozen,
            relay,
            clock,
            accepted: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        }
    }

    pub fn counters(&self) -> SourceCounters {
        SourceCounters {
            accepted: self.accepted.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
        }
    }
}

impl FrameSink for FrameSource {
    fn on_frame_arrived(&self, raw: RawImage<'_>) {
        if self.frozen.load(Ordering::Acquire) {
            return;
        }

        if raw.width <= 0 || raw.height <= 0 {
            self.malformed.fetch_add(1, Ordering::Relaxed);
            crate::utils::logger::debug(&format!(
                "Dropped frame with invalid size {}x{}",
                raw.width, raw.height
            ));
            return;
        }

        let pixels = match PixelBuffer::from_raw(
            raw.bytes,
            raw.width as u32,
            raw.height as u32,
            raw.row_stride,
            raw.layout,
        ) {
            Ok(p) => p,
            Err(e) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                crate::utils::logger::debug(&format!("Dropped malformed frame: {}", e));
                return;
            }
        };

        if self.relay.push(Frame::new(pixels, raw.timestamp)) {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.clock.record_arrival();
    }
}
