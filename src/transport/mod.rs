//! Image stream sources.
//!
//! A transport owns its thread and pushes frames into a [`FrameSink`]; the
//! bytes it lends are only valid for the duration of the call.

pub mod pattern;
pub mod video;

use std::sync::Arc;
use std::time::Duration;

use crate::core::pixel_buffer::ChannelLayout;

pub use pattern::PatternTransport;
pub use video::{VideoSource, VideoTransport};

/// Borrowed view of one frame as the transport delivers it.
#[derive(Debug, Clone, Copy)]
pub struct RawImage<'a> {
    pub bytes: &'a [u8],
    pub width: i32,
    pub height: i32,
    pub row_stride: usize,
    pub layout: ChannelLayout,
    /// Capture stamp, relative to when the transport opened
    pub timestamp: Duration,
}

/// Receives frames on the transport's thread.
pub trait FrameSink: Send + Sync {
    fn on_frame_arrived(&self, raw: RawImage<'_>);
}

pub trait ImageTransport {
    fn name(&self) -> &str;

    /// Start delivering frames to `sink`. Returns false if the stream cannot be opened.
    fn open(&mut self, sink: Arc<dyn FrameSink>) -> bool;

    /// Stop delivering and join the transport thread. Safe to call twice.
    fn close(&mut self);
}
