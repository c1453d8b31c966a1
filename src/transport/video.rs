use anyhow::{anyhow, Result};
use opencv::{core, imgproc, prelude::*, videoio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{FrameSink, ImageTransport, RawImage};
use crate::core::pixel_buffer::{ChannelLayout, CHANNELS};
use crate::shared::constants;
use crate::sync::FramePacer;

/// Where the video stream comes from: a file or URL, or a camera index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    File(String),
    Camera(i32),
}

impl VideoSource {
    /// Digits-only input selects a camera; anything else is opened as a path.
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<i32>() {
            Ok(index) if index >= 0 => VideoSource::Camera(index),
            _ => VideoSource::File(input.to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            VideoSource::File(path) => path.clone(),
            VideoSource::Camera(index) => format!("camera {}", index),
        }
    }
}

/// Streams decoded frames from OpenCV at the source's native rate.
pub struct VideoTransport {
    name: String,
    source: VideoSource,
    looping: bool,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VideoTransport {
    pub fn new(name: &str, source: VideoSource, looping: bool) -> Self {
        Self {
            name: name.to_string(),
            source,
            looping,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

struct VideoReader {
    capture: videoio::VideoCapture,
    frame: Mat,
    bgra: Mat,
    fps: f64,
}

impl VideoReader {
    fn open(source: &VideoSource) -> Result<Self> {
        // CAP_ANY lets OpenCV pick the backend for the platform
        let mut capture = match source {
            VideoSource::File(path) => videoio::VideoCapture::from_file(path, videoio::CAP_ANY)?,
            VideoSource::Camera(index) => videoio::VideoCapture::new(*index, videoio::CAP_ANY)?,
        };
        let _ = capture.set(
            videoio::CAP_PROP_HW_ACCELERATION,
            videoio::VIDEO_ACCELERATION_ANY as f64,
        );

        if !capture.is_opened()? {
            return Err(anyhow!("Failed to open video source: {}", source.describe()));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            constants::DEFAULT_PATTERN_FPS as f64
        };

        crate::utils::logger::info(&format!(
            "Opened {} ({}x{} @ {:.2} fps)",
            source.describe(),
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
            fps
        ));

        Ok(Self {
            capture,
            frame: Mat::default(),
            bgra: Mat::default(),
            fps,
        })
    }

    /// Decode the next frame into `self.bgra`. Returns false at end of stream.
    fn read_next(&mut self) -> Result<bool> {
        if !self.capture.read(&mut self.frame)? || self.frame.empty() {
            return Ok(false);
        }

        #[cfg(target_os = "macos")]
        imgproc::cvt_color(
            &self.frame,
            &mut self.bgra,
            imgproc::COLOR_BGR2BGRA,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;

        #[cfg(not(target_os = "macos"))]
        imgproc::cvt_color(&self.frame, &mut self.bgra, imgproc::COLOR_BGR2BGRA, 0)?;

        if !self.bgra.is_continuous() {
            return Err(anyhow!("Frame is not continuous"));
        }
        Ok(true)
    }

    fn position(&self) -> Option<Duration> {
        let ms = self.capture.get(videoio::CAP_PROP_POS_MSEC).ok()?;
        (ms.is_finite() && ms >= 0.0).then(|| Duration::from_secs_f64(ms / 1000.0))
    }

    fn rewind(&mut self) -> Result<bool> {
        Ok(self.capture.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?)
    }

    fn deliver(&self, sink: &dyn FrameSink, timestamp: Duration) -> Result<()> {
        let width = self.bgra.cols();
        let height = self.bgra.rows();
        let bytes = self.bgra.data_bytes()?;
        sink.on_frame_arrived(RawImage {
            bytes,
            width,
            height,
            row_stride: width.max(0) as usize * CHANNELS,
            layout: ChannelLayout::Bgra,
            timestamp,
        });
        Ok(())
    }
}

fn run_reader(
    mut reader: VideoReader,
    sink: Arc<dyn FrameSink>,
    running: Arc<AtomicBool>,
    looping: bool,
) -> Result<()> {
    let mut pacer = FramePacer::new(reader.fps);
    let opened_at = Instant::now();

    while running.load(Ordering::Acquire) {
        if !reader.read_next()? {
            if looping && reader.rewind()? {
                crate::utils::logger::debug("Video EOF, rewinding");
                continue;
            }
            crate::utils::logger::debug("Video EOF");
            break;
        }

        let timestamp = reader.position().unwrap_or_else(|| opened_at.elapsed());
        reader.deliver(sink.as_ref(), timestamp)?;
        pacer.wait_for_next_frame();
    }

    let stats = pacer.stats();
    crate::utils::logger::debug(&format!(
        "Video reader paced {} frames at {:.2} fps ({} resyncs)",
        stats.frames_paced, stats.target_fps, stats.resyncs
    ));
    Ok(())
}

impl ImageTransport for VideoTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, sink: Arc<dyn FrameSink>) -> bool {
        if self.handle.is_some() {
            return true;
        }

        let reader = match VideoReader::open(&self.source) {
            Ok(reader) => reader,
            Err(e) => {
                crate::utils::logger::error(&format!("{}", e));
                return false;
            }
        };

        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Release);
        let looping = self.looping;

        let spawned = std::thread::Builder::new()
            .name(format!("video:{}", self.name))
            .spawn(move || {
                crate::utils::logger::debug("Video thread started");
                if let Err(e) = run_reader(reader, sink, running, looping) {
                    crate::utils::logger::error(&format!("Decoding error: {}", e));
                }
                crate::utils::logger::debug("Video thread exiting");
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                crate::utils::logger::error(&format!("Failed to spawn video thread: {}", e));
                false
            }
        }
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                crate::utils::logger::error("Video thread panicked");
            }
        }
    }
}

impl Drop for VideoTransport {
    fn drop(&mut self) {
        self.close();
    }
}
