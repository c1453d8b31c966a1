use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use super::{FrameSink, ImageTransport, RawImage};
use crate::core::pixel_buffer::{ChannelLayout, CHANNELS};
use crate::sync::FramePacer;

/// Extra bytes at the end of each row so consumers exercise stride handling.
const ROW_PADDING: usize = 16;

/// Synthetic BGRA stream: a scrolling gradient with a bright bar sweeping across.
pub struct PatternTransport {
    name: String,
    width: u32,
    height: u32,
    fps: f64,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PatternTransport {
    pub fn new(name: &str, width: u32, height: u32, fps: f64) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            fps,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

/// Paint pattern frame number `tick` into a BGRA buffer with the given row stride.
pub fn paint_pattern(buffer: &mut [u8], width: u32, height: u32, row_stride: usize, tick: u64) {
    let bar_x = if width == 0 { 0 } else { (tick % width as u64) as u32 };
    let shift = (tick % 256) as u32;

    for y in 0..height {
        let row = &mut buffer[y as usize * row_stride..][..width as usize * CHANNELS];
        for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
            let x = x as u32;
            if x == bar_x {
                px.copy_from_slice(&[255, 255, 255, 255]);
                continue;
            }
            let r = ((x * 255) / width.max(1) + shift) % 256;
            let g = ((y * 255) / height.max(1)) % 256;
            let b = (shift + (x ^ y)) % 256;
            px.copy_from_slice(&[b as u8, g as u8, r as u8, 255]);
        }
    }
}

impl ImageTransport for PatternTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, sink: Arc<dyn FrameSink>) -> bool {
        if self.handle.is_some() {
            return true;
        }
        if self.width == 0 || self.height == 0 {
            crate::utils::logger::error(&format!(
                "Pattern size {}x{} is empty",
                self.width, self.height
            ));
            return false;
        }

        let (width, height, fps) = (self.width, self.height, self.fps);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Release);

        let spawned = std::thread::Builder::new()
            .name(format!("pattern:{}", self.name))
            .spawn(move || {
                crate::utils::logger::debug("Pattern thread started");
                let row_stride = width as usize * CHANNELS + ROW_PADDING;
                let mut buffer = vec![0u8; row_stride * height as usize];
                let mut pacer = FramePacer::new(fps);
                let opened_at = Instant::now();
                let mut tick: u64 = 0;

                while running.load(Ordering::Acquire) {
                    paint_pattern(&mut buffer, width, height, row_stride, tick);
                    sink.on_frame_arrived(RawImage {
                        bytes: &buffer,
                        width: width as i32,
                        height: height as i32,
                        row_stride,
                        layout: ChannelLayout::Bgra,
                        timestamp: opened_at.elapsed(),
                    });
                    tick = tick.wrapping_add(1);
                    pacer.wait_for_next_frame();
                }

                let stats = pacer.stats();
                crate::utils::logger::debug(&format!(
                    "Pattern thread exiting after {} frames ({} resyncs)",
                    stats.frames_paced, stats.resyncs
                ));
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                crate::utils::logger::error(&format!("Failed to spawn pattern thread: {}", e));
                false
            }
        }
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                crate::utils::logger::error("Pattern thread panicked");
            }
        }
    }
}

impl Drop for PatternTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect {
        frames: Mutex<Vec<(i32, i32, usize, Vec<u8>)>>,
    }

    impl FrameSink for Collect {
        fn on_frame_arrived(&self, raw: RawImage<'_>) {
            self.frames
                .lock()
                .unwrap()
                .push((raw.width, raw.height, raw.row_stride, raw.bytes.to_vec()));
        }
    }

    #[test]
    fn test_pattern_bar_moves() {
        let (w, h) = (8u32, 2u32);
        let stride = w as usize * CHANNELS + ROW_PADDING;
        let mut buf = vec![0u8; stride * h as usize];

        paint_pattern(&mut buf, w, h, stride, 3);
        assert_eq!(&buf[3 * CHANNELS..4 * CHANNELS], &[255, 255, 255, 255]);
        assert_eq!(&buf[stride + 3 * CHANNELS..stride + 4 * CHANNELS], &[255, 255, 255, 255]);

        paint_pattern(&mut buf, w, h, stride, 4);
        assert_ne!(&buf[3 * CHANNELS..4 * CHANNELS], &[255, 255, 255, 255]);
        assert_eq!(&buf[4 * CHANNELS..5 * CHANNELS], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_padding_is_untouched() {
        let (w, h) = (4u32, 3u32);
        let stride = w as usize * CHANNELS + ROW_PADDING;
        let mut buf = vec![7u8; stride * h as usize];
        paint_pattern(&mut buf, w, h, stride, 1);
        for y in 0..h as usize {
            let pad = &buf[y * stride + w as usize * CHANNELS..(y + 1) * stride];
            assert!(pad.iter().all(|&b| b == 7));
        }
    }

    #[test]
    fn test_open_delivers_and_close_stops() {
        let sink = Arc::new(Collect::default());
        let mut transport = PatternTransport::new("/test", 6, 4, 200.0);
        assert!(transport.open(sink.clone()));
        std::thread::sleep(Duration::from_millis(60));
        transport.close();

        let count = sink.frames.lock().unwrap().len();
        assert!(count > 0);
        let (w, h, stride, bytes) = sink.frames.lock().unwrap()[0].clone();
        assert_eq!((w, h), (6, 4));
        assert_eq!(stride, 6 * CHANNELS + ROW_PADDING);
        assert_eq!(bytes.len(), stride * 4);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(sink.frames.lock().unwrap().len(), count);
        transport.close();
    }

    #[test]
    fn test_empty_pattern_refuses_to_open() {
        let sink = Arc::new(Collect::default());
        let mut transport = PatternTransport::new("/test", 0, 4, 30.0);
        assert!(!transport.open(sink));
    }
}
