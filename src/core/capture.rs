use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::frame::Frame;
use crate::shared::constants;

struct CaptureJob {
    frame: Frame,
    path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub saved: u64,
    pub failed: u64,
    /// Image-set frames skipped because the writer was behind
    pub dropped: u64,
}

/// Writes frames to PNG on a background thread so the UI never waits on disk.
pub struct FrameCapture {
    dir: PathBuf,
    set_dir: Option<PathBuf>,
    set_counter: u64,
    // Stamp of the last single save and how many shared it
    last_single: Option<(String, u32)>,
    jobs: Option<Sender<CaptureJob>>,
    worker: Option<JoinHandle<()>>,
    saved: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    dropped: u64,
}

impl FrameCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create capture directory {}", dir.display()))?;

        let (tx, rx) = bounded::<CaptureJob>(constants::CAPTURE_QUEUE_DEPTH);
        let saved = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let (worker_saved, worker_failed) = (Arc::clone(&saved), Arc::clone(&failed));

        let worker = std::thread::Builder::new()
            .name("capture-writer".to_string())
            .spawn(move || {
                for job in rx.iter() {
                    match write_png(&job.frame, &job.path) {
                        Ok(()) => {
                            worker_saved.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            worker_failed.fetch_add(1, Ordering::Relaxed);
                            crate::utils::logger::error(&format!("{:#}", e));
                        }
                    }
                }
                crate::utils::logger::debug("Capture writer exiting");
            })
            .context("Failed to spawn capture writer")?;

        Ok(Self {
            dir,
            set_dir: None,
            set_counter: 0,
            last_single: None,
            jobs: Some(tx),
            worker: Some(worker),
            saved,
            failed,
            dropped: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Queue `frame` under a timestamped name. Returns the path it will be written to.
    ///
    /// Saves within the same second get a `_1`, `_2`, ... suffix.
    pub fn save_single(&mut self, frame: &Frame) -> Result<PathBuf> {
        let stamp = chrono::Local::now()
            .format(constants::SINGLE_IMAGE_TIME_FORMAT)
            .to_string();
        // Queued saves may not be on disk yet, so same-second names are tracked here
        let mut n = match &self.last_single {
            Some((last, n)) if *last == stamp => n + 1,
            _ => 0,
        };
        let path = loop {
            let path = self.dir.join(format!("{}.png", suffixed(&stamp, n)));
            if !path.exists() {
                break path;
            }
            n += 1;
        };
        if !self.enqueue(frame.clone(), path.clone())? {
            bail!("Capture queue is full, {} not saved", path.display());
        }
        self.last_single = Some((stamp, n));
        Ok(path)
    }

    pub fn is_recording(&self) -> bool {
        self.set_dir.is_some()
    }

    /// Start or stop recording every delivered frame. Returns the new state.
    ///
    /// Each recording goes into its own subdirectory and numbering restarts at zero.
    pub fn toggle_image_set(&mut self) -> Result<bool> {
        if self.set_dir.take().is_some() {
            crate::utils::logger::info(&format!(
                "Stopped image set after {} frames",
                self.set_counter
            ));
            return Ok(false);
        }

        let stamp = chrono::Local::now()
            .format(constants::SINGLE_IMAGE_TIME_FORMAT)
            .to_string();
        let set_dir = create_fresh_dir(&self.dir, &format!("{}{}", constants::IMAGE_SET_DIR_PREFIX, stamp))?;
        crate::utils::logger::info(&format!("Recording image set into {}", set_dir.display()));

        self.set_dir = Some(set_dir);
        self.set_counter = 0;
        Ok(true)
    }

    /// Called for every frame the UI takes from the relay.
    ///
    /// When the writer is behind the frame is dropped and numbering does not advance.
    pub fn on_frame(&mut self, frame: &Frame) -> Result<()> {
        let Some(set_dir) = &self.set_dir else {
            return Ok(());
        };
        let path = set_dir.join(format!(
            "{}{:06}.png",
            constants::IMAGE_SET_PREFIX,
            self.set_counter
        ));
        if self.enqueue(frame.clone(), path)? {
            self.set_counter += 1;
        } else {
            self.dropped += 1;
            crate::utils::logger::debug(&format!(
                "Capture writer behind, dropped image set frame ({} so far)",
                self.dropped
            ));
        }
        Ok(())
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            saved: self.saved.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped,
        }
    }

    /// Stop recording, flush queued writes and join the writer.
    pub fn finish(&mut self) -> CaptureStats {
        self.set_dir = None;
        self.jobs = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                crate::utils::logger::error("Capture writer panicked");
            }
        }
        self.stats()
    }

    /// Hand a job to the writer without blocking. False when the queue is full.
    fn enqueue(&self, frame: Frame, path: PathBuf) -> Result<bool> {
        let jobs = self
            .jobs
            .as_ref()
            .context("Capture writer already finished")?;
        match jobs.try_send(CaptureJob { frame, path }) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => bail!("Capture writer is gone"),
        }
    }
}

fn suffixed(stem: &str, n: u32) -> String {
    if n == 0 {
        stem.to_string()
    } else {
        format!("{}_{}", stem, n)
    }
}

/// Create `base/stem`, or `base/stem_1`, `base/stem_2`, ... when taken.
fn create_fresh_dir(base: &Path, stem: &str) -> Result<PathBuf> {
    for n in 0..u32::MAX {
        let dir = base.join(suffixed(stem, n));
        match std::fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create image set directory {}", dir.display()))
            }
        }
    }
    bail!("No free image set directory under {}", base.display())
}

impl Drop for FrameCapture {
    fn drop(&mut self) {
        self.finish();
    }
}

fn write_png(frame: &Frame, path: &Path) -> Result<()> {
    let pixels = frame.pixels();
    image::save_buffer(
        path,
        pixels.as_bytes(),
        pixels.width(),
        pixels.height(),
        image::ColorType::Rgba8,
    )
    .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pixel_buffer::PixelBuffer;
    use std::time::Duration;

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("portview-{}-{}-{}", tag, std::process::id(), nanos))
    }

    fn frame(rgba: [u8; 4]) -> Frame {
        Frame::new(PixelBuffer::filled(3, 2, rgba), Duration::ZERO)
    }

    #[test]
    fn test_single_save_writes_png() {
        let dir = scratch_dir("single");
        let mut capture = FrameCapture::new(&dir).unwrap();
        let path = capture.save_single(&frame([10, 20, 30, 255])).unwrap();
        assert_eq!(path.extension().unwrap(), "png");

        let stats = capture.finish();
        assert_eq!(stats, CaptureStats { saved: 1, failed: 0, dropped: 0 });

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [10, 20, 30, 255]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_image_set_numbers_frames() {
        let dir = scratch_dir("set");
        let mut capture = FrameCapture::new(&dir).unwrap();

        capture.on_frame(&frame([1, 1, 1, 255])).unwrap();
        assert!(capture.toggle_image_set().unwrap());
        for v in 0..3u8 {
            capture.on_frame(&frame([v, v, v, 255])).unwrap();
        }
        assert!(!capture.toggle_image_set().unwrap());
        capture.on_frame(&frame([9, 9, 9, 255])).unwrap();
        capture.finish();

        let set_dir = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| p.is_dir())
            .unwrap();
        let mut names: Vec<String> = std::fs::read_dir(&set_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["image_000000.png", "image_000001.png", "image_000002.png"]);

        let last = image::open(set_dir.join("image_000002.png")).unwrap().to_rgba8();
        assert_eq!(last.get_pixel(0, 0).0, [2, 2, 2, 255]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_back_to_back_saves_get_distinct_files() {
        let dir = scratch_dir("twice");
        let mut capture = FrameCapture::new(&dir).unwrap();
        let first = capture.save_single(&frame([1, 0, 0, 255])).unwrap();
        let second = capture.save_single(&frame([2, 0, 0, 255])).unwrap();
        assert_ne!(first, second);
        assert_eq!(capture.finish().saved, 2);

        assert_eq!(image::open(&first).unwrap().to_rgba8().get_pixel(0, 0).0, [1, 0, 0, 255]);
        assert_eq!(image::open(&second).unwrap().to_rgba8().get_pixel(0, 0).0, [2, 0, 0, 255]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_restarted_image_set_keeps_earlier_recording() {
        let dir = scratch_dir("restart");
        let mut capture = FrameCapture::new(&dir).unwrap();
        for v in [10u8, 20] {
            assert!(capture.toggle_image_set().unwrap());
            capture.on_frame(&frame([v, v, v, 255])).unwrap();
            assert!(!capture.toggle_image_set().unwrap());
        }
        assert_eq!(capture.finish().saved, 2);

        let mut firsts: Vec<[u8; 4]> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.is_dir())
            .map(|p| image::open(p.join("image_000000.png")).unwrap().to_rgba8().get_pixel(0, 0).0)
            .collect();
        firsts.sort();
        assert_eq!(firsts, vec![[10, 10, 10, 255], [20, 20, 20, 255]]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_taken_directory_names_get_a_suffix() {
        let dir = scratch_dir("fresh");
        std::fs::create_dir_all(&dir).unwrap();
        let a = create_fresh_dir(&dir, "set_x").unwrap();
        let b = create_fresh_dir(&dir, "set_x").unwrap();
        assert_eq!(a, dir.join("set_x"));
        assert_eq!(b, dir.join("set_x_1"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_full_queue_drops_set_frames_without_blocking() {
        let dir = scratch_dir("full");
        let mut capture = FrameCapture::new(&dir).unwrap();
        // Nobody drains this queue, so it stays full after one job
        let (tx, rx) = bounded::<CaptureJob>(1);
        capture.jobs = Some(tx);

        assert!(capture.toggle_image_set().unwrap());
        for v in 0..3u8 {
            capture.on_frame(&frame([v, v, v, 255])).unwrap();
        }
        assert_eq!(capture.stats().dropped, 2);
        assert!(capture.save_single(&frame([0, 0, 0, 255])).is_err());

        let job = rx.try_recv().unwrap();
        assert!(job.path.ends_with("image_000000.png"));
        capture.on_frame(&frame([7, 7, 7, 255])).unwrap();
        let job = rx.try_recv().unwrap();
        assert!(job.path.ends_with("image_000001.png"));
        assert_eq!(job.frame.pixels().pixel(0, 0), Some([7, 7, 7, 255]));

        let stats = capture.finish();
        assert_eq!((stats.saved, stats.dropped), (0, 2));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_enqueue_after_finish_fails() {
        let dir = scratch_dir("finished");
        let mut capture = FrameCapture::new(&dir).unwrap();
        capture.finish();
        assert!(capture.save_single(&frame([0, 0, 0, 255])).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
