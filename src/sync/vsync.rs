use std::time::{Duration, Instant};

/// Paces a producer loop at a fixed rate.
///
/// Sleeps only for the time left in the current period and resyncs instead of
/// bursting when the producer falls several periods behind.
pub struct FramePacer {
    target_fps: f64,
    frame_duration: Duration,
    next_frame_time: Instant,
    frames_paced: u64,
    resyncs: u64,
}

impl FramePacer {
    pub fn new(fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 30.0 };
        let frame_duration = Duration::from_secs_f64(1.0 / fps);
        Self {
            target_fps: fps,
            frame_duration,
            next_frame_time: Instant::now() + frame_duration,
            frames_paced: 0,
            resyncs: 0,
        }
    }

    /// Block until the next frame is due.
    pub fn wait_for_next_frame(&mut self) {
        let now = Instant::now();

        if now > self.next_frame_time + self.frame_duration * 3 {
            self.next_frame_time = now + self.frame_duration;
            self.frames_paced += 1;
            self.resyncs += 1;
            return;
        }

        if now < self.next_frame_time {
            std::thread::sleep(self.next_frame_time - now);
        }

        self.next_frame_time += self.frame_duration;
        self.frames_paced += 1;
    }

    pub fn stats(&self) -> PacerStats {
        PacerStats {
            frames_paced: self.frames_paced,
            resyncs: self.resyncs,
            target_fps: self.target_fps,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PacerStats {
    pub frames_paced: u64,
    pub resyncs: u64,
    pub target_fps: f64,
}
