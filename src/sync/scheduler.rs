use std::time::Duration;

use crate::renderer::layout::Viewport;
use crate::shared::constants;

/// When the compositor consumes the latest frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// One render per arrival
    Synchronous,
    /// Render on a periodic tick, only when something changed
    Timer,
}

/// Decides whether an arrival, tick or resize should trigger a render.
///
/// Owns no frames: the buffered frame lives in the compositor, so switching
/// modes never loses it.
#[derive(Debug, Clone)]
pub struct DisplayScheduler {
    mode: ScheduleMode,
    interval: Duration,
    pending: bool,
    last_viewport: Option<Viewport>,
}

impl DisplayScheduler {
    pub fn new(mode: ScheduleMode, interval_ms: u64) -> Self {
        Self {
            mode,
            interval: Duration::from_millis(clamp_interval(interval_ms)),
            pending: false,
            last_viewport: None,
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    #[cfg(test)]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Switch modes; true when a buffered frame should be rendered right away.
    pub fn set_mode(&mut self, mode: ScheduleMode) -> bool {
        self.mode = mode;
        mode == ScheduleMode::Synchronous && self.pending
    }

    pub fn toggle_mode(&mut self) -> bool {
        let next = match self.mode {
            ScheduleMode::Synchronous => ScheduleMode::Timer,
            ScheduleMode::Timer => ScheduleMode::Synchronous,
        };
        self.set_mode(next)
    }

    /// Set the tick interval, clamped to the supported range. Returns the value used.
    pub fn set_interval_ms(&mut self, interval_ms: u64) -> u64 {
        let ms = clamp_interval(interval_ms);
        self.interval = Duration::from_millis(ms);
        ms
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval.as_millis() as u64
    }

    /// A new frame reached the UI thread.
    pub fn on_arrival(&mut self) -> bool {
        self.pending = true;
        self.mode == ScheduleMode::Synchronous
    }

    /// Periodic tick; ignored outside timer mode.
    pub fn on_tick(&self, viewport: Viewport) -> bool {
        self.mode == ScheduleMode::Timer && (self.pending || self.viewport_changed(viewport))
    }

    /// Terminal resized; the timer picks this up on its next tick.
    pub fn on_resize(&self, viewport: Viewport) -> bool {
        self.mode == ScheduleMode::Synchronous && self.viewport_changed(viewport)
    }

    /// Force a redraw on the next decision (layout policy changed).
    pub fn invalidate(&mut self) {
        self.last_viewport = None;
    }

    pub fn mark_rendered(&mut self, viewport: Viewport) {
        self.pending = false;
        self.last_viewport = Some(viewport);
    }

    fn viewport_changed(&self, viewport: Viewport) -> bool {
        self.last_viewport != Some(viewport)
    }
}

fn clamp_interval(interval_ms: u64) -> u64 {
    interval_ms.clamp(constants::MIN_REFRESH_MS, constants::MAX_REFRESH_MS)
}
