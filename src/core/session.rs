use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::capture::FrameCapture;
use super::click_port::{ClickPoint, ClickPort};
use super::frame::Frame;
use crate::renderer::mapper::map_to_image;
use crate::renderer::{DisplayCompositor, LayoutPolicy, PixelReadout, RenderOutput, StatusReport, Viewport};
use crate::shared::constants;
use crate::sync::{DisplayScheduler, FrameClock, ScheduleMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
}

/// Emitted when a click lands on the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelClicked {
    pub button: PointerButton,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub policy: LayoutPolicy,
    pub mode: ScheduleMode,
    pub refresh_ms: u64,
    pub show_pixel_value: bool,
    pub autosize: bool,
    pub capture_dir: PathBuf,
    pub left_out: Option<PathBuf>,
    pub right_out: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            policy: LayoutPolicy::default(),
            mode: ScheduleMode::Timer,
            refresh_ms: constants::DEFAULT_REFRESH_MS,
            show_pixel_value: false,
            autosize: false,
            capture_dir: PathBuf::from("."),
            left_out: None,
            right_out: None,
        }
    }
}

/// All viewer state the UI thread owns: policy, freeze, scheduling, capture
/// and click outputs. The terminal loop only translates events into calls here.
pub struct ViewerSession {
    policy: LayoutPolicy,
    frozen: Arc<AtomicBool>,
    clock: Arc<FrameClock>,
    scheduler: DisplayScheduler,
    compositor: DisplayCompositor,
    // Newest frame not yet handed to the compositor
    pending: Option<Frame>,
    capture: FrameCapture,
    left_port: Option<ClickPort>,
    right_port: Option<ClickPort>,
    show_pixel_value: bool,
    autosize: bool,
    hover: Option<PixelReadout>,
}

impl ViewerSession {
    pub fn new(options: SessionOptions, clock: Arc<FrameClock>, frozen: Arc<AtomicBool>) -> Result<Self> {
        let capture = FrameCapture::new(options.capture_dir)?;
        crate::utils::logger::info(&format!("Captures go to {}", capture.dir().display()));

        Ok(Self {
            policy: options.policy,
            frozen,
            compositor: DisplayCompositor::new(Arc::clone(&clock)),
            clock,
            scheduler: DisplayScheduler::new(options.mode, options.refresh_ms),
            pending: None,
            capture,
            left_port: ClickPort::open_optional(options.left_out.as_deref()),
            right_port: ClickPort::open_optional(options.right_out.as_deref()),
            show_pixel_value: options.show_pixel_value,
            autosize: options.autosize,
            hover: None,
        })
    }

    /// Take a frame off the relay. Returns true when it should be rendered now.
    pub fn accept_frame(&mut self, frame: Frame) -> bool {
        if let Err(e) = self.capture.on_frame(&frame) {
            crate::utils::logger::error(&format!("Image set capture failed: {:#}", e));
        }
        self.pending = Some(frame);
        self.scheduler.on_arrival()
    }

    pub fn on_tick(&self, viewport: Viewport) -> bool {
        self.scheduler.on_tick(viewport)
    }

    pub fn on_resize(&self, viewport: Viewport) -> bool {
        self.scheduler.on_resize(viewport)
    }

    /// Show the newest frame. Mapping and hover follow what was rendered last.
    pub fn render(&mut self, viewport: Viewport) -> Result<Option<RenderOutput>> {
        if let Some(frame) = self.pending.take() {
            self.compositor.set_frame(frame);
        }
        let output = self.compositor.render(viewport, self.policy)?;
        self.scheduler.mark_rendered(viewport);
        Ok(output)
    }

    pub fn compositor(&self) -> &DisplayCompositor {
        &self.compositor
    }

    fn latest_frame(&self) -> Option<&Frame> {
        self.pending.as_ref().or_else(|| self.compositor.current_frame())
    }

    pub fn status(&self, viewport: Viewport) -> StatusReport {
        StatusReport {
            arrival: self.clock.arrival_stats(),
            render: self.clock.render_stats(),
            frame_size: self.compositor.frame_size(),
            viewport,
        }
    }

    fn map_point(&self, point: (u32, u32)) -> Option<(u32, u32)> {
        let rect = self.compositor.last_draw_rect()?;
        let size = self.compositor.frame_size()?;
        map_to_image(point, rect, size, self.policy)
    }

    /// Mouse press at a viewport point. Clicks off the image emit nothing.
    pub fn pointer_down(&mut self, button: PointerButton, point: (u32, u32)) -> Option<PixelClicked> {
        let (x, y) = self.map_point(point)?;
        let port = match button {
            PointerButton::Left => self.left_port.as_mut(),
            PointerButton::Right => self.right_port.as_mut(),
        };
        if let Some(port) = port {
            if let Err(e) = port.write(ClickPoint { x, y }) {
                crate::utils::logger::error(&format!(
                    "Failed to write click to {}: {:#}",
                    port.path().display(),
                    e
                ));
            }
        }
        Some(PixelClicked { button, x, y })
    }

    /// Mouse motion at a viewport point; tracked only while the pixel readout is on.
    pub fn pointer_move(&mut self, point: (u32, u32)) -> Option<PixelReadout> {
        if !self.show_pixel_value {
            return None;
        }
        let readout = self.map_point(point).and_then(|(x, y)| {
            let rgba = self.compositor.current_frame()?.pixels().pixel(x, y)?;
            Some(PixelReadout { x, y, rgba })
        });
        if readout.is_some() {
            self.hover = readout;
        }
        readout
    }

    pub fn hover(&self) -> Option<PixelReadout> {
        self.hover.filter(|_| self.show_pixel_value)
    }

    pub fn policy(&self) -> LayoutPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: LayoutPolicy) {
        if policy != self.policy {
            self.policy = policy;
            self.scheduler.invalidate();
        }
    }

    /// Frame size the terminal should be resized to, when autosize applies.
    pub fn autosize_target(&self) -> Option<(u32, u32)> {
        if self.autosize && self.policy == LayoutPolicy::OriginalSize {
            self.latest_frame().map(Frame::size)
        } else {
            None
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn set_frozen(&self, frozen: bool) {
        self.frozen.store(frozen, Ordering::Release);
    }

    pub fn toggle_freeze(&self) -> bool {
        let frozen = !self.is_frozen();
        self.set_frozen(frozen);
        frozen
    }

    pub fn mode(&self) -> ScheduleMode {
        self.scheduler.mode()
    }

    /// Flip between synchronous and timer rendering. True when a buffered frame should render now.
    pub fn toggle_synch(&mut self) -> bool {
        self.scheduler.toggle_mode()
    }

    pub fn refresh_ms(&self) -> u64 {
        self.scheduler.interval_ms()
    }

    /// Halve (`faster`) or double the timer interval. Returns the interval in effect.
    pub fn step_refresh(&mut self, faster: bool) -> u64 {
        let current = self.scheduler.interval_ms();
        let next = if faster { current / 2 } else { current.saturating_mul(2) };
        self.scheduler.set_interval_ms(next)
    }

    pub fn show_pixel_value(&self) -> bool {
        self.show_pixel_value
    }

    pub fn toggle_pixel_value(&mut self) -> bool {
        self.show_pixel_value = !self.show_pixel_value;
        if !self.show_pixel_value {
            self.hover = None;
        }
        self.show_pixel_value
    }

    /// Save the newest frame, shown or not. `None` when nothing has arrived yet.
    pub fn save_single(&mut self) -> Result<Option<PathBuf>> {
        let latest = self.pending.as_ref().or_else(|| self.compositor.current_frame());
        let Some(frame) = latest else {
            return Ok(None);
        };
        Ok(Some(self.capture.save_single(frame)?))
    }

    pub fn toggle_image_set(&mut self) -> Result<bool> {
        self.capture.toggle_image_set()
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    /// Flush pending captures. The session is still usable for reading state.
    pub fn finish(&mut self) {
        let stats = self.capture.finish();
        crate::utils::logger::info(&format!(
            "Capture finished: {} saved, {} failed, {} dropped",
            stats.saved, stats.failed, stats.dropped
        ));
        for port in [&self.left_port, &self.right_port].into_iter().flatten() {
            crate::utils::logger::info(&format!(
                "{} clicks written to {}",
                port.written(),
                port.path().display()
            ));
        }
    }
}
