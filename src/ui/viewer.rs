use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, never, select, tick, Receiver};
use crossterm::event::Event;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::input::{cell_to_viewport, command_for, InputReader, ViewerCommand};
use crate::config::{SourceConfig, ViewerConfig};
use crate::core::{FrameRelay, FrameSource, SessionOptions, ViewerSession};
use crate::renderer::cell::CellData;
use crate::renderer::{DisplayManager, DrawRect, FrameProcessor};
use crate::sync::{FrameClock, ScheduleMode};
use crate::transport::{ImageTransport, PatternTransport, VideoTransport};

/// What the loop does after handling one wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    /// Scheduling mode or interval changed; rebuild the ticker
    Retick,
    Quit,
}

/// Open the configured stream and run the terminal viewer until quit.
pub fn run_viewer(config: ViewerConfig) -> Result<()> {
    let clock = Arc::new(FrameClock::new());
    let frozen = Arc::new(AtomicBool::new(config.freeze));
    let (relay, wake) = FrameRelay::new();
    let relay = Arc::new(relay);
    let source = Arc::new(FrameSource::new(
        Arc::clone(&relay),
        Arc::clone(&clock),
        Arc::clone(&frozen),
    ));

    let mut transport: Box<dyn ImageTransport> = match &config.source {
        SourceConfig::Pattern { width, height, fps } => {
            Box::new(PatternTransport::new(&config.name, *width, *height, *fps as f64))
        }
        SourceConfig::Video { source, looping } => {
            Box::new(VideoTransport::new(&config.name, source.clone(), *looping))
        }
    };

    let mut session = ViewerSession::new(
        SessionOptions {
            policy: config.policy,
            mode: if config.synch { ScheduleMode::Synchronous } else { ScheduleMode::Timer },
            refresh_ms: config.refresh_ms,
            show_pixel_value: false,
            autosize: config.autosize,
            capture_dir: config.capture_dir.clone(),
            left_out: config.left_out.clone(),
            right_out: config.right_out.clone(),
        },
        clock,
        frozen,
    )?;

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("Failed to install signal handler")?;

    if !transport.open(source.clone()) {
        bail!("Failed to open stream {}", transport.name());
    }
    crate::utils::logger::info(&format!("Opened stream {}", transport.name()));

    let result = (|| -> Result<()> {
        let display = DisplayManager::new(&config.title, config.status_rows())?;
        let (mut input, events) = InputReader::spawn()?;
        let outcome = {
            let mut viewer = Viewer {
                session: &mut session,
                display,
                relay: &relay,
                cells: Vec::new(),
                config: &config,
                notice: None,
                last_rect: None,
                last_autosize: None,
            };
            viewer.run(&wake, &events, &shutdown_rx)
        };
        input.stop();
        outcome
    })();

    transport.close();
    session.finish();

    let counters = source.counters();
    crate::utils::logger::info(&format!(
        "Viewer closed. Frames accepted: {}, superseded: {}, malformed: {}",
        counters.accepted, counters.superseded, counters.malformed
    ));

    result
}

struct Viewer<'a> {
    session: &'a mut ViewerSession,
    display: DisplayManager,
    relay: &'a FrameRelay,
    cells: Vec<CellData>,
    config: &'a ViewerConfig,
    notice: Option<String>,
    last_rect: Option<DrawRect>,
    last_autosize: Option<(u32, u32)>,
}

impl Viewer<'_> {
    fn run(&mut self, wake: &Receiver<()>, events: &Receiver<Event>, shutdown: &Receiver<()>) -> Result<()> {
        self.display.clear()?;
        self.draw_status()?;

        let mut ticker = self.ticker();

        loop {
            let step = select! {
                recv(wake) -> _ => self.on_wake(),
                recv(events) -> ev => match ev {
                    Ok(ev) => self.on_event(&ev),
                    Err(_) => {
                        crate::utils::logger::debug("Input channel closed");
                        Ok(Step::Quit)
                    }
                },
                recv(ticker) -> _ => self.on_tick(),
                recv(shutdown) -> _ => {
                    crate::utils::logger::info("Interrupted");
                    Ok(Step::Quit)
                }
            }?;

            match step {
                Step::Continue => {}
                Step::Retick => ticker = self.ticker(),
                Step::Quit => break,
            }
        }
        Ok(())
    }

    fn on_wake(&mut self) -> Result<Step> {
        if let Some(frame) = self.relay.take() {
            let render_now = self.session.accept_frame(frame);
            self.apply_autosize();
            if render_now {
                self.render()?;
            }
        }
        Ok(Step::Continue)
    }

    fn on_event(&mut self, ev: &Event) -> Result<Step> {
        let Some(command) = command_for(ev, self.config.minimal) else {
            return Ok(Step::Continue);
        };
        let retick = matches!(
            command,
            ViewerCommand::ToggleSynch | ViewerCommand::RefreshFaster | ViewerCommand::RefreshSlower
        );
        if self.handle(command)? == Step::Quit {
            return Ok(Step::Quit);
        }
        Ok(if retick { Step::Retick } else { Step::Continue })
    }

    fn on_tick(&mut self) -> Result<Step> {
        let viewport = self.display.viewport()?;
        if self.session.on_tick(viewport) {
            self.render()?;
        }
        Ok(Step::Continue)
    }

    fn ticker(&self) -> Receiver<Instant> {
        match self.session.mode() {
            ScheduleMode::Timer => tick(Duration::from_millis(self.session.refresh_ms())),
            ScheduleMode::Synchronous => never(),
        }
    }

    fn handle(&mut self, command: ViewerCommand) -> Result<Step> {
        match command {
            ViewerCommand::Quit => return Ok(Step::Quit),
            ViewerCommand::SetPolicy(policy) => {
                self.session.set_policy(policy);
                self.notice = Some(format!("Layout: {}", policy.label()));
                self.apply_autosize();
                if self.session.mode() == ScheduleMode::Synchronous {
                    self.render()?;
                    return Ok(Step::Continue);
                }
            }
            ViewerCommand::ToggleFreeze => {
                let frozen = self.session.toggle_freeze();
                self.notice = Some(if frozen { "Frozen" } else { "Live" }.to_string());
            }
            ViewerCommand::ToggleSynch => {
                let render_now = self.session.toggle_synch();
                self.notice = Some(self.mode_text());
                if render_now {
                    self.render()?;
                    return Ok(Step::Continue);
                }
            }
            ViewerCommand::TogglePixelValue => {
                let on = self.session.toggle_pixel_value();
                self.notice = Some(format!("Pixel value {}", if on { "on" } else { "off" }));
            }
            ViewerCommand::SaveSingle => {
                self.notice = Some(match self.session.save_single() {
                    Ok(Some(path)) => format!("Saved {}", path.display()),
                    Ok(None) => "No frame to save".to_string(),
                    Err(e) => {
                        crate::utils::logger::error(&format!("Save failed: {:#}", e));
                        "Save failed".to_string()
                    }
                });
            }
            ViewerCommand::ToggleImageSet => {
                self.notice = Some(match self.session.toggle_image_set() {
                    Ok(true) => "Recording image set".to_string(),
                    Ok(false) => "Image set stopped".to_string(),
                    Err(e) => {
                        crate::utils::logger::error(&format!("Image set failed: {:#}", e));
                        "Image set failed".to_string()
                    }
                });
            }
            ViewerCommand::RefreshFaster | ViewerCommand::RefreshSlower => {
                let ms = self
                    .session
                    .step_refresh(command == ViewerCommand::RefreshFaster);
                self.notice = Some(format!("Refresh {} ms", ms));
            }
            ViewerCommand::Pointer { button, col, row } => {
                if let Some(click) = self.session.pointer_down(button, cell_to_viewport(col, row)) {
                    crate::utils::logger::debug(&format!("{:?} click at {},{}", click.button, click.x, click.y));
                    self.notice = Some(format!("Clicked {},{}", click.x, click.y));
                }
            }
            ViewerCommand::Hover { col, row } => {
                if self.session.pointer_move(cell_to_viewport(col, row)).is_none() {
                    return Ok(Step::Continue);
                }
            }
            ViewerCommand::Resize => {
                self.display.invalidate();
                let viewport = self.display.viewport()?;
                if self.session.on_resize(viewport) {
                    self.render()?;
                    return Ok(Step::Continue);
                }
            }
        }
        self.draw_status()?;
        Ok(Step::Continue)
    }

    fn render(&mut self) -> Result<()> {
        let viewport = self.display.viewport()?;
        let Some(output) = self.session.render(viewport)? else {
            return self.draw_status();
        };
        if self.last_rect != Some(output.rect) {
            self.last_rect = Some(output.rect);
            crate::utils::logger::debug(&format!(
                "Draw rect {:?} in {}x{} (background {}, {:.1} Hz)",
                output.rect,
                output.viewport.width,
                output.viewport.height,
                output.background_filled,
                output.stats.avg_rate
            ));
        }
        if !viewport.is_empty() {
            self.paint()?;
        }
        self.draw_status()
    }

    fn paint(&mut self) -> Result<()> {
        let viewport = self.session.compositor().canvas_size();
        let width = viewport.width as usize;
        let processor = FrameProcessor::new(width, viewport.height as usize);
        let len = width * processor.cell_rows();
        if self.cells.len() != len {
            self.cells.resize(len, CellData::default());
        }
        processor.process_frame_into(self.session.compositor().canvas(), &mut self.cells);
        self.display.render_diff(&self.cells, width)
    }

    fn mode_text(&self) -> String {
        match self.session.mode() {
            ScheduleMode::Synchronous => "synch".to_string(),
            ScheduleMode::Timer => format!("timer {} ms", self.session.refresh_ms()),
        }
    }

    fn draw_status(&mut self) -> Result<()> {
        let status_rows = self.display.status_rows();
        if status_rows == 0 {
            return Ok(());
        }
        let viewport = self.display.viewport()?;
        let report = self.session.status(viewport);

        let mut header = format!(
            "{}  [{}] [{}]",
            self.config.name,
            self.session.policy().label(),
            self.mode_text()
        );
        if self.session.is_frozen() {
            header.push_str(" [frozen]");
        }
        if self.session.is_recording() {
            header.push_str(" [rec]");
        }
        if let Some(frame) = self.session.compositor().current_frame() {
            header.push_str(&format!(
                "  t={:.3}s age={}ms",
                frame.timestamp().as_secs_f64(),
                frame.arrived_at().elapsed().as_millis()
            ));
        }
        if let Some(notice) = &self.notice {
            header.push_str("  ");
            header.push_str(notice);
        }

        let hover = self.session.hover();
        let pixel_line = match hover {
            Some(readout) => readout.line(),
            None if self.session.show_pixel_value() => "Pixel: --".to_string(),
            None => String::new(),
        };

        let lines = [header, report.port_line(), report.display_line(), pixel_line];
        let (_, term_rows) = self.display.terminal_size_chars()?;
        let first_row = term_rows.saturating_sub(status_rows);
        self.display
            .draw_status(first_row, &lines, hover.map(|h| h.patch_color()))
    }

    /// Ask the terminal to fit the frame one-to-one, once per frame size.
    fn apply_autosize(&mut self) {
        let Some((w, h)) = self.session.autosize_target() else {
            self.last_autosize = None;
            return;
        };
        if self.last_autosize == Some((w, h)) {
            return;
        }
        self.last_autosize = Some((w, h));
        let cols = w.min(u16::MAX as u32) as u16;
        let rows = (h.div_ceil(2) + self.display.status_rows() as u32).min(u16::MAX as u32) as u16;
        crate::utils::logger::debug(&format!("Autosize request {}x{} cells", cols, rows));
        crate::utils::terminal_control::request_resize(cols, rows);
    }
}
