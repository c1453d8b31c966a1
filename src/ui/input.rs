use crossbeam_channel::{bounded, Receiver};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::core::PointerButton;
use crate::renderer::LayoutPolicy;

/// What a terminal event asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    Quit,
    SetPolicy(LayoutPolicy),
    ToggleFreeze,
    ToggleSynch,
    TogglePixelValue,
    SaveSingle,
    ToggleImageSet,
    RefreshFaster,
    RefreshSlower,
    /// Mouse press at a cell
    Pointer { button: PointerButton, col: u16, row: u16 },
    /// Mouse motion over a cell
    Hover { col: u16, row: u16 },
    /// Terminal resized; the new size is read back from the terminal
    Resize,
}

/// Translate a terminal event. In minimal mode only quitting and the mouse stay bound.
pub fn command_for(event: &Event, minimal: bool) -> Option<ViewerCommand> {
    match event {
        Event::Key(key) => key_command(key, minimal),
        Event::Mouse(mouse) => mouse_command(mouse),
        Event::Resize(..) => Some(ViewerCommand::Resize),
        _ => None,
    }
}

fn key_command(key: &KeyEvent, minimal: bool) -> Option<ViewerCommand> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let quit = match key.code {
        KeyCode::Esc | KeyCode::Char('q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    };
    if quit {
        return Some(ViewerCommand::Quit);
    }
    if minimal {
        return None;
    }

    let command = match key.code {
        KeyCode::Char('o') => ViewerCommand::SetPolicy(LayoutPolicy::OriginalSize),
        KeyCode::Char('a') => ViewerCommand::SetPolicy(LayoutPolicy::PreserveAspect),
        KeyCode::Char('w') => ViewerCommand::SetPolicy(LayoutPolicy::Stretch),
        KeyCode::Char('f') => ViewerCommand::ToggleFreeze,
        KeyCode::Char('y') => ViewerCommand::ToggleSynch,
        KeyCode::Char('v') => ViewerCommand::TogglePixelValue,
        KeyCode::Char('s') => ViewerCommand::SaveSingle,
        KeyCode::Char('S') => ViewerCommand::ToggleImageSet,
        KeyCode::Char('+') | KeyCode::Char('=') => ViewerCommand::RefreshFaster,
        KeyCode::Char('-') => ViewerCommand::RefreshSlower,
        _ => return None,
    };
    Some(command)
}

fn mouse_command(mouse: &MouseEvent) -> Option<ViewerCommand> {
    let (col, row) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => Some(ViewerCommand::Pointer {
            button: PointerButton::Left,
            col,
            row,
        }),
        MouseEventKind::Down(MouseButton::Right) => Some(ViewerCommand::Pointer {
            button: PointerButton::Right,
            col,
            row,
        }),
        MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(ViewerCommand::Hover { col, row }),
        _ => None,
    }
}

/// Cell (col, row) to the top pixel it covers in the half-block viewport.
pub fn cell_to_viewport(col: u16, row: u16) -> (u32, u32) {
    (col as u32, row as u32 * 2)
}

/// Reads terminal events on its own thread and forwards them to the UI loop.
pub struct InputReader {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputReader {
    pub fn spawn() -> anyhow::Result<(Self, Receiver<Event>)> {
        let (tx, rx) = bounded::<Event>(256);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("input".to_string())
            .spawn(move || {
                while thread_running.load(Ordering::Acquire) {
                    match event::poll(Duration::from_millis(50)) {
                        Ok(true) => match event::read() {
                            Ok(ev) => {
                                if tx.send(ev).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                crate::utils::logger::error(&format!("Input read error: {}", e));
                                break;
                            }
                        },
                        Ok(false) => {}
                        Err(e) => {
                            crate::utils::logger::error(&format!("Input poll error: {}", e));
                            break;
                        }
                    }
                }
                crate::utils::logger::debug("Input thread exiting");
            })?;

        Ok((
            Self {
                running,
                handle: Some(handle),
            },
            rx,
        ))
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.stop();
    }
}
