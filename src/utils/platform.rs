use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::process::Command;

use crate::renderer::display::viewport_for;
use crate::shared::constants;

/// Terminal and host facts that decide how the viewer can draw.
#[derive(Debug, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os_name: String,
    pub os_version: String,
    pub arch: String,
    pub terminal: String,
    pub shell: String,
    pub terminal_width: u16,
    pub terminal_height: u16,
    /// Image area in pixels with the status bar shown
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub supports_truecolor: bool,
    pub supports_mouse: bool,
    pub cpu_cores: usize,
}

impl PlatformInfo {
    pub fn detect() -> Result<Self> {
        let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
        let viewport = viewport_for(width, height, constants::STATUS_ROWS);

        Ok(Self {
            os_name: env::consts::OS.to_string(),
            os_version: Self::detect_os_version(),
            arch: env::consts::ARCH.to_string(),
            terminal: Self::detect_terminal(),
            shell: Self::detect_shell(),
            terminal_width: width,
            terminal_height: height,
            viewport_width: viewport.width,
            viewport_height: viewport.height,
            supports_truecolor: Self::detect_truecolor(),
            supports_mouse: Self::detect_mouse(),
            cpu_cores: num_cpus::get(),
        })
    }

    fn detect_os_version() -> String {
        // Simple detection using uname -r
        if let Ok(output) = Command::new("uname").arg("-r").output() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            "Unknown".to_string()
        }
    }

    fn detect_terminal() -> String {
        if let Ok(term) = env::var("TERM_PROGRAM") {
            return term;
        }
        if let Ok(term) = env::var("TERM") {
            return term;
        }
        "Unknown".to_string()
    }

    fn detect_shell() -> String {
        if let Ok(shell) = env::var("SHELL") {
            shell.rsplit('/').next().unwrap_or("unknown").to_string()
        } else {
            "unknown".to_string()
        }
    }

    fn detect_truecolor() -> bool {
        env::var("COLORTERM")
            .map(|v| v.contains("truecolor") || v.contains("24bit"))
            .unwrap_or(false)
    }

    fn detect_mouse() -> bool {
        // The linux console and dumb terminals ignore mouse reporting
        env::var("TERM")
            .map(|v| v != "dumb" && v != "linux")
            .unwrap_or(false)
    }
}
