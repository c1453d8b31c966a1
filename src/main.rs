mod config;
mod core;
mod renderer;
mod shared;
mod sync;
mod transport;
mod ui;
mod utils;

use anyhow::Result;
use clap::Parser;

use crate::config::{Cli, Commands, ViewerConfig};

fn main() -> Result<()> {
    crate::utils::logger::init();

    // Leftover raw mode from a previous crash would garble clap's output
    let _ = crossterm::terminal::disable_raw_mode();

    let cli = Cli::parse();

    match &cli.command {
        Commands::View(args) => {
            let config = ViewerConfig::resolve(args)?;
            crate::utils::logger::info(&format!("Starting viewer: {:?}", config));
            if let Err(e) = crate::ui::run_viewer(config) {
                crate::utils::logger::error(&format!("Viewer failed: {:#}", e));
                return Err(e);
            }
        }
        Commands::Detect => {
            let info = crate::utils::platform::PlatformInfo::detect()?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::TerminalSize => {
            let (cols, rows) = crossterm::terminal::size()?;
            println!("{}x{}", cols, rows);
        }
    }

    Ok(())
}
