use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::renderer::LayoutPolicy;
use crate::shared::constants;
use crate::transport::VideoSource;

#[derive(Parser)]
#[command(author, version, about = "Live image stream viewer for the terminal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a stream and view it
    View(ViewArgs),
    /// Detect platform info
    Detect,
    /// Query the terminal size as crossterm sees it
    TerminalSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Synthetic moving test pattern
    Pattern,
    /// Video file or camera through OpenCV
    Video,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ViewArgs {
    /// Stream name shown in the status bar
    #[arg(long)]
    pub name: Option<String>,
    /// Terminal window title (defaults to the stream name)
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,
    /// Video file path or camera index; implies `--source video`
    #[arg(long)]
    pub video: Option<String>,
    /// Restart the video file when it ends
    #[arg(long = "loop", overrides_with = "no_loop")]
    pub looping: bool,
    #[arg(long, overrides_with = "looping", hide = true)]
    pub no_loop: bool,
    #[arg(long)]
    pub pattern_fps: Option<u32>,
    /// Pattern frame size as WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size)]
    pub pattern_size: Option<(u32, u32)>,
    /// Display refresh interval in milliseconds (timer mode)
    #[arg(short = 'p', long)]
    pub refresh: Option<u64>,
    /// Render every frame as it arrives instead of on the refresh timer
    #[arg(long, overrides_with = "no_synch")]
    pub synch: bool,
    #[arg(long, overrides_with = "synch", hide = true)]
    pub no_synch: bool,
    /// In original-size mode, ask the terminal to resize to fit the frame
    #[arg(long, overrides_with = "no_autosize")]
    pub autosize: bool,
    #[arg(long, overrides_with = "autosize", hide = true)]
    pub no_autosize: bool,
    /// Hide the status bar
    #[arg(long, overrides_with = "no_compact")]
    pub compact: bool,
    #[arg(long, overrides_with = "compact", hide = true)]
    pub no_compact: bool,
    /// Image only: no status bar, only quit keys and the mouse are bound
    #[arg(long, overrides_with = "no_minimal")]
    pub minimal: bool,
    #[arg(long, overrides_with = "minimal", hide = true)]
    pub no_minimal: bool,
    /// Start with the display frozen
    #[arg(long, overrides_with = "no_freeze")]
    pub freeze: bool,
    #[arg(long, overrides_with = "freeze", hide = true)]
    pub no_freeze: bool,
    #[arg(long, value_enum)]
    pub mode: Option<LayoutPolicy>,
    /// Left-click output file (JSON lines)
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Right-click output file (JSON lines)
    #[arg(long)]
    pub rightout: Option<PathBuf>,
    /// Directory for saved images
    #[arg(long)]
    pub capture_dir: Option<PathBuf>,
    /// JSON file with defaults; flags given on the command line win.
    /// Switches the file turns on can be turned off with `--no-<flag>`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Same fields as [`ViewArgs`], all optional, read from `--config`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FileConfig {
    pub name: Option<String>,
    pub title: Option<String>,
    pub source: Option<SourceKind>,
    pub video: Option<String>,
    #[serde(rename = "loop")]
    pub looping: Option<bool>,
    pub pattern_fps: Option<u32>,
    pub pattern_width: Option<u32>,
    pub pattern_height: Option<u32>,
    pub refresh: Option<u64>,
    pub synch: Option<bool>,
    pub autosize: Option<bool>,
    pub compact: Option<bool>,
    pub minimal: Option<bool>,
    pub freeze: Option<bool>,
    pub mode: Option<LayoutPolicy>,
    pub out: Option<PathBuf>,
    pub rightout: Option<PathBuf>,
    pub capture_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Pattern { width: u32, height: u32, fps: u32 },
    Video { source: VideoSource, looping: bool },
}

/// Fully resolved viewer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub name: String,
    pub title: String,
    pub source: SourceConfig,
    pub refresh_ms: u64,
    pub synch: bool,
    pub autosize: bool,
    pub compact: bool,
    pub minimal: bool,
    pub freeze: bool,
    pub policy: LayoutPolicy,
    pub left_out: Option<PathBuf>,
    pub right_out: Option<PathBuf>,
    pub capture_dir: PathBuf,
}

impl ViewerConfig {
    pub fn resolve(args: &ViewArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    /// Command line first, then the config file, then built-in defaults.
    pub fn merge(args: &ViewArgs, file: FileConfig) -> Result<Self> {
        let name = args
            .name
            .clone()
            .or(file.name)
            .unwrap_or_else(|| constants::DEFAULT_STREAM_NAME.to_string());
        let title = args.title.clone().or(file.title).unwrap_or_else(|| name.clone());

        let video = args.video.clone().or(file.video);
        let kind = args.source.or(file.source).unwrap_or(if video.is_some() {
            SourceKind::Video
        } else {
            SourceKind::Pattern
        });

        let source = match kind {
            SourceKind::Pattern => {
                let (width, height) = args.pattern_size.unwrap_or((
                    file.pattern_width.unwrap_or(constants::DEFAULT_PATTERN_WIDTH),
                    file.pattern_height.unwrap_or(constants::DEFAULT_PATTERN_HEIGHT),
                ));
                if width == 0 || height == 0 {
                    bail!("Pattern size must be non-zero, got {}x{}", width, height);
                }
                let fps = args
                    .pattern_fps
                    .or(file.pattern_fps)
                    .unwrap_or(constants::DEFAULT_PATTERN_FPS);
                if fps == 0 {
                    bail!("Pattern fps must be at least 1");
                }
                SourceConfig::Pattern { width, height, fps }
            }
            SourceKind::Video => {
                let Some(video) = video else {
                    bail!("--source video needs --video <path|camera-index>");
                };
                SourceConfig::Video {
                    source: VideoSource::parse(&video),
                    looping: switch(args.looping, args.no_loop, file.looping),
                }
            }
        };

        let refresh_ms = args
            .refresh
            .or(file.refresh)
            .unwrap_or(constants::DEFAULT_REFRESH_MS)
            .clamp(constants::MIN_REFRESH_MS, constants::MAX_REFRESH_MS);

        Ok(Self {
            name,
            title,
            source,
            refresh_ms,
            synch: switch(args.synch, args.no_synch, file.synch),
            autosize: switch(args.autosize, args.no_autosize, file.autosize),
            compact: switch(args.compact, args.no_compact, file.compact),
            minimal: switch(args.minimal, args.no_minimal, file.minimal),
            freeze: switch(args.freeze, args.no_freeze, file.freeze),
            policy: args.mode.or(file.mode).unwrap_or_default(),
            left_out: args.out.clone().or(file.out),
            right_out: args.rightout.clone().or(file.rightout),
            capture_dir: args
                .capture_dir
                .clone()
                .or(file.capture_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    /// Terminal rows under the image given to the status bar.
    pub fn status_rows(&self) -> u16 {
        if self.compact || self.minimal {
            0
        } else {
            constants::STATUS_ROWS
        }
    }
}

/// `--flag` / `--no-flag` from the command line, else the file, else off.
fn switch(on: bool, off: bool, file: Option<bool>) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        file.unwrap_or(false)
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w = w.trim().parse::<u32>().map_err(|e| format!("bad width '{}': {}", w, e))?;
    let h = h.trim().parse::<u32>().map_err(|e| format!("bad height '{}': {}", h, e))?;
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_args(argv: &[&str]) -> ViewArgs {
        let mut full = vec!["portview", "view"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::View(args) => args,
            _ => panic!("expected view"),
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = ViewerConfig::merge(&view_args(&[]), FileConfig::default()).unwrap();
        assert_eq!(cfg.name, "/portview");
        assert_eq!(cfg.title, "/portview");
        assert_eq!(cfg.refresh_ms, 30);
        assert_eq!(cfg.policy, LayoutPolicy::Stretch);
        assert_eq!(
            cfg.source,
            SourceConfig::Pattern { width: 320, height: 240, fps: 30 }
        );
        assert_eq!(cfg.status_rows(), constants::STATUS_ROWS);
    }

    #[test]
    fn test_cli_flags() {
        let args = view_args(&[
            "--name", "/cam", "-p", "100", "--synch", "--mode", "aspect",
            "--pattern-size", "64x48", "--out", "left.jsonl", "--compact",
        ]);
        let cfg = ViewerConfig::merge(&args, FileConfig::default()).unwrap();
        assert_eq!(cfg.name, "/cam");
        assert_eq!(cfg.refresh_ms, 100);
        assert!(cfg.synch);
        assert_eq!(cfg.policy, LayoutPolicy::PreserveAspect);
        assert_eq!(cfg.source, SourceConfig::Pattern { width: 64, height: 48, fps: 30 });
        assert_eq!(cfg.left_out, Some(PathBuf::from("left.jsonl")));
        assert_eq!(cfg.status_rows(), 0);
    }

    #[test]
    fn test_refresh_is_clamped() {
        let cfg = ViewerConfig::merge(&view_args(&["-p", "0"]), FileConfig::default()).unwrap();
        assert_eq!(cfg.refresh_ms, 1);
        let cfg = ViewerConfig::merge(&view_args(&["-p", "99999"]), FileConfig::default()).unwrap();
        assert_eq!(cfg.refresh_ms, 10_000);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{"name": "/from-file", "refresh": 250, "mode": "original", "minimal": true, "pattern_width": 32}"#,
        )
        .unwrap();
        let cfg = ViewerConfig::merge(&view_args(&["--name", "/cli"]), file).unwrap();
        assert_eq!(cfg.name, "/cli");
        assert_eq!(cfg.refresh_ms, 250);
        assert_eq!(cfg.policy, LayoutPolicy::OriginalSize);
        assert!(cfg.minimal);
        assert_eq!(cfg.source, SourceConfig::Pattern { width: 32, height: 240, fps: 30 });
    }

    #[test]
    fn test_no_flags_turn_off_file_switches() {
        let file: FileConfig = serde_json::from_str(
            r#"{"synch": true, "freeze": true, "compact": true, "loop": true, "video": "clip.mp4"}"#,
        )
        .unwrap();
        let args = view_args(&["--no-synch", "--no-compact", "--no-loop"]);
        let cfg = ViewerConfig::merge(&args, file.clone()).unwrap();
        assert!(!cfg.synch);
        assert!(!cfg.compact);
        assert!(cfg.freeze);
        assert_eq!(
            cfg.source,
            SourceConfig::Video { source: VideoSource::File("clip.mp4".to_string()), looping: false }
        );

        let cfg = ViewerConfig::merge(&view_args(&[]), file).unwrap();
        assert!(cfg.synch);
        assert!(cfg.compact);
    }

    #[test]
    fn test_last_of_flag_and_no_flag_wins() {
        let cfg = ViewerConfig::merge(&view_args(&["--synch", "--no-synch"]), FileConfig::default()).unwrap();
        assert!(!cfg.synch);
        let cfg = ViewerConfig::merge(&view_args(&["--no-freeze", "--freeze"]), FileConfig::default()).unwrap();
        assert!(cfg.freeze);
    }

    #[test]
    fn test_video_flag_implies_video_source() {
        let cfg = ViewerConfig::merge(&view_args(&["--video", "1", "--loop"]), FileConfig::default()).unwrap();
        assert_eq!(
            cfg.source,
            SourceConfig::Video { source: VideoSource::Camera(1), looping: true }
        );
    }

    #[test]
    fn test_video_source_needs_input() {
        let err = ViewerConfig::merge(&view_args(&["--source", "video"]), FileConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_zero_pattern_size_rejected() {
        let err = ViewerConfig::merge(&view_args(&["--pattern-size", "0x10"]), FileConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x480"), Ok((640, 480)));
        assert_eq!(parse_size("8X2"), Ok((8, 2)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = view_args(&["--config", "/nonexistent/portview.json"]);
        assert!(ViewerConfig::resolve(&args).is_err());
    }
}
