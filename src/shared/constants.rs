pub const APP_NAME: &str = "portview";

pub const ERROR_LOG_FILE: &str = "portview-error.log";
pub const DEBUG_LOG_FILE: &str = "portview-debug.log";

pub const DEFAULT_STREAM_NAME: &str = "/portview";

/// Samples kept by each rate window (arrival and render).
pub const RATE_WINDOW: usize = 120;

pub const DEFAULT_REFRESH_MS: u64 = 30;
pub const MIN_REFRESH_MS: u64 = 1;
pub const MAX_REFRESH_MS: u64 = 10_000;

pub const DEFAULT_PATTERN_FPS: u32 = 30;
pub const DEFAULT_PATTERN_WIDTH: u32 = 320;
pub const DEFAULT_PATTERN_HEIGHT: u32 = 240;

/// Rows reserved under the image for the status bar.
pub const STATUS_ROWS: u16 = 4;

pub const BACKGROUND_RGBA: [u8; 4] = [0, 0, 0, 255];

pub const IMAGE_SET_PREFIX: &str = "image_";
pub const IMAGE_SET_DIR_PREFIX: &str = "set_";
pub const SINGLE_IMAGE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// PNG writes allowed to wait for the capture writer before frames are dropped.
pub const CAPTURE_QUEUE_DEPTH: usize = 8;
