use crate::shared::constants;
use lazy_static::lazy_static;
use std::backtrace::Backtrace;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::Path;
use std::sync::Mutex;

#[derive(Clone)]
struct LoggerPaths {
    error_path: String,
    debug_path: String,
}

lazy_static! {
    static ref LOGGER: Mutex<Option<LoggerPaths>> = Mutex::new(None);
}

fn append_line(path: &str, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", line);
    }
}

/// First line of a fresh log: app, version, process and start time.
fn header_line(kind: &str, pid: u32, started: &str) -> String {
    format!(
        "=== {} {} {} log | pid {} | started {} ===",
        constants::APP_NAME,
        env!("CARGO_PKG_VERSION"),
        kind,
        pid,
        started
    )
}

/// Truncate `path` and write its header. Failures leave logging disabled for that file.
fn start_file(path: &Path, kind: &str) {
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
    {
        let started = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        let _ = writeln!(file, "{}", header_line(kind, std::process::id(), &started));
    }
}

pub fn init() {
    let dir = std::env::current_dir().unwrap_or_default();
    let error_path = dir.join(constants::ERROR_LOG_FILE);
    let debug_path = dir.join(constants::DEBUG_LOG_FILE);

    start_file(&error_path, "error");
    start_file(&debug_path, "debug");

    let paths = LoggerPaths {
        error_path: error_path.to_string_lossy().to_string(),
        debug_path: debug_path.to_string_lossy().to_string(),
    };
    *LOGGER.lock().unwrap_or_else(|e| e.into_inner()) = Some(paths.clone());

    // Set panic hook
    panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::capture();
        let msg = match info.payload().downcast_ref::<&str>() {
            Some(s) => *s,
            None => match info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<Any>",
            },
        };

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());

        let error_msg = format!(
            "\nCRITICAL PANIC at {}:\nMessage: {}\nBacktrace:\n{:?}\n",
            location, msg, backtrace
        );

        append_line(&paths.error_path, &error_msg);
        append_line(&paths.debug_path, &error_msg);

        restore_terminal();
        eprintln!("{} crashed. See {} for details.", constants::APP_NAME, paths.error_path);
    }));
}

/// Leave raw mode and the alternate screen after a crash or an interrupted start.
pub fn restore_terminal() {
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::cursor::Show,
        crossterm::terminal::LeaveAlternateScreen
    );
}

pub fn log(level: &str, msg: &str) {
    if let Some(paths) = LOGGER.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let line = format!("[{}][{}] {}", timestamp, level, msg);
        append_line(&paths.debug_path, &line);

        if level == "ERROR" {
            append_line(&paths.error_path, &line);
        }
    }
}

pub fn info(msg: &str) {
    log("INFO", msg);
}

pub fn error(msg: &str) {
    log("ERROR", msg);
}

pub fn debug(msg: &str) {
    log("DEBUG", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names_app_and_process() {
        let line = header_line("debug", 4242, "2026-10-18 03:37:13.000");
        assert!(line.starts_with("=== portview "));
        assert!(line.contains(" debug log | pid 4242 | started 2026-10-18 03:37:13.000"));
        assert!(line.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_logging_before_init_is_a_no_op() {
        info("not written");
        debug("not written");
        error("not written");
    }
}
