use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One clicked image coordinate, written as a JSON line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: u32,
    pub y: u32,
}

/// Append-only output for clicked image coordinates.
pub struct ClickPort {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl ClickPort {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open click output {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Open if configured; a failure is logged and the port stays disabled.
    pub fn open_optional(path: Option<&Path>) -> Option<Self> {
        let path = path?;
        match Self::open(path) {
            Ok(port) => Some(port),
            Err(e) => {
                crate::utils::logger::error(&format!("{:#}", e));
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, point: ClickPoint) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &point)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}
