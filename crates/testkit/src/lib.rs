#![warn(missing_docs)]
//! Deterministic testing surfaces: JSONL event logs, snapshots and scratch dirs.

mod snapshot;

use anyhow::{Context, Result};
use chrono::Utc;
use farmstead_core::{SimTick, Timestamp};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

pub use snapshot::*;

/// Primary event record captured by headless runs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Simulation tick when the event occurred.
    pub tick: SimTick,
    /// Farm time of the event.
    pub at: Timestamp,
    /// Event kind label, e.g. `crop_done`.
    pub kind: String,
    /// Free-form payload.
    pub payload: String,
}

impl EventRecord {
    /// Build a record from borrowed parts.
    pub fn new(tick: SimTick, at: Timestamp, kind: &str, payload: impl Into<String>) -> Self {
        Self {
            tick,
            at,
            kind: kind.to_string(),
            payload: payload.into(),
        }
    }
}

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    file: File,
    written: usize,
}

impl JsonlSink {
    /// Create a new sink at `path`, creating parent dirs if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create event log {}", path.display()))?;
        Ok(Self { file, written: 0 })
    }

    /// Append an event to the log.
    pub fn write(&mut self, event: &EventRecord) -> Result<()> {
        let line = serde_json::to_string(event)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Number of events written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush buffered data to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Read back every event of a JSONL log.
pub fn read_events<P: AsRef<Path>>(path: P) -> Result<Vec<EventRecord>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open event log {}", path.display()))?;
    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line)
            .with_context(|| format!("Bad event on line {} of {}", index + 1, path.display()))?;
        events.push(event);
    }
    Ok(events)
}

/// Scratch directory removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    /// Create a fresh directory under the system temp dir, tagged for debugging.
    pub fn new(tag: &str) -> Result<Self> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let stamp = Utc::now().format("%Y%m%d%H%M%S%f");
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "farmstead_{tag}_{stamp}_{}_{seq}",
            std::process::id()
        ));
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create temp dir {}", path.display()))?;
        Ok(Self { path })
    }

    /// Path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of an entry inside the directory.
    pub fn join<P: AsRef<Path>>(&self, child: P) -> PathBuf {
        self.path.join(child)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.path).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonl_sink_roundtrips_events() {
        let dir = TempDir::new("jsonl").expect("temp dir");
        let path = dir.join("events.jsonl");
        let mut sink = JsonlSink::create(&path).expect("sink create");
        sink.write(&EventRecord::new(SimTick(1), Timestamp(50), "crop_added", "0 64 0"))
            .expect("write succeeds");
        sink.write(&EventRecord::new(SimTick(2), Timestamp(100), "crop_done", "0 64 0"))
            .expect("write succeeds");
        sink.flush().expect("flush");
        assert_eq!(sink.written(), 2);

        let events = read_events(&path).expect("events readable");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, "crop_done");
        assert_eq!(events[1].at, Timestamp(100));
    }

    #[test]
    fn temp_dir_is_removed_on_drop() {
        let path = {
            let dir = TempDir::new("drop").expect("temp dir");
            fs::write(dir.join("file.txt"), "x").expect("write");
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn temp_dirs_are_distinct() {
        let a = TempDir::new("same").expect("temp dir");
        let b = TempDir::new("same").expect("temp dir");
        assert_ne!(a.path(), b.path());
    }
}
