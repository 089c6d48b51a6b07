//! Wire log - append-only record of every frame sent to or received from the agent
//!
//! Entries stay in memory for export on demand. With a mirror path, each entry
//! is also appended to that file as one JSON line by a background writer task.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Tx,
    Rx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireEntry {
    pub seq: u64,
    pub ts: u64,
    pub dir: Direction,
    pub frame: String,
}

#[derive(Debug, Default)]
pub struct WireLog {
    entries: Vec<WireEntry>,
    next_seq: u64,
    mirror: Option<mpsc::UnboundedSender<WireEntry>>,
}

impl WireLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that also appends to `path`. Must be called inside a tokio runtime;
    /// outside one the mirror is skipped.
    pub fn with_mirror(path: impl Into<String>) -> Self {
        let path = path.into();
        let mut log = Self::new();
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("no runtime; wire log mirror {} disabled", path);
            return log;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<WireEntry>();
        tokio::spawn(async move {
            use tokio::fs::OpenOptions;
            use tokio::io::AsyncWriteExt;

            let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    warn!("cannot open wire log {}: {}", path, e);
                    return;
                }
            };

            let mut buf: Vec<u8> = Vec::with_capacity(4096);
            while let Some(entry) = rx.recv().await {
                buf.clear();
                if serde_json::to_writer(&mut buf, &entry).is_err() {
                    continue;
                }
                buf.push(b'\n');
                if file.write_all(&buf).await.is_err() {
                    break;
                }
            }
            let _ = file.flush().await;
        });
        log.mirror = Some(tx);
        log
    }

    pub fn record(&mut self, dir: Direction, frame: &str) {
        self.next_seq += 1;
        let entry = WireEntry {
            seq: self.next_seq,
            ts: current_timestamp_ms(),
            dir,
            frame: frame.to_string(),
        };
        if let Some(tx) = self.mirror.as_ref() {
            let _ = tx.send(entry.clone());
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[WireEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write every entry as one JSON object per line.
    pub fn export<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for entry in &self.entries {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }

    pub fn export_to_path(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.export(std::io::BufWriter::new(file))
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
