//! JSON Lines ledger storage.
//!
//! Uses JSON Lines format (.jsonl) for robustness:
//! - Each line is a complete entry
//! - Partial file corruption only affects individual lines
//! - Readable even if a write was interrupted
//!
//! Unlike high-volume market data capture this path is not buffered:
//! every entry is flushed before the message is acked, because an acked
//! message is never redelivered.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::LedgerResult;
use flow_core::LedgerEntry;

/// Open daily file state.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
}

/// Append-only ledger over daily JSON Lines files.
///
/// Idempotency is enforced with an in-memory key set rebuilt from the
/// files at startup, so a restart cannot re-admit an already-settled
/// order.
pub struct LedgerStore {
    base_dir: PathBuf,
    keys: HashSet<String>,
    active_writer: Option<ActiveWriter>,
}

impl LedgerStore {
    /// Open the store, scanning existing files to rebuild the key set.
    pub fn open(base_dir: impl AsRef<Path>) -> LedgerResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;

        let keys = load_keys(&base_dir)?;
        info!(
            dir = %base_dir.display(),
            entries = keys.len(),
            "Ledger opened"
        );
        Ok(Self {
            base_dir,
            keys,
            active_writer: None,
        })
    }

    /// Append an entry unless its key was already settled.
    ///
    /// Returns true if the entry was written, false if it was a
    /// duplicate. The line is flushed to the OS before returning.
    pub fn append(&mut self, entry: &LedgerEntry) -> LedgerResult<bool> {
        if self.keys.contains(&entry.entry_key) {
            debug!(entry_key = %entry.entry_key, "Duplicate ledger entry skipped");
            return Ok(false);
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let rotate = self
            .active_writer
            .as_ref()
            .is_some_and(|w| w.date != today);
        if rotate {
            self.close_active_writer();
        }
        if self.active_writer.is_none() {
            let path = self.base_dir.join(format!("ledger_{today}.jsonl"));
            info!(path = %path.display(), "Opening ledger file (append mode)");
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            self.active_writer = Some(ActiveWriter {
                writer: BufWriter::new(file),
                date: today,
            });
        }
        let Some(active) = self.active_writer.as_mut() else {
            return Ok(false);
        };
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        active.writer.write_all(line.as_bytes())?;
        active.writer.flush()?;

        self.keys.insert(entry.entry_key.clone());
        Ok(true)
    }

    /// Number of settled entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn contains(&self, entry_key: &str) -> bool {
        self.keys.contains(entry_key)
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(error = %e, date = %active.date, "Failed to flush ledger file on rotation");
            }
        }
    }
}

/// Rebuild the key set from every ledger file in the directory.
///
/// Unparseable lines (a torn write from a crash) are skipped with a
/// warning; the entries around them are unaffected.
fn load_keys(base_dir: &Path) -> LedgerResult<HashSet<String>> {
    let mut keys = HashSet::new();
    for dirent in std::fs::read_dir(base_dir)? {
        let path = dirent?.path();
        if path.extension().map_or(true, |ext| ext != "jsonl") {
            continue;
        }
        let reader = BufReader::new(File::open(&path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEntry>(&line) {
                Ok(entry) => {
                    keys.insert(entry.entry_key);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unparseable ledger line");
                }
            }
        }
    }
    Ok(keys)
}
