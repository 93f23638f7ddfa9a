// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log: an append-only, newline-delimited JSON file of [`Event`]s.
//!
//! Every mutation is appended here before it is considered durable. On
//! startup the daemon opens the WAL at the sequence number recorded in the
//! last snapshot and replays everything after it into a fresh
//! [`MaterializedState`](crate::state::MaterializedState).

use crate::event::Event;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One durable entry: a sequence number paired with the event it records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only log of [`WalEntry`] rows, one JSON object per line.
pub struct Wal {
    path: PathBuf,
    file: File,
    /// Sequence number that will be assigned to the next appended entry.
    write_seq: u64,
    /// Highest sequence number the caller has acknowledged as processed
    /// (i.e. folded into `MaterializedState` and, if applicable, a
    /// downstream side effect has completed). Entries at or below this are
    /// eligible for truncation once a snapshot covers them.
    processed_seq: u64,
    pending_flush: usize,
}

/// Flush after this many unflushed appends, even without an explicit `flush()`.
const AUTO_FLUSH_THRESHOLD: usize = 64;

impl Wal {
    /// Open (creating if absent) the WAL at `path`, recovering a truncated or
    /// corrupt tail by rotating it into a `.bak` file and keeping only the
    /// valid JSON-lines prefix. `start_seq` is the sequence number one past
    /// the last snapshot's `seq` — entries at or below it are assumed already
    /// captured by the snapshot and are skipped during the validity scan's
    /// sequence bookkeeping (they are not rewritten, only counted).
    pub fn open(path: impl AsRef<Path>, start_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();

        let mut max_seq = start_seq.saturating_sub(1);
        if path.exists() {
            let (valid_bytes, last_seq) = Self::scan_valid_prefix(&path)?;
            if let Some(seq) = last_seq {
                max_seq = seq;
            }

            let metadata_len = std::fs::metadata(&path)?.len();
            if valid_bytes < metadata_len {
                tracing::warn!(
                    path = %path.display(),
                    valid_bytes,
                    total_bytes = metadata_len,
                    "WAL tail corrupt or truncated, rotating to .bak"
                );
                let bak = crate::snapshot::rotate_bak_path(&path);
                std::fs::copy(&path, &bak)?;
                let mut file = OpenOptions::new().write(true).open(&path)?;
                file.set_len(valid_bytes)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            file,
            write_seq: max_seq + 1,
            processed_seq: start_seq.saturating_sub(1),
            pending_flush: 0,
        })
    }

    /// Scans the file line by line, returning the byte length of the valid
    /// JSON-lines prefix and the highest sequence number found within it.
    fn scan_valid_prefix(path: &Path) -> Result<(u64, Option<u64>), WalError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut valid_bytes = 0u64;
        let mut last_seq = None;
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                valid_bytes += bytes_read as u64;
                continue;
            }
            match serde_json::from_str::<WalEntry>(trimmed) {
                Ok(entry) => {
                    valid_bytes += bytes_read as u64;
                    last_seq = Some(entry.seq);
                }
                Err(_) => break,
            }
        }
        Ok((valid_bytes, last_seq))
    }

    /// The sequence number the next `append` call will assign.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// The highest sequence number acknowledged as processed.
    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// True once enough unflushed writes have accumulated that the caller
    /// should call [`Wal::flush`] before relying on durability.
    pub fn needs_flush(&self) -> bool {
        self.pending_flush >= AUTO_FLUSH_THRESHOLD
    }

    /// Appends `event`, assigning it the next sequence number. Does not
    /// fsync — call [`Wal::flush`] (or rely on [`Wal::needs_flush`]) for that.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let seq = self.write_seq;
        let entry = WalEntry {
            seq,
            event: event.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.write_seq += 1;
        self.pending_flush += 1;
        Ok(seq)
    }

    /// Fsyncs pending writes.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.pending_flush = 0;
        Ok(())
    }

    /// Returns the next entry after `processed_seq` that has not yet been
    /// marked processed, without advancing the processed mark.
    pub fn next_unprocessed(&self) -> Result<Option<WalEntry>, WalError> {
        Ok(self.entries_after(self.processed_seq)?.into_iter().next())
    }

    /// Marks `seq` (and everything before it) as processed.
    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    /// Returns every entry with `seq > after`, in order. Used for replay
    /// after opening at a snapshot's sequence number, and by
    /// [`Wal::next_unprocessed`].
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(0))?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: WalEntry = serde_json::from_str(&line)?;
            if entry.seq > after {
                out.push(entry);
            }
        }
        Ok(out)
    }

    /// Rewrites the WAL file keeping only entries with `seq > before`. Called
    /// by the checkpointer after a snapshot has durably captured everything
    /// up to and including `before`.
    pub fn truncate_before(&mut self, before: u64) -> Result<(), WalError> {
        let keep = self.entries_after(before)?;

        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for entry in &keep {
                let mut line = serde_json::to_string(entry)?;
                line.push('\n');
                tmp.write_all(line.as_bytes())?;
            }
            tmp.sync_data()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        self.pending_flush = 0;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
