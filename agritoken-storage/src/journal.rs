//! Payout journal.
//!
//! A payout event touches every holding of a farm in one atomic store
//! replace. The journal brackets that replace with `Started`/`Committed`
//! markers so that after a crash the platform can tell whether the last
//! event reached durability: a `Started` entry with no matching
//! `Committed` means the snapshot on disk predates the event and the event
//! counts as not-applied.

use agritoken_core::error::PlatformError;
use agritoken_core::id::FarmId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Durable record of one payout event having been started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutEventRecord {
    pub event_id: u64,
    pub farm_id: FarmId,
    pub total_amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Entry type in the journal file
#[derive(Debug, Clone, Serialize, Deserialize)]
enum JournalEntry {
    Started(PayoutEventRecord),
    Committed { event_id: u64 },
}

/// Append-only, length-prefixed journal of payout events.
pub struct PayoutJournal {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    next_event_id: AtomicU64,
}

impl PayoutJournal {
    /// Open (or create) the journal at `path` and seed the event counter
    /// past everything already recorded.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PlatformError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .map_err(|e| PlatformError::Journal(format!("failed to open journal: {}", e)))?;

        let mut max_id = 0;
        for entry in read_entries(&path)? {
            match entry {
                JournalEntry::Started(record) => max_id = max_id.max(record.event_id),
                JournalEntry::Committed { event_id } => max_id = max_id.max(event_id),
            }
        }

        Ok(PayoutJournal {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            next_event_id: AtomicU64::new(max_id + 1),
        })
    }

    fn append(&self, entry: &JournalEntry) -> Result<(), PlatformError> {
        let serialized = bincode::serialize(entry)
            .map_err(|e| PlatformError::Journal(format!("failed to encode entry: {}", e)))?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| PlatformError::Journal(format!("failed to acquire lock: {}", e)))?;

        let entry_len = serialized.len() as u64;
        writer.write_all(&entry_len.to_le_bytes())?;
        writer.write_all(&serialized)?;
        writer.flush()?;
        Ok(())
    }

    /// Record that a payout event is about to mutate holdings. Returns the
    /// event id to commit once the store replace is durable.
    pub fn begin(
        &self,
        farm_id: &FarmId,
        total_amount: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<u64, PlatformError> {
        let event_id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        self.append(&JournalEntry::Started(PayoutEventRecord {
            event_id,
            farm_id: farm_id.clone(),
            total_amount,
            timestamp,
        }))?;
        Ok(event_id)
    }

    /// Record that the event's store replace completed.
    pub fn commit(&self, event_id: u64) -> Result<(), PlatformError> {
        self.append(&JournalEntry::Committed { event_id })
    }

    /// Events that started but never committed, oldest first. After a
    /// restart these are exactly the events that must be treated as
    /// not-applied.
    pub fn unfinished(&self) -> Result<Vec<PayoutEventRecord>, PlatformError> {
        let mut started: Vec<PayoutEventRecord> = Vec::new();
        for entry in read_entries(&self.path)? {
            match entry {
                JournalEntry::Started(record) => started.push(record),
                JournalEntry::Committed { event_id } => {
                    started.retain(|r| r.event_id != event_id);
                }
            }
        }
        Ok(started)
    }
}

/// Read every entry currently in the journal file.
fn read_entries(path: &Path) -> Result<Vec<JournalEntry>, PlatformError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PlatformError::Journal(format!("failed to read journal: {}", e))),
    };
    let mut reader = BufReader::new(file);
    let mut entries = Vec::new();

    loop {
        let mut len_buf = [0u8; 8];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(PlatformError::from(e)),
        }

        let entry_len = u64::from_le_bytes(len_buf);
        let mut entry_data = vec![0u8; entry_len as usize];
        match reader.read_exact(&mut entry_data) {
            Ok(()) => {}
            // a torn tail from a crash mid-append is not corruption; the
            // partial entry simply never happened
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(PlatformError::from(e)),
        }

        let entry: JournalEntry = bincode::deserialize(&entry_data)
            .map_err(|e| PlatformError::Journal(format!("failed to decode entry: {}", e)))?;
        entries.push(entry);
    }

    Ok(entries)
}
