//! Write-ahead log for graph mutations

use crate::graph::{Node, Relationship};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// WAL errors
#[derive(Error, Debug)]
pub enum WalError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Corruption detected
    #[error("WAL corruption detected at sequence {0}")]
    Corruption(u64),
}

pub type WalResult<T> = Result<T, WalError>;

/// Write-ahead log entry types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntry {
    /// Node created
    CreateNode { node: Node },
    /// Relationship created
    CreateRel { rel: Relationship },
    /// Node deleted
    DeleteNode { id: u64 },
    /// Relationship deleted
    DeleteRel { id: u64 },
    /// Checkpoint marker
    Checkpoint { sequence: u64, timestamp: i64 },
}

/// WAL record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalRecord {
    /// Sequence number (monotonically increasing)
    sequence: u64,
    /// Entry data
    entry: WalEntry,
    /// Checksum for corruption detection
    checksum: u32,
}

impl WalRecord {
    fn new(sequence: u64, entry: WalEntry) -> Self {
        let mut record = Self {
            sequence,
            entry,
            checksum: 0,
        };
        record.checksum = record.calculate_checksum();
        record
    }

    fn calculate_checksum(&self) -> u32 {
        let bytes = bincode::serialize(&self.entry).unwrap_or_default();
        bytes.iter().fold(0u32, |acc, &b| acc ^ (b as u32))
    }

    fn verify_checksum(&self) -> bool {
        self.checksum == self.calculate_checksum()
    }
}

/// Write-ahead log manager
pub struct Wal {
    /// Path to WAL directory
    path: PathBuf,
    /// Current WAL file
    current_file: Option<BufWriter<File>>,
    /// Current sequence number
    sequence: u64,
}

impl Wal {
    /// Create or reopen a WAL in the given directory.
    pub fn new(path: impl AsRef<Path>) -> WalResult<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let mut wal = Self {
            path,
            current_file: None,
            sequence: 0,
        };
        // File names record the sequence at open time; the true last
        // sequence comes from the records themselves.
        let floor = Self::find_latest_sequence(&wal.path)?;
        let last = wal.replay(0, |_| Ok(()))?;
        wal.sequence = floor.max(last);

        info!("Initializing WAL at {:?}, sequence: {}", wal.path, wal.sequence);
        Ok(wal)
    }

    /// Append an entry to the WAL, returning its sequence number.
    pub fn append(&mut self, entry: WalEntry) -> WalResult<u64> {
        self.sequence += 1;
        let sequence = self.sequence;

        let record = WalRecord::new(sequence, entry);
        let data = bincode::serialize(&record)?;

        if self.current_file.is_none() {
            self.open_new_file()?;
        }

        if let Some(ref mut file) = self.current_file {
            // Length prefix (4 bytes) then the record.
            file.write_all(&(data.len() as u32).to_le_bytes())?;
            file.write_all(&data)?;
        }

        Ok(sequence)
    }

    /// Force flush the WAL
    pub fn flush(&mut self) -> WalResult<()> {
        if let Some(ref mut file) = self.current_file {
            file.flush()?;
        }
        Ok(())
    }

    /// Current (last assigned) sequence number.
    pub fn current_sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all WAL entries at or after `from_sequence`.
    pub fn replay<F>(&self, from_sequence: u64, mut callback: F) -> WalResult<u64>
    where
        F: FnMut(&WalEntry) -> WalResult<()>,
    {
        debug!("Replaying WAL from sequence {}", from_sequence);

        let files = self.wal_files()?;
        let mut replayed = 0u64;
        let mut last_sequence = from_sequence;

        for file_path in files {
            let file = File::open(&file_path)?;
            let mut reader = BufReader::new(file);
            let mut buf = Vec::new();

            loop {
                let mut len_bytes = [0u8; 4];
                match reader.read_exact(&mut len_bytes) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }

                let len = u32::from_le_bytes(len_bytes) as usize;
                buf.resize(len, 0);
                reader.read_exact(&mut buf)?;

                let record: WalRecord = bincode::deserialize(&buf)?;
                if !record.verify_checksum() {
                    warn!("WAL corruption detected at sequence {}", record.sequence);
                    return Err(WalError::Corruption(record.sequence));
                }

                if record.sequence < from_sequence {
                    continue;
                }

                callback(&record.entry)?;
                replayed += 1;
                last_sequence = record.sequence;
            }
        }

        debug!(
            "Replayed {} WAL entries, last sequence: {}",
            replayed, last_sequence
        );
        Ok(last_sequence)
    }

    /// Stamp a checkpoint marker and roll to a fresh file.
    pub fn checkpoint(&mut self, sequence: u64) -> WalResult<()> {
        debug!("Creating WAL checkpoint at sequence {}", sequence);

        let timestamp = chrono::Utc::now().timestamp();
        self.append(WalEntry::Checkpoint {
            sequence,
            timestamp,
        })?;
        self.flush()?;
        self.current_file = None;

        Ok(())
    }

    fn open_new_file(&mut self) -> WalResult<()> {
        let filename = format!("wal-{:016x}.log", self.sequence);
        let file_path = self.path.join(filename);

        debug!("Opening new WAL file: {:?}", file_path);

        let file = OpenOptions::new().create(true).append(true).open(file_path)?;
        self.current_file = Some(BufWriter::new(file));
        Ok(())
    }

    fn find_latest_sequence(path: &Path) -> WalResult<u64> {
        let files = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(_) => return Ok(0),
        };

        let mut max_sequence = 0u64;
        for entry in files.flatten() {
            if let Some(filename) = entry.file_name().to_str() {
                if let Some(seq_str) = filename
                    .strip_prefix("wal-")
                    .and_then(|s| s.strip_suffix(".log"))
                {
                    if let Ok(seq) = u64::from_str_radix(seq_str, 16) {
                        max_sequence = max_sequence.max(seq);
                    }
                }
            }
        }

        Ok(max_sequence)
    }

    fn wal_files(&self) -> WalResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.path)?.flatten() {
            if let Some(filename) = entry.file_name().to_str() {
                if filename.starts_with("wal-") && filename.ends_with(".log") {
                    files.push(entry.path());
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Label, NodeId, PropertyMap};
    use tempfile::TempDir;

    fn node(id: u64) -> Node {
        Node::new(NodeId::new(id), vec![Label::new("Provenance")], PropertyMap::new())
    }

    #[test]
    fn test_wal_creation() {
        let temp_dir = TempDir::new().unwrap();
        let wal = Wal::new(temp_dir.path()).unwrap();
        assert_eq!(wal.current_sequence(), 0);
    }

    #[test]
    fn test_wal_append_and_replay() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = Wal::new(temp_dir.path()).unwrap();

        for i in 1..=5 {
            wal.append(WalEntry::CreateNode { node: node(i) }).unwrap();
        }
        wal.flush().unwrap();

        let mut count = 0;
        wal.replay(0, |_entry| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_wal_checkpoint_marker() {
        let temp_dir = TempDir::new().unwrap();
        let mut wal = Wal::new(temp_dir.path()).unwrap();

        for i in 1..=3 {
            wal.append(WalEntry::CreateNode { node: node(i) }).unwrap();
        }
        wal.checkpoint(3).unwrap();

        let mut found_checkpoint = false;
        wal.replay(0, |entry| {
            if matches!(entry, WalEntry::Checkpoint { .. }) {
                found_checkpoint = true;
            }
            Ok(())
        })
        .unwrap();
        assert!(found_checkpoint);
    }

    #[test]
    fn test_wal_sequence_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut wal = Wal::new(temp_dir.path()).unwrap();
            wal.append(WalEntry::DeleteNode { id: 1 }).unwrap();
            wal.append(WalEntry::DeleteNode { id: 2 }).unwrap();
            wal.checkpoint(2).unwrap();
        }

        let wal = Wal::new(temp_dir.path()).unwrap();
        // Reopened sequence is at least the last checkpointed marker.
        assert!(wal.current_sequence() >= 2);
    }
}
