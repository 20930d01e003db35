//! Durability layer: RocksDB snapshot plus write-ahead log
//!
//! Committed transactions hand their buffered entries to `Persistence`,
//! which journals them in the WAL and applies them to the RocksDB
//! snapshot. Recovery loads the snapshot; the WAL provides the journal of
//! record for corruption detection and checkpointing.

pub mod storage;
pub mod wal;

pub use storage::{PersistentStorage, StorageError, StorageResult};
pub use wal::{Wal, WalEntry, WalError, WalResult};

use crate::graph::{Node, Relationship};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Integrated persistence: snapshot storage plus WAL.
pub struct Persistence {
    storage: PersistentStorage,
    wal: Wal,
}

impl Persistence {
    /// Open the persistence stack under the given base directory.
    pub fn open(base_path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let base_path = base_path.as_ref();
        let storage_path = base_path.join("data");
        let wal_path = base_path.join("wal");

        std::fs::create_dir_all(&storage_path)?;
        std::fs::create_dir_all(&wal_path)?;

        info!("Initializing persistence at: {:?}", base_path);

        let storage = PersistentStorage::open(&storage_path)?;
        let wal = Wal::new(&wal_path)?;

        Ok(Self { storage, wal })
    }

    /// Journal and apply a single committed entry.
    pub fn apply(&mut self, entry: &WalEntry) -> PersistenceResult<()> {
        self.wal.append(entry.clone())?;
        match entry {
            WalEntry::CreateNode { node } => self.storage.put_node(node)?,
            WalEntry::CreateRel { rel } => self.storage.put_rel(rel)?,
            WalEntry::DeleteNode { id } => self.storage.delete_node(*id)?,
            WalEntry::DeleteRel { id } => self.storage.delete_rel(*id)?,
            WalEntry::Checkpoint { .. } => {}
        }
        Ok(())
    }

    /// Load the persisted graph. Nodes are returned before relationships so
    /// the caller can re-insert them in dependency order.
    pub fn recover(&self) -> PersistenceResult<(Vec<Node>, Vec<Relationship>)> {
        let nodes = self.storage.scan_nodes()?;
        let rels = self.storage.scan_rels()?;
        Ok((nodes, rels))
    }

    /// Flush everything and stamp a WAL checkpoint.
    pub fn checkpoint(&mut self) -> PersistenceResult<()> {
        self.wal.flush()?;
        self.storage.flush()?;
        let sequence = self.wal.current_sequence();
        self.wal.checkpoint(sequence)?;
        Ok(())
    }
}
