//! Scoped transactions over the graph store
//!
//! Every storage function runs inside an explicit transaction handed out by
//! the kernel. Read transactions take the shared lock and never attempt a
//! commit. Write transactions take the exclusive lock, record an undo entry
//! per mutation, and buffer durability records; `commit` flushes the
//! buffered records to persistence, while dropping an uncommitted write
//! transaction rolls the in-memory store back.

use super::node::Node;
use super::property::PropertyMap;
use super::relationship::Relationship;
use super::store::{GraphError, GraphResult, GraphStore, KernelConfig};
use super::types::{Label, NodeId, RelId, RelType};
use crate::persistence::{Persistence, PersistenceError, WalEntry};
use std::ops::Deref;
use std::path::Path;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// The embedded transactional graph kernel.
///
/// Owns the in-memory store and, when opened on disk, the persistence
/// stack. The kernel is the only component that touches persistent state.
pub struct GraphKernel {
    store: RwLock<GraphStore>,
    persist: Option<Mutex<Persistence>>,
}

impl GraphKernel {
    /// Open (or create) a kernel backed by the given directory.
    ///
    /// Existing data is recovered before the kernel is handed out.
    pub fn open(path: impl AsRef<Path>, config: KernelConfig) -> Result<Self, PersistenceError> {
        let mut store = GraphStore::new(&config);
        let persist = Persistence::open(path.as_ref())?;

        let (nodes, rels) = persist.recover()?;
        let node_count = nodes.len();
        let rel_count = rels.len();
        for node in nodes {
            store.insert_recovered_node(node);
        }
        for rel in rels {
            if let Err(e) = store.insert_recovered_rel(rel) {
                warn!("Skipping unrecoverable relationship: {}", e);
            }
        }
        if node_count > 0 || rel_count > 0 {
            info!(
                "Recovered {} nodes and {} relationships",
                node_count, rel_count
            );
        }

        Ok(GraphKernel {
            store: RwLock::new(store),
            persist: Some(Mutex::new(persist)),
        })
    }

    /// Open an ephemeral in-memory kernel with no persistence.
    pub fn in_memory(config: KernelConfig) -> Self {
        GraphKernel {
            store: RwLock::new(GraphStore::new(&config)),
            persist: None,
        }
    }

    /// Begin a read-only transaction.
    pub fn read(&self) -> ReadTxn<'_> {
        ReadTxn {
            guard: self.store.read().unwrap_or_else(|e| e.into_inner()),
        }
    }

    /// Begin a write transaction.
    pub fn write(&self) -> WriteTxn<'_> {
        WriteTxn {
            guard: self.store.write().unwrap_or_else(|e| e.into_inner()),
            persist: self.persist.as_ref(),
            undo: Vec::new(),
            log: Vec::new(),
            committed: false,
        }
    }

    /// Flush buffered durability state and stamp a checkpoint.
    pub fn checkpoint(&self) -> Result<(), PersistenceError> {
        if let Some(p) = &self.persist {
            p.lock().unwrap_or_else(|e| e.into_inner()).checkpoint()?;
        }
        Ok(())
    }

    /// Close the kernel, flushing persistence.
    ///
    /// Use after close is undefined; in practice the kernel is dropped.
    pub fn close(&self) {
        if let Some(p) = &self.persist {
            let mut p = p.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = p.checkpoint() {
                warn!("Checkpoint on close failed: {}", e);
            }
        }
    }
}

/// A read-only transaction: a shared view of the store.
///
/// Read transactions have no commit step; there is nothing to flush and
/// nothing that can fail at scope exit.
pub struct ReadTxn<'a> {
    guard: RwLockReadGuard<'a, GraphStore>,
}

impl Deref for ReadTxn<'_> {
    type Target = GraphStore;

    fn deref(&self) -> &GraphStore {
        &self.guard
    }
}

enum UndoOp {
    RemoveNode(NodeId),
    RestoreNode(Node),
    RemoveRel(RelId),
    RestoreRel(Relationship),
}

/// A write transaction: exclusive access plus rollback and durability
/// buffers.
pub struct WriteTxn<'a> {
    guard: RwLockWriteGuard<'a, GraphStore>,
    persist: Option<&'a Mutex<Persistence>>,
    undo: Vec<UndoOp>,
    log: Vec<WalEntry>,
    committed: bool,
}

impl WriteTxn<'_> {
    /// Create a node; visible to this transaction immediately.
    pub fn create_node(
        &mut self,
        labels: Vec<Label>,
        properties: PropertyMap,
    ) -> GraphResult<NodeId> {
        let id = self.guard.create_node(labels, properties)?;
        self.undo.push(UndoOp::RemoveNode(id));
        let node = self.guard.get_node(id).cloned();
        if let Some(node) = node {
            self.log.push(WalEntry::CreateNode { node });
        }
        Ok(id)
    }

    /// Create a relationship; endpoints must exist.
    pub fn create_rel(
        &mut self,
        source: NodeId,
        target: NodeId,
        rel_type: impl Into<RelType>,
        properties: PropertyMap,
    ) -> GraphResult<RelId> {
        let id = self.guard.create_rel(source, target, rel_type, properties)?;
        self.undo.push(UndoOp::RemoveRel(id));
        let rel = self.guard.get_rel(id).cloned();
        if let Some(rel) = rel {
            self.log.push(WalEntry::CreateRel { rel });
        }
        Ok(id)
    }

    /// Delete a node; fails while incident relationships remain.
    pub fn delete_node(&mut self, id: NodeId) -> GraphResult<Node> {
        let node = self.guard.delete_node(id)?;
        self.undo.push(UndoOp::RestoreNode(node.clone()));
        self.log.push(WalEntry::DeleteNode { id: id.as_u64() });
        Ok(node)
    }

    /// Delete a relationship.
    pub fn delete_rel(&mut self, id: RelId) -> GraphResult<Relationship> {
        let rel = self.guard.delete_rel(id)?;
        self.undo.push(UndoOp::RestoreRel(rel.clone()));
        self.log.push(WalEntry::DeleteRel { id: id.as_u64() });
        Ok(rel)
    }

    /// Commit the transaction, flushing buffered records to persistence.
    pub fn commit(mut self) -> GraphResult<()> {
        if let Some(persist) = self.persist {
            let mut p = persist.lock().unwrap_or_else(|e| e.into_inner());
            for entry in &self.log {
                if let Err(e) = p.apply(entry) {
                    // The in-memory store still rolls back via the undo log.
                    warn!("Commit failed, rolling back: {}", e);
                    return Err(GraphError::Storage(e.to_string()));
                }
            }
        }
        self.undo.clear();
        self.log.clear();
        self.committed = true;
        Ok(())
    }
}

impl Deref for WriteTxn<'_> {
    type Target = GraphStore;

    fn deref(&self) -> &GraphStore {
        &self.guard
    }
}

impl Drop for WriteTxn<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Roll back uncommitted mutations in reverse order.
        while let Some(op) = self.undo.pop() {
            match op {
                UndoOp::RemoveNode(id) => {
                    // Incident rels were created later and already removed.
                    let _ = self.guard.delete_node(id);
                }
                UndoOp::RestoreNode(node) => {
                    self.guard.insert_recovered_node(node);
                }
                UndoOp::RemoveRel(id) => {
                    let _ = self.guard.delete_rel(id);
                }
                UndoOp::RestoreRel(rel) => {
                    let _ = self.guard.insert_recovered_rel(rel);
                }
            }
        }
    }
}
