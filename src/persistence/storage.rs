//! RocksDB snapshot storage for nodes and relationships

use crate::graph::{Label, Node, NodeId, PropertyMap, RelId, Relationship, RelType};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Column family error
    #[error("Column family error: {0}")]
    ColumnFamily(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Serialized node for storage
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    id: u64,
    labels: Vec<String>,
    properties: Vec<u8>, // Serialized PropertyMap
    created_at: i64,
}

/// Serialized relationship for storage
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRel {
    id: u64,
    source: u64,
    target: u64,
    rel_type: String,
    properties: Vec<u8>, // Serialized PropertyMap
    created_at: i64,
}

/// RocksDB-backed persistent snapshot of the graph.
pub struct PersistentStorage {
    db: DB,
}

impl PersistentStorage {
    /// Open or create persistent storage at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        info!("Opening persistent storage at: {:?}", path.as_ref());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new("nodes", Self::cf_options()),
            ColumnFamilyDescriptor::new("rels", Self::cf_options()),
        ];

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)?;

        Ok(Self { db })
    }

    fn cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    /// Store a node
    pub fn put_node(&self, node: &Node) -> StorageResult<()> {
        let cf = self
            .db
            .cf_handle("nodes")
            .ok_or_else(|| StorageError::ColumnFamily("nodes".to_string()))?;

        let stored = StoredNode {
            id: node.id.as_u64(),
            labels: node.labels.iter().map(|l| l.as_str().to_string()).collect(),
            properties: bincode::serialize(&node.properties)?,
            created_at: node.created_at,
        };

        self.db
            .put_cf(cf, node.id.as_u64().to_be_bytes(), bincode::serialize(&stored)?)?;
        Ok(())
    }

    /// Store a relationship
    pub fn put_rel(&self, rel: &Relationship) -> StorageResult<()> {
        let cf = self
            .db
            .cf_handle("rels")
            .ok_or_else(|| StorageError::ColumnFamily("rels".to_string()))?;

        let stored = StoredRel {
            id: rel.id.as_u64(),
            source: rel.source.as_u64(),
            target: rel.target.as_u64(),
            rel_type: rel.rel_type.as_str().to_string(),
            properties: bincode::serialize(&rel.properties)?,
            created_at: rel.created_at,
        };

        self.db
            .put_cf(cf, rel.id.as_u64().to_be_bytes(), bincode::serialize(&stored)?)?;
        Ok(())
    }

    /// Delete a node
    pub fn delete_node(&self, id: u64) -> StorageResult<()> {
        let cf = self
            .db
            .cf_handle("nodes")
            .ok_or_else(|| StorageError::ColumnFamily("nodes".to_string()))?;
        self.db.delete_cf(cf, id.to_be_bytes())?;
        Ok(())
    }

    /// Delete a relationship
    pub fn delete_rel(&self, id: u64) -> StorageResult<()> {
        let cf = self
            .db
            .cf_handle("rels")
            .ok_or_else(|| StorageError::ColumnFamily("rels".to_string()))?;
        self.db.delete_cf(cf, id.to_be_bytes())?;
        Ok(())
    }

    /// Scan all stored nodes
    pub fn scan_nodes(&self) -> StorageResult<Vec<Node>> {
        let cf = self
            .db
            .cf_handle("nodes")
            .ok_or_else(|| StorageError::ColumnFamily("nodes".to_string()))?;

        let mut nodes = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, value) = item?;
            let stored: StoredNode = bincode::deserialize(&value)?;
            let properties: PropertyMap = bincode::deserialize(&stored.properties)?;
            let mut node = Node::new(
                NodeId::new(stored.id),
                stored.labels.into_iter().map(Label::new).collect(),
                properties,
            );
            node.created_at = stored.created_at;
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Scan all stored relationships
    pub fn scan_rels(&self) -> StorageResult<Vec<Relationship>> {
        let cf = self
            .db
            .cf_handle("rels")
            .ok_or_else(|| StorageError::ColumnFamily("rels".to_string()))?;

        let mut rels = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, value) = item?;
            let stored: StoredRel = bincode::deserialize(&value)?;
            let properties: PropertyMap = bincode::deserialize(&stored.properties)?;
            let mut rel = Relationship::new(
                RelId::new(stored.id),
                NodeId::new(stored.source),
                NodeId::new(stored.target),
                RelType::new(stored.rel_type),
                properties,
            );
            rel.created_at = stored.created_at;
            rels.push(rel);
        }
        Ok(rels)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;
    use tempfile::TempDir;

    #[test]
    fn test_node_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PersistentStorage::open(temp_dir.path()).unwrap();

        let mut props = PropertyMap::new();
        props.insert("oid".to_string(), "urn:uuid:a".into());
        let node = Node::new(NodeId::new(1), vec![Label::new("Provenance")], props);

        storage.put_node(&node).unwrap();
        let nodes = storage.scan_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, NodeId::new(1));
        assert_eq!(
            nodes[0].get_property("oid"),
            Some(&PropertyValue::from("urn:uuid:a"))
        );
        assert_eq!(nodes[0].created_at, node.created_at);
    }

    #[test]
    fn test_rel_roundtrip_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PersistentStorage::open(temp_dir.path()).unwrap();

        let rel = Relationship::new(
            RelId::new(7),
            NodeId::new(1),
            NodeId::new(2),
            "input to",
            PropertyMap::new(),
        );
        storage.put_rel(&rel).unwrap();
        assert_eq!(storage.scan_rels().unwrap().len(), 1);

        storage.delete_rel(7).unwrap();
        assert!(storage.scan_rels().unwrap().is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = PersistentStorage::open(temp_dir.path()).unwrap();
            let node = Node::new(NodeId::new(3), vec![Label::new("Actor")], PropertyMap::new());
            storage.put_node(&node).unwrap();
            storage.flush().unwrap();
        }

        let storage = PersistentStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.scan_nodes().unwrap().len(), 1);
    }
}
