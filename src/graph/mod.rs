//! Embedded transactional property graph kernel
//!
//! The kernel is the only component permitted to touch persistent state.
//! It offers labeled nodes and typed relationships with properties,
//! uniqueness constraints, property auto-indices, scoped transactions,
//! bounded typed-path traversal, and a pattern query primitive.

pub mod node;
pub mod parse;
pub mod property;
pub mod query;
pub mod relationship;
pub mod store;
pub mod traverse;
pub mod txn;
pub mod types;

pub use node::Node;
pub use parse::{parse_query, ParseError, ParseResult};
pub use property::{compare_values, IndexKey, PropertyMap, PropertyValue};
pub use query::{
    execute, Condition, NodePattern, OrderBy, PatternQuery, QueryItem, QueryRow, RelPattern,
};
pub use relationship::Relationship;
pub use store::{GraphError, GraphResult, GraphStore, KernelConfig};
pub use traverse::{path_exists, TraversalSpec, Traverser};
pub use txn::{GraphKernel, ReadTxn, WriteTxn};
pub use types::{Direction, Label, NodeId, RelId, RelType};
