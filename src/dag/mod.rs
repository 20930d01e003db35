//! Lineage traversal engine and DAG post-processing

pub mod fingerprint;
pub mod lineage;
pub mod settings;
pub mod traversal;

pub use fingerprint::Fingerprint;
pub use lineage::LineageDag;
pub use settings::TraversalSettings;
pub use traversal::new_dag;
