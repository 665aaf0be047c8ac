pub mod config;
pub mod errors;
pub mod graph_topology;

#[cfg(test)]
pub mod testing;

pub use config::{
    GraphTopology, GtopMetadata, NodeMapping, RelationshipMapping, SnapshotUnit, StorageLayout,
};
pub use errors::GraphTopologyError;
pub use graph_topology::{GraphTopologyLookup, Orientation, RelationshipBinding, TableBinding};
