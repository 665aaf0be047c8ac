//! Graph topology ("gtop") document: the mapping from node labels and
//! relationship types to relational tables.
//!
//! Documents are JSON or YAML:
//!
//! ```yaml
//! metadata:
//!   storageLayout: snapshot
//!   snapshotConcatenationFactor: 2
//!   snapshotConcatenationUnit: hours
//! nodes:
//!   - labels: [Person]
//!     table: persons
//!     idColumn: person_id
//!     properties:
//!       firstName: first_name
//! relationships:
//!   - type: KNOWS
//!     table: knows
//!     fromLabel: Person
//!     toLabel: Person
//!     fromColumn: src_id
//!     toColumn: dst_id
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use validator::Validate;

use super::errors::GraphTopologyError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum StorageLayout {
    #[default]
    IgnoreTime,
    Snapshot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl SnapshotUnit {
    pub fn seconds(&self) -> u64 {
        match self {
            SnapshotUnit::Seconds => 1,
            SnapshotUnit::Minutes => 60,
            SnapshotUnit::Hours => 3_600,
            SnapshotUnit::Days => 86_400,
        }
    }
}

/// Storage metadata of a topology. Only interpreted by the metadata layer;
/// lowering never looks at it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GtopMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_layout: Option<StorageLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "Snapshot concatenation factor must be positive"))]
    pub snapshot_concatenation_factor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_concatenation_unit: Option<SnapshotUnit>,
}

impl GtopMetadata {
    pub fn storage_layout(&self) -> StorageLayout {
        self.storage_layout.unwrap_or_default()
    }

    /// Length of one concatenated snapshot window, when both factor and unit are set.
    pub fn snapshot_window_seconds(&self) -> Option<u64> {
        match (
            self.snapshot_concatenation_factor,
            self.snapshot_concatenation_unit,
        ) {
            (Some(factor), Some(unit)) => Some(u64::from(factor) * unit.seconds()),
            _ => None,
        }
    }
}

fn default_node_id_column() -> String {
    "id".to_string()
}

fn default_from_column() -> String {
    "src".to_string()
}

fn default_to_column() -> String {
    "dst".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeMapping {
    pub labels: BTreeSet<String>,
    pub table: String,
    #[serde(default = "default_node_id_column")]
    pub id_column: String,
    /// property name -> column, identity when absent
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipMapping {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_label: Option<String>,
    #[serde(default = "default_from_column")]
    pub from_column: String,
    #[serde(default = "default_to_column")]
    pub to_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_column: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// A whole topology document. Equality is structural.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraphTopology {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GtopMetadata>,
    #[serde(default)]
    pub nodes: Vec<NodeMapping>,
    #[serde(default)]
    pub relationships: Vec<RelationshipMapping>,
}

impl GraphTopology {
    /// Load a topology from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GraphTopologyError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| GraphTopologyError::ConfigReadError {
            error: format!("{}: {}", path.display(), e),
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::from_yaml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, GraphTopologyError> {
        let topology: Self =
            serde_json::from_str(json).map_err(|e| GraphTopologyError::ConfigParseError {
                error: e.to_string(),
            })?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, GraphTopologyError> {
        let topology: Self =
            serde_yaml::from_str(yaml).map_err(|e| GraphTopologyError::ConfigParseError {
                error: e.to_string(),
            })?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn to_json_string(&self) -> Result<String, GraphTopologyError> {
        serde_json::to_string_pretty(self).map_err(|e| GraphTopologyError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Structural checks of a loaded document.
    pub fn validate(&self) -> Result<(), GraphTopologyError> {
        if let Some(metadata) = &self.metadata {
            metadata
                .validate()
                .map_err(|e| GraphTopologyError::InvalidConfig {
                    message: e.to_string(),
                })?;
        }

        let mut seen_labels = HashSet::new();
        for node in &self.nodes {
            if node.table.trim().is_empty() {
                return Err(GraphTopologyError::InvalidConfig {
                    message: format!(
                        "node mapping for labels {:?} has an empty table name",
                        node.labels
                    ),
                });
            }
            if !seen_labels.insert(&node.labels) {
                return Err(GraphTopologyError::InvalidConfig {
                    message: format!("duplicate node mapping for labels {:?}", node.labels),
                });
            }
        }

        for rel in &self.relationships {
            if rel.table.trim().is_empty() || rel.rel_type.trim().is_empty() {
                return Err(GraphTopologyError::InvalidConfig {
                    message: format!(
                        "relationship mapping `{}` needs both a type and a table",
                        rel.rel_type
                    ),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
metadata:
  storageLayout: snapshot
  snapshotConcatenationFactor: 2
  snapshotConcatenationUnit: hours
nodes:
  - labels: [Person]
    table: persons
    idColumn: person_id
    properties:
      firstName: first_name
relationships:
  - type: KNOWS
    table: knows
    fromLabel: Person
    toLabel: Person
"#;

    #[test]
    fn test_yaml_document_with_defaults() {
        let gtop = GraphTopology::from_yaml_str(YAML).unwrap();
        let metadata = gtop.metadata.as_ref().unwrap();
        assert_eq!(metadata.storage_layout(), StorageLayout::Snapshot);
        assert_eq!(metadata.snapshot_window_seconds(), Some(7_200));
        assert_eq!(gtop.nodes[0].id_column, "person_id");
        assert_eq!(gtop.relationships[0].from_column, "src");
        assert_eq!(gtop.relationships[0].to_column, "dst");
    }

    #[test]
    fn test_absent_metadata_fields_are_omitted() {
        let metadata = GtopMetadata {
            snapshot_concatenation_factor: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"snapshotConcatenationFactor":3}"#);
        assert_eq!(metadata.storage_layout(), StorageLayout::IgnoreTime);
        assert_eq!(serde_json::to_string(&GtopMetadata::default()).unwrap(), "{}");
    }

    #[test]
    fn test_metadata_equality_is_structural() {
        let a = GtopMetadata {
            storage_layout: Some(StorageLayout::Snapshot),
            snapshot_concatenation_factor: Some(1),
            snapshot_concatenation_unit: Some(SnapshotUnit::Days),
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.snapshot_concatenation_unit = Some(SnapshotUnit::Hours);
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_snapshot_factor_is_rejected() {
        let err = GraphTopology::from_json_str(
            r#"{"metadata": {"snapshotConcatenationFactor": 0}, "nodes": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GraphTopologyError::InvalidConfig { .. }));
    }

    #[test]
    fn test_duplicate_label_sets_are_rejected() {
        let err = GraphTopology::from_json_str(
            r#"{"nodes": [
                {"labels": ["Person"], "table": "a"},
                {"labels": ["Person"], "table": "b"}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GraphTopologyError::InvalidConfig { .. }));
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let gtop = GraphTopology::from_yaml_str(YAML).unwrap();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", gtop.to_json_string().unwrap()).unwrap();

        assert_eq!(GraphTopology::from_file(file.path()).unwrap(), gtop);
    }

    #[test]
    fn test_missing_file() {
        let err = GraphTopology::from_file("/nonexistent/gtop.json").unwrap_err();
        assert!(matches!(err, GraphTopologyError::ConfigReadError { .. }));
    }
}
