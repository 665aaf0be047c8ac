use std::collections::{BTreeMap, BTreeSet};

use super::config::{GraphTopology, NodeMapping, RelationshipMapping};
use super::errors::{display_labels, GraphTopologyError};
use crate::open_cypher_parser::ast::Direction;

/// Physical table behind a node label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    pub table: String,
    pub key_column: String,
    pub labels: BTreeSet<String>,
    pub columns: BTreeMap<String, String>,
}

impl TableBinding {
    /// Column holding `property`; unmapped properties use their own name.
    pub fn column_for<'a>(&'a self, property: &'a str) -> &'a str {
        self.columns
            .get(property)
            .map(String::as_str)
            .unwrap_or(property)
    }
}

/// Which side of the relationship table the pattern's left node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// left node = from column
    Forward,
    /// left node = to column
    Reversed,
    /// either, for undirected patterns whose endpoints fit both ways
    Either,
}

impl Orientation {
    fn merge(self, other: Orientation) -> Orientation {
        if self == other {
            self
        } else {
            Orientation::Either
        }
    }
}

/// Physical table behind a relationship pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipBinding {
    pub rel_type: String,
    pub table: String,
    pub from_column: String,
    pub to_column: String,
    /// Own key column; the from column stands in when the table has none.
    pub key_column: String,
    pub columns: BTreeMap<String, String>,
    pub from_label: Option<String>,
    pub to_label: Option<String>,
    pub orientation: Orientation,
}

impl RelationshipBinding {
    pub fn column_for<'a>(&'a self, property: &'a str) -> &'a str {
        self.columns
            .get(property)
            .map(String::as_str)
            .unwrap_or(property)
    }

    /// Label the mapping fixes for the pattern's left and right endpoints.
    pub fn endpoint_labels(&self) -> (Option<&str>, Option<&str>) {
        let from = self.from_label.as_deref();
        let to = self.to_label.as_deref();
        match self.orientation {
            Orientation::Forward => (from, to),
            Orientation::Reversed => (to, from),
            Orientation::Either if from == to => (from, to),
            Orientation::Either => (None, None),
        }
    }
}

/// Lookups the lowering passes run against the topology.
pub trait GraphTopologyLookup {
    fn lookup_table_for_labels(
        &self,
        labels: &BTreeSet<String>,
    ) -> Result<TableBinding, GraphTopologyError>;

    /// `types` empty means any type. `direction` is the pattern's arrow as
    /// written between `left_labels` and `right_labels`.
    fn lookup_relationship_mapping(
        &self,
        types: &[String],
        left_labels: &BTreeSet<String>,
        right_labels: &BTreeSet<String>,
        direction: Direction,
    ) -> Result<RelationshipBinding, GraphTopologyError>;
}

fn endpoint_matches(mapped: &Option<String>, requested: &BTreeSet<String>) -> bool {
    match mapped {
        Some(label) => requested.is_empty() || requested.contains(label),
        None => true,
    }
}

fn table_binding(node: &NodeMapping) -> TableBinding {
    TableBinding {
        table: node.table.clone(),
        key_column: node.id_column.clone(),
        labels: node.labels.clone(),
        columns: node.properties.clone(),
    }
}

fn relationship_binding(rel: &RelationshipMapping, orientation: Orientation) -> RelationshipBinding {
    RelationshipBinding {
        rel_type: rel.rel_type.clone(),
        table: rel.table.clone(),
        from_column: rel.from_column.clone(),
        to_column: rel.to_column.clone(),
        key_column: rel
            .id_column
            .clone()
            .unwrap_or_else(|| rel.from_column.clone()),
        columns: rel.properties.clone(),
        from_label: rel.from_label.clone(),
        to_label: rel.to_label.clone(),
        orientation,
    }
}

impl GraphTopologyLookup for GraphTopology {
    fn lookup_table_for_labels(
        &self,
        labels: &BTreeSet<String>,
    ) -> Result<TableBinding, GraphTopologyError> {
        let candidates: Vec<&NodeMapping> = self
            .nodes
            .iter()
            .filter(|node| labels.is_subset(&node.labels))
            .collect();

        match candidates.as_slice() {
            [] => Err(GraphTopologyError::NodeLabels {
                labels: display_labels(labels),
            }),
            [node] => Ok(table_binding(node)),
            many => {
                // an exact label set wins over its supersets
                if let Some(exact) = many.iter().find(|node| &node.labels == labels) {
                    return Ok(table_binding(exact));
                }
                Err(GraphTopologyError::AmbiguousNodeLabels {
                    labels: display_labels(labels),
                    candidates: many
                        .iter()
                        .map(|node| node.table.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        }
    }

    fn lookup_relationship_mapping(
        &self,
        types: &[String],
        left_labels: &BTreeSet<String>,
        right_labels: &BTreeSet<String>,
        direction: Direction,
    ) -> Result<RelationshipBinding, GraphTopologyError> {
        let mut candidates: Vec<RelationshipBinding> = Vec::new();

        for rel in &self.relationships {
            if !types.is_empty() && !types.contains(&rel.rel_type) {
                continue;
            }
            let forward = endpoint_matches(&rel.from_label, left_labels)
                && endpoint_matches(&rel.to_label, right_labels);
            let reversed = endpoint_matches(&rel.from_label, right_labels)
                && endpoint_matches(&rel.to_label, left_labels);

            let orientation = match direction {
                Direction::Right if forward => Orientation::Forward,
                Direction::Left if reversed => Orientation::Reversed,
                Direction::Both => match (forward, reversed) {
                    (true, true) => Orientation::Either,
                    (true, false) => Orientation::Forward,
                    (false, true) => Orientation::Reversed,
                    (false, false) => continue,
                },
                _ => continue,
            };

            // same physical table and columns: one candidate
            if let Some(existing) = candidates.iter_mut().find(|c| {
                c.table == rel.table
                    && c.from_column == rel.from_column
                    && c.to_column == rel.to_column
            }) {
                existing.orientation = existing.orientation.merge(orientation);
                if existing.from_label != rel.from_label {
                    existing.from_label = None;
                }
                if existing.to_label != rel.to_label {
                    existing.to_label = None;
                }
                if existing.rel_type != rel.rel_type {
                    existing.rel_type = format!("{}|{}", existing.rel_type, rel.rel_type);
                }
                continue;
            }
            candidates.push(relationship_binding(rel, orientation));
        }

        let types_display = if types.is_empty() {
            "*".to_string()
        } else {
            types.join("|")
        };

        match candidates.len() {
            0 => Err(GraphTopologyError::Relationship {
                types: types_display,
                left: display_labels(left_labels),
                right: display_labels(right_labels),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(GraphTopologyError::AmbiguousRelationship {
                types: types_display,
                left: display_labels(left_labels),
                right: display_labels(right_labels),
                candidates: candidates
                    .iter()
                    .map(|c| c.table.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn topology() -> GraphTopology {
        GraphTopology::from_json_str(
            r#"{
                "nodes": [
                    {"labels": ["Person"], "table": "persons", "properties": {"firstName": "first_name"}},
                    {"labels": ["Person", "Admin"], "table": "admins"},
                    {"labels": ["City"], "table": "cities", "idColumn": "city_id"}
                ],
                "relationships": [
                    {"type": "KNOWS", "table": "knows", "fromLabel": "Person", "toLabel": "Person"},
                    {"type": "LIVES_IN", "table": "lives_in", "fromLabel": "Person", "toLabel": "City",
                     "fromColumn": "person_id", "toColumn": "city_id"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_node_lookup() {
        let gtop = topology();
        let person = gtop.lookup_table_for_labels(&labels(&["Person"])).unwrap();
        assert_eq!(person.table, "persons");
        assert_eq!(person.key_column, "id");
        assert_eq!(person.column_for("firstName"), "first_name");
        assert_eq!(person.column_for("age"), "age");

        let admin = gtop.lookup_table_for_labels(&labels(&["Admin"])).unwrap();
        assert_eq!(admin.table, "admins");
    }

    #[test]
    fn test_unknown_label_names_the_label() {
        let err = topology()
            .lookup_table_for_labels(&labels(&["Robot"]))
            .unwrap_err();
        assert_eq!(
            err,
            GraphTopologyError::NodeLabels {
                labels: "Robot".to_string()
            }
        );
    }

    #[test]
    fn test_unlabeled_node_is_ambiguous() {
        let err = topology()
            .lookup_table_for_labels(&BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, GraphTopologyError::AmbiguousNodeLabels { .. }));
    }

    #[test]
    fn test_relationship_lookup_by_direction() {
        let gtop = topology();
        let right = gtop
            .lookup_relationship_mapping(
                &["LIVES_IN".to_string()],
                &labels(&["Person"]),
                &labels(&["City"]),
                Direction::Right,
            )
            .unwrap();
        assert_eq!(right.orientation, Orientation::Forward);
        assert_eq!(right.endpoint_labels(), (Some("Person"), Some("City")));

        let left = gtop
            .lookup_relationship_mapping(
                &["LIVES_IN".to_string()],
                &labels(&["City"]),
                &labels(&["Person"]),
                Direction::Left,
            )
            .unwrap();
        assert_eq!(left.orientation, Orientation::Reversed);
        assert_eq!(left.endpoint_labels(), (Some("City"), Some("Person")));

        assert!(gtop
            .lookup_relationship_mapping(
                &["LIVES_IN".to_string()],
                &labels(&["City"]),
                &labels(&["Person"]),
                Direction::Right,
            )
            .is_err());
    }

    #[test]
    fn test_undirected_lookup_accepts_either_orientation() {
        let gtop = topology();
        let knows = gtop
            .lookup_relationship_mapping(
                &["KNOWS".to_string()],
                &BTreeSet::new(),
                &BTreeSet::new(),
                Direction::Both,
            )
            .unwrap();
        assert_eq!(knows.orientation, Orientation::Either);
        assert_eq!(knows.endpoint_labels(), (Some("Person"), Some("Person")));
        assert_eq!(knows.key_column, "src");

        let lives_in = gtop
            .lookup_relationship_mapping(
                &["LIVES_IN".to_string()],
                &labels(&["City"]),
                &BTreeSet::new(),
                Direction::Both,
            )
            .unwrap();
        assert_eq!(lives_in.orientation, Orientation::Reversed);
    }

    #[test]
    fn test_untyped_relationship_between_unlabeled_nodes_is_ambiguous() {
        let err = topology()
            .lookup_relationship_mapping(&[], &BTreeSet::new(), &BTreeSet::new(), Direction::Right)
            .unwrap_err();
        assert!(matches!(err, GraphTopologyError::AmbiguousRelationship { .. }));
    }
}
