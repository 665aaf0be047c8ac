//! Topology fixtures and a mock lookup for pass tests.

use std::collections::BTreeSet;

use mockall::mock;

use super::config::GraphTopology;
use super::errors::GraphTopologyError;
use super::graph_topology::{GraphTopologyLookup, RelationshipBinding, TableBinding};
use crate::open_cypher_parser::ast::Direction;

mock! {
    pub Topology {}

    impl GraphTopologyLookup for Topology {
        fn lookup_table_for_labels(
            &self,
            labels: &BTreeSet<String>,
        ) -> Result<TableBinding, GraphTopologyError>;

        fn lookup_relationship_mapping(
            &self,
            types: &[String],
            left_labels: &BTreeSet<String>,
            right_labels: &BTreeSet<String>,
            direction: Direction,
        ) -> Result<RelationshipBinding, GraphTopologyError>;
    }
}

/// Social graph used across the planner and renderer tests.
pub fn social_topology() -> GraphTopology {
    GraphTopology::from_yaml_str(
        r#"
nodes:
  - labels: [Person]
    table: persons
    properties:
      firstName: first_name
      lastName: last_name
  - labels: [City]
    table: cities
    idColumn: city_id
relationships:
  - type: KNOWS
    table: knows
    fromLabel: Person
    toLabel: Person
    idColumn: knows_id
  - type: LIVES_IN
    table: lives_in
    fromLabel: Person
    toLabel: City
    fromColumn: person_id
    toColumn: city_id
"#,
    )
    .expect("social topology fixture is valid")
}
