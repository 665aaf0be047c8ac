//! Integration tests - Tests that run whole translations against a topology document
//!
//! These tests verify that parsing, expansion, lowering and rendering work
//! together through the public API.

mod topology_tests;
mod translation_tests;
mod variable_length_tests;

use gtopsql::graph_catalog::GraphTopology;

pub(crate) const SOCIAL_YAML: &str = r#"
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
"#;

pub(crate) fn social_topology() -> GraphTopology {
    GraphTopology::from_yaml_str(SOCIAL_YAML).expect("social topology is valid")
}
