//! Topology documents loaded from disk.

use std::io::Write;

use gtopsql::{graph_catalog::GraphTopology, translate};

use super::{social_topology, SOCIAL_YAML};

#[test]
fn test_yaml_and_json_documents_are_equal() {
    let yaml = social_topology();
    let json = GraphTopology::from_json_str(&yaml.to_json_string().unwrap()).unwrap();
    assert_eq!(yaml, json);
}

#[test]
fn test_load_from_yaml_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(SOCIAL_YAML.as_bytes()).unwrap();

    let gtop = GraphTopology::from_file(file.path()).unwrap();
    assert_eq!(gtop, social_topology());
    assert_eq!(
        translate(&gtop, "MATCH (c:City) RETURN c.name").unwrap(),
        "SELECT c.name AS \"c.name\" FROM cities AS c"
    );
}

#[test]
fn test_invalid_document_is_rejected() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(br#"{"nodes": [{"labels": ["Person"], "table": ""}]}"#)
        .unwrap();

    let err = GraphTopology::from_file(file.path()).unwrap_err();
    assert!(!err.is_lookup_error());
}
