//! Unit tests for variable-length relationship expansion through the public API

use gtopsql::{
    config::TranslatorConfig,
    graph_catalog::GraphTopology,
    path_expansion::{ExpansionError, IdentityExpander, PathExpander, VariableLengthExpander},
    query_planner::errors::ErrorCategory,
};

fn empty_topology() -> GraphTopology {
    GraphTopology::default()
}

#[test]
fn test_expander_follows_config_cap() {
    let config = TranslatorConfig {
        max_expansion_hops: 2,
        ..TranslatorConfig::default()
    };
    let expander = VariableLengthExpander::from_config(&config);
    let variants = expander
        .expand(&empty_topology(), "MATCH (a)-[:KNOWS*]->(b) RETURN b")
        .unwrap();
    assert_eq!(
        variants,
        vec![
            "MATCH (a)-[:KNOWS]->(b) RETURN b",
            "MATCH (a)-[:KNOWS]->()-[:KNOWS]->(b) RETURN b",
        ]
    );
}

#[test]
fn test_text_around_patterns_is_untouched() {
    let expander = VariableLengthExpander::default();
    let variants = expander
        .expand(
            &empty_topology(),
            "MATCH (a:Person {name: 'x'})-[:KNOWS*2]->(b)\nWHERE b.age > 3\nRETURN b.name",
        )
        .unwrap();
    assert_eq!(
        variants,
        vec!["MATCH (a:Person {name: 'x'})-[:KNOWS]->()-[:KNOWS]->(b)\nWHERE b.age > 3\nRETURN b.name"]
    );
}

#[test]
fn test_identity_expander() {
    let source = "MATCH (a)-[*1..3]->(b) RETURN b";
    assert_eq!(
        IdentityExpander.expand(&empty_topology(), source).unwrap(),
        vec![source]
    );
}

#[test]
fn test_expansion_error_categories() {
    let expander = VariableLengthExpander {
        max_hops: 4,
        max_variants: 3,
    };
    let too_many = expander
        .expand(&empty_topology(), "MATCH (a)-[*]->(b) RETURN b")
        .unwrap_err();
    assert!(matches!(
        too_many,
        ExpansionError::TooManyVariants {
            variants: 4,
            limit: 3
        }
    ));
    assert_eq!(too_many.category(), ErrorCategory::UserQuery);

    let named = expander
        .expand(&empty_topology(), "MATCH (a)-[r*2]->(b) RETURN r")
        .unwrap_err();
    assert_eq!(named.category(), ErrorCategory::UnsupportedFeature);
    assert!(named.to_string().contains("`r`"));
}
