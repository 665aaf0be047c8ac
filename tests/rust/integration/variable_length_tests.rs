//! Variable-length relationships expanded into a UNION of fixed-length variants.

use gtopsql::{
    config::TranslatorConfig, path_expansion::ExpansionError,
    query_planner::errors::ErrorCategory, translate, TranslateError, Translator,
};

use super::social_topology;

#[test]
fn test_bounded_range_becomes_union_all() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person)-[:KNOWS*1..2]->(b:Person) RETURN b.firstName",
    )
    .unwrap();

    let branches: Vec<&str> = sql.split(" UNION ALL ").collect();
    assert_eq!(branches.len(), 2, "{}", sql);
    assert_eq!(
        branches[0],
        "SELECT b.first_name AS \"b.firstName\" FROM persons AS a \
         JOIN knows AS anon_r ON (anon_r.src = a.id) \
         JOIN persons AS b ON (anon_r.dst = b.id)"
    );
    assert!(branches[1].starts_with("SELECT b.first_name AS \"b.firstName\" FROM persons AS a"));
    assert_eq!(branches[1].matches("JOIN knows AS").count(), 2, "{}", sql);
}

#[test]
fn test_counts_over_variants_are_summed() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person)-[:KNOWS*1..3]->(b:Person) RETURN a.lastName AS name, count(b) AS reach",
    )
    .unwrap();
    assert!(sql.starts_with("SELECT name, SUM(reach) AS reach FROM ("), "{}", sql);
    assert!(sql.ends_with(") AS merged GROUP BY name"), "{}", sql);
    assert_eq!(sql.matches(" UNION ALL ").count(), 2, "{}", sql);
}

#[test]
fn test_paging_moves_to_the_merged_query() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person)-[:KNOWS*2..3]->(b:Person) RETURN DISTINCT b.lastName AS last \
         ORDER BY last SKIP 5 LIMIT 10",
    )
    .unwrap();
    assert!(sql.contains(" UNION "), "{}", sql);
    assert!(!sql.contains("UNION ALL"), "{}", sql);
    assert!(
        sql.ends_with(") AS merged ORDER BY last LIMIT 10 OFFSET 5"),
        "{}",
        sql
    );
}

#[test]
fn test_configured_union_distinct() {
    let translator = Translator::new(TranslatorConfig {
        union_distinct: true,
        ..TranslatorConfig::default()
    });
    let sql = translator
        .translate(
            &social_topology(),
            "MATCH (a:Person)-[:KNOWS*1..2]->(b:Person) RETURN b.lastName",
        )
        .unwrap();
    assert_eq!(sql.matches(" UNION ").count(), 1, "{}", sql);
    assert!(!sql.contains("UNION ALL"), "{}", sql);
}

#[test]
fn test_hop_cap_comes_from_config() {
    let translator = Translator::new(TranslatorConfig {
        max_expansion_hops: 3,
        ..TranslatorConfig::default()
    });
    let sql = translator
        .translate(
            &social_topology(),
            "MATCH (a:Person)-[:KNOWS*]->(b:Person) RETURN b.firstName",
        )
        .unwrap();
    assert_eq!(sql.matches(" UNION ALL ").count(), 2, "{}", sql);
}

#[test]
fn test_variant_limit_is_enforced() {
    let translator = Translator::new(TranslatorConfig {
        max_expansion_hops: 8,
        max_expansion_variants: 10,
        ..TranslatorConfig::default()
    });
    let err = translator
        .translate(
            &social_topology(),
            "MATCH (a:Person)-[:KNOWS*]->(b:Person)-[:KNOWS*1..2]->(c:Person) RETURN c.firstName",
        )
        .unwrap_err();
    assert_eq!(
        err,
        TranslateError::Expansion(ExpansionError::TooManyVariants {
            variants: 16,
            limit: 10
        })
    );
    assert_eq!(err.category(), ErrorCategory::UserQuery);
}

#[test]
fn test_average_over_variants_is_unsupported() {
    let err = translate(
        &social_topology(),
        "MATCH (a:Person)-[:KNOWS*1..2]->(b:Person) RETURN avg(b.age) AS age",
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::UnsupportedFeature);
}
