//! Fixed-length queries translated end to end.

use gtopsql::{
    graph_catalog::GraphTopology, query_planner::errors::ErrorCategory, translate,
    TranslateError,
};

use super::social_topology;

#[test]
fn test_unknown_label_is_a_user_error() {
    let gtop = GraphTopology::from_yaml_str(
        r#"
nodes:
  - labels: [City]
    table: cities
"#,
    )
    .unwrap();

    let err = translate(&gtop, "MATCH (p:Person) RETURN p.name").unwrap_err();
    assert!(matches!(err, TranslateError::Lowering(_)), "{:?}", err);
    assert_eq!(err.category(), ErrorCategory::UserQuery);
    assert!(err.to_string().contains("Person"), "{}", err);
}

#[test]
fn test_undefined_variable() {
    let err = translate(&social_topology(), "MATCH (a:Person) RETURN b.firstName").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::UserQuery);
    assert!(err.to_string().contains("`b`"), "{}", err);
}

#[test]
fn test_single_node_selects_only_requested_columns() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person) WHERE a.lastName IN ['Smith', 'Jones'] RETURN a.firstName",
    )
    .unwrap();
    assert_eq!(
        sql,
        "SELECT a.first_name AS \"a.firstName\" FROM persons AS a \
         WHERE a.last_name IN ('Smith', 'Jones')"
    );
}

#[test]
fn test_relationship_joins_through_its_table() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person)-[:LIVES_IN]->(c:City) RETURN c.name",
    )
    .unwrap();
    assert_eq!(
        sql,
        "SELECT c.name AS \"c.name\" FROM persons AS a \
         JOIN lives_in AS anon_r ON (anon_r.person_id = a.id) \
         JOIN cities AS c ON (anon_r.city_id = c.city_id)"
    );
}

#[test]
fn test_optional_match_uses_left_joins() {
    let gtop = social_topology();
    let optional = translate(
        &gtop,
        "MATCH (a:Person) OPTIONAL MATCH (a)-[:LIVES_IN]->(c:City) RETURN a.firstName, c.name",
    )
    .unwrap();
    assert_eq!(optional.matches(" LEFT JOIN ").count(), 2, "{}", optional);

    let required = translate(
        &gtop,
        "MATCH (a:Person) MATCH (a)-[:LIVES_IN]->(c:City) RETURN a.firstName, c.name",
    )
    .unwrap();
    assert!(!required.contains("LEFT JOIN"), "{}", required);
}

#[test]
fn test_translation_is_deterministic() {
    let gtop = social_topology();
    let query = "MATCH (a:Person)-[:KNOWS]-(b:Person) WITH a, count(b) AS friends \
                 WHERE friends > 2 RETURN a.lastName, friends ORDER BY friends DESC LIMIT 10";
    let first = translate(&gtop, query).unwrap();
    for _ in 0..5 {
        assert_eq!(translate(&gtop, query).unwrap(), first);
    }
}

#[test]
fn test_subquery_names_are_unique() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person) WITH a \
         MATCH (a)-[:KNOWS]->(b:Person) WITH a, count(b) AS n \
         RETURN a.firstName, n",
    )
    .unwrap();
    let mut names: Vec<&str> = sql
        .match_indices(") AS with_")
        .map(|(start, _)| {
            let name = &sql[start + 5..];
            let end = name
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(name.len());
            &name[..end]
        })
        .collect();
    assert!(!names.is_empty(), "{}", sql);
    let count = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), count, "{}", sql);
}

#[test]
fn test_with_aggregate_filter_moves_to_outer_scope() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person) WITH a, count(*) AS n WHERE n > 1 RETURN a.firstName, n",
    )
    .unwrap();
    assert_eq!(
        sql,
        "SELECT with_0.a__firstName AS \"a.firstName\", with_0.n AS n \
         FROM (SELECT a.id AS a, a.first_name AS a__firstName, COUNT(*) AS n \
         FROM persons AS a GROUP BY a.id, a.first_name) AS with_0 \
         WHERE with_0.n > 1"
    );
}

#[test]
fn test_unsupported_function() {
    let err = translate(
        &social_topology(),
        "MATCH (a:Person) RETURN soundex(a.firstName) AS s",
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::UnsupportedFeature);
}

#[test]
fn test_with_exports_only_properties_read_after_it() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person) WHERE a.lastName IN ['foo', 'bar'] WITH a RETURN a.firstName",
    )
    .unwrap();
    assert!(
        sql.contains("(SELECT a.id AS a, a.first_name AS a__firstName FROM persons AS a"),
        "{}",
        sql
    );
    assert!(!sql.contains("a__lastName"), "{}", sql);
}

#[test]
fn test_sole_map_projection_renders() {
    let sql = translate(
        &social_topology(),
        "MATCH (a:Person) WITH {x: 1} AS m RETURN m.x",
    )
    .unwrap();
    assert!(sql.contains("1 AS m"), "{}", sql);
    assert!(!sql.contains("{"), "{}", sql);
}

#[test]
fn test_escaped_quote_in_string_literal() {
    let sql = translate(
        &social_topology(),
        r"MATCH (a:Person) WHERE a.lastName = 'O\'Brien' RETURN a.firstName",
    )
    .unwrap();
    assert!(sql.contains("a.last_name = 'O''Brien'"), "{}", sql);
}
