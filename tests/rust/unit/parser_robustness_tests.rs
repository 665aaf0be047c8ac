//! Unit tests for query parsing edge cases and error handling
//!
//! Tests malformed queries, edge cases, and error conditions to ensure
//! robust parsing without panics.

#[cfg(test)]
mod parser_robustness_tests {
    use gtopsql::open_cypher_parser::{ast::Clause, parse_query};

    /// Test that malformed queries don't cause panics
    #[test]
    fn test_malformed_queries_no_panic() {
        let malformed_queries = vec![
            "",
            "MATCH",
            "MATCH (",
            "MATCH )",
            "MATCH (n",
            "MATCH n)",
            "MATCH (n-",
            "MATCH (n-[]",
            "MATCH (n-[]-",
            "MATCH (n)-[]",
            "RETURN",
            "WHERE",
            "MATCH (n) RETURN n WHERE",
            "MATCH (n) INVALID_CLAUSE",
            "MATCH (n) RETURN n INVALID_KEYWORD",
            "MATCH (n) RETURN n LIMIT",
            "MATCH (n) RETURN [1, 2",
            "MATCH (n) RETURN 'unterminated",
        ];

        for query in malformed_queries {
            let result = parse_query(query);
            assert!(result.is_err(), "Expected parse error for: {:?}", query);
        }
    }

    #[test]
    fn test_error_hint_points_at_failure() {
        let err = parse_query("MATCH (n) RETURN n INVALID_KEYWORD").unwrap_err();
        let hint = err.hint();
        assert!(hint.contains("INVALID_KEYWORD"), "hint: {}", hint);
    }

    #[test]
    fn test_whitespace_and_case_variations() {
        let queries = vec![
            "match (n) return n",
            "MATCH(n)RETURN n",
            "  MATCH (n)\n\tRETURN n  ",
            "Match (n:Person) Where n.age > 1 Return n.name;",
            "MATCH (a)-->(b) RETURN b",
            "MATCH (a)<--(b) RETURN b",
            "MATCH (a)--(b) RETURN b",
        ];

        for query in queries {
            assert!(parse_query(query).is_ok(), "Failed to parse: {:?}", query);
        }
    }

    #[test]
    fn test_clause_sequence_is_preserved() {
        let query = parse_query(
            "MATCH (a:Person) OPTIONAL MATCH (a)-[:KNOWS]->(b) WITH a, count(b) AS n RETURN a, n",
        )
        .unwrap();
        let kinds: Vec<&str> = query
            .clauses
            .iter()
            .map(|clause| match clause {
                Clause::Match(m) if m.optional => "optional match",
                Clause::Match(_) => "match",
                Clause::With(_) => "with",
                Clause::Return(_) => "return",
            })
            .collect();
        assert_eq!(kinds, vec!["match", "optional match", "with", "return"]);
    }

    #[test]
    fn test_deeply_nested_expressions() {
        let depth = 64;
        let query = format!(
            "MATCH (n) RETURN {}1{} AS x",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        assert!(parse_query(&query).is_ok());
    }

    #[test]
    fn test_unicode_string_literals() {
        let query = "MATCH (n) WHERE n.name = 'Zoë 東京' RETURN n";
        assert!(parse_query(query).is_ok());
    }
}
