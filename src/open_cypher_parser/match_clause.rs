use nom::{
    combinator::{cut, opt},
    error::context,
    Parser,
};

use super::{
    ast::MatchClause,
    common::{keyword, PResult},
    path_pattern::parse_pattern_list,
    where_clause::parse_where_clause,
};

/// `[OPTIONAL] MATCH pattern, ... [WHERE condition]`
pub fn parse_match_clause(input: &'_ str) -> PResult<'_, MatchClause<'_>> {
    let (input, optional) = opt(keyword("OPTIONAL")).parse(input)?;
    let (input, _) = keyword("MATCH").parse(input)?;
    let (input, patterns) =
        context("Error in match clause", cut(parse_pattern_list)).parse(input)?;
    let (input, where_clause) = opt(parse_where_clause).parse(input)?;

    Ok((
        input,
        MatchClause {
            optional: optional.is_some(),
            patterns,
            where_clause,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_match_clause() {
        let (rest, clause) = parse_match_clause("MATCH (a), (b)-->(c) WHERE a.x = 1 RETURN a").unwrap();
        assert_eq!(rest, "RETURN a");
        assert!(!clause.optional);
        assert_eq!(clause.patterns.len(), 2);
        assert!(clause.where_clause.is_some());
    }

    #[test]
    fn test_parse_optional_match_clause() {
        let (_, clause) = parse_match_clause("OPTIONAL MATCH (a)-[:KNOWS]->(b)").unwrap();
        assert!(clause.optional);
        assert_eq!(clause.patterns[0].relationships.len(), 1);
    }

    #[test]
    fn test_match_without_pattern_fails_hard() {
        assert!(matches!(
            parse_match_clause("MATCH RETURN a"),
            Err(nom::Err::Failure(_))
        ));
    }
}
