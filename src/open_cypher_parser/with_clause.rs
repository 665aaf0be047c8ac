use nom::{combinator::opt, Parser};

use super::{
    ast::ProjectionClause,
    common::{keyword, PResult},
    return_clause::parse_projection_body,
    where_clause::parse_where_clause,
};

/// `WITH [DISTINCT] items [ORDER BY ...] [SKIP n] [LIMIT n] [WHERE condition]`
pub fn parse_with_clause(input: &'_ str) -> PResult<'_, ProjectionClause<'_>> {
    let (input, _) = keyword("WITH").parse(input)?;
    let (input, mut clause) = parse_projection_body(input)?;
    let (input, where_clause) = opt(parse_where_clause).parse(input)?;
    clause.where_clause = where_clause;
    Ok((input, clause))
}
