use nom::{combinator::cut, error::context, Parser};

use super::{
    ast::Expression,
    common::{keyword, PResult},
    expression::parse_expression,
};

pub fn parse_where_clause(input: &'_ str) -> PResult<'_, Expression<'_>> {
    let (input, _) = keyword("WHERE").parse(input)?;
    context("Error in where clause", cut(parse_expression)).parse(input)
}
