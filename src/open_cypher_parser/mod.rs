//! nom parser for the read subset of openCypher lowered by this crate:
//! `[OPTIONAL] MATCH`, `WITH`, `RETURN` with ORDER BY / SKIP / LIMIT.

use ast::{Clause, CypherQuery};
use common::{ws, PResult};
use errors::OpenCypherParsingError;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::multispace0;
use nom::combinator::{map, opt};
use nom::multi::many1;
use nom::Parser;

pub mod ast;
mod common;
pub mod errors;
mod expression;
mod match_clause;
mod order_by_and_page_clause;
mod path_pattern;
mod return_clause;
mod where_clause;
mod with_clause;

fn parse_clause(input: &'_ str) -> PResult<'_, Clause<'_>> {
    alt((
        map(match_clause::parse_match_clause, Clause::Match),
        map(with_clause::parse_with_clause, Clause::With),
        map(return_clause::parse_return_clause, Clause::Return),
    ))
    .parse(input)
}

pub fn parse_statement(input: &'_ str) -> PResult<'_, CypherQuery<'_>> {
    let (input, _) = multispace0.parse(input)?;
    let (input, clauses) = many1(parse_clause).parse(input)?;
    let (input, _) = opt(ws(tag(";"))).parse(input)?;
    Ok((input, CypherQuery { clauses }))
}

/// Parses a whole query; trailing unparsed input is an error.
pub fn parse_query(input: &'_ str) -> Result<CypherQuery<'_>, OpenCypherParsingError<'_>> {
    match parse_statement(input) {
        Ok((remainder, query)) => {
            let trimmed = remainder.trim();
            if !trimmed.is_empty() {
                return Err(OpenCypherParsingError {
                    errors: vec![(trimmed, "Unexpected tokens after query")],
                });
            }
            log::trace!("parsed query:\n{}", query);
            Ok(query)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => Err(OpenCypherParsingError::new("", "Incomplete input")),
    }
}
