use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map_res, not, peek, recognize, verify},
    error::ParseError,
    sequence::{delimited, pair, terminated},
    IResult, Parser,
};

use super::errors::OpenCypherParsingError;

pub type PResult<'a, O> = IResult<&'a str, O, OpenCypherParsingError<'a>>;

/// Words that can never be used as bare variable names.
const RESERVED_WORDS: &[&str] = &[
    "MATCH", "OPTIONAL", "WHERE", "WITH", "RETURN", "ORDER", "BY", "SKIP", "LIMIT", "AS",
    "AND", "OR", "XOR", "NOT", "IN", "IS", "NULL", "TRUE", "FALSE", "DISTINCT", "ASC", "DESC",
    "ASCENDING", "DESCENDING", "STARTS", "ENDS", "CONTAINS", "UNION",
];

pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that is not the prefix of a longer word,
/// e.g. `IN` does not match the start of `INDEX`.
pub fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = OpenCypherParsingError<'a>> {
    ws(terminated(
        tag_no_case(word),
        not(peek(take_while1(is_identifier_char))),
    ))
}

fn unquoted_identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(is_identifier_char),
    ))
    .parse(input)
}

/// `` `quoted name` `` returns the text between the backticks.
fn quoted_identifier(input: &str) -> PResult<'_, &str> {
    delimited(char('`'), take_until("`"), char('`')).parse(input)
}

/// Label, relationship type, property key or map key. Reserved words are
/// allowed here (`n.limit`, `:Order`).
pub fn parse_symbolic_name(input: &str) -> PResult<'_, &str> {
    alt((quoted_identifier, unquoted_identifier)).parse(input)
}

/// Variable name; reserved words are rejected.
pub fn parse_identifier(input: &str) -> PResult<'_, &str> {
    alt((
        quoted_identifier,
        verify(unquoted_identifier, |name: &str| {
            !RESERVED_WORDS
                .iter()
                .any(|reserved| reserved.eq_ignore_ascii_case(name))
        }),
    ))
    .parse(input)
}

pub fn parse_u32(input: &str) -> PResult<'_, u32> {
    map_res(digit1, |digits: &str| digits.parse::<u32>()).parse(input)
}
