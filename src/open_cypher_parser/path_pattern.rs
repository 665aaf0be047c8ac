use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, opt},
    error::context,
    multi::{many0, separated_list1},
    sequence::{delimited, preceded, terminated},
    Parser,
};

use super::{
    ast::{Direction, NodePattern, PathPattern, RelationshipPattern, VariableLength},
    common::{parse_identifier, parse_symbolic_name, parse_u32, ws, PResult},
    expression::parse_map_literal,
    errors::OpenCypherParsingError,
};

/// Longest relationship chain accepted in one path pattern.
const MAX_RELATIONSHIP_CHAIN_DEPTH: usize = 50;

/// `[p =] (a)-[r]->(b)...`
pub fn parse_path_pattern(input: &'_ str) -> PResult<'_, PathPattern<'_>> {
    let (input, variable) = opt(terminated(ws(parse_identifier), ws(char('=')))).parse(input)?;
    let (input, start) = parse_node_pattern(input)?;
    let (input, chain) = many0((parse_relationship_pattern, parse_node_pattern)).parse(input)?;

    if chain.len() > MAX_RELATIONSHIP_CHAIN_DEPTH {
        return Err(nom::Err::Failure(OpenCypherParsingError::new(
            input,
            "relationship chain is too long",
        )));
    }

    let mut nodes = Vec::with_capacity(chain.len() + 1);
    let mut relationships = Vec::with_capacity(chain.len());
    nodes.push(start);
    for (relationship, node) in chain {
        relationships.push(relationship);
        nodes.push(node);
    }

    Ok((
        input,
        PathPattern {
            variable,
            nodes,
            relationships,
        },
    ))
}

/// Comma separated pattern list of a MATCH clause.
pub fn parse_pattern_list(input: &'_ str) -> PResult<'_, Vec<PathPattern<'_>>> {
    separated_list1(ws(char(',')), parse_path_pattern).parse(input)
}

fn parse_labels(input: &str) -> PResult<'_, Vec<&str>> {
    many0(preceded(ws(char(':')), ws(parse_symbolic_name))).parse(input)
}

pub fn parse_node_pattern(input: &'_ str) -> PResult<'_, NodePattern<'_>> {
    context(
        "Error in node pattern",
        map(
            delimited(
                ws(char('(')),
                (
                    opt(ws(parse_identifier)),
                    parse_labels,
                    opt(parse_map_literal),
                ),
                ws(char(')')),
            ),
            |(name, labels, properties)| NodePattern {
                name,
                labels,
                properties,
            },
        ),
    )
    .parse(input)
}

/// `:A|B` or `:A|:B`
fn parse_relationship_types(input: &str) -> PResult<'_, Vec<&str>> {
    map(
        opt(preceded(
            ws(char(':')),
            separated_list1(
                ws(char('|')),
                preceded(opt(ws(char(':'))), ws(parse_symbolic_name)),
            ),
        )),
        |types| types.unwrap_or_default(),
    )
    .parse(input)
}

/// `*`, `*3`, `*1..3`, `*..3`, `*2..`
fn parse_variable_length(input: &str) -> PResult<'_, VariableLength> {
    let (input, _) = ws(char('*')).parse(input)?;
    let (input, min_hops) = opt(ws(parse_u32)).parse(input)?;
    let (input, range) = opt(preceded(ws(tag("..")), opt(ws(parse_u32)))).parse(input)?;
    let length = match range {
        // `*n` is a fixed length
        None => VariableLength {
            min_hops,
            max_hops: min_hops,
        },
        Some(max_hops) => VariableLength { min_hops, max_hops },
    };
    Ok((input, length))
}

type RelationshipDetail<'a> = (
    Option<&'a str>,
    Vec<&'a str>,
    Option<VariableLength>,
    Option<Vec<(&'a str, super::ast::Expression<'a>)>>,
);

fn parse_relationship_detail(input: &'_ str) -> PResult<'_, RelationshipDetail<'_>> {
    delimited(
        ws(char('[')),
        (
            opt(ws(parse_identifier)),
            parse_relationship_types,
            opt(parse_variable_length),
            opt(parse_map_literal),
        ),
        ws(char(']')),
    )
    .parse(input)
}

pub fn parse_relationship_pattern(input: &'_ str) -> PResult<'_, RelationshipPattern<'_>> {
    let (input, left_arrow) = ws(alt((map(tag("<-"), |_| true), map(tag("-"), |_| false))))
        .parse(input)?;
    let (input, detail) = opt(parse_relationship_detail).parse(input)?;
    let (input, right_arrow) = ws(alt((map(tag("->"), |_| true), map(tag("-"), |_| false))))
        .parse(input)?;

    let direction = match (left_arrow, right_arrow) {
        (true, false) => Direction::Left,
        (false, true) => Direction::Right,
        // `-[]-` and `<-[]->` both match either orientation
        _ => Direction::Both,
    };
    let (name, types, variable_length, properties) = detail.unwrap_or_default();

    Ok((
        input,
        RelationshipPattern {
            name,
            direction,
            types,
            properties,
            variable_length,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::{Expression, Literal};

    #[test]
    fn test_undirected_relationship() {
        let (rest, pattern) = parse_path_pattern("(a)-[r:TEST]-(c)").unwrap();
        assert_eq!(rest, "");
        let (left, rel, right) = pattern.connections().next().unwrap();
        assert_eq!(rel.direction, Direction::Both);
        assert_eq!(rel.variable_length, None);
        assert_eq!(rel.types, vec!["TEST"]);
        assert_eq!(rel.name, Some("r"));
        assert_eq!(left.name, Some("a"));
        assert_eq!(right.name, Some("c"));
    }

    #[test]
    fn test_node_with_labels_and_properties() {
        let (_, node) = parse_node_pattern("(a:Person:Admin {id: 'test'})").unwrap();
        assert_eq!(node.name, Some("a"));
        assert_eq!(node.labels, vec!["Person", "Admin"]);
        assert_eq!(
            node.properties,
            Some(vec![("id", Expression::Literal(Literal::String("test")))])
        );
    }

    #[test]
    fn test_chain_directions_and_anonymous_parts() {
        let (rest, pattern) = parse_path_pattern("p = (a)-->(:City)<-[:LIVES_IN|WORKS_IN]-(b)").unwrap();
        assert_eq!(rest, "");
        assert_eq!(pattern.variable, Some("p"));
        assert_eq!(pattern.nodes.len(), 3);
        assert_eq!(pattern.relationships[0].direction, Direction::Right);
        assert_eq!(pattern.relationships[0].name, None);
        assert_eq!(pattern.relationships[1].direction, Direction::Left);
        assert_eq!(pattern.relationships[1].types, vec!["LIVES_IN", "WORKS_IN"]);
        assert_eq!(pattern.nodes[1].name, None);
        assert_eq!(pattern.nodes[1].labels, vec!["City"]);
    }

    #[test]
    fn test_variable_length_forms() {
        let cases = [
            ("(a)-[*]->(b)", None, None),
            ("(a)-[*2]->(b)", Some(2), Some(2)),
            ("(a)-[:T*1..3]->(b)", Some(1), Some(3)),
            ("(a)-[*..4]->(b)", None, Some(4)),
            ("(a)-[*2..]->(b)", Some(2), None),
        ];
        for (query, min_hops, max_hops) in cases {
            let (_, pattern) = parse_path_pattern(query).unwrap();
            assert_eq!(
                pattern.relationships[0].variable_length,
                Some(VariableLength { min_hops, max_hops }),
                "{}",
                query
            );
        }
    }
}
