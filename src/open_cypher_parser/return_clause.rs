use nom::{
    character::complete::char,
    combinator::{cut, opt},
    error::context,
    multi::separated_list1,
    sequence::preceded,
    Parser,
};

use super::{
    ast::{ProjectionClause, ProjectionItem},
    common::{keyword, parse_identifier, ws, PResult},
    expression::parse_expression,
    order_by_and_page_clause::parse_order_by_and_page_clause,
};

/// `expr [AS alias]`, remembering the expression text.
pub fn parse_projection_item(input: &'_ str) -> PResult<'_, ProjectionItem<'_>> {
    let (rest, expression) = parse_expression(input)?;
    let original_text = input[..input.len() - rest.len()].trim();
    let (rest, alias) = opt(preceded(keyword("AS"), ws(parse_identifier))).parse(rest)?;
    Ok((
        rest,
        ProjectionItem {
            expression,
            alias,
            original_text,
        },
    ))
}

/// Items plus the trailing ORDER BY / SKIP / LIMIT shared by WITH and RETURN.
pub fn parse_projection_body(input: &'_ str) -> PResult<'_, ProjectionClause<'_>> {
    let (input, distinct) = opt(keyword("DISTINCT")).parse(input)?;
    let (input, items) = context(
        "Error in projection items",
        cut(separated_list1(ws(char(',')), parse_projection_item)),
    )
    .parse(input)?;
    let (input, page) = parse_order_by_and_page_clause(input)?;
    Ok((
        input,
        ProjectionClause {
            distinct: distinct.is_some(),
            items,
            order_by: page.order_by,
            skip: page.skip,
            limit: page.limit,
            where_clause: None,
        },
    ))
}

pub fn parse_return_clause(input: &'_ str) -> PResult<'_, ProjectionClause<'_>> {
    let (input, _) = keyword("RETURN").parse(input)?;
    parse_projection_body(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::{Expression, Literal};

    #[test]
    fn test_return_items_keep_text_and_alias() {
        let (rest, clause) = parse_return_clause("RETURN 234, foobar.test, a.x + 1 AS y").unwrap();
        assert_eq!(rest, "");
        assert_eq!(clause.items.len(), 3);
        assert_eq!(
            clause.items[0].expression,
            Expression::Literal(Literal::Integer(234))
        );
        assert_eq!(clause.items[0].original_text, "234");
        assert_eq!(clause.items[1].original_text, "foobar.test");
        assert_eq!(clause.items[1].alias, None);
        assert_eq!(clause.items[2].alias, Some("y"));
        assert_eq!(clause.items[2].original_text, "a.x + 1");
    }

    #[test]
    fn test_return_distinct_with_paging() {
        let (_, clause) = parse_return_clause("RETURN DISTINCT a ORDER BY a SKIP 1 LIMIT 2").unwrap();
        assert!(clause.distinct);
        assert_eq!(clause.order_by.len(), 1);
        assert!(clause.skip.is_some());
        assert!(clause.limit.is_some());
    }
}
