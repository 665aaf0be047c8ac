use nom::{
    branch::alt,
    character::complete::char,
    combinator::{cut, map, opt},
    error::context,
    multi::separated_list1,
    sequence::preceded,
    Parser,
};

use super::{
    ast::{Expression, SortItem},
    common::{keyword, ws, PResult},
    expression::parse_expression,
};

/// ORDER BY, SKIP and LIMIT trailing a WITH or RETURN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderByAndPageClause<'a> {
    pub order_by: Vec<SortItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
}

fn parse_sort_item(input: &'_ str) -> PResult<'_, SortItem<'_>> {
    let (input, expression) = parse_expression(input)?;
    let (input, descending) = opt(alt((
        map(keyword("DESCENDING"), |_| true),
        map(keyword("DESC"), |_| true),
        map(keyword("ASCENDING"), |_| false),
        map(keyword("ASC"), |_| false),
    )))
    .parse(input)?;
    let item = if descending.unwrap_or(false) {
        SortItem::Desc(expression)
    } else {
        SortItem::Asc(expression)
    };
    Ok((input, item))
}

fn parse_order_by(input: &'_ str) -> PResult<'_, Vec<SortItem<'_>>> {
    let (input, _) = (keyword("ORDER"), keyword("BY")).parse(input)?;
    context(
        "Error in order by clause",
        cut(separated_list1(ws(char(',')), parse_sort_item)),
    )
    .parse(input)
}

/// `[ORDER BY ...] [SKIP n] [LIMIT n]`, SKIP strictly before LIMIT.
pub fn parse_order_by_and_page_clause(input: &'_ str) -> PResult<'_, OrderByAndPageClause<'_>> {
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, skip) = opt(preceded(
        keyword("SKIP"),
        context("Error in skip clause", cut(parse_expression)),
    ))
    .parse(input)?;
    let (input, limit) = opt(preceded(
        keyword("LIMIT"),
        context("Error in limit clause", cut(parse_expression)),
    ))
    .parse(input)?;
    Ok((
        input,
        OrderByAndPageClause {
            order_by: order_by.unwrap_or_default(),
            skip,
            limit,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::Literal;

    #[test]
    fn test_full_page_clause() {
        let (rest, clause) =
            parse_order_by_and_page_clause("ORDER BY a.x DESC, b SKIP 5 LIMIT 10").unwrap();
        assert_eq!(rest, "");
        assert_eq!(clause.order_by.len(), 2);
        assert!(matches!(clause.order_by[0], SortItem::Desc(_)));
        assert_eq!(clause.order_by[1], SortItem::Asc(Expression::Variable("b")));
        assert_eq!(clause.skip, Some(Expression::Literal(Literal::Integer(5))));
        assert_eq!(clause.limit, Some(Expression::Literal(Literal::Integer(10))));
    }

    #[test]
    fn test_empty_page_clause() {
        let (rest, clause) = parse_order_by_and_page_clause("WHERE x").unwrap();
        assert_eq!(rest, "WHERE x");
        assert_eq!(clause, OrderByAndPageClause::default());
    }

    #[test]
    fn test_limit_before_skip_is_not_consumed() {
        let (rest, clause) = parse_order_by_and_page_clause("LIMIT 1 SKIP 2").unwrap();
        assert_eq!(clause.limit, Some(Expression::Literal(Literal::Integer(1))));
        assert_eq!(rest, "SKIP 2");
    }
}
