use nom::{
    branch::alt,
    bytes::complete::{escaped, is_not, tag, take_while1},
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{map, map_res, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, separated_pair},
    Parser,
};

use super::{
    ast::{Expression, FunctionCall, Literal, Operator, OperatorApplication, PropertyAccess},
    common::{keyword, parse_identifier, parse_symbolic_name, ws, PResult},
    errors::OpenCypherParsingError,
};

pub fn parse_expression(input: &'_ str) -> PResult<'_, Expression<'_>> {
    parse_logical_or(input)
}

fn binary<'a>(operator: Operator, lhs: Expression<'a>, rhs: Expression<'a>) -> Expression<'a> {
    Expression::OperatorApplicationExp(OperatorApplication {
        operator,
        operands: vec![lhs, rhs],
    })
}

fn unary(operator: Operator, operand: Expression<'_>) -> Expression<'_> {
    Expression::OperatorApplicationExp(OperatorApplication {
        operator,
        operands: vec![operand],
    })
}

/// Left-associative fold of `next (op next)*`.
fn fold_left<'a, Op, Next>(input: &'a str, mut op: Op, mut next: Next) -> PResult<'a, Expression<'a>>
where
    Op: Parser<&'a str, Output = Operator, Error = OpenCypherParsingError<'a>>,
    Next: Parser<&'a str, Output = Expression<'a>, Error = OpenCypherParsingError<'a>>,
{
    let (mut input, mut lhs) = next.parse(input)?;
    loop {
        match op.parse(input) {
            Ok((rest, operator)) => {
                let (rest, rhs) = next.parse(rest)?;
                lhs = binary(operator, lhs, rhs);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, lhs)),
            Err(e) => return Err(e),
        }
    }
}

fn parse_logical_or(input: &'_ str) -> PResult<'_, Expression<'_>> {
    fold_left(input, map(keyword("OR"), |_| Operator::Or), parse_logical_xor)
}

fn parse_logical_xor(input: &'_ str) -> PResult<'_, Expression<'_>> {
    fold_left(input, map(keyword("XOR"), |_| Operator::Xor), parse_logical_and)
}

fn parse_logical_and(input: &'_ str) -> PResult<'_, Expression<'_>> {
    fold_left(input, map(keyword("AND"), |_| Operator::And), parse_logical_not)
}

fn parse_logical_not(input: &'_ str) -> PResult<'_, Expression<'_>> {
    alt((
        map(preceded(keyword("NOT"), parse_logical_not), |e| {
            unary(Operator::Not, e)
        }),
        parse_comparison,
    ))
    .parse(input)
}

pub fn parse_comparison_operator(input: &str) -> PResult<'_, Operator> {
    ws(alt((
        map(tag(">="), |_| Operator::GreaterThanEqual),
        map(tag("<="), |_| Operator::LessThanEqual),
        map(tag("<>"), |_| Operator::NotEqual),
        map(tag("!="), |_| Operator::NotEqual),
        map(tag("=~"), |_| Operator::RegexMatch),
        map(tag(">"), |_| Operator::GreaterThan),
        map(tag("<"), |_| Operator::LessThan),
        map(tag("="), |_| Operator::Equal),
    )))
    .parse(input)
}

fn parse_string_predicate_operator(input: &str) -> PResult<'_, Operator> {
    alt((
        map(pair(keyword("STARTS"), keyword("WITH")), |_| {
            Operator::StartsWith
        }),
        map(pair(keyword("ENDS"), keyword("WITH")), |_| Operator::EndsWith),
        map(keyword("CONTAINS"), |_| Operator::Contains),
        map(keyword("IN"), |_| Operator::In),
    ))
    .parse(input)
}

/// Comparisons, string predicates, `IN` and the `IS [NOT] NULL` postfix.
fn parse_comparison(input: &'_ str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut lhs) = parse_additive(input)?;
    loop {
        if let Ok((rest, operator)) = alt((
            map(
                (keyword("IS"), keyword("NOT"), keyword("NULL")),
                |_| Operator::IsNotNull,
            ),
            map((keyword("IS"), keyword("NULL")), |_| Operator::IsNull),
        ))
        .parse(input)
        {
            lhs = unary(operator, lhs);
            input = rest;
            continue;
        }

        let operator = alt((parse_comparison_operator, parse_string_predicate_operator))
            .parse(input);
        match operator {
            Ok((rest, operator)) => {
                let (rest, rhs) = parse_additive(rest)?;
                lhs = binary(operator, lhs, rhs);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, lhs)),
            Err(e) => return Err(e),
        }
    }
}

fn parse_additive(input: &'_ str) -> PResult<'_, Expression<'_>> {
    fold_left(
        input,
        ws(alt((
            map(char('+'), |_| Operator::Addition),
            map(char('-'), |_| Operator::Subtraction),
        ))),
        parse_multiplicative,
    )
}

fn parse_multiplicative(input: &'_ str) -> PResult<'_, Expression<'_>> {
    fold_left(
        input,
        ws(alt((
            map(char('*'), |_| Operator::Multiplication),
            map(char('/'), |_| Operator::Division),
            map(char('%'), |_| Operator::ModuloDivision),
        ))),
        parse_power,
    )
}

fn parse_power(input: &'_ str) -> PResult<'_, Expression<'_>> {
    fold_left(
        input,
        map(ws(char('^')), |_| Operator::Exponentiation),
        parse_unary,
    )
}

fn parse_unary(input: &'_ str) -> PResult<'_, Expression<'_>> {
    alt((
        map(preceded(ws(char('-')), parse_unary), |operand| match operand {
            Expression::Literal(Literal::Integer(i)) => Expression::Literal(Literal::Integer(-i)),
            Expression::Literal(Literal::Float(f)) => Expression::Literal(Literal::Float(-f)),
            other => unary(Operator::Negation, other),
        }),
        preceded(ws(char('+')), parse_unary),
        parse_postfix,
    ))
    .parse(input)
}

/// Atom followed by any number of `.key` property lookups.
fn parse_postfix(input: &'_ str) -> PResult<'_, Expression<'_>> {
    let (mut input, mut expr) = ws(parse_atom).parse(input)?;
    while let Ok((rest, key)) =
        preceded(char::<&str, OpenCypherParsingError>('.'), parse_symbolic_name).parse(input)
    {
        expr = Expression::PropertyAccessExp(PropertyAccess {
            base: Box::new(expr),
            key,
        });
        input = rest;
    }
    let (input, _) = multispace0.parse(input)?;
    Ok((input, expr))
}

fn parse_atom(input: &'_ str) -> PResult<'_, Expression<'_>> {
    alt((
        parse_literal,
        parse_parameter,
        parse_function_call,
        parse_list_literal,
        map(parse_map_literal, Expression::Map),
        delimited(ws(char('(')), parse_expression, ws(char(')'))),
        map(parse_identifier, Expression::Variable),
    ))
    .parse(input)
}

fn parse_literal(input: &'_ str) -> PResult<'_, Expression<'_>> {
    map(
        alt((
            map_res(
                recognize((digit1, char('.'), digit1)),
                |s: &str| s.parse::<f64>().map(Literal::Float),
            ),
            map_res(digit1, |s: &str| s.parse::<i64>().map(Literal::Integer)),
            map(parse_string_literal, Literal::String),
            map(keyword("TRUE"), |_| Literal::Boolean(true)),
            map(keyword("FALSE"), |_| Literal::Boolean(false)),
            map(keyword("NULL"), |_| Literal::Null),
        )),
        Expression::Literal,
    )
    .parse(input)
}

/// Single- or double-quoted string, without the quotes. `\\`, `\'` and
/// `\"` are kept escaped in the returned slice.
pub fn parse_string_literal(input: &str) -> PResult<'_, &str> {
    alt((
        delimited(
            char('\''),
            map(opt(escaped(is_not("\\'"), '\\', one_of("\\'\""))), Option::unwrap_or_default),
            char('\''),
        ),
        delimited(
            char('"'),
            map(opt(escaped(is_not("\\\""), '\\', one_of("\\'\""))), Option::unwrap_or_default),
            char('"'),
        ),
    ))
    .parse(input)
}

pub fn parse_parameter(input: &'_ str) -> PResult<'_, Expression<'_>> {
    map(
        preceded(
            char('$'),
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
        ),
        Expression::Parameter,
    )
    .parse(input)
}

fn parse_function_name(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        parse_symbolic_name,
        nom::multi::many0(pair(char('.'), parse_symbolic_name)),
    ))
    .parse(input)
}

fn parse_function_call(input: &'_ str) -> PResult<'_, Expression<'_>> {
    let (input, name) = parse_function_name(input)?;
    let (input, _) = ws(char('(')).parse(input)?;
    let (input, distinct) = opt(keyword("DISTINCT")).parse(input)?;
    let (input, args) = alt((
        map(ws(char('*')), |_| vec![Expression::Star]),
        separated_list0(ws(char(',')), parse_expression),
    ))
    .parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;
    Ok((
        input,
        Expression::FunctionCallExp(FunctionCall {
            name,
            distinct: distinct.is_some(),
            args,
        }),
    ))
}

pub fn parse_list_literal(input: &'_ str) -> PResult<'_, Expression<'_>> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), parse_expression),
            ws(char(']')),
        ),
        Expression::List,
    )
    .parse(input)
}

/// `{key: expr, ...}`; also used for pattern property maps.
pub fn parse_map_literal(input: &'_ str) -> PResult<'_, Vec<(&'_ str, Expression<'_>)>> {
    delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            separated_pair(ws(parse_symbolic_name), char(':'), parse_expression),
        ),
        ws(char('}')),
    )
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_cypher_parser::ast::unescape_string;

    fn int(i: i64) -> Expression<'static> {
        Expression::Literal(Literal::Integer(i))
    }

    #[test]
    fn test_arithmetic_precedence() {
        let (rest, expr) = parse_expression("12 + 4/1").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            expr,
            binary(
                Operator::Addition,
                int(12),
                binary(Operator::Division, int(4), int(1))
            )
        );
    }

    #[test]
    fn test_boolean_precedence() {
        let (_, expr) = parse_expression("a.x > 1 AND NOT b OR c").unwrap();
        match expr {
            Expression::OperatorApplicationExp(OperatorApplication {
                operator: Operator::Or,
                operands,
            }) => {
                assert!(matches!(
                    &operands[0],
                    Expression::OperatorApplicationExp(OperatorApplication {
                        operator: Operator::And,
                        ..
                    })
                ));
                assert_eq!(operands[1], Expression::Variable("c"));
            }
            other => panic!("expected OR at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_in_list() {
        let (rest, expr) = parse_expression("a.lastName IN ['foo','bar']").unwrap();
        assert_eq!(rest, "");
        match expr {
            Expression::OperatorApplicationExp(app) => {
                assert_eq!(app.operator, Operator::In);
                assert_eq!(
                    app.operands[1],
                    Expression::List(vec![
                        Expression::Literal(Literal::String("foo")),
                        Expression::Literal(Literal::String("bar")),
                    ])
                );
            }
            other => panic!("expected IN, got {:?}", other),
        }
    }

    #[test]
    fn test_is_not_null_and_string_predicates() {
        let (_, expr) = parse_expression("n.name IS NOT NULL").unwrap();
        assert!(matches!(
            expr,
            Expression::OperatorApplicationExp(OperatorApplication {
                operator: Operator::IsNotNull,
                ..
            })
        ));
        let (_, expr) = parse_expression("n.name STARTS WITH 'Al'").unwrap();
        assert!(matches!(
            expr,
            Expression::OperatorApplicationExp(OperatorApplication {
                operator: Operator::StartsWith,
                ..
            })
        ));
    }

    #[test]
    fn test_function_calls() {
        let (_, expr) = parse_expression("count(*)").unwrap();
        assert_eq!(
            expr,
            Expression::FunctionCallExp(FunctionCall {
                name: "count",
                distinct: false,
                args: vec![Expression::Star],
            })
        );
        let (_, expr) = parse_expression("count(DISTINCT a)").unwrap();
        assert!(matches!(
            expr,
            Expression::FunctionCallExp(FunctionCall { distinct: true, .. })
        ));
    }

    #[test]
    fn test_negative_literal_and_nested_property() {
        assert_eq!(parse_expression("-3").unwrap().1, int(-3));
        let (_, expr) = parse_expression("m.a.b").unwrap();
        match expr {
            Expression::PropertyAccessExp(outer) => {
                assert_eq!(outer.key, "b");
                assert!(matches!(*outer.base, Expression::PropertyAccessExp(_)));
            }
            other => panic!("expected property access, got {:?}", other),
        }
    }

    #[test]
    fn test_map_and_parameter() {
        assert_eq!(parse_expression("{}").unwrap().1, Expression::Map(vec![]));
        assert_eq!(
            parse_expression("$limit").unwrap().1,
            Expression::Parameter("limit")
        );
    }

    #[test]
    fn test_stops_before_clause_keyword() {
        let (rest, expr) = parse_expression("a.x = 1 WITH a").unwrap();
        assert_eq!(rest, "WITH a");
        assert!(matches!(expr, Expression::OperatorApplicationExp(_)));
    }

    #[test]
    fn test_string_escapes() {
        let (rest, raw) = parse_string_literal(r"'O\'Brien' AND").unwrap();
        assert_eq!(rest, " AND");
        assert_eq!(raw, r"O\'Brien");
        assert_eq!(unescape_string(raw), "O'Brien");

        let (_, raw) = parse_string_literal(r#""say \"hi\" c:\\tmp""#).unwrap();
        assert_eq!(unescape_string(raw), r#"say "hi" c:\tmp"#);

        assert_eq!(parse_string_literal("''").unwrap(), ("", ""));
        assert!(parse_string_literal("'unterminated").is_err());
    }
}
