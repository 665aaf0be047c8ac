//! AST to LogicalExpr conversion.
//!
//! Variable names are resolved against the [`AvailableVariables`] of the
//! clause being lowered, so a converted expression never carries a bare name.

use crate::{
    open_cypher_parser::ast,
    query_planner::{
        errors::{LoweringError, LoweringResult, Pass},
        typed_variable::AvailableVariables,
    },
    sql_generator::function_registry::is_aggregate_function,
};

use super::{
    AggregateFnCall, Literal, LogicalExpr, Operator, OperatorApplication, PropertyAccess,
    ScalarFnCall,
};

impl<'a> From<&ast::Literal<'a>> for Literal {
    fn from(value: &ast::Literal<'a>) -> Self {
        match value {
            ast::Literal::Integer(val) => Literal::Integer(*val),
            ast::Literal::Float(val) => Literal::Float(*val),
            ast::Literal::Boolean(val) => Literal::Boolean(*val),
            ast::Literal::String(val) => Literal::String(ast::unescape_string(val)),
            ast::Literal::Null => Literal::Null,
        }
    }
}

impl From<ast::Operator> for Operator {
    fn from(value: ast::Operator) -> Self {
        match value {
            ast::Operator::Addition => Operator::Addition,
            ast::Operator::Subtraction => Operator::Subtraction,
            ast::Operator::Multiplication => Operator::Multiplication,
            ast::Operator::Division => Operator::Division,
            ast::Operator::ModuloDivision => Operator::ModuloDivision,
            ast::Operator::Exponentiation => Operator::Exponentiation,
            ast::Operator::Equal => Operator::Equal,
            ast::Operator::NotEqual => Operator::NotEqual,
            ast::Operator::LessThan => Operator::LessThan,
            ast::Operator::GreaterThan => Operator::GreaterThan,
            ast::Operator::LessThanEqual => Operator::LessThanEqual,
            ast::Operator::GreaterThanEqual => Operator::GreaterThanEqual,
            ast::Operator::RegexMatch => Operator::RegexMatch,
            ast::Operator::And => Operator::And,
            ast::Operator::Or => Operator::Or,
            ast::Operator::Xor => Operator::Xor,
            ast::Operator::In => Operator::In,
            ast::Operator::StartsWith => Operator::StartsWith,
            ast::Operator::EndsWith => Operator::EndsWith,
            ast::Operator::Contains => Operator::Contains,
            ast::Operator::Not => Operator::Not,
            ast::Operator::Negation => Operator::Negation,
            ast::Operator::IsNull => Operator::IsNull,
            ast::Operator::IsNotNull => Operator::IsNotNull,
        }
    }
}

/// Converts `expr`, resolving every variable against `available`.
pub fn convert_expression(
    expr: &ast::Expression<'_>,
    available: &AvailableVariables,
    pass: Pass,
) -> LoweringResult<LogicalExpr> {
    let converted = match expr {
        ast::Expression::Literal(literal) => LogicalExpr::Literal(literal.into()),
        ast::Expression::Variable(name) => match available.get(name) {
            Some(id) => LogicalExpr::Variable(id.clone()),
            None => {
                return Err(LoweringError::UndefinedVariable {
                    pass,
                    name: name.to_string(),
                })
            }
        },
        ast::Expression::Parameter(name) => LogicalExpr::Parameter(name.to_string()),
        ast::Expression::List(items) => LogicalExpr::List(
            items
                .iter()
                .map(|item| convert_expression(item, available, pass))
                .collect::<LoweringResult<_>>()?,
        ),
        ast::Expression::Map(entries) => LogicalExpr::MapLiteral(
            entries
                .iter()
                .map(|(key, value)| {
                    Ok((key.to_string(), convert_expression(value, available, pass)?))
                })
                .collect::<LoweringResult<_>>()?,
        ),
        ast::Expression::PropertyAccessExp(access) => {
            LogicalExpr::PropertyAccessExp(PropertyAccess {
                base: Box::new(convert_expression(&access.base, available, pass)?),
                key: access.key.to_string(),
            })
        }
        ast::Expression::OperatorApplicationExp(op) => {
            LogicalExpr::OperatorApplicationExp(OperatorApplication {
                operator: op.operator.into(),
                operands: op
                    .operands
                    .iter()
                    .map(|operand| convert_expression(operand, available, pass))
                    .collect::<LoweringResult<_>>()?,
            })
        }
        ast::Expression::FunctionCallExp(call) => {
            let args = call
                .args
                .iter()
                .map(|arg| convert_expression(arg, available, pass))
                .collect::<LoweringResult<Vec<_>>>()?;
            if is_aggregate_function(call.name) {
                LogicalExpr::AggregateFnCall(AggregateFnCall {
                    name: call.name.to_lowercase(),
                    distinct: call.distinct,
                    args,
                })
            } else if call.distinct {
                return Err(LoweringError::invalid(
                    pass,
                    format!("DISTINCT is only allowed in aggregate functions, not in `{}`", call.name),
                ));
            } else if args.iter().any(|arg| matches!(arg, LogicalExpr::Star)) {
                return Err(LoweringError::invalid(
                    pass,
                    format!("`*` is only allowed in count(*), not in `{}`", call.name),
                ));
            } else {
                LogicalExpr::ScalarFnCall(ScalarFnCall {
                    name: call.name.to_string(),
                    args,
                })
            }
        }
        ast::Expression::Star => LogicalExpr::Star,
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_planner::typed_variable::VarId;

    fn available() -> AvailableVariables {
        let mut available = AvailableVariables::default();
        available.insert("a", VarId::from("a"));
        available.insert("b", VarId::from("b_1"));
        available
    }

    #[test]
    fn test_variables_resolve_to_unique_names() {
        let expr = ast::Expression::PropertyAccessExp(ast::PropertyAccess {
            base: Box::new(ast::Expression::Variable("b")),
            key: "name",
        });
        assert_eq!(
            convert_expression(&expr, &available(), Pass::VarDependencies).unwrap(),
            LogicalExpr::property(VarId::from("b_1"), "name")
        );
    }

    #[test]
    fn test_undefined_variable() {
        let err = convert_expression(
            &ast::Expression::Variable("zz"),
            &available(),
            Pass::VarDependencies,
        )
        .unwrap_err();
        assert_eq!(
            err,
            LoweringError::UndefinedVariable {
                pass: Pass::VarDependencies,
                name: "zz".to_string()
            }
        );
    }

    #[test]
    fn test_functions_split_into_aggregate_and_scalar() {
        let count = ast::Expression::FunctionCallExp(ast::FunctionCall {
            name: "COUNT",
            distinct: true,
            args: vec![ast::Expression::Variable("a")],
        });
        assert_eq!(
            convert_expression(&count, &available(), Pass::VarDependencies).unwrap(),
            LogicalExpr::AggregateFnCall(AggregateFnCall {
                name: "count".to_string(),
                distinct: true,
                args: vec![LogicalExpr::Variable(VarId::from("a"))],
            })
        );

        let upper = ast::Expression::FunctionCallExp(ast::FunctionCall {
            name: "toUpper",
            distinct: true,
            args: vec![ast::Expression::Variable("a")],
        });
        assert!(convert_expression(&upper, &available(), Pass::VarDependencies).is_err());
    }
}
