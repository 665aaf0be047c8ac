//! Lowered expressions.
//!
//! Unlike the parser's `Expression`, every variable reference here is a
//! resolved [`VarId`], so later passes never look names up again.

use std::collections::BTreeSet;
use std::fmt;

use crate::query_planner::typed_variable::VarId;

pub mod ast_conversion;

#[derive(Debug, PartialEq, Clone)]
pub enum LogicalExpr {
    Literal(Literal),

    /// `*` inside `count(*)`
    Star,

    /// `$name`, stored without the `$`
    Parameter(String),

    /// Reference to a node, relationship, path or alias variable
    Variable(VarId),

    /// Physical column of a table-backed variable, used by join conditions
    Column(Column),

    PropertyAccessExp(PropertyAccess),

    OperatorApplicationExp(OperatorApplication),

    List(Vec<LogicalExpr>),

    MapLiteral(Vec<(String, LogicalExpr)>),

    AggregateFnCall(AggregateFnCall),

    ScalarFnCall(ScalarFnCall),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Column {
    pub var: VarId,
    pub name: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyAccess {
    pub base: Box<LogicalExpr>,
    pub key: String,
}

#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    ModuloDivision,
    Exponentiation,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    RegexMatch,
    And,
    Or,
    Xor,
    In,
    StartsWith,
    EndsWith,
    Contains,
    Not,
    Negation,
    IsNull,
    IsNotNull,
}

#[derive(Debug, PartialEq, Clone)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ScalarFnCall {
    pub name: String,
    pub args: Vec<LogicalExpr>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct AggregateFnCall {
    pub name: String,
    pub distinct: bool,
    pub args: Vec<LogicalExpr>,
}

impl LogicalExpr {
    pub fn binary(operator: Operator, left: LogicalExpr, right: LogicalExpr) -> LogicalExpr {
        LogicalExpr::OperatorApplicationExp(OperatorApplication {
            operator,
            operands: vec![left, right],
        })
    }

    pub fn equals(left: LogicalExpr, right: LogicalExpr) -> LogicalExpr {
        Self::binary(Operator::Equal, left, right)
    }

    pub fn property(var: VarId, key: impl Into<String>) -> LogicalExpr {
        LogicalExpr::PropertyAccessExp(PropertyAccess {
            base: Box::new(LogicalExpr::Variable(var)),
            key: key.into(),
        })
    }

    pub fn column(var: VarId, name: impl Into<String>) -> LogicalExpr {
        LogicalExpr::Column(Column {
            var,
            name: name.into(),
        })
    }

    /// Pre-order walk over this expression and all sub-expressions.
    pub fn walk<F: FnMut(&LogicalExpr)>(&self, f: &mut F) {
        f(self);
        match self {
            LogicalExpr::PropertyAccessExp(access) => access.base.walk(f),
            LogicalExpr::OperatorApplicationExp(op) => {
                op.operands.iter().for_each(|operand| operand.walk(f))
            }
            LogicalExpr::List(items) => items.iter().for_each(|item| item.walk(f)),
            LogicalExpr::MapLiteral(entries) => entries.iter().for_each(|(_, v)| v.walk(f)),
            LogicalExpr::AggregateFnCall(call) => call.args.iter().for_each(|arg| arg.walk(f)),
            LogicalExpr::ScalarFnCall(call) => call.args.iter().for_each(|arg| arg.walk(f)),
            LogicalExpr::Literal(_)
            | LogicalExpr::Star
            | LogicalExpr::Parameter(_)
            | LogicalExpr::Variable(_)
            | LogicalExpr::Column(_) => {}
        }
    }

    /// Bottom-up rewrite: children first, then `f` on the rebuilt node.
    pub fn try_transform<E, F>(self, f: &mut F) -> Result<LogicalExpr, E>
    where
        F: FnMut(LogicalExpr) -> Result<LogicalExpr, E>,
    {
        let rebuilt = match self {
            LogicalExpr::PropertyAccessExp(access) => {
                LogicalExpr::PropertyAccessExp(PropertyAccess {
                    base: Box::new(access.base.try_transform(f)?),
                    key: access.key,
                })
            }
            LogicalExpr::OperatorApplicationExp(op) => {
                LogicalExpr::OperatorApplicationExp(OperatorApplication {
                    operator: op.operator,
                    operands: transform_all(op.operands, f)?,
                })
            }
            LogicalExpr::List(items) => LogicalExpr::List(transform_all(items, f)?),
            LogicalExpr::MapLiteral(entries) => LogicalExpr::MapLiteral(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((k, v.try_transform(f)?)))
                    .collect::<Result<_, E>>()?,
            ),
            LogicalExpr::AggregateFnCall(call) => LogicalExpr::AggregateFnCall(AggregateFnCall {
                name: call.name,
                distinct: call.distinct,
                args: transform_all(call.args, f)?,
            }),
            LogicalExpr::ScalarFnCall(call) => LogicalExpr::ScalarFnCall(ScalarFnCall {
                name: call.name,
                args: transform_all(call.args, f)?,
            }),
            leaf => leaf,
        };
        f(rebuilt)
    }

    /// Every variable referenced anywhere in the expression.
    pub fn variables(&self) -> BTreeSet<VarId> {
        let mut vars = BTreeSet::new();
        self.walk(&mut |expr| match expr {
            LogicalExpr::Variable(id) => {
                vars.insert(id.clone());
            }
            LogicalExpr::Column(column) => {
                vars.insert(column.var.clone());
            }
            _ => {}
        });
        vars
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |expr| {
            if matches!(expr, LogicalExpr::AggregateFnCall(_)) {
                found = true;
            }
        });
        found
    }

    /// Literals and list/map literals built only from literals.
    pub fn is_constant(&self) -> bool {
        match self {
            LogicalExpr::Literal(_) => true,
            LogicalExpr::List(items) => items.iter().all(LogicalExpr::is_constant),
            LogicalExpr::MapLiteral(entries) => entries.iter().all(|(_, v)| v.is_constant()),
            _ => false,
        }
    }

    /// Splits nested ANDs into their conjuncts.
    pub fn into_conjuncts(self) -> Vec<LogicalExpr> {
        match self {
            LogicalExpr::OperatorApplicationExp(op) if op.operator == Operator::And => op
                .operands
                .into_iter()
                .flat_map(LogicalExpr::into_conjuncts)
                .collect(),
            other => vec![other],
        }
    }
}

fn transform_all<E, F>(exprs: Vec<LogicalExpr>, f: &mut F) -> Result<Vec<LogicalExpr>, E>
where
    F: FnMut(LogicalExpr) -> Result<LogicalExpr, E>,
{
    exprs.into_iter().map(|e| e.try_transform(f)).collect()
}

/// Left-deep AND of `exprs`; `None` when empty.
pub fn conjunction(exprs: Vec<LogicalExpr>) -> Option<LogicalExpr> {
    exprs
        .into_iter()
        .reduce(|acc, next| LogicalExpr::binary(Operator::And, acc, next))
}

pub fn disjunction(left: LogicalExpr, right: LogicalExpr) -> LogicalExpr {
    LogicalExpr::binary(Operator::Or, left, right)
}

impl fmt::Display for LogicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalExpr::Literal(Literal::String(s)) => write!(f, "'{}'", s),
            LogicalExpr::Literal(Literal::Integer(i)) => write!(f, "{}", i),
            LogicalExpr::Literal(Literal::Float(x)) => write!(f, "{}", x),
            LogicalExpr::Literal(Literal::Boolean(b)) => write!(f, "{}", b),
            LogicalExpr::Literal(Literal::Null) => write!(f, "null"),
            LogicalExpr::Star => write!(f, "*"),
            LogicalExpr::Parameter(p) => write!(f, "${}", p),
            LogicalExpr::Variable(id) => write!(f, "{}", id),
            LogicalExpr::Column(c) => write!(f, "{}#{}", c.var, c.name),
            LogicalExpr::PropertyAccessExp(p) => write!(f, "{}.{}", p.base, p.key),
            LogicalExpr::OperatorApplicationExp(op) => {
                write!(f, "{:?}(", op.operator)?;
                write_list(f, &op.operands)?;
                write!(f, ")")
            }
            LogicalExpr::List(items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            LogicalExpr::MapLiteral(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            LogicalExpr::AggregateFnCall(call) => {
                write!(f, "{}(", call.name)?;
                if call.distinct {
                    write!(f, "DISTINCT ")?;
                }
                write_list(f, &call.args)?;
                write!(f, ")")
            }
            LogicalExpr::ScalarFnCall(call) => {
                write!(f, "{}(", call.name)?;
                write_list(f, &call.args)?;
                write!(f, ")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[LogicalExpr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", expr)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> LogicalExpr {
        LogicalExpr::Variable(VarId::from(name))
    }

    #[test]
    fn test_variables_and_aggregates() {
        let expr = LogicalExpr::binary(
            Operator::GreaterThan,
            LogicalExpr::property(VarId::from("a"), "x"),
            LogicalExpr::AggregateFnCall(AggregateFnCall {
                name: "count".to_string(),
                distinct: false,
                args: vec![var("b")],
            }),
        );
        let vars: Vec<String> = expr.variables().iter().map(|v| v.to_string()).collect();
        assert_eq!(vars, vec!["a", "b"]);
        assert!(expr.contains_aggregate());
        assert!(!var("a").contains_aggregate());
    }

    #[test]
    fn test_try_transform_is_bottom_up() {
        let expr = LogicalExpr::binary(Operator::Addition, var("a"), var("b"));
        let renamed: Result<LogicalExpr, ()> = expr.try_transform(&mut |e| match e {
            LogicalExpr::Variable(id) if id.as_str() == "a" => Ok(var("z")),
            other => Ok(other),
        });
        assert_eq!(
            renamed.unwrap(),
            LogicalExpr::binary(Operator::Addition, var("z"), var("b"))
        );
    }

    #[test]
    fn test_conjunction_round_trip() {
        assert_eq!(conjunction(vec![]), None);
        let joined = conjunction(vec![var("a"), var("b"), var("c")]).unwrap();
        assert_eq!(joined.into_conjuncts(), vec![var("a"), var("b"), var("c")]);
    }

    #[test]
    fn test_constants() {
        assert!(LogicalExpr::MapLiteral(vec![(
            "k".to_string(),
            LogicalExpr::List(vec![LogicalExpr::Literal(Literal::Integer(1))])
        )])
        .is_constant());
        assert!(!LogicalExpr::List(vec![var("a")]).is_constant());
    }
}
