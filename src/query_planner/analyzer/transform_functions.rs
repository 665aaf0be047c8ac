//! Function simplifier.
//!
//! - `length(p)` on a path becomes its hop count.
//! - `id(n)` on a node or relationship becomes the variable itself; the
//!   renderer prints a bare entity variable as its key column.
//! - `count(p)` counts the path's first node instead: a path has exactly one
//!   row per match, so does its first element. Counts of expanded variants
//!   are summed by the expansion merger.
//! - Any other scalar function has to be known to the SQL function registry.

use crate::{
    query_planner::{
        errors::{LoweringError, LoweringResult, Pass},
        logical_expr::{AggregateFnCall, Literal, LogicalExpr, ScalarFnCall},
        logical_plan::QueryTree,
        plan_ctx::LoweringCtx,
        typed_variable::{PathVar, VarId, VarKind, VarTable, VarType},
    },
    sql_generator::function_registry::get_function_mapping,
};

use super::{analyzer_pass::LoweringPass, rewrite_expressions};

pub struct TransformFunctions;

impl LoweringPass for TransformFunctions {
    fn name(&self) -> Pass {
        Pass::TransformFunctions
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        rewrite_expressions(&mut tree, &mut ctx.vars, |expr, _, vars| {
            expr.try_transform(&mut |node| match node {
                LogicalExpr::ScalarFnCall(call) => transform_scalar(call, vars),
                LogicalExpr::AggregateFnCall(call) => Ok(transform_aggregate(call, vars)),
                other => Ok(other),
            })
        })?;
        Ok(tree)
    }
}

fn path_of<'a>(vars: &'a VarTable, id: &VarId) -> Option<&'a PathVar> {
    match vars.get(vars.resolve_alias_var(id)).map(|v| &v.kind) {
        Some(VarKind::Path(path)) => Some(path),
        _ => None,
    }
}

fn transform_scalar(call: ScalarFnCall, vars: &VarTable) -> LoweringResult<LogicalExpr> {
    let pass = Pass::TransformFunctions;
    let name = call.name.to_lowercase();

    if let [LogicalExpr::Variable(arg)] = call.args.as_slice() {
        if name == "length" {
            if let Some(path) = path_of(vars, arg) {
                log::trace!("{}: length({}) = {}", pass, arg, path.hops);
                return Ok(LogicalExpr::Literal(Literal::Integer(path.hops as i64)));
            }
        }
        if name == "id" {
            return match vars.var_type(arg) {
                Some(VarType::Node | VarType::Relationship) => {
                    Ok(LogicalExpr::Variable(arg.clone()))
                }
                other => Err(LoweringError::invalid(
                    pass,
                    format!(
                        "id() expects a node or relationship, `{}` is {}",
                        arg,
                        other.map(|ty| ty.to_string()).unwrap_or_else(|| "untyped".to_string())
                    ),
                )),
            };
        }
    }

    if name == "id" {
        return Err(LoweringError::invalid(
            pass,
            "id() expects a single node or relationship variable",
        ));
    }
    if get_function_mapping(&name).is_none() {
        return Err(LoweringError::unsupported(
            pass,
            format!("function `{}`", call.name),
        ));
    }
    Ok(LogicalExpr::ScalarFnCall(call))
}

fn transform_aggregate(mut call: AggregateFnCall, vars: &VarTable) -> LogicalExpr {
    if call.name == "count" {
        let first = match call.args.as_slice() {
            [LogicalExpr::Variable(arg)] => {
                path_of(vars, arg).and_then(|path| path.elements.first().cloned())
            }
            _ => None,
        };
        if let Some(first) = first {
            call.args = vec![LogicalExpr::Variable(first)];
        }
    }
    LogicalExpr::AggregateFnCall(call)
}
