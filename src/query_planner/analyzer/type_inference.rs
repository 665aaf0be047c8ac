//! Type checker: gives every alias a [`VarType`].
//!
//! An alias of a bare variable takes that variable's type; any other
//! expression is a scalar. Relationship endpoints are checked to resolve to
//! nodes, which the join populator relies on.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult, Pass},
    logical_expr::LogicalExpr,
    logical_plan::QueryTree,
    plan_ctx::LoweringCtx,
    typed_variable::{VarId, VarKind, VarTable, VarType},
};

use super::analyzer_pass::LoweringPass;

pub struct ComputeAliasVarType;

impl LoweringPass for ComputeAliasVarType {
    fn name(&self) -> Pass {
        Pass::ComputeAliasVarType
    }

    fn run(&self, tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        let ids = ctx.vars.ids();
        for id in &ids {
            let needs_type = matches!(
                ctx.vars.get(id).map(|v| &v.kind),
                Some(VarKind::Alias(alias)) if alias.ty.is_none()
            );
            if !needs_type {
                continue;
            }
            let ty = alias_type(&ctx.vars, id)?;
            if let Some(var) = ctx.vars.get_mut(id) {
                if let VarKind::Alias(alias) = &mut var.kind {
                    alias.ty = Some(ty);
                }
            }
            log::trace!("{}: `{}` is a {}", self.name(), id, ty);
        }

        for var in ctx.vars.iter() {
            if let VarKind::Rel(rel) = &var.kind {
                for endpoint in [&rel.relationship.left, &rel.relationship.right] {
                    let resolved = ctx.vars.resolve_alias_var(endpoint);
                    if ctx.vars.get(resolved).and_then(|v| v.static_type()) != Some(VarType::Node) {
                        return Err(LoweringError::bug(
                            self.name(),
                            "Relationship",
                            format!(
                                "endpoint `{}` of `{}` does not resolve to a node",
                                endpoint, var.unique_name
                            ),
                        ));
                    }
                }
            }
        }

        Ok(tree)
    }
}

/// Type of alias `id`, following alias-of-alias chains.
fn alias_type(vars: &VarTable, id: &VarId) -> LoweringResult<VarType> {
    let mut current = id;
    for _ in 0..=vars.len() {
        let var = vars.get(current).ok_or_else(|| {
            LoweringError::bug(
                Pass::ComputeAliasVarType,
                "AliasVar",
                format!("`{}` refers to an undeclared variable", current),
            )
        })?;
        match &var.kind {
            VarKind::Alias(alias) => match (&alias.expr, alias.ty) {
                (_, Some(ty)) => return Ok(ty),
                (LogicalExpr::Variable(target), None) => current = target,
                (_, None) => return Ok(VarType::Scalar),
            },
            _ => {
                return var.static_type().ok_or_else(|| {
                    LoweringError::bug(Pass::ComputeAliasVarType, "Variable", "untyped variable")
                })
            }
        }
    }
    Err(LoweringError::bug(
        Pass::ComputeAliasVarType,
        "AliasVar",
        format!("alias chain of `{}` does not end", id),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::social_topology;
    use crate::open_cypher_parser::parse_query;
    use crate::query_planner::analyzer::var_dependencies;

    #[test]
    fn test_alias_types() {
        let gtop = social_topology();
        let mut ctx = LoweringCtx::new(&gtop);
        let ast = parse_query(
            "MATCH p = (a)-[r:KNOWS]->(b) WITH a AS x, r AS y, p AS z, a.firstName AS n \
             WITH x AS xx, n AS m RETURN xx, m",
        )
        .unwrap();
        var_dependencies::collect(&ast, &mut ctx).unwrap();
        ComputeAliasVarType
            .run(QueryTree::default(), &mut ctx)
            .unwrap();

        let ty = |name: &str| ctx.vars.get(&VarId::from(name)).and_then(|v| v.static_type());
        assert_eq!(ty("x"), Some(VarType::Node));
        assert_eq!(ty("y"), Some(VarType::Relationship));
        assert_eq!(ty("z"), Some(VarType::Path));
        assert_eq!(ty("n"), Some(VarType::Scalar));
        assert_eq!(ty("xx"), Some(VarType::Node));
        assert_eq!(ty("m"), Some(VarType::Scalar));
    }
}
