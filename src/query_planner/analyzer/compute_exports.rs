//! Export computer and property-usage marking.
//!
//! [`ComputeExports`] fixes the shape of every WithSelect's output: one
//! entity export per projected node or relationship (paths contribute their
//! elements), one scalar export per other projection. Which property
//! columns an entity export carries is only decided by
//! [`MarkPropertiesAsUsed`], after the simplifiers have settled which
//! property accesses survive.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult, Pass},
    logical_expr::LogicalExpr,
    logical_plan::{Export, QueryTree},
    plan_ctx::LoweringCtx,
    typed_variable::{VarId, VarKind, VarTable, VarType},
};

use super::{analyzer_pass::LoweringPass, projected_variables};

pub struct ComputeExports;

impl LoweringPass for ComputeExports {
    fn name(&self) -> Pass {
        Pass::ComputeExports
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        for with in &mut tree.subqueries {
            if !with.exports.is_empty() {
                return Err(LoweringError::bug(
                    self.name(),
                    "WithSelect",
                    format!("exports of scope {} computed twice", with.scope.scope_index),
                ));
            }

            let mut exports = Vec::new();
            for id in projected_variables(&with.scope, &ctx.vars, self.name())? {
                for export in exports_of(&ctx.vars, &id)? {
                    if !exports.contains(&export) {
                        exports.push(export);
                    }
                }
            }
            log::trace!(
                "{}: {:?} exports {:?}",
                self.name(),
                with.subquery_name,
                exports
            );
            with.exports = exports;
        }
        Ok(tree)
    }
}

fn exports_of(vars: &VarTable, id: &VarId) -> LoweringResult<Vec<Export>> {
    let var = vars.get(id).ok_or_else(|| {
        LoweringError::bug(
            Pass::ComputeExports,
            "Export",
            format!("projected `{}` is not declared", id),
        )
    })?;
    Ok(match (&var.kind, vars.var_type(id)) {
        (VarKind::Path(path), _) => path.elements.iter().cloned().map(Export::Entity).collect(),
        (_, Some(VarType::Node | VarType::Relationship)) => vec![Export::Entity(id.clone())],
        (_, Some(VarType::Scalar)) => vec![Export::Scalar(id.clone())],
        (_, ty) => {
            return Err(LoweringError::bug(
                Pass::ComputeExports,
                "Export",
                format!("`{}` has type {:?}", id, ty),
            ))
        }
    })
}

/// Records every property read from a node or relationship in its
/// `properties_required`, together with the outermost scope that reads it.
/// A WithSelect only exports the properties read by scopes outside it.
/// Runs once the simplifiers are done.
pub struct MarkPropertiesAsUsed;

impl LoweringPass for MarkPropertiesAsUsed {
    fn name(&self) -> Pass {
        Pass::MarkPropertiesAsUsed
    }

    fn run(&self, tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        let mut used: Vec<(VarId, String, usize)> = Vec::new();
        let mut collect = |expr: &LogicalExpr, scope: usize| {
            expr.walk(&mut |node| {
                if let LogicalExpr::PropertyAccessExp(access) = node {
                    if let LogicalExpr::Variable(base) = access.base.as_ref() {
                        used.push((base.clone(), access.key.clone(), scope));
                    }
                }
            })
        };

        for scope in tree.scopes() {
            for expr in scope.expressions() {
                collect(expr, scope.scope_index);
            }
        }
        // alias definitions are evaluated in the scope declaring them
        for var in ctx.vars.iter() {
            if let VarKind::Alias(alias) = &var.kind {
                collect(&alias.expr, var.scope);
            }
        }

        for (base, key, scope) in used {
            let resolved = ctx.vars.resolve_alias_var(&base).clone();
            let required = match ctx.vars.get_mut(&resolved).map(|v| &mut v.kind) {
                Some(VarKind::Node(node)) => &mut node.properties_required,
                Some(VarKind::Rel(rel)) => &mut rel.properties_required,
                _ => continue,
            };
            let outermost = required.entry(key.clone()).or_insert(scope);
            *outermost = (*outermost).max(scope);
            log::trace!(
                "{}: `{}.{}` is read up to scope {}",
                Pass::MarkPropertiesAsUsed,
                resolved,
                key,
                outermost
            );
        }
        Ok(tree)
    }
}
