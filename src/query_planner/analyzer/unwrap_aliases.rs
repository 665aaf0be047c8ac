//! Alias simplifiers.
//!
//! After these passes no expression reaches a node or relationship through
//! an alias, and constant aliases survive only where a WITH still has to
//! project them.

use std::collections::BTreeSet;

use crate::query_planner::{
    errors::{LoweringResult, Pass},
    logical_expr::{Literal, LogicalExpr, PropertyAccess},
    logical_plan::{QueryTree, ReturnItem, SubqueryId},
    plan_ctx::LoweringCtx,
    typed_variable::{VarId, VarKind, VarTable, VarType},
};

use super::{analyzer_pass::LoweringPass, rewrite_expressions};

/// `x.prop` with `x` an alias of a node or relationship becomes `n.prop`.
pub struct UnwrapPropertyAccess;

impl LoweringPass for UnwrapPropertyAccess {
    fn name(&self) -> Pass {
        Pass::UnwrapPropertyAccess
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        rewrite_expressions(&mut tree, &mut ctx.vars, |expr, _, vars| {
            expr.try_transform(&mut |node| {
                Ok(match node {
                    LogicalExpr::PropertyAccessExp(PropertyAccess { base, key }) => {
                        let target = match base.as_ref() {
                            LogicalExpr::Variable(id) if is_entity_alias(vars, id) => {
                                Some(vars.resolve_alias_var(id).clone())
                            }
                            _ => None,
                        };
                        match target {
                            Some(target) => LogicalExpr::property(target, key),
                            None => LogicalExpr::PropertyAccessExp(PropertyAccess { base, key }),
                        }
                    }
                    other => other,
                })
            })
        })?;
        Ok(tree)
    }
}

fn is_entity_alias(vars: &VarTable, id: &VarId) -> bool {
    vars.resolve_alias_var(id) != id
        && matches!(
            vars.var_type(id),
            Some(VarType::Node | VarType::Relationship)
        )
}

fn constant_alias<'a>(vars: &'a VarTable, id: &VarId) -> Option<(&'a LogicalExpr, usize)> {
    match vars.get(id) {
        Some(var) => match &var.kind {
            VarKind::Alias(alias) if alias.expr.is_constant() => Some((&alias.expr, var.scope)),
            _ => None,
        },
        None => None,
    }
}

/// Inlines constant aliases into later scopes, folds property access on
/// inlined map literals, then drops WITH projections of constants nothing
/// reads any more.
pub struct UnwrapAliasVar;

impl LoweringPass for UnwrapAliasVar {
    fn name(&self) -> Pass {
        Pass::UnwrapAliasVar
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        rewrite_expressions(&mut tree, &mut ctx.vars, |expr, site, vars| {
            if site.with_projection {
                return Ok(expr);
            }
            expr.try_transform(&mut |node| {
                Ok(match node {
                    LogicalExpr::Variable(id) => match constant_alias(vars, &id) {
                        Some((value, declared_in)) if declared_in < site.scope_index => {
                            log::trace!("{}: inlining `{}` = {}", Pass::UnwrapAliasVar, id, value);
                            value.clone()
                        }
                        _ => LogicalExpr::Variable(id),
                    },
                    LogicalExpr::PropertyAccessExp(PropertyAccess { base, key }) => match *base {
                        LogicalExpr::MapLiteral(entries) => entries
                            .into_iter()
                            .find(|(entry, _)| *entry == key)
                            .map(|(_, value)| value)
                            .unwrap_or(LogicalExpr::Literal(Literal::Null)),
                        base => LogicalExpr::PropertyAccessExp(PropertyAccess {
                            base: Box::new(base),
                            key,
                        }),
                    },
                    other => other,
                })
            })
        })?;

        remove_unused_constants(&mut tree, &mut ctx.vars);
        Ok(tree)
    }
}

fn remove_unused_constants(tree: &mut QueryTree, vars: &mut VarTable) {
    for position in 0..tree.subqueries.len() {
        let scope_index = tree.subqueries[position].scope.scope_index;
        let candidates: Vec<VarId> = tree.subqueries[position]
            .scope
            .declared_aliases()
            .filter(|id| constant_alias(vars, id).is_some())
            .cloned()
            .collect();

        for id in candidates {
            let with = &tree.subqueries[position];
            if is_still_read(tree, vars, &id, scope_index) {
                continue;
            }
            if with.scope.items.len() <= 1 {
                // A WITH must project something; a folded-away map or list
                // is replaced by a scalar stand-in.
                if let Some(var) = vars.get_mut(&id) {
                    if let VarKind::Alias(alias) = &mut var.kind {
                        if !matches!(alias.expr, LogicalExpr::Literal(_)) {
                            log::debug!(
                                "{}: `{}` is the sole projection of {:?}, keeping it as a scalar",
                                Pass::UnwrapAliasVar,
                                id,
                                with.subquery_name
                            );
                            alias.expr = LogicalExpr::Literal(Literal::Integer(1));
                        }
                    }
                }
                vars.refresh_dependencies(&id);
                continue;
            }
            log::debug!(
                "{}: dropping unused constant `{}` from {:?}",
                Pass::UnwrapAliasVar,
                id,
                with.subquery_name
            );

            let with = &mut tree.subqueries[position];
            with.scope
                .items
                .retain(|item| !matches!(item, ReturnItem::Aliased { alias } if *alias == id));
            with.exports.retain(|export| export.var() != &id);

            let source = SubqueryId(position);
            for scope in tree.scopes_mut() {
                for item in scope.select.from_items.iter_mut() {
                    if item.source == Some(source) {
                        item.variables.retain(|var| *var != id);
                    }
                }
            }
            vars.remove(&id);
        }
    }
}

/// Whether anything outside its own projection still refers to `id`.
fn is_still_read(tree: &QueryTree, vars: &VarTable, id: &VarId, declared_in: usize) -> bool {
    let mut readers = BTreeSet::new();
    for scope in tree.scopes() {
        if scope.scope_index > declared_in {
            for expr in scope.expressions() {
                readers.extend(expr.variables());
            }
        } else if scope.scope_index == declared_in {
            for sort in &scope.order_by {
                readers.extend(sort.expr().variables());
            }
        }
    }
    if readers.contains(id) || !vars.dependents_of(id).is_empty() {
        return true;
    }

    tree.subqueries
        .iter()
        .filter(|with| with.scope.scope_index > declared_in)
        .flat_map(|with| with.exports.iter())
        .any(|export| export.var() == id)
}

/// Remaining references to an alias of a variable point at the variable.
pub struct UnwrapAliasExpr;

impl LoweringPass for UnwrapAliasExpr {
    fn name(&self) -> Pass {
        Pass::UnwrapAliasExpr
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        rewrite_expressions(&mut tree, &mut ctx.vars, |expr, _, vars| {
            expr.try_transform(&mut |node| {
                Ok(match node {
                    LogicalExpr::Variable(id) => {
                        LogicalExpr::Variable(vars.resolve_alias_var(&id).clone())
                    }
                    other => other,
                })
            })
        })?;
        Ok(tree)
    }
}
