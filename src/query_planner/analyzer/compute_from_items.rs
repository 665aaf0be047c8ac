//! From-item resolver.
//!
//! Every scope gets one table item per node and relationship its own
//! reading clauses declare, plus one subquery item over the previous scope
//! carrying the variables that scope projects (resolved through aliases,
//! paths expanded to their elements). Anything a scope reads from an
//! earlier scope has to arrive through that subquery item.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult, Pass},
    logical_plan::{FromItem, QueryTree, ScopeSelect},
    plan_ctx::LoweringCtx,
    typed_variable::{VarId, VarKind, VarTable},
};

use super::{analyzer_pass::LoweringPass, projected_variables};

pub struct ComputeFromItems;

impl LoweringPass for ComputeFromItems {
    fn name(&self) -> Pass {
        Pass::ComputeFromItems
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        let outputs = tree
            .subqueries
            .iter()
            .map(|with| supplied_variables(&with.scope, &ctx.vars, self.name()))
            .collect::<LoweringResult<Vec<_>>>()?;

        for scope in tree.scopes_mut() {
            if !scope.select.from_items.is_empty() || !scope.select.joins.is_empty() {
                return Err(LoweringError::bug(
                    self.name(),
                    "SimpleSelect",
                    format!("scope {} already has FROM items", scope.scope_index),
                ));
            }

            let mut items = Vec::new();
            if let Some(inner) = scope.inner {
                let variables = outputs.get(inner.0).cloned().ok_or_else(|| {
                    LoweringError::bug(
                        Pass::ComputeFromItems,
                        "ScopeSelect",
                        format!("scope {} reads from missing {:?}", scope.scope_index, inner),
                    )
                })?;
                if variables.is_empty() {
                    return Err(LoweringError::bug(
                        Pass::ComputeFromItems,
                        "FromItem",
                        format!("{:?} supplies no variables", inner),
                    ));
                }
                items.push(FromItem::subquery_item(inner, variables));
            }
            for (index, clause) in scope.reading_clauses.iter().enumerate() {
                for var in &clause.variables {
                    items.push(FromItem::table_item(var.clone(), index, clause.optional));
                }
            }

            check_inherited(scope, &items, &ctx.vars)?;
            log::trace!(
                "{}: scope {} has {} FROM items",
                Pass::ComputeFromItems,
                scope.scope_index,
                items.len()
            );
            scope.select.from_items = items;
        }
        Ok(tree)
    }
}

/// Projected variables of `scope` plus the elements of projected paths.
fn supplied_variables(scope: &ScopeSelect, vars: &VarTable, pass: Pass) -> LoweringResult<Vec<VarId>> {
    let mut supplied = Vec::new();
    for id in projected_variables(scope, vars, pass)? {
        let elements = match vars.get(&id).map(|v| &v.kind) {
            Some(VarKind::Path(path)) => path.elements.clone(),
            _ => Vec::new(),
        };
        for var in std::iter::once(id).chain(elements) {
            if !supplied.contains(&var) {
                supplied.push(var);
            }
        }
    }
    Ok(supplied)
}

/// Every variable `scope` refers to that an earlier scope declared must be
/// supplied by one of `items`.
fn check_inherited(scope: &ScopeSelect, items: &[FromItem], vars: &VarTable) -> LoweringResult<()> {
    let mut referenced = std::collections::BTreeSet::new();
    for expr in scope.expressions() {
        referenced.extend(expr.variables());
    }
    for alias in scope.declared_aliases() {
        if let Some(deps) = vars.dependencies_of(alias) {
            referenced.extend(deps.iter().cloned());
        }
    }
    for clause in &scope.reading_clauses {
        for rel in &clause.relationships {
            if let Some(deps) = vars.dependencies_of(rel) {
                referenced.extend(deps.iter().cloned());
            }
        }
    }

    for var in &referenced {
        let resolved = vars.resolve_alias_var(var);
        let declared_in = vars.get(resolved).map(|v| v.scope).ok_or_else(|| {
            LoweringError::bug(
                Pass::ComputeFromItems,
                "Variable",
                format!("`{}` is referenced but not declared", resolved),
            )
        })?;
        if declared_in < scope.scope_index && !items.iter().any(|item| item.supplies(resolved)) {
            return Err(LoweringError::bug(
                Pass::ComputeFromItems,
                "FromItem",
                format!(
                    "`{}` from scope {} is not exported into scope {}",
                    resolved, declared_in, scope.scope_index
                ),
            ));
        }
    }
    Ok(())
}
