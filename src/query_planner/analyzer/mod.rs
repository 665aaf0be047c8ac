//! # Lowering passes
//!
//! The analyzer turns the variable model collected from the AST into a
//! finished [`QueryTree`]. Passes run strictly in order; each one takes the
//! tree by value and hands it on:
//!
//! ```text
//! 0. VarDependencies          - variables, scopes, dependencies (var_dependencies::collect)
//! 1. ComputeAliasVarType      - types of alias variables
//! 2. SelectTreeBuilder        - one ScopeSelect per WITH/RETURN
//! 3. NameSubqueries           - with_0, with_1, ...
//! 4. ComputeFromItems         - table items and the inherited subquery item
//! 5. MoveRestrictionInPattern - pattern property maps to WHERE / join conditions
//! 6. ExpandNodeVarWithGtop    - label sets and relationship types to tables
//! 7. PopulateJoins            - FROM items vs. INNER/LEFT joins
//! 8. ComputeExports           - columns every WITH has to select
//! 9. TransformFunctions       - length(p), id(n), count(p)
//! 10. UnwrapPropertyAccess    - alias.prop to var.prop
//! 11. UnwrapAliasVar          - inline and drop constant aliases
//! 12. MarkPropertiesAsUsed    - property columns entity exports carry
//! 13. UnwrapAliasExpr         - alias-of-variable references to the variable
//! ```
//!
//! Property marking has to run after the simplifiers: before them it would
//! see accesses that get folded away and miss the ones that appear when an
//! alias is unwrapped.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult, Pass},
    logical_expr::LogicalExpr,
    logical_plan::{QueryTree, ReturnItem, ScopeKind, ScopeSelect},
    typed_variable::{VarId, VarKind, VarTable},
};

use analyzer_pass::LoweringPass;

pub mod analyzer_pass;
mod compute_exports;
mod compute_from_items;
mod expand_with_gtop;
mod move_restrictions;
mod name_subqueries;
mod populate_joins;
mod select_tree_builder;
mod transform_functions;
mod type_inference;
mod unwrap_aliases;
pub mod var_dependencies;

/// Passes 1-13, in execution order.
pub fn pipeline() -> Vec<Box<dyn LoweringPass>> {
    vec![
        Box::new(type_inference::ComputeAliasVarType),
        Box::new(select_tree_builder::SelectTreeBuilder),
        Box::new(name_subqueries::NameSubqueries),
        Box::new(compute_from_items::ComputeFromItems),
        Box::new(move_restrictions::MoveRestrictionInPattern),
        Box::new(expand_with_gtop::ExpandNodeVarWithGtop),
        Box::new(populate_joins::PopulateJoins),
        Box::new(compute_exports::ComputeExports),
        Box::new(transform_functions::TransformFunctions),
        Box::new(unwrap_aliases::UnwrapPropertyAccess),
        Box::new(unwrap_aliases::UnwrapAliasVar),
        Box::new(compute_exports::MarkPropertiesAsUsed),
        Box::new(unwrap_aliases::UnwrapAliasExpr),
    ]
}

/// Variables a scope projects, resolved through aliases, without
/// duplicates and in item order.
pub(super) fn projected_variables(
    scope: &ScopeSelect,
    vars: &VarTable,
    pass: Pass,
) -> LoweringResult<Vec<VarId>> {
    let mut projected = Vec::new();
    for item in &scope.items {
        let id = match item {
            ReturnItem::Aliased { alias } => alias,
            ReturnItem::Unaliased {
                expr: LogicalExpr::Variable(id),
                ..
            } => id,
            ReturnItem::Unaliased { expr, .. } if scope.kind == ScopeKind::With => {
                return Err(LoweringError::bug(
                    pass,
                    "ReturnItem",
                    format!(
                        "WITH of scope {} projects `{}` without an alias",
                        scope.scope_index, expr
                    ),
                ))
            }
            ReturnItem::Unaliased { .. } => continue,
        };
        let resolved = vars.resolve_alias_var(id).clone();
        if !projected.contains(&resolved) {
            projected.push(resolved);
        }
    }
    Ok(projected)
}

/// Where a rewritten expression lives.
#[derive(Debug, Clone, Copy)]
pub(super) struct ExprSite {
    /// Scope the expression is evaluated in.
    pub scope_index: usize,
    /// Unaliased projection of a WITH; must stay a bare variable.
    pub with_projection: bool,
}

/// Runs `f` over every expression of every scope, then over the definition
/// of every alias variable. Dependencies of rewritten aliases are refreshed.
pub(super) fn rewrite_expressions<F>(
    tree: &mut QueryTree,
    vars: &mut VarTable,
    mut f: F,
) -> LoweringResult<()>
where
    F: FnMut(LogicalExpr, ExprSite, &VarTable) -> LoweringResult<LogicalExpr>,
{
    for scope in tree.scopes_mut() {
        let projections = scope
            .items
            .iter()
            .filter(|item| matches!(item, ReturnItem::Unaliased { .. }))
            .count();
        let is_with = scope.kind == ScopeKind::With;
        let scope_index = scope.scope_index;

        for (position, slot) in scope.expressions_mut().into_iter().enumerate() {
            let site = ExprSite {
                scope_index,
                with_projection: is_with && position < projections,
            };
            let expr = std::mem::replace(slot, LogicalExpr::Star);
            *slot = f(expr, site, vars)?;
        }
    }

    for id in vars.ids() {
        let Some((expr, scope_index)) = vars.get(&id).and_then(|var| match &var.kind {
            VarKind::Alias(alias) => Some((alias.expr.clone(), var.scope)),
            _ => None,
        }) else {
            continue;
        };
        let site = ExprSite { scope_index, with_projection: false };
        let rewritten = f(expr.clone(), site, vars)?;
        if rewritten != expr {
            if let Some(VarKind::Alias(alias)) = vars.get_mut(&id).map(|v| &mut v.kind) {
                alias.expr = rewritten;
            }
            vars.refresh_dependencies(&id);
        }
    }
    Ok(())
}
