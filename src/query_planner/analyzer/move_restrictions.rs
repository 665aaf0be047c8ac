//! Restriction relocator.
//!
//! Pattern property maps were lowered into restrictions on the node and
//! relationship variables. Required items hand theirs to the select's WHERE;
//! optional items keep them as pending conditions of their future LEFT JOIN.
//! The WHERE of an OPTIONAL MATCH likewise becomes a pending condition of
//! the clause's last item.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult, Pass},
    logical_plan::{QueryTree, ScopeSelect},
    plan_ctx::LoweringCtx,
    typed_variable::VarKind,
};

use super::analyzer_pass::LoweringPass;

pub struct MoveRestrictionInPattern;

impl LoweringPass for MoveRestrictionInPattern {
    fn name(&self) -> Pass {
        Pass::MoveRestrictionInPattern
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        for scope in tree.scopes_mut() {
            let ScopeSelect {
                select,
                reading_clauses,
                scope_index,
                ..
            } = scope;

            for item in select.from_items.iter_mut() {
                let Some(var) = item.table_var().cloned() else {
                    continue;
                };
                let restriction = match ctx.vars.get_mut(&var).map(|v| &mut v.kind) {
                    Some(VarKind::Node(node)) => node.restriction.take(),
                    Some(VarKind::Rel(rel)) => rel.relationship.restriction.take(),
                    _ => {
                        return Err(LoweringError::bug(
                            self.name(),
                            "FromItem",
                            format!("table item over `{}`, which is no node or relationship", var),
                        ))
                    }
                };
                ctx.vars.refresh_dependencies(&var);

                if let Some(restriction) = restriction {
                    log::trace!(
                        "{}: restriction of `{}` goes to {}",
                        self.name(),
                        var,
                        if item.optional { "its join" } else { "WHERE" }
                    );
                    let conjuncts = restriction.into_conjuncts();
                    if item.optional {
                        item.pending_conditions.extend(conjuncts);
                    } else {
                        select.where_clause.extend(conjuncts);
                    }
                }
            }

            for (index, clause) in reading_clauses.iter_mut().enumerate() {
                let Some(condition) = clause.where_clause.take() else {
                    continue;
                };
                if !clause.optional {
                    select.where_clause.extend(condition.into_conjuncts());
                    continue;
                }
                match select
                    .from_items
                    .iter_mut()
                    .rev()
                    .find(|item| item.clause == Some(index))
                {
                    Some(item) => item.pending_conditions.extend(condition.into_conjuncts()),
                    None => {
                        return Err(LoweringError::unsupported(
                            self.name(),
                            format!(
                                "OPTIONAL MATCH without new variables in scope {}",
                                scope_index
                            ),
                        ))
                    }
                }
            }
        }
        Ok(tree)
    }
}
