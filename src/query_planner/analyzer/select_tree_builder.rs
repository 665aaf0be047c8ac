//! Query-tree builder.
//!
//! Turns the scope models of the variable model into the skeleton
//! [`QueryTree`]: one [`ScopeSelect`] per scope, every WITH scope wrapped in
//! an unnamed [`WithSelect`] that the following scope reads from. FROM and
//! JOIN data stay empty.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult, Pass},
    logical_plan::{QueryTree, ScopeKind, ScopeSelect, SimpleSelect, SubqueryId, WithSelect},
    plan_ctx::LoweringCtx,
};

use super::analyzer_pass::LoweringPass;

pub struct SelectTreeBuilder;

impl LoweringPass for SelectTreeBuilder {
    fn name(&self) -> Pass {
        Pass::SelectTreeBuilder
    }

    fn run(&self, tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        if !tree.subqueries.is_empty() {
            return Err(LoweringError::bug(
                self.name(),
                "QueryTree",
                "tree is already built",
            ));
        }

        let models = std::mem::take(&mut ctx.scopes);
        let count = models.len();
        let mut subqueries = Vec::with_capacity(count.saturating_sub(1));
        let mut root = None;

        for (index, model) in models.into_iter().enumerate() {
            let order_by = model
                .order_by
                .into_iter()
                .filter(|sort| {
                    let constant = sort.expr().is_constant();
                    if constant {
                        log::warn!(
                            "{}: dropping constant ORDER BY key {} in scope {}",
                            self.name(),
                            sort.expr(),
                            index
                        );
                    }
                    !constant
                })
                .collect();

            let scope = ScopeSelect {
                kind: model.kind,
                scope_index: index,
                inner: index.checked_sub(1).map(SubqueryId),
                reading_clauses: model.reading_clauses,
                select: SimpleSelect {
                    where_clause: model
                        .filter
                        .map(|filter| filter.into_conjuncts())
                        .unwrap_or_default(),
                    ..Default::default()
                },
                distinct: model.distinct,
                items: model.items,
                order_by,
                skip: model.skip,
                limit: model.limit,
            };

            match (scope.kind, index + 1 == count) {
                (ScopeKind::With, false) => subqueries.push(WithSelect {
                    subquery_name: None,
                    scope,
                    exports: Vec::new(),
                }),
                (ScopeKind::Return, true) => root = Some(scope),
                (kind, _) => {
                    return Err(LoweringError::bug(
                        self.name(),
                        "ScopeSelect",
                        format!("{:?} scope at position {} of {}", kind, index, count),
                    ))
                }
            }
        }

        let root = root.ok_or_else(|| {
            LoweringError::bug(self.name(), "QueryTree", "query has no RETURN scope")
        })?;
        log::debug!(
            "{}: built {} nested scopes under RETURN",
            self.name(),
            subqueries.len()
        );
        Ok(QueryTree { subqueries, root })
    }
}
