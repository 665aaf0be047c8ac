//! Subquery namer: gives every WithSelect its `with_<n>` name, innermost
//! first. Names are assigned once; finding one already set is a bug.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult, Pass},
    logical_plan::QueryTree,
    plan_ctx::LoweringCtx,
};

use super::analyzer_pass::LoweringPass;

pub struct NameSubqueries;

impl LoweringPass for NameSubqueries {
    fn name(&self) -> Pass {
        Pass::NameSubqueries
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        for with in &mut tree.subqueries {
            if let Some(name) = &with.subquery_name {
                return Err(LoweringError::bug(
                    self.name(),
                    "WithSelect",
                    format!("scope {} is already named `{}`", with.scope.scope_index, name),
                ));
            }
            let name = ctx.naming.fresh_subquery_name();
            log::trace!("{}: scope {} is `{}`", self.name(), with.scope.scope_index, name);
            with.subquery_name = Some(name);
        }
        Ok(tree)
    }
}
