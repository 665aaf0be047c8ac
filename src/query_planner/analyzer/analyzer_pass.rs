use crate::query_planner::{
    errors::{LoweringResult, Pass},
    logical_plan::QueryTree,
    plan_ctx::LoweringCtx,
};

/// One step of the lowering pipeline. Takes the tree by value and hands
/// back the rewritten tree; the variable table travels in `ctx`.
pub trait LoweringPass {
    fn name(&self) -> Pass;

    fn run(&self, tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree>;
}
