//! Cypher to relational lowering.
//!
//! [`lower_query`] takes one parsed query through the variable model and
//! the analyzer passes and returns the finished [`LoweredQuery`]. The
//! [`expansion_merger`] combines several lowered variants of one source
//! query into a single UNION.

use crate::{
    graph_catalog::graph_topology::GraphTopologyLookup,
    open_cypher_parser::ast::CypherQuery,
    query_planner::{
        errors::{LoweringError, LoweringResult, Pass},
        logical_plan::{LoweredQuery, QueryTree},
        plan_ctx::LoweringCtx,
    },
};

pub mod analyzer;
pub mod errors;
pub mod expansion_merger;
pub mod logical_expr;
pub mod logical_plan;
pub mod plan_ctx;
pub mod typed_variable;

pub fn lower_query(
    query: &CypherQuery<'_>,
    gtop: &dyn GraphTopologyLookup,
) -> LoweringResult<LoweredQuery> {
    let mut ctx = LoweringCtx::new(gtop);
    analyzer::var_dependencies::collect(query, &mut ctx)?;

    let mut tree = QueryTree::default();
    for pass in analyzer::pipeline() {
        log::debug!("running {}", pass.name());
        tree = pass.run(tree, &mut ctx)?;
    }

    tree.check_invariants(true).map_err(|message| {
        LoweringError::bug(Pass::PopulateJoins, "QueryTree", message)
    })?;
    log::debug!(
        "lowered {} scopes over {} variables",
        tree.subqueries.len() + 1,
        ctx.vars.len()
    );

    Ok(LoweredQuery {
        tree,
        vars: ctx.vars,
    })
}
