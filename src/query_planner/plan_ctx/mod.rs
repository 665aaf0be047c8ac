//! Lowering context.
//!
//! [`LoweringCtx`] is created once per lowered query (or expanded variant)
//! and threaded through every pass. It owns:
//! - the [`VarTable`] of all variables and their dependencies
//! - the [`NamingContext`] handing out unique names
//! - the per-scope models collected from the AST, consumed by the tree builder
//! - the graph topology the table passes look labels up in
//!
//! # Scopes
//!
//! Every WITH closes a scope:
//! ```text
//! MATCH (a) WITH a MATCH (a)-->(b) RETURN b
//! └─ scope 0 ──────┘└─ scope 1 ────────────┘
//! ```

use crate::{
    graph_catalog::graph_topology::GraphTopologyLookup,
    query_planner::{
        logical_expr::LogicalExpr,
        logical_plan::{ReadingClause, ReturnItem, ScopeKind, SortItem},
        typed_variable::{NamingContext, VarTable},
    },
};

/// What the variable model recorded for one WITH/RETURN boundary.
#[derive(Debug, Clone)]
pub struct ScopeModel {
    pub kind: ScopeKind,
    pub reading_clauses: Vec<ReadingClause>,
    pub items: Vec<ReturnItem>,
    pub distinct: bool,
    pub order_by: Vec<SortItem>,
    pub skip: Option<LogicalExpr>,
    pub limit: Option<LogicalExpr>,
    /// WHERE of the WITH that opened this scope.
    pub filter: Option<LogicalExpr>,
}

pub struct LoweringCtx<'g> {
    pub vars: VarTable,
    pub naming: NamingContext,
    pub scopes: Vec<ScopeModel>,
    gtop: &'g dyn GraphTopologyLookup,
}

impl<'g> LoweringCtx<'g> {
    pub fn new(gtop: &'g dyn GraphTopologyLookup) -> Self {
        LoweringCtx {
            vars: VarTable::default(),
            naming: NamingContext::default(),
            scopes: Vec::new(),
            gtop,
        }
    }

    pub fn gtop(&self) -> &'g dyn GraphTopologyLookup {
        self.gtop
    }
}

impl std::fmt::Debug for LoweringCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoweringCtx")
            .field("vars", &self.vars)
            .field("naming", &self.naming)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
