//! Relational query tree produced by lowering.
//!
//! One [`ScopeSelect`] per WITH/RETURN boundary. Every scope but the last is
//! wrapped in a [`WithSelect`] and stored in [`QueryTree::subqueries`]; the
//! enclosing scope refers to it by [`SubqueryId`] from a [`FromItem`].
//! Subquery `i` is the scope with index `i`, so the arena is ordered from the
//! innermost scope outward.

use std::fmt;

use crate::query_planner::logical_expr::LogicalExpr;
use crate::query_planner::typed_variable::{VarId, VarTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubqueryId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    With,
    Return,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnItem {
    /// `expr AS name`; the expression lives on the alias variable.
    Aliased { alias: VarId },
    /// Column named after the source text, held by a temp variable.
    Unaliased { expr: LogicalExpr, column: VarId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortItem {
    Asc(LogicalExpr),
    Desc(LogicalExpr),
}

impl SortItem {
    pub fn expr(&self) -> &LogicalExpr {
        match self {
            SortItem::Asc(expr) | SortItem::Desc(expr) => expr,
        }
    }

    pub fn expr_mut(&mut self) -> &mut LogicalExpr {
        match self {
            SortItem::Asc(expr) | SortItem::Desc(expr) => expr,
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortItem::Desc(_))
    }
}

/// One MATCH or OPTIONAL MATCH of a scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadingClause {
    pub optional: bool,
    /// Node and relationship variables this clause declares, in pattern order.
    pub variables: Vec<VarId>,
    pub relationships: Vec<VarId>,
    pub where_clause: Option<LogicalExpr>,
}

/// Source of data for variables: a table (exactly one variable) or a nested
/// subquery (at least one variable).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FromItem {
    pub source: Option<SubqueryId>,
    pub source_table_name: Option<String>,
    pub variables: Vec<VarId>,
    /// Reading clause that declared the variable of a table item.
    pub clause: Option<usize>,
    pub optional: bool,
    /// Restrictions that must go into this item's join condition.
    pub pending_conditions: Vec<LogicalExpr>,
}

impl FromItem {
    pub fn table_item(var: VarId, clause: usize, optional: bool) -> Self {
        FromItem {
            variables: vec![var],
            clause: Some(clause),
            optional,
            ..Default::default()
        }
    }

    pub fn subquery_item(source: SubqueryId, variables: Vec<VarId>) -> Self {
        FromItem {
            source: Some(source),
            variables,
            ..Default::default()
        }
    }

    pub fn supplies(&self, var: &VarId) -> bool {
        self.variables.contains(var)
    }

    /// Variable of a table item.
    pub fn table_var(&self) -> Option<&VarId> {
        match (self.source, self.variables.as_slice()) {
            (None, [var]) => Some(var),
            _ => None,
        }
    }

    /// `Err` names the broken half of the FromItem invariant. Table names are
    /// only required once `require_table` is set (after table resolution).
    pub fn check_invariant(&self, require_table: bool) -> Result<(), String> {
        match (&self.source, &self.source_table_name) {
            (Some(_), None) if !self.variables.is_empty() => Ok(()),
            (Some(source), None) => Err(format!("subquery item over {:?} has no variables", source)),
            (Some(_), Some(table)) => Err(format!(
                "item has both a subquery and the table `{}`",
                table
            )),
            (None, table) if self.variables.len() != 1 => Err(format!(
                "table item {:?} must supply exactly one variable, found {}",
                table,
                self.variables.len()
            )),
            (None, None) if require_table => Err(format!(
                "no table was resolved for `{}`",
                self.variables[0]
            )),
            (None, _) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub joining_item: FromItem,
    pub condition: LogicalExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BaseJoin {
    InnerJoin(Join),
    LeftJoin(Join),
}

impl BaseJoin {
    pub fn join(&self) -> &Join {
        match self {
            BaseJoin::InnerJoin(join) | BaseJoin::LeftJoin(join) => join,
        }
    }

    pub fn join_mut(&mut self) -> &mut Join {
        match self {
            BaseJoin::InnerJoin(join) | BaseJoin::LeftJoin(join) => join,
        }
    }

    pub fn is_left_join(&self) -> bool {
        matches!(self, BaseJoin::LeftJoin(_))
    }
}

/// One SQL SELECT.
///
/// Before `PopulateJoins` every item sits in `from_items`; afterwards
/// `from_items` holds the FROM list (first item plus cross-joined ones) and
/// `joins` the JOINs in placement order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleSelect {
    pub from_items: Vec<FromItem>,
    pub joins: Vec<BaseJoin>,
    /// Conjuncts of the WHERE clause.
    pub where_clause: Vec<LogicalExpr>,
}

impl SimpleSelect {
    pub fn items(&self) -> impl Iterator<Item = &FromItem> {
        self.from_items
            .iter()
            .chain(self.joins.iter().map(|join| &join.join().joining_item))
    }

    /// Item supplying `var` in this select.
    pub fn supplier(&self, var: &VarId) -> Option<&FromItem> {
        self.items().find(|item| item.supplies(var))
    }
}

/// A WITH or RETURN boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSelect {
    pub kind: ScopeKind,
    pub scope_index: usize,
    /// Scope this one reads from (the previous WITH).
    pub inner: Option<SubqueryId>,
    pub reading_clauses: Vec<ReadingClause>,
    pub select: SimpleSelect,
    pub distinct: bool,
    pub items: Vec<ReturnItem>,
    pub order_by: Vec<SortItem>,
    pub skip: Option<LogicalExpr>,
    pub limit: Option<LogicalExpr>,
}

impl ScopeSelect {
    pub fn new(kind: ScopeKind, scope_index: usize) -> Self {
        ScopeSelect {
            kind,
            scope_index,
            inner: None,
            reading_clauses: Vec::new(),
            select: SimpleSelect::default(),
            distinct: false,
            items: Vec::new(),
            order_by: Vec::new(),
            skip: None,
            limit: None,
        }
    }

    /// Every expression stored in this scope (not counting alias definitions,
    /// which live in the variable table).
    pub fn expressions_mut(&mut self) -> Vec<&mut LogicalExpr> {
        let mut exprs: Vec<&mut LogicalExpr> = Vec::new();
        for item in &mut self.items {
            if let ReturnItem::Unaliased { expr, .. } = item {
                exprs.push(expr);
            }
        }
        exprs.extend(self.order_by.iter_mut().map(SortItem::expr_mut));
        exprs.extend(self.skip.iter_mut());
        exprs.extend(self.limit.iter_mut());
        exprs.extend(self.select.where_clause.iter_mut());
        for clause in &mut self.reading_clauses {
            exprs.extend(clause.where_clause.iter_mut());
        }
        for item in &mut self.select.from_items {
            exprs.extend(item.pending_conditions.iter_mut());
        }
        for join in &mut self.select.joins {
            let join = join.join_mut();
            exprs.push(&mut join.condition);
            exprs.extend(join.joining_item.pending_conditions.iter_mut());
        }
        exprs
    }

    pub fn expressions(&self) -> Vec<&LogicalExpr> {
        let mut exprs: Vec<&LogicalExpr> = Vec::new();
        for item in &self.items {
            if let ReturnItem::Unaliased { expr, .. } = item {
                exprs.push(expr);
            }
        }
        exprs.extend(self.order_by.iter().map(SortItem::expr));
        exprs.extend(self.skip.iter());
        exprs.extend(self.limit.iter());
        exprs.extend(self.select.where_clause.iter());
        for clause in &self.reading_clauses {
            exprs.extend(clause.where_clause.iter());
        }
        for item in self.select.items() {
            exprs.extend(item.pending_conditions.iter());
        }
        for join in &self.select.joins {
            exprs.push(&join.join().condition);
        }
        exprs
    }

    /// Alias variables declared by this scope's projection.
    pub fn declared_aliases(&self) -> impl Iterator<Item = &VarId> {
        self.items.iter().filter_map(|item| match item {
            ReturnItem::Aliased { alias } => Some(alias),
            ReturnItem::Unaliased { .. } => None,
        })
    }
}

/// Column set a WITH scope exposes to the scope reading from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Export {
    /// Node or relationship: its key plus every required property.
    Entity(VarId),
    Scalar(VarId),
}

impl Export {
    pub fn var(&self) -> &VarId {
        match self {
            Export::Entity(var) | Export::Scalar(var) => var,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithSelect {
    /// Assigned once by `NameSubqueries`.
    pub subquery_name: Option<String>,
    pub scope: ScopeSelect,
    /// Filled by `ComputeExports`.
    pub exports: Vec<Export>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTree {
    pub subqueries: Vec<WithSelect>,
    pub root: ScopeSelect,
}

impl Default for QueryTree {
    fn default() -> Self {
        QueryTree {
            subqueries: Vec::new(),
            root: ScopeSelect::new(ScopeKind::Return, 0),
        }
    }
}

impl QueryTree {
    pub fn subquery(&self, id: SubqueryId) -> Option<&WithSelect> {
        self.subqueries.get(id.0)
    }

    /// Scopes from the innermost outward, root last.
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeSelect> {
        self.subqueries
            .iter()
            .map(|with| &with.scope)
            .chain(std::iter::once(&self.root))
    }

    pub fn scopes_mut(&mut self) -> impl Iterator<Item = &mut ScopeSelect> {
        self.subqueries
            .iter_mut()
            .map(|with| &mut with.scope)
            .chain(std::iter::once(&mut self.root))
    }

    pub fn scope(&self, index: usize) -> Option<&ScopeSelect> {
        self.scopes().nth(index)
    }

    /// Checks the FromItem and join invariants over the whole tree.
    pub fn check_invariants(&self, require_tables: bool) -> Result<(), String> {
        for scope in self.scopes() {
            for item in scope.select.items() {
                item.check_invariant(require_tables)?;
                if let Some(source) = item.source {
                    if self.subquery(source).is_none() {
                        return Err(format!("item refers to missing subquery {:?}", source));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A lowered variant together with the variables its tree refers to.
#[derive(Debug, Clone)]
pub struct LoweredQuery {
    pub tree: QueryTree,
    pub vars: VarTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAggregate {
    Sum,
    Min,
    Max,
}

impl fmt::Display for MergeAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeAggregate::Sum => write!(f, "SUM"),
            MergeAggregate::Min => write!(f, "MIN"),
            MergeAggregate::Max => write!(f, "MAX"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedColumn {
    pub name: String,
    /// How the outer query combines per-branch values; `None` groups by it.
    pub merge: Option<MergeAggregate>,
}

/// UNION of the RETURN scopes of several variants.
#[derive(Debug, Clone)]
pub struct UnionQuery {
    pub branches: Vec<LoweredQuery>,
    /// UNION ALL rather than UNION
    pub all: bool,
    pub columns: Vec<MergedColumn>,
    /// Wrap the union and re-aggregate per `columns`.
    pub reaggregate: bool,
    /// Output column name and descending flag.
    pub order_by: Vec<(String, bool)>,
    pub skip: Option<LogicalExpr>,
    pub limit: Option<LogicalExpr>,
}

#[derive(Debug, Clone)]
pub enum MergedQuery {
    Single(LoweredQuery),
    Union(UnionQuery),
}
