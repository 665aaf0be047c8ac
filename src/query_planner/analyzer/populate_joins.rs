//! Join populator.
//!
//! Splits each select's FROM items into the FROM list and a sequence of
//! joins. Required items come first: the first one is the FROM, every item
//! connected to what is already placed through a relationship becomes an
//! INNER JOIN, and a disconnected item is another FROM entry (a cross
//! join). The items of each OPTIONAL MATCH follow as LEFT JOINs.
//!
//! Join conditions equate the relationship table's endpoint columns with
//! the endpoint nodes' keys. Each condition is emitted once, with whichever
//! of the relationship and the node is placed later.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    graph_catalog::graph_topology::{Orientation, RelationshipBinding},
    query_planner::{
        errors::{LoweringError, LoweringResult, Pass},
        logical_expr::{conjunction, disjunction, Literal, LogicalExpr, Operator},
        logical_plan::{BaseJoin, FromItem, Join, QueryTree, SimpleSelect},
        plan_ctx::LoweringCtx,
        typed_variable::{VarId, VarKind, VarTable},
    },
};

use super::analyzer_pass::LoweringPass;

const PASS: Pass = Pass::PopulateJoins;

pub struct PopulateJoins;

impl LoweringPass for PopulateJoins {
    fn name(&self) -> Pass {
        PASS
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        for scope in tree.scopes_mut() {
            if !scope.select.joins.is_empty() {
                return Err(LoweringError::bug(
                    PASS,
                    "SimpleSelect",
                    format!("scope {} already has joins", scope.scope_index),
                ));
            }
            resolve_ambiguous_nodes(&mut scope.select, ctx)?;

            let items = std::mem::take(&mut scope.select.from_items);
            let mut layout = JoinLayout::new(&ctx.vars, &items)?;

            let (required, optional): (Vec<FromItem>, Vec<FromItem>) =
                items.into_iter().partition(|item| !item.optional);
            layout.place_required(required)?;

            let mut optional_clauses: BTreeMap<usize, Vec<FromItem>> = BTreeMap::new();
            for item in optional {
                optional_clauses
                    .entry(item.clause.unwrap_or_default())
                    .or_default()
                    .push(item);
            }
            for (clause, items) in optional_clauses {
                log::trace!("{}: LEFT JOINs for optional clause {}", PASS, clause);
                layout.place_optional(items)?;
            }

            let (from_items, joins) = layout.finish();
            scope.select.from_items = from_items;
            scope.select.joins = joins;

            for item in scope.select.items() {
                item.check_invariant(true)
                    .map_err(|message| LoweringError::bug(PASS, "FromItem", message))?;
            }
            log::debug!(
                "{}: scope {} has {} FROM items and {} joins",
                PASS,
                scope.scope_index,
                scope.select.from_items.len(),
                scope.select.joins.len()
            );
        }
        Ok(tree)
    }
}

/// Narrows unlabeled nodes through the endpoint labels of the relationships
/// they are attached to in the same select.
fn resolve_ambiguous_nodes(select: &mut SimpleSelect, ctx: &mut LoweringCtx<'_>) -> LoweringResult<()> {
    let gtop = ctx.gtop();
    let rels: Vec<VarId> = select
        .from_items
        .iter()
        .filter_map(FromItem::table_var)
        .filter(|var| matches!(ctx.vars.get(var).map(|v| &v.kind), Some(VarKind::Rel(_))))
        .cloned()
        .collect();

    for item in select.from_items.iter_mut() {
        if item.source_table_name.is_some() {
            continue;
        }
        let Some(node_id) = item.table_var().cloned() else {
            continue;
        };
        let Some(VarKind::Node(node)) = ctx.vars.get(&node_id).map(|v| &v.kind) else {
            continue;
        };

        let mut labels = node.labels.clone();
        for rel_id in &rels {
            let Some(VarKind::Rel(rel)) = ctx.vars.get(rel_id).map(|v| &v.kind) else {
                continue;
            };
            let Some(binding) = &rel.binding else {
                continue;
            };
            let (left_label, right_label) = binding.endpoint_labels();
            if ctx.vars.resolve_alias_var(&rel.relationship.left) == &node_id {
                labels.extend(left_label.map(str::to_string));
            }
            if ctx.vars.resolve_alias_var(&rel.relationship.right) == &node_id {
                labels.extend(right_label.map(str::to_string));
            }
        }

        let name = ctx
            .vars
            .get(&node_id)
            .map_or_else(|| node_id.to_string(), |v| v.name.clone());
        let binding = gtop
            .lookup_table_for_labels(&labels)
            .map_err(|source| LoweringError::Lookup {
                pass: PASS,
                hint: format!(
                    "({}:{})",
                    name,
                    crate::graph_catalog::errors::display_labels(&labels)
                ),
                source,
            })?;

        log::trace!("{}: `{}` narrowed to {}", PASS, node_id, binding.table);
        item.source_table_name = Some(binding.table.clone());
        if let Some(VarKind::Node(node)) = ctx.vars.get_mut(&node_id).map(|v| &mut v.kind) {
            node.labels = labels;
            node.binding = Some(binding);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

struct RelEdge<'v> {
    rel: VarId,
    left: VarId,
    right: VarId,
    binding: &'v RelationshipBinding,
}

impl RelEdge<'_> {
    fn endpoint(&self, side: Side) -> &VarId {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Column of the relationship table holding the endpoint on `side`,
    /// for fixed orientations.
    fn column(&self, side: Side) -> Option<&str> {
        match (self.binding.orientation, side) {
            (Orientation::Forward, Side::Left) | (Orientation::Reversed, Side::Right) => {
                Some(self.binding.from_column.as_str())
            }
            (Orientation::Forward, Side::Right) | (Orientation::Reversed, Side::Left) => {
                Some(self.binding.to_column.as_str())
            }
            (Orientation::Either, _) => None,
        }
    }

    fn rel_column(&self, column: &str) -> LogicalExpr {
        LogicalExpr::column(self.rel.clone(), column)
    }

    fn key_of(node: &VarId) -> LogicalExpr {
        LogicalExpr::Variable(node.clone())
    }

    /// `(from = left AND to = right) OR (to = left AND from = right)`
    fn either_both(&self) -> LogicalExpr {
        let from = &self.binding.from_column;
        let to = &self.binding.to_column;
        let forward = LogicalExpr::binary(
            Operator::And,
            LogicalExpr::equals(self.rel_column(from), Self::key_of(&self.left)),
            LogicalExpr::equals(self.rel_column(to), Self::key_of(&self.right)),
        );
        let reversed = LogicalExpr::binary(
            Operator::And,
            LogicalExpr::equals(self.rel_column(to), Self::key_of(&self.left)),
            LogicalExpr::equals(self.rel_column(from), Self::key_of(&self.right)),
        );
        disjunction(forward, reversed)
    }

    /// `from = node OR to = node`
    fn either_one(&self, node: &VarId) -> LogicalExpr {
        disjunction(
            LogicalExpr::equals(self.rel_column(&self.binding.from_column), Self::key_of(node)),
            LogicalExpr::equals(self.rel_column(&self.binding.to_column), Self::key_of(node)),
        )
    }
}

struct JoinLayout<'v> {
    vars: &'v VarTable,
    edges: Vec<RelEdge<'v>>,
    placed: BTreeSet<VarId>,
    from_items: Vec<FromItem>,
    joins: Vec<BaseJoin>,
}

impl<'v> JoinLayout<'v> {
    fn new(vars: &'v VarTable, items: &[FromItem]) -> LoweringResult<Self> {
        let mut edges = Vec::new();
        for item in items {
            let Some(var) = item.table_var() else {
                continue;
            };
            if let Some(VarKind::Rel(rel)) = vars.get(var).map(|v| &v.kind) {
                let binding = rel.binding.as_ref().ok_or_else(|| {
                    LoweringError::bug(
                        PASS,
                        "RelVar",
                        format!("`{}` reached join population without a table", var),
                    )
                })?;
                edges.push(RelEdge {
                    rel: var.clone(),
                    left: vars.resolve_alias_var(&rel.relationship.left).clone(),
                    right: vars.resolve_alias_var(&rel.relationship.right).clone(),
                    binding,
                });
            }
        }
        Ok(JoinLayout {
            vars,
            edges,
            placed: BTreeSet::new(),
            from_items: Vec::new(),
            joins: Vec::new(),
        })
    }

    fn is_empty(&self) -> bool {
        self.from_items.is_empty() && self.joins.is_empty()
    }

    /// Endpoint conditions that become evaluable once `item` is placed.
    fn edge_conditions(&self, item: &FromItem) -> Vec<LogicalExpr> {
        let new: BTreeSet<&VarId> = item.variables.iter().collect();
        let now = |var: &VarId| self.placed.contains(var) || new.contains(var);
        let mut conditions = Vec::new();

        for edge in &self.edges {
            if !now(&edge.rel) {
                continue;
            }
            let rel_is_new = new.contains(&edge.rel);
            match edge.binding.orientation {
                Orientation::Forward | Orientation::Reversed => {
                    for side in [Side::Left, Side::Right] {
                        let node = edge.endpoint(side);
                        if now(node) && (rel_is_new || new.contains(node)) {
                            if let Some(column) = edge.column(side) {
                                conditions.push(LogicalExpr::equals(
                                    edge.rel_column(column),
                                    RelEdge::key_of(node),
                                ));
                            }
                        }
                    }
                }
                Orientation::Either => {
                    let left_now = now(&edge.left);
                    let right_now = now(&edge.right);
                    let touches = rel_is_new || new.contains(&edge.left) || new.contains(&edge.right);
                    if !touches {
                        continue;
                    }
                    match (left_now, right_now) {
                        (true, true) => conditions.push(edge.either_both()),
                        (true, false) => conditions.push(edge.either_one(&edge.left)),
                        (false, true) => conditions.push(edge.either_one(&edge.right)),
                        (false, false) => {}
                    }
                }
            }
        }
        conditions
    }

    fn is_connected(&self, item: &FromItem) -> bool {
        !self.edge_conditions(item).is_empty()
    }

    /// A condition can go into a join once no variable it mentions belongs
    /// to an item still waiting in `waiting`.
    fn is_evaluable(&self, condition: &LogicalExpr, waiting: &BTreeSet<VarId>) -> bool {
        condition.variables().iter().all(|var| {
            let resolved = self.vars.resolve_alias_var(var);
            !waiting.contains(resolved) || self.placed.contains(resolved)
        })
    }

    fn mark_placed(&mut self, item: &FromItem) {
        self.placed.extend(item.variables.iter().cloned());
    }

    fn take_next(&self, pending: &mut Vec<FromItem>) -> FromItem {
        let index = pending
            .iter()
            .position(|item| self.is_connected(item))
            .unwrap_or(0);
        pending.remove(index)
    }

    fn place_required(&mut self, mut pending: Vec<FromItem>) -> LoweringResult<()> {
        while !pending.is_empty() {
            let item = if self.is_empty() {
                pending.remove(0)
            } else {
                self.take_next(&mut pending)
            };
            if !item.pending_conditions.is_empty() {
                return Err(LoweringError::bug(
                    PASS,
                    "FromItem",
                    "required item carries join conditions",
                ));
            }

            let conditions = self.edge_conditions(&item);
            self.mark_placed(&item);
            match conjunction(conditions) {
                Some(condition) if !self.from_items.is_empty() => {
                    self.joins.push(BaseJoin::InnerJoin(Join {
                        joining_item: item,
                        condition,
                    }));
                }
                _ => {
                    if !self.from_items.is_empty() {
                        log::trace!("{}: {:?} is not connected, cross joining", PASS, item.variables);
                    }
                    self.from_items.push(item);
                }
            }
        }
        Ok(())
    }

    fn place_optional(&mut self, mut pending: Vec<FromItem>) -> LoweringResult<()> {
        if self.is_empty() {
            return Err(LoweringError::unsupported(
                PASS,
                "OPTIONAL MATCH with no MATCH before it",
            ));
        }

        let mut waiting: BTreeSet<VarId> = pending
            .iter()
            .flat_map(|item| item.variables.iter().cloned())
            .collect();
        let mut conditions: Vec<LogicalExpr> = pending
            .iter_mut()
            .flat_map(|item| std::mem::take(&mut item.pending_conditions))
            .collect();

        while !pending.is_empty() {
            let item = self.take_next(&mut pending);
            let mut join_conditions = self.edge_conditions(&item);
            self.mark_placed(&item);
            for var in &item.variables {
                waiting.remove(var);
            }

            let (ready, rest): (Vec<LogicalExpr>, Vec<LogicalExpr>) = conditions
                .into_iter()
                .partition(|condition| self.is_evaluable(condition, &waiting));
            join_conditions.extend(ready);
            conditions = rest;
            if pending.is_empty() {
                join_conditions.append(&mut conditions);
            }

            let condition =
                conjunction(join_conditions).unwrap_or(LogicalExpr::Literal(Literal::Boolean(true)));
            self.joins.push(BaseJoin::LeftJoin(Join {
                joining_item: item,
                condition,
            }));
        }
        Ok(())
    }

    fn finish(self) -> (Vec<FromItem>, Vec<BaseJoin>) {
        (self.from_items, self.joins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::social_topology;
    use crate::open_cypher_parser::parse_query;
    use crate::query_planner::analyzer::{
        compute_from_items::ComputeFromItems, expand_with_gtop::ExpandNodeVarWithGtop,
        move_restrictions::MoveRestrictionInPattern, name_subqueries::NameSubqueries,
        select_tree_builder::SelectTreeBuilder, type_inference::ComputeAliasVarType,
        var_dependencies,
    };

    fn joined(query: &str) -> LoweringResult<QueryTree> {
        let gtop = social_topology();
        let mut ctx = LoweringCtx::new(&gtop);
        let ast = parse_query(query).unwrap();
        var_dependencies::collect(&ast, &mut ctx)?;
        let passes: Vec<Box<dyn LoweringPass>> = vec![
            Box::new(ComputeAliasVarType),
            Box::new(SelectTreeBuilder),
            Box::new(NameSubqueries),
            Box::new(ComputeFromItems),
            Box::new(MoveRestrictionInPattern),
            Box::new(ExpandNodeVarWithGtop),
            Box::new(PopulateJoins),
        ];
        let mut tree = QueryTree::default();
        for pass in passes {
            tree = pass.run(tree, &mut ctx)?;
        }
        Ok(tree)
    }

    #[test]
    fn test_chain_becomes_inner_joins() {
        let tree = joined("MATCH (a:Person)-[r:KNOWS]->(b:Person) RETURN b").unwrap();
        let select = &tree.root.select;
        assert_eq!(select.from_items.len(), 1);
        assert_eq!(select.joins.len(), 2);
        assert!(select.joins.iter().all(|join| !join.is_left_join()));
        assert!(tree.check_invariants(true).is_ok());
    }

    #[test]
    fn test_optional_match_becomes_left_joins() {
        let tree = joined(
            "MATCH (a:Person) OPTIONAL MATCH (a)-[:LIVES_IN]->(c:City) WHERE c.name = 'x' RETURN c",
        )
        .unwrap();
        let joins = &tree.root.select.joins;
        assert_eq!(joins.len(), 2);
        assert!(joins.iter().all(BaseJoin::is_left_join));
        // the clause's WHERE only becomes evaluable with the city
        let last = &joins[1].join();
        assert_eq!(last.joining_item.table_var(), Some(&VarId::from("c")));
        assert_eq!(last.condition.clone().into_conjuncts().len(), 2);
        assert!(tree.root.select.where_clause.is_empty());
    }

    #[test]
    fn test_disconnected_items_are_cross_joined() {
        let tree = joined("MATCH (a:Person), (c:City) RETURN a, c").unwrap();
        assert_eq!(tree.root.select.from_items.len(), 2);
        assert!(tree.root.select.joins.is_empty());
    }

    #[test]
    fn test_unlabeled_nodes_are_narrowed_by_relationships() {
        let tree = joined("MATCH (a)-[:LIVES_IN]->(c) RETURN c").unwrap();
        let tables: Vec<&str> = tree
            .root
            .select
            .items()
            .filter_map(|item| item.source_table_name.as_deref())
            .collect();
        assert_eq!(tables, vec!["persons", "lives_in", "cities"]);
    }

    #[test]
    fn test_optional_match_first_is_unsupported() {
        let err = joined("OPTIONAL MATCH (a:Person) RETURN a").unwrap_err();
        assert_eq!(
            err.category(),
            crate::query_planner::errors::ErrorCategory::UnsupportedFeature
        );
    }
}
