//! Table-name resolver.
//!
//! Looks every table item up in the graph topology: nodes by label set,
//! relationships by type list plus the labels of both endpoints. Unlabeled
//! nodes that match several tables are left for the join populator, which
//! can narrow them through the relationships they take part in.

use std::collections::BTreeSet;

use crate::{
    graph_catalog::{
        errors::{display_labels, GraphTopologyError},
        graph_topology::{GraphTopologyLookup, RelationshipBinding, TableBinding},
    },
    query_planner::{
        errors::{LoweringError, LoweringResult, Pass},
        logical_plan::QueryTree,
        plan_ctx::LoweringCtx,
        typed_variable::{VarId, VarKind, VarTable},
    },
};

use super::analyzer_pass::LoweringPass;

pub struct ExpandNodeVarWithGtop;

enum Resolution {
    Node(TableBinding),
    Rel(RelationshipBinding),
    Deferred,
}

impl LoweringPass for ExpandNodeVarWithGtop {
    fn name(&self) -> Pass {
        Pass::ExpandNodeVarWithGtop
    }

    fn run(&self, mut tree: QueryTree, ctx: &mut LoweringCtx<'_>) -> LoweringResult<QueryTree> {
        let gtop = ctx.gtop();
        for scope in tree.scopes_mut() {
            for item in scope.select.from_items.iter_mut() {
                if item.source_table_name.is_some() {
                    continue;
                }
                let Some(var) = item.table_var().cloned() else {
                    continue;
                };

                match resolve_table(&ctx.vars, gtop, &var)? {
                    Resolution::Node(binding) => {
                        log::trace!("{}: `{}` -> {}", self.name(), var, binding.table);
                        item.source_table_name = Some(binding.table.clone());
                        if let Some(VarKind::Node(node)) = ctx.vars.get_mut(&var).map(|v| &mut v.kind)
                        {
                            node.binding = Some(binding);
                        }
                    }
                    Resolution::Rel(binding) => {
                        log::trace!(
                            "{}: `{}` -> {} ({:?})",
                            self.name(),
                            var,
                            binding.table,
                            binding.orientation
                        );
                        item.source_table_name = Some(binding.table.clone());
                        if let Some(VarKind::Rel(rel)) = ctx.vars.get_mut(&var).map(|v| &mut v.kind) {
                            rel.binding = Some(binding);
                        }
                    }
                    Resolution::Deferred => {
                        log::debug!(
                            "{}: `{}` matches several tables, deferring to join population",
                            self.name(),
                            var
                        );
                    }
                }
            }
        }
        Ok(tree)
    }
}

/// Labels of the node an endpoint resolves to.
pub(super) fn endpoint_labels(vars: &VarTable, endpoint: &VarId) -> BTreeSet<String> {
    match vars.get(vars.resolve_alias_var(endpoint)).map(|v| &v.kind) {
        Some(VarKind::Node(node)) => node.labels.clone(),
        _ => BTreeSet::new(),
    }
}

fn resolve_table(
    vars: &VarTable,
    gtop: &dyn GraphTopologyLookup,
    id: &VarId,
) -> LoweringResult<Resolution> {
    let pass = Pass::ExpandNodeVarWithGtop;
    let var = vars.get(id).ok_or_else(|| {
        LoweringError::bug(pass, "FromItem", format!("`{}` is not declared", id))
    })?;

    match &var.kind {
        VarKind::Node(node) => match gtop.lookup_table_for_labels(&node.labels) {
            Ok(binding) => Ok(Resolution::Node(binding)),
            Err(GraphTopologyError::AmbiguousNodeLabels { .. }) => Ok(Resolution::Deferred),
            Err(source) => Err(LoweringError::Lookup {
                pass,
                hint: format!("({}:{})", var.name, display_labels(&node.labels)),
                source,
            }),
        },
        VarKind::Rel(rel) => {
            let relationship = &rel.relationship;
            let left = endpoint_labels(vars, &relationship.left);
            let right = endpoint_labels(vars, &relationship.right);
            match gtop.lookup_relationship_mapping(
                &relationship.types,
                &left,
                &right,
                relationship.direction,
            ) {
                Ok(binding) => Ok(Resolution::Rel(binding)),
                Err(GraphTopologyError::AmbiguousRelationship { .. })
                    if relationship.types.len() > 1 =>
                {
                    Err(LoweringError::unsupported(
                        pass,
                        format!(
                            "relationship types {} of `{}` map to different tables",
                            relationship.types.join("|"),
                            var.name
                        ),
                    ))
                }
                Err(source) => Err(LoweringError::Lookup {
                    pass,
                    hint: format!("[{}:{}]", var.name, relationship.types.join("|")),
                    source,
                }),
            }
        }
        other => Err(LoweringError::bug(
            pass,
            "FromItem",
            format!("table item over {} `{}`", other.kind_name(), id),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::MockTopology;
    use crate::query_planner::{
        logical_plan::{FromItem, ScopeKind, ScopeSelect},
        typed_variable::{NodeVar, Variable},
    };

    fn single_node_tree(ctx: &mut LoweringCtx<'_>, labels: &[&str]) -> QueryTree {
        ctx.vars.insert(Variable {
            name: "a".to_string(),
            unique_name: VarId::from("a"),
            scope: 0,
            kind: VarKind::Node(NodeVar {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                restriction: None,
                properties_required: Default::default(),
                binding: None,
            }),
        });
        let mut root = ScopeSelect::new(ScopeKind::Return, 0);
        root.select
            .from_items
            .push(FromItem::table_item(VarId::from("a"), 0, false));
        QueryTree {
            subqueries: vec![],
            root,
        }
    }

    #[test]
    fn test_unknown_label_is_a_user_error() {
        let mut gtop = MockTopology::new();
        gtop.expect_lookup_table_for_labels()
            .returning(|labels| {
                Err(GraphTopologyError::NodeLabels {
                    labels: display_labels(labels),
                })
            });
        let mut ctx = LoweringCtx::new(&gtop);
        let tree = single_node_tree(&mut ctx, &["Person"]);

        let err = ExpandNodeVarWithGtop.run(tree, &mut ctx).unwrap_err();
        assert_eq!(
            err.category(),
            crate::query_planner::errors::ErrorCategory::UserQuery
        );
        assert!(err.to_string().contains("Person"));
    }

    #[test]
    fn test_ambiguous_node_is_deferred() {
        let mut gtop = MockTopology::new();
        gtop.expect_lookup_table_for_labels().times(1).returning(|labels| {
            Err(GraphTopologyError::AmbiguousNodeLabels {
                labels: display_labels(labels),
                candidates: "persons, cities".to_string(),
            })
        });
        let mut ctx = LoweringCtx::new(&gtop);
        let tree = single_node_tree(&mut ctx, &[]);

        let tree = ExpandNodeVarWithGtop.run(tree, &mut ctx).unwrap();
        assert_eq!(tree.root.select.from_items[0].source_table_name, None);
    }

    #[test]
    fn test_resolved_node_gets_table_and_binding() {
        let mut gtop = MockTopology::new();
        gtop.expect_lookup_table_for_labels().returning(|labels| {
            Ok(TableBinding {
                table: "persons".to_string(),
                key_column: "id".to_string(),
                labels: labels.clone(),
                columns: Default::default(),
            })
        });
        let mut ctx = LoweringCtx::new(&gtop);
        let tree = single_node_tree(&mut ctx, &["Person"]);

        let tree = ExpandNodeVarWithGtop.run(tree, &mut ctx).unwrap();
        assert_eq!(
            tree.root.select.from_items[0].source_table_name.as_deref(),
            Some("persons")
        );
        assert!(matches!(
            ctx.vars.get(&VarId::from("a")).map(|v| &v.kind),
            Some(VarKind::Node(NodeVar { binding: Some(_), .. }))
        ));
    }
}
