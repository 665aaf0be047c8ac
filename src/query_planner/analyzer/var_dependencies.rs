//! Variable model.
//!
//! Walks the clauses once, declaring every node, relationship, path and
//! projection alias in the [`VarTable`] under a fresh unique name, and
//! records one [`ScopeModel`] per WITH/RETURN boundary. Expressions are
//! converted against the names visible at their position, so everything
//! downstream works on resolved ids.

use std::collections::BTreeSet;

use crate::{
    open_cypher_parser::ast,
    query_planner::{
        errors::{LoweringError, LoweringResult, Pass},
        logical_expr::{ast_conversion::convert_expression, conjunction, LogicalExpr},
        logical_plan::{ReadingClause, ReturnItem, ScopeKind, SortItem},
        plan_ctx::{LoweringCtx, ScopeModel},
        typed_variable::{
            AliasVar, AvailableVariables, NodeVar, PathVar, RelVar, Relationship, TempVar, VarId,
            VarKind, Variable,
        },
    },
};

const PASS: Pass = Pass::VarDependencies;

struct ScopeState {
    index: usize,
    available: AvailableVariables,
    reading_clauses: Vec<ReadingClause>,
    filter: Option<LogicalExpr>,
}

impl ScopeState {
    fn new(index: usize, available: AvailableVariables, filter: Option<LogicalExpr>) -> Self {
        ScopeState {
            index,
            available,
            reading_clauses: Vec::new(),
            filter,
        }
    }
}

/// Fills `ctx.vars` and `ctx.scopes` from `query`.
pub fn collect(query: &ast::CypherQuery<'_>, ctx: &mut LoweringCtx<'_>) -> LoweringResult<()> {
    log::debug!("{}: collecting variables of {} clauses", PASS, query.clauses.len());

    let mut state = ScopeState::new(0, AvailableVariables::default(), None);
    let mut returned = false;

    for clause in &query.clauses {
        if returned {
            return Err(LoweringError::invalid(
                PASS,
                format!("{} cannot follow RETURN", clause.kind_name()),
            ));
        }
        match clause {
            ast::Clause::Match(match_clause) => declare_match(match_clause, &mut state, ctx)?,
            ast::Clause::With(projection) => {
                let (next, filter) = close_scope(projection, ScopeKind::With, &mut state, ctx)?;
                state = ScopeState::new(ctx.scopes.len(), next, filter);
            }
            ast::Clause::Return(projection) => {
                close_scope(projection, ScopeKind::Return, &mut state, ctx)?;
                returned = true;
            }
        }
    }

    if !returned {
        return Err(LoweringError::invalid(PASS, "query must end with RETURN"));
    }

    log::debug!(
        "{}: {} variables in {} scopes",
        PASS,
        ctx.vars.len(),
        ctx.scopes.len()
    );
    Ok(())
}

fn declare_match(
    clause: &ast::MatchClause<'_>,
    state: &mut ScopeState,
    ctx: &mut LoweringCtx<'_>,
) -> LoweringResult<()> {
    let mut reading = ReadingClause {
        optional: clause.optional,
        ..Default::default()
    };
    let mut conditions = Vec::new();

    for pattern in &clause.patterns {
        let mut nodes = Vec::with_capacity(pattern.nodes.len());
        for node in &pattern.nodes {
            nodes.push(declare_node(node, state, ctx, &mut reading, &mut conditions)?);
        }

        let mut rels = Vec::with_capacity(pattern.relationships.len());
        for (i, rel) in pattern.relationships.iter().enumerate() {
            let (left, right) = match (nodes.get(i), nodes.get(i + 1)) {
                (Some(left), Some(right)) => (left.clone(), right.clone()),
                _ => {
                    return Err(LoweringError::bug(
                        PASS,
                        "PathPattern",
                        format!("relationship {} has no two endpoints", i),
                    ))
                }
            };
            rels.push(declare_relationship(rel, left, right, state, ctx, &mut reading)?);
        }

        if let Some(name) = pattern.variable {
            declare_path(name, &nodes, &rels, state, ctx)?;
        }
    }

    if let Some(where_clause) = &clause.where_clause {
        let expr = convert_expression(where_clause, &state.available, PASS)?;
        conditions.extend(expr.into_conjuncts());
    }
    reading.where_clause = conjunction(conditions);

    log::trace!(
        "{}: {} declares {:?}",
        PASS,
        if clause.optional { "OPTIONAL MATCH" } else { "MATCH" },
        reading.variables
    );
    state.reading_clauses.push(reading);
    Ok(())
}

fn property_conditions(
    target: &VarId,
    properties: &Option<Vec<(&str, ast::Expression<'_>)>>,
    available: &AvailableVariables,
) -> LoweringResult<Vec<LogicalExpr>> {
    properties
        .iter()
        .flatten()
        .map(|(key, value)| {
            Ok(LogicalExpr::equals(
                LogicalExpr::property(target.clone(), *key),
                convert_expression(value, available, PASS)?,
            ))
        })
        .collect()
}

fn declare_node(
    node: &ast::NodePattern<'_>,
    state: &mut ScopeState,
    ctx: &mut LoweringCtx<'_>,
    reading: &mut ReadingClause,
    conditions: &mut Vec<LogicalExpr>,
) -> LoweringResult<VarId> {
    if let Some(name) = node.name {
        if let Some(existing) = state.available.get(name).cloned() {
            let resolved = ctx.vars.resolve_alias_var(&existing).clone();
            let extra_labels: BTreeSet<String> = match ctx.vars.get(&resolved) {
                Some(Variable {
                    kind: VarKind::Node(node_var),
                    scope,
                    ..
                }) => {
                    let extra: BTreeSet<String> = node
                        .labels
                        .iter()
                        .map(|label| label.to_string())
                        .filter(|label| !node_var.labels.contains(label))
                        .collect();
                    if !extra.is_empty() && (*scope != state.index || resolved != existing) {
                        return Err(LoweringError::unsupported(
                            PASS,
                            format!("adding labels to `{}` from an earlier scope", name),
                        ));
                    }
                    extra
                }
                Some(other) => {
                    return Err(LoweringError::VariableKindConflict {
                        pass: PASS,
                        name: name.to_string(),
                        existing: other.kind.kind_name(),
                    })
                }
                None => {
                    return Err(LoweringError::bug(
                        PASS,
                        "NodeVar",
                        format!("`{}` is visible but not declared", resolved),
                    ))
                }
            };

            if !extra_labels.is_empty() {
                if let Some(Variable {
                    kind: VarKind::Node(node_var),
                    ..
                }) = ctx.vars.get_mut(&resolved)
                {
                    node_var.labels.extend(extra_labels);
                }
            }
            conditions.extend(property_conditions(&existing, &node.properties, &state.available)?);
            return Ok(existing);
        }
    }

    let id = VarId::from(ctx.naming.fresh(node.name.unwrap_or("anon_n")));
    let restriction = conjunction(property_conditions(&id, &node.properties, &state.available)?);
    ctx.vars.insert(Variable {
        name: node.name.map_or_else(|| id.to_string(), str::to_string),
        unique_name: id.clone(),
        scope: state.index,
        kind: VarKind::Node(NodeVar {
            labels: node.labels.iter().map(|label| label.to_string()).collect(),
            restriction,
            properties_required: Default::default(),
            binding: None,
        }),
    });
    if let Some(name) = node.name {
        state.available.insert(name, id.clone());
    }
    reading.variables.push(id.clone());
    Ok(id)
}

fn declare_relationship(
    rel: &ast::RelationshipPattern<'_>,
    left: VarId,
    right: VarId,
    state: &mut ScopeState,
    ctx: &mut LoweringCtx<'_>,
    reading: &mut ReadingClause,
) -> LoweringResult<VarId> {
    if let Some(bounds) = rel.variable_length {
        return Err(LoweringError::unsupported(
            PASS,
            format!(
                "variable-length relationship `{}` (*{}..{}) reached lowering unexpanded",
                rel.name.unwrap_or(""),
                bounds.min_hops.map_or(String::new(), |n| n.to_string()),
                bounds.max_hops.map_or(String::new(), |n| n.to_string()),
            ),
        ));
    }

    if let Some(name) = rel.name {
        if let Some(existing) = state.available.get(name) {
            let resolved = ctx.vars.resolve_alias_var(existing);
            return Err(match ctx.vars.get(resolved) {
                Some(Variable {
                    kind: VarKind::Rel(_),
                    ..
                }) => LoweringError::unsupported(
                    PASS,
                    format!("relationship variable `{}` used in more than one pattern", name),
                ),
                Some(other) => LoweringError::VariableKindConflict {
                    pass: PASS,
                    name: name.to_string(),
                    existing: other.kind.kind_name(),
                },
                None => LoweringError::bug(
                    PASS,
                    "RelVar",
                    format!("`{}` is visible but not declared", resolved),
                ),
            });
        }
    }

    let id = VarId::from(ctx.naming.fresh(rel.name.unwrap_or("anon_r")));
    let restriction = conjunction(property_conditions(&id, &rel.properties, &state.available)?);
    ctx.vars.insert(Variable {
        name: rel.name.map_or_else(|| id.to_string(), str::to_string),
        unique_name: id.clone(),
        scope: state.index,
        kind: VarKind::Rel(RelVar {
            relationship: Relationship {
                left,
                right,
                direction: rel.direction,
                types: rel.types.iter().map(|t| t.to_string()).collect(),
                restriction,
            },
            properties_required: Default::default(),
            binding: None,
        }),
    });
    if let Some(name) = rel.name {
        state.available.insert(name, id.clone());
    }
    reading.variables.push(id.clone());
    reading.relationships.push(id.clone());
    Ok(id)
}

fn declare_path(
    name: &str,
    nodes: &[VarId],
    rels: &[VarId],
    state: &mut ScopeState,
    ctx: &mut LoweringCtx<'_>,
) -> LoweringResult<()> {
    if let Some(existing) = state.available.get(name) {
        return Err(LoweringError::VariableKindConflict {
            pass: PASS,
            name: name.to_string(),
            existing: ctx
                .vars
                .get(existing)
                .map_or("a variable", |var| var.kind.kind_name()),
        });
    }

    let mut elements = Vec::with_capacity(nodes.len() + rels.len());
    for (i, node) in nodes.iter().enumerate() {
        elements.push(node.clone());
        if let Some(rel) = rels.get(i) {
            elements.push(rel.clone());
        }
    }

    let id = VarId::from(ctx.naming.fresh(name));
    ctx.vars.insert(Variable {
        name: name.to_string(),
        unique_name: id.clone(),
        scope: state.index,
        kind: VarKind::Path(PathVar {
            hops: rels.len(),
            elements,
        }),
    });
    state.available.insert(name, id);
    Ok(())
}

fn declare_temp(column_name: &str, scope: usize, ctx: &mut LoweringCtx<'_>) -> VarId {
    let id = VarId::from(ctx.naming.fresh("col"));
    ctx.vars.insert(Variable {
        name: column_name.to_string(),
        unique_name: id.clone(),
        scope,
        kind: VarKind::Temp(TempVar {
            column_name: column_name.to_string(),
        }),
    });
    id
}

/// Records the scope ended by `projection` and returns the names visible
/// after it together with the WITH's WHERE.
fn close_scope(
    projection: &ast::ProjectionClause<'_>,
    kind: ScopeKind,
    state: &mut ScopeState,
    ctx: &mut LoweringCtx<'_>,
) -> LoweringResult<(AvailableVariables, Option<LogicalExpr>)> {
    let mut next = AvailableVariables::default();
    let mut items = Vec::with_capacity(projection.items.len());

    for item in &projection.items {
        let expr = convert_expression(&item.expression, &state.available, PASS)?;
        match (item.alias, kind, &item.expression) {
            (Some(alias), _, _) => {
                if kind == ScopeKind::With && next.get(alias).is_some() {
                    return Err(LoweringError::invalid(
                        PASS,
                        format!("`{}` is projected more than once", alias),
                    ));
                }
                let id = VarId::from(ctx.naming.fresh(alias));
                ctx.vars.insert(Variable {
                    name: alias.to_string(),
                    unique_name: id.clone(),
                    scope: state.index,
                    kind: VarKind::Alias(AliasVar { expr, ty: None }),
                });
                next.insert(alias, id.clone());
                items.push(ReturnItem::Aliased { alias: id });
            }
            (None, ScopeKind::With, ast::Expression::Variable(name)) => {
                if next.get(name).is_some() {
                    return Err(LoweringError::invalid(
                        PASS,
                        format!("`{}` is projected more than once", name),
                    ));
                }
                if let LogicalExpr::Variable(id) = &expr {
                    next.insert(*name, id.clone());
                }
                let column = declare_temp(name, state.index, ctx);
                items.push(ReturnItem::Unaliased { expr, column });
            }
            (None, ScopeKind::With, _) => {
                return Err(LoweringError::invalid(
                    PASS,
                    format!("expression `{}` in WITH must be aliased (use AS)", item.original_text),
                ))
            }
            (None, ScopeKind::Return, _) => {
                let column = declare_temp(item.original_text, state.index, ctx);
                items.push(ReturnItem::Unaliased { expr, column });
            }
        }
    }

    // ORDER BY sees both the projected names and the ones they came from.
    let mut sort_scope = state.available.clone();
    for (name, id) in next.iter() {
        sort_scope.insert(name, id.clone());
    }
    let order_by = projection
        .order_by
        .iter()
        .map(|sort| {
            let expr = convert_expression(sort.expression(), &sort_scope, PASS)?;
            Ok(match sort {
                ast::SortItem::Asc(_) => SortItem::Asc(expr),
                ast::SortItem::Desc(_) => SortItem::Desc(expr),
            })
        })
        .collect::<LoweringResult<Vec<_>>>()?;

    let no_variables = AvailableVariables::default();
    let skip = projection
        .skip
        .as_ref()
        .map(|expr| convert_expression(expr, &no_variables, PASS))
        .transpose()?;
    let limit = projection
        .limit
        .as_ref()
        .map(|expr| convert_expression(expr, &no_variables, PASS))
        .transpose()?;

    let filter = match (&projection.where_clause, kind) {
        (Some(_), ScopeKind::Return) => {
            return Err(LoweringError::invalid(PASS, "WHERE cannot follow RETURN"))
        }
        (Some(where_clause), ScopeKind::With) => {
            Some(convert_expression(where_clause, &next, PASS)?)
        }
        (None, _) => None,
    };

    log::trace!(
        "{}: scope {} closed by {:?} with {} items",
        PASS,
        state.index,
        kind,
        items.len()
    );
    ctx.scopes.push(ScopeModel {
        kind,
        reading_clauses: std::mem::take(&mut state.reading_clauses),
        items,
        distinct: projection.distinct,
        order_by,
        skip,
        limit,
        filter: state.filter.take(),
    });
    Ok((next, filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::social_topology;
    use crate::open_cypher_parser::{ast::Direction, parse_query};
    use crate::query_planner::errors::ErrorCategory;

    fn collect_query(query: &str) -> LoweringResult<(Vec<ScopeModel>, Vec<Variable>)> {
        let gtop = social_topology();
        let mut ctx = LoweringCtx::new(&gtop);
        let ast = parse_query(query).unwrap();
        collect(&ast, &mut ctx)?;
        Ok((ctx.scopes, ctx.vars.iter().cloned().collect()))
    }

    fn find<'v>(vars: &'v [Variable], unique: &str) -> &'v Variable {
        vars.iter()
            .find(|v| v.unique_name.as_str() == unique)
            .unwrap_or_else(|| panic!("no variable {}", unique))
    }

    #[test]
    fn test_names_are_unique_across_scopes() {
        let (scopes, vars) =
            collect_query("MATCH (a:Person) WITH a AS b MATCH (a:City) RETURN a, b").unwrap();
        assert_eq!(scopes.len(), 2);
        assert_eq!(find(&vars, "a").scope, 0);
        assert_eq!(find(&vars, "a_1").name, "a");
        assert_eq!(find(&vars, "a_1").scope, 1);

        let unique: BTreeSet<&str> = vars.iter().map(|v| v.unique_name.as_str()).collect();
        assert_eq!(unique.len(), vars.len());
    }

    #[test]
    fn test_relationship_endpoints() {
        let (scopes, vars) = collect_query("MATCH (a)-[r:TEST]-(c) RETURN r").unwrap();
        let VarKind::Rel(rel) = &find(&vars, "r").kind else {
            panic!("r is not a relationship");
        };
        assert_eq!(rel.relationship.direction, Direction::Both);
        assert_eq!(rel.relationship.types, vec!["TEST".to_string()]);
        assert_eq!(rel.relationship.left.as_str(), "a");
        assert_eq!(rel.relationship.right.as_str(), "c");
        assert_eq!(
            scopes[0].reading_clauses[0].variables,
            vec![VarId::from("a"), VarId::from("c"), VarId::from("r")]
        );
    }

    #[test]
    fn test_pattern_properties_become_restrictions() {
        let (scopes, vars) =
            collect_query("MATCH (a:Person {id: 'test'}), (a {lastName: 'x'}) RETURN a").unwrap();
        let VarKind::Node(node) = &find(&vars, "a").kind else {
            panic!("a is not a node");
        };
        assert!(node.restriction.is_some());
        // the second mention filters the existing node
        assert!(scopes[0].reading_clauses[0].where_clause.is_some());
    }

    #[test]
    fn test_path_hops() {
        let (_, vars) = collect_query("MATCH p = (a)-[:KNOWS]->(b)-[:KNOWS]->(c) RETURN p").unwrap();
        let VarKind::Path(path) = &find(&vars, "p").kind else {
            panic!("p is not a path");
        };
        assert_eq!(path.hops, 2);
        assert_eq!(path.elements.len(), 5);
    }

    #[test]
    fn test_kind_conflict() {
        let err = collect_query("MATCH (a)-[a]->(b) RETURN a").unwrap_err();
        assert!(matches!(err, LoweringError::VariableKindConflict { .. }));
        assert_eq!(err.category(), ErrorCategory::UserQuery);
    }

    #[test]
    fn test_unsupported_constructs() {
        for query in [
            "MATCH (a)-[:KNOWS*1..3]->(b) RETURN b",
            "MATCH (a)-[r]->(b) MATCH (b)-[r]->(c) RETURN c",
            "MATCH (a:Person) WITH a MATCH (a:City) RETURN a",
        ] {
            let err = collect_query(query).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::UnsupportedFeature, "{}", query);
        }
    }

    #[test]
    fn test_invalid_projections() {
        for query in [
            "MATCH (a) WITH a.x RETURN 1",
            "MATCH (a) RETURN a MATCH (b) RETURN b",
            "MATCH (a)",
            "MATCH (a) RETURN b",
        ] {
            let err = collect_query(query).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::UserQuery, "{}", query);
        }
    }

    #[test]
    fn test_with_filter_moves_to_next_scope() {
        let (scopes, _) =
            collect_query("MATCH (a) WITH a.x AS x WHERE x > 1 RETURN x ORDER BY x").unwrap();
        assert!(scopes[0].filter.is_none());
        assert!(scopes[1].filter.is_some());
        assert_eq!(scopes[1].order_by.len(), 1);
    }
}
