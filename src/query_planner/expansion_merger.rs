//! Expansion merger.
//!
//! A source query with variable-length relationships expands into several
//! fixed-length variants. Each variant is lowered on its own; this module
//! combines the lowered trees into one UNION whose branches are the
//! variants' RETURN scopes, in expansion order.
//!
//! Aggregates cannot be computed per branch and concatenated, so when the
//! RETURN aggregates, the union is wrapped and re-aggregated:
//!
//! ```text
//! count(x) / sum(x) -> SUM(col)
//! min(x)            -> MIN(col)
//! max(x)            -> MAX(col)
//! avg, collect      -> unsupported
//! ```
//!
//! ORDER BY, SKIP and LIMIT move from the branches to the wrapping query.

use crate::query_planner::{
    errors::{LoweringError, LoweringResult, Pass},
    logical_expr::LogicalExpr,
    logical_plan::{
        LoweredQuery, MergeAggregate, MergedColumn, MergedQuery, ReturnItem, UnionQuery,
    },
    typed_variable::{VarKind, VarTable},
};

const PASS: Pass = Pass::ExpansionMerger;

pub fn merge(mut variants: Vec<LoweredQuery>, union_distinct: bool) -> LoweringResult<MergedQuery> {
    if variants.len() <= 1 {
        return variants
            .pop()
            .map(MergedQuery::Single)
            .ok_or_else(|| LoweringError::bug(PASS, "QueryTree", "no variants to merge"));
    }

    let first = &variants[0];
    let columns = root_columns(first)?;
    let names: Vec<&str> = columns.iter().map(|(column, _)| column.name.as_str()).collect();

    for (index, variant) in variants.iter().enumerate().skip(1) {
        let other = root_columns(variant)?;
        let other_names: Vec<&str> = other.iter().map(|(column, _)| column.name.as_str()).collect();
        if other_names != names {
            return Err(LoweringError::bug(
                PASS,
                "ScopeSelect",
                format!(
                    "variant {} returns ({}) instead of ({})",
                    index,
                    other_names.join(", "),
                    names.join(", ")
                ),
            ));
        }
        let (root, other_root) = (&first.tree.root, &variant.tree.root);
        if root.distinct != other_root.distinct
            || root.skip != other_root.skip
            || root.limit != other_root.limit
        {
            return Err(LoweringError::bug(
                PASS,
                "ScopeSelect",
                format!("variant {} differs in DISTINCT, SKIP or LIMIT", index),
            ));
        }
    }

    let order_by = first
        .tree
        .root
        .order_by
        .iter()
        .map(|sort| {
            order_column(first, &columns, sort.expr())
                .map(|name| (name, sort.is_descending()))
        })
        .collect::<LoweringResult<Vec<_>>>()?;

    let columns: Vec<MergedColumn> = columns.into_iter().map(|(column, _)| column).collect();
    let reaggregate = columns.iter().any(|column| column.merge.is_some());
    let distinct = first.tree.root.distinct;
    let skip = first.tree.root.skip.clone();
    let limit = first.tree.root.limit.clone();
    log::debug!(
        "{}: merging {} variants over ({}){}",
        PASS,
        variants.len(),
        columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        if reaggregate { ", re-aggregating" } else { "" }
    );

    Ok(MergedQuery::Union(UnionQuery {
        branches: variants,
        // re-aggregation needs every branch row, equal or not
        all: reaggregate || !(distinct || union_distinct),
        columns,
        reaggregate,
        order_by,
        skip,
        limit,
    }))
}

/// Output columns of the RETURN scope with the expression each one renders.
fn root_columns(variant: &LoweredQuery) -> LoweringResult<Vec<(MergedColumn, LogicalExpr)>> {
    variant
        .tree
        .root
        .items
        .iter()
        .map(|item| {
            let (name, expr) = item_column(item, &variant.vars)?;
            let merge = merge_aggregate(&expr)?;
            Ok((MergedColumn { name, merge }, expr))
        })
        .collect()
}

fn item_column(item: &ReturnItem, vars: &VarTable) -> LoweringResult<(String, LogicalExpr)> {
    let (id, expr) = match item {
        ReturnItem::Aliased { alias } => match vars.get(alias).map(|v| &v.kind) {
            Some(VarKind::Alias(def)) => (alias, def.expr.clone()),
            _ => {
                return Err(LoweringError::bug(
                    PASS,
                    "ReturnItem",
                    format!("`{}` is not an alias", alias),
                ))
            }
        },
        ReturnItem::Unaliased { expr, column } => (column, expr.clone()),
    };
    let name = match vars.get(id) {
        Some(var) => match &var.kind {
            VarKind::Temp(temp) => temp.column_name.clone(),
            _ => var.name.clone(),
        },
        None => {
            return Err(LoweringError::bug(
                PASS,
                "ReturnItem",
                format!("column `{}` is not declared", id),
            ))
        }
    };
    Ok((name, expr))
}

fn merge_aggregate(expr: &LogicalExpr) -> LoweringResult<Option<MergeAggregate>> {
    match expr {
        LogicalExpr::AggregateFnCall(call) => match call.name.as_str() {
            "count" | "sum" => Ok(Some(MergeAggregate::Sum)),
            "min" => Ok(Some(MergeAggregate::Min)),
            "max" => Ok(Some(MergeAggregate::Max)),
            other => Err(LoweringError::unsupported(
                PASS,
                format!("{}() over an expanded variable-length pattern", other),
            )),
        },
        other if other.contains_aggregate() => Err(LoweringError::unsupported(
            PASS,
            format!("aggregate inside `{}` over an expanded variable-length pattern", other),
        )),
        _ => Ok(None),
    }
}

fn order_column(
    variant: &LoweredQuery,
    columns: &[(MergedColumn, LogicalExpr)],
    key: &LogicalExpr,
) -> LoweringResult<String> {
    let by_alias = |item: &ReturnItem| match (item, key) {
        (ReturnItem::Aliased { alias }, LogicalExpr::Variable(var)) => {
            alias == var || variant.vars.resolve_alias_var(alias) == var
        }
        _ => false,
    };

    variant
        .tree
        .root
        .items
        .iter()
        .zip(columns)
        .find(|&(item, (_, expr))| by_alias(item) || expr == key)
        .map(|(_, (column, _))| column.name.clone())
        .ok_or_else(|| {
            LoweringError::unsupported(
                PASS,
                format!("ORDER BY `{}` that is not a returned column", key),
            )
        })
}
