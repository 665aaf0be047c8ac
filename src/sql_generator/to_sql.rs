//! SQL rendering of a finished query tree.
//!
//! Rendering only reads the tree and the variable table; rendering the same
//! tree twice yields the same string. Output is a single line:
//!
//! ```text
//! SELECT <list> FROM <item> [CROSS JOIN <item>]* [[LEFT] JOIN <item> ON (<cond>)]*
//!   [WHERE ...] [GROUP BY ...] [ORDER BY ...] [LIMIT n] [OFFSET m]
//! ```
//!
//! A WITH scope renders as `(<select>) AS with_k` inside the FROM list of
//! the scope reading from it. It selects one column per scalar export and,
//! per entity export, the key column plus `<var>__<property>` for every
//! property a later scope reads.

use crate::{
    graph_catalog::graph_topology::{RelationshipBinding, TableBinding},
    query_planner::{
        logical_expr::{Literal, LogicalExpr, Operator, OperatorApplication, PropertyAccess},
        logical_plan::{
            BaseJoin, Export, FromItem, LoweredQuery, MergedQuery, QueryTree, ReturnItem,
            ScopeKind, ScopeSelect, UnionQuery,
        },
        typed_variable::{VarId, VarKind, VarTable},
    },
    sql_generator::{
        errors::{RenderError, RenderResult},
        function_registry::{get_aggregate_mapping, get_function_mapping},
    },
};

/// Renders a lowered variant or a union of variants.
pub fn render_merged(query: &MergedQuery) -> RenderResult<String> {
    match query {
        MergedQuery::Single(lowered) => SqlRenderer::new(lowered).render(),
        MergedQuery::Union(union) => render_union(union),
    }
}

pub fn render_lowered(lowered: &LoweredQuery) -> RenderResult<String> {
    SqlRenderer::new(lowered).render()
}

/// Identifiers that are not plain `[A-Za-z_][A-Za-z0-9_]*` get double quotes.
pub fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Column a WITH scope exports a property of an entity under.
fn property_column(var: &VarId, key: &str) -> String {
    quote_ident(&format!("{}__{}", var, key))
}

struct SelectEntry {
    sql: String,
    alias: String,
    aggregate: bool,
    constant: bool,
}

pub struct SqlRenderer<'a> {
    tree: &'a QueryTree,
    vars: &'a VarTable,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(lowered: &'a LoweredQuery) -> Self {
        SqlRenderer {
            tree: &lowered.tree,
            vars: &lowered.vars,
        }
    }

    pub fn render(&self) -> RenderResult<String> {
        self.render_scope(&self.tree.root, None, true)
    }

    /// The RETURN scope without ORDER BY, SKIP and LIMIT.
    fn render_branch(&self) -> RenderResult<String> {
        self.render_scope(&self.tree.root, None, false)
    }

    fn render_scope(
        &self,
        scope: &ScopeSelect,
        exports: Option<&[Export]>,
        paging: bool,
    ) -> RenderResult<String> {
        let entries = match exports {
            Some(exports) => self.export_entries(scope, exports)?,
            None => self.return_entries(scope)?,
        };
        if entries.is_empty() {
            return Err(RenderError::invalid(
                "ScopeSelect",
                format!("scope {} selects no columns", scope.scope_index),
            ));
        }

        let mut sql = String::from("SELECT ");
        if scope.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(
            &entries
                .iter()
                .map(|entry| format!("{} AS {}", entry.sql, entry.alias))
                .collect::<Vec<_>>()
                .join(", "),
        );

        sql.push_str(&self.from_clause(scope)?);

        if !scope.select.where_clause.is_empty() {
            let conditions = scope
                .select
                .where_clause
                .iter()
                .map(|condition| self.operand(scope, condition, Operator::And, true))
                .collect::<RenderResult<Vec<_>>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if entries.iter().any(|entry| entry.aggregate) {
            let mut keys: Vec<&str> = Vec::new();
            for entry in entries.iter().filter(|e| !e.aggregate && !e.constant) {
                if !keys.contains(&entry.sql.as_str()) {
                    keys.push(&entry.sql);
                }
            }
            if !keys.is_empty() {
                sql.push_str(" GROUP BY ");
                sql.push_str(&keys.join(", "));
            }
        }

        if paging {
            if !scope.order_by.is_empty() {
                let keys = scope
                    .order_by
                    .iter()
                    .map(|sort| {
                        let key = self.order_key(scope, sort.expr())?;
                        Ok(if sort.is_descending() {
                            format!("{} DESC", key)
                        } else {
                            key
                        })
                    })
                    .collect::<RenderResult<Vec<_>>>()?;
                sql.push_str(" ORDER BY ");
                sql.push_str(&keys.join(", "));
            }
            if let Some(limit) = &scope.limit {
                sql.push_str(" LIMIT ");
                sql.push_str(&self.expr(scope, limit)?);
            }
            if let Some(skip) = &scope.skip {
                sql.push_str(" OFFSET ");
                sql.push_str(&self.expr(scope, skip)?);
            }
        }
        Ok(sql)
    }

    fn return_entries(&self, scope: &ScopeSelect) -> RenderResult<Vec<SelectEntry>> {
        scope
            .items
            .iter()
            .map(|item| {
                let (expr, name) = match item {
                    ReturnItem::Aliased { alias } => (self.alias_definition(alias)?, self.display_name(alias)?),
                    ReturnItem::Unaliased { expr, column } => (expr, self.display_name(column)?),
                };
                Ok(SelectEntry {
                    sql: self.expr(scope, expr)?,
                    alias: quote_ident(&name),
                    aggregate: expr.contains_aggregate(),
                    constant: expr.is_constant(),
                })
            })
            .collect()
    }

    fn export_entries(&self, scope: &ScopeSelect, exports: &[Export]) -> RenderResult<Vec<SelectEntry>> {
        let mut entries = Vec::new();
        for export in exports {
            match export {
                Export::Entity(var) => {
                    entries.push(SelectEntry {
                        sql: self.variable(scope, var)?,
                        alias: quote_ident(var.as_str()),
                        aggregate: false,
                        constant: false,
                    });
                    for key in self.exported_properties(var, scope.scope_index)? {
                        entries.push(SelectEntry {
                            sql: self.property(scope, var, key)?,
                            alias: property_column(var, key),
                            aggregate: false,
                            constant: false,
                        });
                    }
                }
                Export::Scalar(var) => {
                    let declared_here = scope.declared_aliases().any(|alias| alias == var);
                    let (sql, aggregate, constant) = if declared_here {
                        let expr = self.alias_definition(var)?;
                        (self.expr(scope, expr)?, expr.contains_aggregate(), expr.is_constant())
                    } else {
                        (self.variable(scope, var)?, false, false)
                    };
                    entries.push(SelectEntry {
                        sql,
                        alias: quote_ident(var.as_str()),
                        aggregate,
                        constant,
                    });
                }
            }
        }
        Ok(entries)
    }

    fn from_clause(&self, scope: &ScopeSelect) -> RenderResult<String> {
        let mut sql = String::new();
        for (index, item) in scope.select.from_items.iter().enumerate() {
            sql.push_str(if index == 0 { " FROM " } else { " CROSS JOIN " });
            sql.push_str(&self.from_item(item)?);
        }
        for join in &scope.select.joins {
            let keyword = match join {
                BaseJoin::InnerJoin(_) => " JOIN ",
                BaseJoin::LeftJoin(_) => " LEFT JOIN ",
            };
            let join = join.join();
            sql.push_str(keyword);
            sql.push_str(&self.from_item(&join.joining_item)?);
            sql.push_str(" ON (");
            sql.push_str(&self.expr(scope, &join.condition)?);
            sql.push(')');
        }
        Ok(sql)
    }

    fn from_item(&self, item: &FromItem) -> RenderResult<String> {
        item.check_invariant(true)
            .map_err(|message| RenderError::invalid("FromItem", message))?;
        if !item.pending_conditions.is_empty() {
            return Err(RenderError::invalid(
                "FromItem",
                format!("{} conditions were never placed", item.pending_conditions.len()),
            ));
        }

        match (&item.source, &item.source_table_name, item.table_var()) {
            (Some(source), _, _) => {
                let with = self.tree.subquery(*source).ok_or_else(|| {
                    RenderError::invalid("FromItem", format!("missing subquery {:?}", source))
                })?;
                let name = with.subquery_name.as_deref().ok_or_else(|| {
                    RenderError::invalid("WithSelect", format!("subquery {:?} has no name", source))
                })?;
                let inner = self.render_scope(&with.scope, Some(&with.exports), true)?;
                Ok(format!("({}) AS {}", inner, quote_ident(name)))
            }
            (None, Some(table), Some(var)) => Ok(format!("{} AS {}", table, quote_ident(var.as_str()))),
            _ => Err(RenderError::invalid("FromItem", "neither a subquery nor a table")),
        }
    }

    fn order_key(&self, scope: &ScopeSelect, key: &LogicalExpr) -> RenderResult<String> {
        if let LogicalExpr::Variable(var) = key {
            if scope.declared_aliases().any(|alias| alias == var) {
                return Ok(match scope.kind {
                    ScopeKind::Return => quote_ident(&self.display_name(var)?),
                    ScopeKind::With => quote_ident(var.as_str()),
                });
            }
        }
        self.expr(scope, key)
    }

    fn display_name(&self, id: &VarId) -> RenderResult<String> {
        match self.vars.get(id) {
            Some(var) => Ok(match &var.kind {
                VarKind::Temp(temp) => temp.column_name.clone(),
                _ => var.name.clone(),
            }),
            None => Err(RenderError::invalid("ReturnItem", format!("`{}` is not declared", id))),
        }
    }

    fn alias_definition(&self, id: &VarId) -> RenderResult<&'a LogicalExpr> {
        match self.vars.get(id).map(|v| &v.kind) {
            Some(VarKind::Alias(alias)) => Ok(&alias.expr),
            _ => Err(RenderError::invalid("ReturnItem", format!("`{}` is not an alias", id))),
        }
    }

    /// Properties of `id` read by scopes outside the one at `scope_index`.
    fn exported_properties(&self, id: &VarId, scope_index: usize) -> RenderResult<Vec<&'a str>> {
        let required = match self.vars.get(id).map(|v| &v.kind) {
            Some(VarKind::Node(node)) => &node.properties_required,
            Some(VarKind::Rel(rel)) => &rel.properties_required,
            _ => {
                return Err(RenderError::invalid(
                    "Export",
                    format!("entity export `{}` is no node or relationship", id),
                ))
            }
        };
        Ok(required
            .iter()
            .filter(|(_, outermost)| **outermost > scope_index)
            .map(|(key, _)| key.as_str())
            .collect())
    }

    fn table_binding(&self, id: &VarId) -> RenderResult<Binding<'a>> {
        match self.vars.get(id).map(|v| &v.kind) {
            Some(VarKind::Node(node)) => node.binding.as_ref().map(Binding::Node),
            Some(VarKind::Rel(rel)) => rel.binding.as_ref().map(Binding::Rel),
            _ => None,
        }
        .ok_or_else(|| RenderError::invalid("FromItem", format!("`{}` has no table binding", id)))
    }

    fn supplier<'s>(
        &self,
        scope: &'s ScopeSelect,
        var: &VarId,
        node_kind: &'static str,
    ) -> RenderResult<&'s FromItem> {
        scope
            .select
            .supplier(var)
            .ok_or_else(|| RenderError::MissingSupplier {
                node_kind,
                var: var.to_string(),
                scope: scope.scope_index,
            })
    }

    fn subquery_name(&self, item: &FromItem) -> RenderResult<Option<String>> {
        match item.source {
            Some(source) => self
                .tree
                .subquery(source)
                .and_then(|with| with.subquery_name.as_deref())
                .map(|name| Some(quote_ident(name)))
                .ok_or_else(|| RenderError::invalid("FromItem", format!("unnamed subquery {:?}", source))),
            None => Ok(None),
        }
    }

    fn variable(&self, scope: &ScopeSelect, var: &VarId) -> RenderResult<String> {
        if let Some(VarKind::Path(_)) = self.vars.get(var).map(|v| &v.kind) {
            return Err(RenderError::Unsupported(format!("path `{}` as a value", var)));
        }
        if scope.select.supplier(var).is_none() {
            if let Some(VarKind::Alias(alias)) = self.vars.get(var).map(|v| &v.kind) {
                return self.expr(scope, &alias.expr);
            }
        }

        let item = self.supplier(scope, var, "Variable")?;
        match self.subquery_name(item)? {
            Some(subquery) => Ok(format!("{}.{}", subquery, quote_ident(var.as_str()))),
            None => {
                let key = match self.table_binding(var)? {
                    Binding::Node(binding) => &binding.key_column,
                    Binding::Rel(binding) => &binding.key_column,
                };
                Ok(format!("{}.{}", quote_ident(var.as_str()), quote_ident(key)))
            }
        }
    }

    fn property(&self, scope: &ScopeSelect, var: &VarId, key: &str) -> RenderResult<String> {
        let item = self.supplier(scope, var, "PropertyAccess")?;
        match self.subquery_name(item)? {
            Some(subquery) => Ok(format!("{}.{}", subquery, property_column(var, key))),
            None => {
                let column = match self.table_binding(var)? {
                    Binding::Node(binding) => binding.column_for(key),
                    Binding::Rel(binding) => binding.column_for(key),
                };
                Ok(format!("{}.{}", quote_ident(var.as_str()), quote_ident(column)))
            }
        }
    }

    fn expr(&self, scope: &ScopeSelect, expr: &LogicalExpr) -> RenderResult<String> {
        match expr {
            LogicalExpr::Literal(literal) => Ok(render_literal(literal)),
            LogicalExpr::Star => Ok("*".to_string()),
            LogicalExpr::Parameter(name) => Ok(format!(":{}", name)),
            LogicalExpr::Variable(var) => self.variable(scope, var),
            LogicalExpr::Column(column) => Ok(format!(
                "{}.{}",
                quote_ident(column.var.as_str()),
                quote_ident(&column.name)
            )),
            LogicalExpr::PropertyAccessExp(PropertyAccess { base, key }) => match base.as_ref() {
                LogicalExpr::Variable(var) => self.property(scope, var, key),
                other => Err(RenderError::Unsupported(format!(
                    "property access on `{}`",
                    other
                ))),
            },
            LogicalExpr::OperatorApplicationExp(op) => self.operator(scope, op),
            LogicalExpr::List(items) => Ok(format!("ARRAY[{}]", self.list(scope, items)?)),
            LogicalExpr::MapLiteral(_) => {
                Err(RenderError::Unsupported(format!("map value `{}`", expr)))
            }
            LogicalExpr::AggregateFnCall(call) => {
                let name = get_aggregate_mapping(&call.name).ok_or_else(|| {
                    RenderError::Unsupported(format!("aggregate `{}`", call.name))
                })?;
                let args = self.list(scope, &call.args)?;
                Ok(if call.distinct {
                    format!("{}(DISTINCT {})", name, args)
                } else {
                    format!("{}({})", name, args)
                })
            }
            LogicalExpr::ScalarFnCall(call) => {
                let mapping = get_function_mapping(&call.name).ok_or_else(|| {
                    RenderError::Unsupported(format!("function `{}`", call.name))
                })?;
                let args = call
                    .args
                    .iter()
                    .map(|arg| self.expr(scope, arg))
                    .collect::<RenderResult<Vec<_>>>()?;
                Ok(mapping.render(&args))
            }
        }
    }

    fn list(&self, scope: &ScopeSelect, items: &[LogicalExpr]) -> RenderResult<String> {
        Ok(items
            .iter()
            .map(|item| self.expr(scope, item))
            .collect::<RenderResult<Vec<_>>>()?
            .join(", "))
    }

    /// Renders `operand` of `parent`, parenthesized when it binds looser
    /// (or, with `inclusive`, equally loose).
    fn operand(
        &self,
        scope: &ScopeSelect,
        operand: &LogicalExpr,
        parent: Operator,
        inclusive: bool,
    ) -> RenderResult<String> {
        let sql = self.expr(scope, operand)?;
        let (inner, outer) = (precedence(operand), operator_precedence(parent));
        if inner < outer || (inclusive && inner == outer) {
            Ok(format!("({})", sql))
        } else {
            Ok(sql)
        }
    }

    fn operator(&self, scope: &ScopeSelect, op: &OperatorApplication) -> RenderResult<String> {
        let operator = op.operator;
        match (operator, op.operands.as_slice()) {
            (Operator::Not, [operand]) => Ok(format!(
                "NOT {}",
                self.operand(scope, operand, operator, false)?
            )),
            (Operator::Negation, [operand]) => Ok(format!(
                "-{}",
                self.operand(scope, operand, operator, true)?
            )),
            (Operator::IsNull, [operand]) => Ok(format!(
                "{} IS NULL",
                self.operand(scope, operand, operator, true)?
            )),
            (Operator::IsNotNull, [operand]) => Ok(format!(
                "{} IS NOT NULL",
                self.operand(scope, operand, operator, true)?
            )),
            (Operator::Exponentiation, [left, right]) => Ok(format!(
                "POWER({}, {})",
                self.expr(scope, left)?,
                self.expr(scope, right)?
            )),
            (Operator::In, [left, LogicalExpr::List(items)]) => Ok(format!(
                "{} IN ({})",
                self.operand(scope, left, operator, true)?,
                self.list(scope, items)?
            )),
            (Operator::In, [left, right]) => Ok(format!(
                "{} = ANY({})",
                self.operand(scope, left, operator, true)?,
                self.expr(scope, right)?
            )),
            (Operator::StartsWith | Operator::EndsWith | Operator::Contains, [left, right]) => {
                let left = self.operand(scope, left, operator, true)?;
                let right = self.operand(scope, right, operator, true)?;
                let pattern = match operator {
                    Operator::StartsWith => format!("{} || '%'", right),
                    Operator::EndsWith => format!("'%' || {}", right),
                    _ => format!("'%' || {} || '%'", right),
                };
                Ok(format!("{} LIKE {}", left, pattern))
            }
            (_, [left, right]) => {
                let symbol = binary_symbol(operator).ok_or_else(|| {
                    RenderError::invalid("OperatorApplication", format!("{:?} is not binary", operator))
                })?;
                let comparison = operator_precedence(operator) == COMPARISON;
                Ok(format!(
                    "{} {} {}",
                    self.operand(scope, left, operator, comparison)?,
                    symbol,
                    self.operand(scope, right, operator, true)?
                ))
            }
            (_, operands) => Err(RenderError::invalid(
                "OperatorApplication",
                format!("{:?} applied to {} operands", operator, operands.len()),
            )),
        }
    }
}

enum Binding<'a> {
    Node(&'a TableBinding),
    Rel(&'a RelationshipBinding),
}

const COMPARISON: u8 = 5;

fn operator_precedence(operator: Operator) -> u8 {
    match operator {
        Operator::Or => 1,
        Operator::And => 3,
        Operator::Not => 4,
        Operator::Xor
        | Operator::Equal
        | Operator::NotEqual
        | Operator::LessThan
        | Operator::GreaterThan
        | Operator::LessThanEqual
        | Operator::GreaterThanEqual
        | Operator::RegexMatch
        | Operator::In
        | Operator::StartsWith
        | Operator::EndsWith
        | Operator::Contains
        | Operator::IsNull
        | Operator::IsNotNull => COMPARISON,
        Operator::Addition | Operator::Subtraction => 6,
        Operator::Multiplication | Operator::Division | Operator::ModuloDivision => 7,
        Operator::Negation => 8,
        Operator::Exponentiation => 10,
    }
}

fn precedence(expr: &LogicalExpr) -> u8 {
    match expr {
        LogicalExpr::OperatorApplicationExp(op) => operator_precedence(op.operator),
        _ => 10,
    }
}

fn binary_symbol(operator: Operator) -> Option<&'static str> {
    Some(match operator {
        Operator::Addition => "+",
        Operator::Subtraction => "-",
        Operator::Multiplication => "*",
        Operator::Division => "/",
        Operator::ModuloDivision => "%",
        Operator::Equal => "=",
        Operator::NotEqual | Operator::Xor => "<>",
        Operator::LessThan => "<",
        Operator::GreaterThan => ">",
        Operator::LessThanEqual => "<=",
        Operator::GreaterThanEqual => ">=",
        Operator::RegexMatch => "~",
        Operator::And => "AND",
        Operator::Or => "OR",
        _ => return None,
    })
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Integer(i) => i.to_string(),
        Literal::Float(x) if x.is_finite() && x.fract() == 0.0 => format!("{:.1}", x),
        Literal::Float(x) => x.to_string(),
        Literal::Boolean(true) => "TRUE".to_string(),
        Literal::Boolean(false) => "FALSE".to_string(),
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
        Literal::Null => "NULL".to_string(),
    }
}

fn render_union(union: &UnionQuery) -> RenderResult<String> {
    let first = union
        .branches
        .first()
        .ok_or_else(|| RenderError::invalid("UnionQuery", "no branches"))?;
    let branches = union
        .branches
        .iter()
        .map(|branch| SqlRenderer::new(branch).render_branch())
        .collect::<RenderResult<Vec<_>>>()?;
    let combined = branches.join(if union.all { " UNION ALL " } else { " UNION " });

    let wrap = union.reaggregate
        || !union.order_by.is_empty()
        || union.skip.is_some()
        || union.limit.is_some();
    if !wrap {
        return Ok(combined);
    }

    let columns = union
        .columns
        .iter()
        .map(|column| {
            let name = quote_ident(&column.name);
            match column.merge {
                Some(merge) if union.reaggregate => format!("{}({}) AS {}", merge, name, name),
                _ => name,
            }
        })
        .collect::<Vec<_>>();
    let mut sql = format!("SELECT {} FROM ({}) AS merged", columns.join(", "), combined);

    if union.reaggregate {
        let keys = union
            .columns
            .iter()
            .filter(|column| column.merge.is_none())
            .map(|column| quote_ident(&column.name))
            .collect::<Vec<_>>();
        if !keys.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&keys.join(", "));
        }
    }
    if !union.order_by.is_empty() {
        let keys = union
            .order_by
            .iter()
            .map(|(name, descending)| {
                if *descending {
                    format!("{} DESC", quote_ident(name))
                } else {
                    quote_ident(name)
                }
            })
            .collect::<Vec<_>>();
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }

    let renderer = SqlRenderer::new(first);
    if let Some(limit) = &union.limit {
        sql.push_str(" LIMIT ");
        sql.push_str(&renderer.expr(&first.tree.root, limit)?);
    }
    if let Some(skip) = &union.skip {
        sql.push_str(" OFFSET ");
        sql.push_str(&renderer.expr(&first.tree.root, skip)?);
    }
    Ok(sql)
}
