//! Variables of one lowering run.
//!
//! Every variable gets a `unique_name` ([`VarId`]) once, at creation; it is
//! the only key used by the internal maps. Display names may repeat across
//! scopes (`WITH a AS b WITH b AS a`).
//!
//! Relationships, paths and aliases refer to other variables by id only; the
//! [`VarTable`] owns all of them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::graph_catalog::graph_topology::{RelationshipBinding, TableBinding};
use crate::open_cypher_parser::ast::Direction;
use crate::query_planner::logical_expr::LogicalExpr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(String);

impl VarId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VarId {
    fn from(value: &str) -> Self {
        VarId(value.to_string())
    }
}

impl From<String> for VarId {
    fn from(value: String) -> Self {
        VarId(value)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Semantic type of a variable, as seen by the type checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Node,
    Relationship,
    Path,
    Scalar,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Node => write!(f, "node"),
            VarType::Relationship => write!(f, "relationship"),
            VarType::Path => write!(f, "path"),
            VarType::Scalar => write!(f, "scalar"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeVar {
    pub labels: BTreeSet<String>,
    pub restriction: Option<LogicalExpr>,
    /// Property -> outermost scope reading it; filled by `MarkPropertiesAsUsed`.
    pub properties_required: BTreeMap<String, usize>,
    pub binding: Option<TableBinding>,
}

/// The edge a relationship variable stands for.
///
/// `left`/`right` are the pattern's endpoints as written; they resolve
/// (directly or through one alias) to node variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub left: VarId,
    pub right: VarId,
    pub direction: Direction,
    pub types: Vec<String>,
    pub restriction: Option<LogicalExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelVar {
    pub relationship: Relationship,
    pub properties_required: BTreeMap<String, usize>,
    pub binding: Option<RelationshipBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathVar {
    /// Number of relationships in the path.
    pub hops: usize,
    /// Alternating node and relationship variables, node first.
    pub elements: Vec<VarId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasVar {
    pub expr: LogicalExpr,
    /// Set by `ComputeAliasVarType`.
    pub ty: Option<VarType>,
}

/// Name holder for an unaliased projection column.
#[derive(Debug, Clone, PartialEq)]
pub struct TempVar {
    pub column_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarKind {
    Node(NodeVar),
    Rel(RelVar),
    Path(PathVar),
    Alias(AliasVar),
    Temp(TempVar),
}

impl VarKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            VarKind::Node(_) => "a node",
            VarKind::Rel(_) => "a relationship",
            VarKind::Path(_) => "a path",
            VarKind::Alias(_) => "an alias",
            VarKind::Temp(_) => "a temporary",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub unique_name: VarId,
    /// Index of the scope that declares the variable.
    pub scope: usize,
    pub kind: VarKind,
}

impl Variable {
    /// Type known without looking at other variables; aliases need the table.
    pub fn static_type(&self) -> Option<VarType> {
        match &self.kind {
            VarKind::Node(_) => Some(VarType::Node),
            VarKind::Rel(_) => Some(VarType::Relationship),
            VarKind::Path(_) => Some(VarType::Path),
            VarKind::Alias(alias) => alias.ty,
            VarKind::Temp(_) => Some(VarType::Scalar),
        }
    }
}

/// All variables of one lowering run, keyed by unique name, plus the
/// textual dependencies between them.
#[derive(Debug, Clone, Default)]
pub struct VarTable {
    vars: BTreeMap<VarId, Variable>,
    dependencies: BTreeMap<VarId, BTreeSet<VarId>>,
}

impl VarTable {
    pub fn insert(&mut self, var: Variable) -> VarId {
        let id = var.unique_name.clone();
        if !matches!(var.kind, VarKind::Temp(_)) {
            self.dependencies.insert(id.clone(), defining_dependencies(&var));
        }
        self.vars.insert(id.clone(), var);
        id
    }

    pub fn get(&self, id: &VarId) -> Option<&Variable> {
        self.vars.get(id)
    }

    pub fn get_mut(&mut self, id: &VarId) -> Option<&mut Variable> {
        self.vars.get_mut(id)
    }

    pub fn remove(&mut self, id: &VarId) -> Option<Variable> {
        self.dependencies.remove(id);
        for deps in self.dependencies.values_mut() {
            deps.remove(id);
        }
        self.vars.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    pub fn ids(&self) -> Vec<VarId> {
        self.vars.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables `id`'s definition refers to.
    pub fn dependencies_of(&self, id: &VarId) -> Option<&BTreeSet<VarId>> {
        self.dependencies.get(id)
    }

    /// Transposed dependency edges: the variables whose definition refers to `id`.
    pub fn dependents_of(&self, id: &VarId) -> BTreeSet<VarId> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.contains(id))
            .map(|(dependent, _)| dependent.clone())
            .collect()
    }

    /// Recompute the dependency set after a definition changed.
    pub fn refresh_dependencies(&mut self, id: &VarId) {
        if let Some(var) = self.vars.get(id) {
            if !matches!(var.kind, VarKind::Temp(_)) {
                let deps = defining_dependencies(var);
                self.dependencies.insert(id.clone(), deps);
            }
        }
    }

    /// Follows aliases that directly name another variable (`WITH a AS b`)
    /// down to the variable they stand for. Other ids resolve to themselves.
    pub fn resolve_alias_var<'a>(&'a self, id: &'a VarId) -> &'a VarId {
        let mut current = id;
        // bounded by the table size; alias chains cannot be cyclic
        for _ in 0..=self.vars.len() {
            match self.vars.get(current).map(|v| &v.kind) {
                Some(VarKind::Alias(AliasVar {
                    expr: LogicalExpr::Variable(target),
                    ..
                })) => current = target,
                _ => return current,
            }
        }
        current
    }

    /// Type of `id`, looking through aliases.
    pub fn var_type(&self, id: &VarId) -> Option<VarType> {
        let resolved = self.resolve_alias_var(id);
        self.vars.get(resolved).and_then(Variable::static_type)
    }

    pub fn is_aggregate_alias(&self, id: &VarId) -> bool {
        matches!(
            self.vars.get(id).map(|v| &v.kind),
            Some(VarKind::Alias(alias)) if alias.expr.contains_aggregate()
        )
    }
}

fn defining_dependencies(var: &Variable) -> BTreeSet<VarId> {
    match &var.kind {
        VarKind::Node(node) => node
            .restriction
            .as_ref()
            .map(|r| r.variables())
            .unwrap_or_default()
            .into_iter()
            .filter(|dep| dep != &var.unique_name)
            .collect(),
        VarKind::Rel(rel) => {
            let mut deps: BTreeSet<VarId> = rel
                .relationship
                .restriction
                .as_ref()
                .map(|r| r.variables())
                .unwrap_or_default();
            deps.insert(rel.relationship.left.clone());
            deps.insert(rel.relationship.right.clone());
            deps.remove(&var.unique_name);
            deps
        }
        VarKind::Path(path) => path.elements.iter().cloned().collect(),
        VarKind::Alias(alias) => alias.expr.variables(),
        VarKind::Temp(_) => BTreeSet::new(),
    }
}

/// Hands out unique names for one translation.
///
/// `fresh("a")` returns `a`, then `a_1`, `a_2`, ...
#[derive(Debug, Clone, Default)]
pub struct NamingContext {
    used: BTreeSet<String>,
    next_subquery: usize,
}

impl NamingContext {
    pub fn fresh(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut suffix = 1;
        loop {
            let candidate = format!("{}_{}", base, suffix);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// `with_0`, `with_1`, ... skipping names already taken by variables.
    pub fn fresh_subquery_name(&mut self) -> String {
        loop {
            let candidate = format!("with_{}", self.next_subquery);
            self.next_subquery += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Names visible at one point of the query, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailableVariables {
    entries: Vec<(String, VarId)>,
}

impl AvailableVariables {
    pub fn get(&self, name: &str) -> Option<&VarId> {
        self.entries
            .iter()
            .find(|(visible, _)| visible == name)
            .map(|(_, id)| id)
    }

    /// Binds `name`, replacing an earlier binding of the same name.
    pub fn insert(&mut self, name: impl Into<String>, id: VarId) {
        let name = name.into();
        match self.entries.iter_mut().find(|(visible, _)| *visible == name) {
            Some(entry) => entry.1 = id,
            None => self.entries.push((name, id)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VarId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
