use std::fmt;

/// A parsed read query: the clauses in source order.
///
/// The parser accepts any clause sequence; checking that the query ends
/// with exactly one RETURN is left to lowering so that partial queries
/// (e.g. a lone MATCH) can still be inspected.
#[derive(Debug, PartialEq, Clone)]
pub struct CypherQuery<'a> {
    pub clauses: Vec<Clause<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Clause<'a> {
    Match(MatchClause<'a>),
    With(ProjectionClause<'a>),
    Return(ProjectionClause<'a>),
}

impl Clause<'_> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Clause::Match(m) if m.optional => "OPTIONAL MATCH",
            Clause::Match(_) => "MATCH",
            Clause::With(_) => "WITH",
            Clause::Return(_) => "RETURN",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct MatchClause<'a> {
    pub optional: bool,
    pub patterns: Vec<PathPattern<'a>>,
    pub where_clause: Option<Expression<'a>>,
}

/// Shared shape of WITH and RETURN.
#[derive(Debug, PartialEq, Clone)]
pub struct ProjectionClause<'a> {
    pub distinct: bool,
    pub items: Vec<ProjectionItem<'a>>,
    pub order_by: Vec<SortItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
    /// Only legal after WITH.
    pub where_clause: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ProjectionItem<'a> {
    pub expression: Expression<'a>,
    pub alias: Option<&'a str>,
    /// Source text of the expression, used as the column name when unaliased.
    pub original_text: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub enum SortItem<'a> {
    Asc(Expression<'a>),
    Desc(Expression<'a>),
}

impl<'a> SortItem<'a> {
    pub fn expression(&self) -> &Expression<'a> {
        match self {
            SortItem::Asc(e) | SortItem::Desc(e) => e,
        }
    }
}

/// `p = (a)-[r]->(b)<-[s]-(c)`
///
/// Invariant: `nodes.len() == relationships.len() + 1`; relationship `i`
/// connects `nodes[i]` (left) and `nodes[i + 1]` (right).
#[derive(Debug, PartialEq, Clone)]
pub struct PathPattern<'a> {
    pub variable: Option<&'a str>,
    pub nodes: Vec<NodePattern<'a>>,
    pub relationships: Vec<RelationshipPattern<'a>>,
}

impl<'a> PathPattern<'a> {
    /// `(left, relationship, right)` triples in chain order.
    pub fn connections(
        &self,
    ) -> impl Iterator<Item = (&NodePattern<'a>, &RelationshipPattern<'a>, &NodePattern<'a>)> {
        self.relationships
            .iter()
            .enumerate()
            .map(move |(i, rel)| (&self.nodes[i], rel, &self.nodes[i + 1]))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct NodePattern<'a> {
    pub name: Option<&'a str>,
    pub labels: Vec<&'a str>,
    pub properties: Option<Vec<(&'a str, Expression<'a>)>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RelationshipPattern<'a> {
    pub name: Option<&'a str>,
    pub direction: Direction,
    pub types: Vec<&'a str>,
    pub properties: Option<Vec<(&'a str, Expression<'a>)>>,
    pub variable_length: Option<VariableLength>,
}

/// `*`, `*2`, `*1..3`, `*..5`, `*2..`
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct VariableLength {
    pub min_hops: Option<u32>,
    pub max_hops: Option<u32>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Direction {
    /// `<-[]-`
    Left,
    /// `-[]->`
    Right,
    /// `-[]-`
    Both,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "LEFT"),
            Direction::Right => write!(f, "RIGHT"),
            Direction::Both => write!(f, "BOTH"),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal<'a> {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Text between the quotes, backslash escapes still in place.
    String(&'a str),
    Null,
}

/// Resolves the backslash escapes of a string literal's raw text.
pub fn unescape_string(raw: &str) -> String {
    let mut unescaped = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => unescaped.extend(chars.next()),
            other => unescaped.push(other),
        }
    }
    unescaped
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Operator {
    // binary
    Addition,
    Subtraction,
    Multiplication,
    Division,
    ModuloDivision,
    Exponentiation,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanEqual,
    GreaterThanEqual,
    RegexMatch,
    And,
    Or,
    Xor,
    In,
    StartsWith,
    EndsWith,
    Contains,
    // unary
    Not,
    Negation,
    // postfix
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            Operator::Not | Operator::Negation | Operator::IsNull | Operator::IsNotNull
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct OperatorApplication<'a> {
    pub operator: Operator,
    pub operands: Vec<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyAccess<'a> {
    pub base: Box<Expression<'a>>,
    pub key: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    pub distinct: bool,
    pub args: Vec<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression<'a> {
    Literal(Literal<'a>),
    Variable(&'a str),
    /// `$name`, stored without the `$`.
    Parameter(&'a str),
    List(Vec<Expression<'a>>),
    Map(Vec<(&'a str, Expression<'a>)>),
    PropertyAccessExp(PropertyAccess<'a>),
    OperatorApplicationExp(OperatorApplication<'a>),
    FunctionCallExp(FunctionCall<'a>),
    /// The `*` of `count(*)`.
    Star,
}

impl fmt::Display for Expression<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for CypherQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "CypherQuery")?;
        let last = self.clauses.len().saturating_sub(1);
        for (i, clause) in self.clauses.iter().enumerate() {
            let branch = if i == last { "└──" } else { "├──" };
            writeln!(f, "{} {}[{}]: {:#?}", branch, clause.kind_name(), i, clause)?;
        }
        Ok(())
    }
}
