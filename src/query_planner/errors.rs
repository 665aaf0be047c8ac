use std::fmt::Display;

use thiserror::Error;

use crate::graph_catalog::errors::GraphTopologyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    VarDependencies,
    ComputeAliasVarType,
    SelectTreeBuilder,
    NameSubqueries,
    ComputeFromItems,
    MoveRestrictionInPattern,
    ExpandNodeVarWithGtop,
    PopulateJoins,
    ComputeExports,
    TransformFunctions,
    UnwrapPropertyAccess,
    UnwrapAliasVar,
    MarkPropertiesAsUsed,
    UnwrapAliasExpr,
    ExpansionMerger,
}

impl Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Pass::VarDependencies => "VarDependencies",
            Pass::ComputeAliasVarType => "ComputeAliasVarType",
            Pass::SelectTreeBuilder => "SelectTreeBuilder",
            Pass::NameSubqueries => "NameSubqueries",
            Pass::ComputeFromItems => "ComputeFromItems",
            Pass::MoveRestrictionInPattern => "MoveRestrictionInPattern",
            Pass::ExpandNodeVarWithGtop => "ExpandNodeVarWithGtop",
            Pass::PopulateJoins => "PopulateJoins",
            Pass::ComputeExports => "ComputeExports",
            Pass::TransformFunctions => "TransformFunctions",
            Pass::UnwrapPropertyAccess => "UnwrapPropertyAccess",
            Pass::UnwrapAliasVar => "UnwrapAliasVar",
            Pass::MarkPropertiesAsUsed => "MarkPropertiesAsUsed",
            Pass::UnwrapAliasExpr => "UnwrapAliasExpr",
            Pass::ExpansionMerger => "ExpansionMerger",
        };
        f.write_str(name)
    }
}

/// Who has to act on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The query text or the metadata it refers to is wrong.
    UserQuery,
    /// Recognised construct that cannot be lowered yet.
    UnsupportedFeature,
    /// A pass broke an invariant an earlier pass established.
    InternalInvariant,
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::UserQuery => write!(f, "user query error"),
            ErrorCategory::UnsupportedFeature => write!(f, "unsupported feature"),
            ErrorCategory::InternalInvariant => write!(f, "bug found"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoweringError {
    #[error("{pass}: variable `{name}` is not defined")]
    UndefinedVariable { pass: Pass, name: String },

    #[error("{pass}: variable `{name}` is already declared as {existing}")]
    VariableKindConflict {
        pass: Pass,
        name: String,
        existing: &'static str,
    },

    #[error("{pass}: {message}")]
    InvalidQuery { pass: Pass, message: String },

    #[error("{pass}: no table for `{hint}`: {source}")]
    Lookup {
        pass: Pass,
        hint: String,
        #[source]
        source: GraphTopologyError,
    },

    #[error("{pass}: unsupported: {feature}")]
    Unsupported { pass: Pass, feature: String },

    #[error("{pass}: bug found in {node_kind}: {message}")]
    InvariantViolation {
        pass: Pass,
        node_kind: &'static str,
        message: String,
    },
}

impl LoweringError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoweringError::UndefinedVariable { .. }
            | LoweringError::VariableKindConflict { .. }
            | LoweringError::InvalidQuery { .. }
            | LoweringError::Lookup { .. } => ErrorCategory::UserQuery,
            LoweringError::Unsupported { .. } => ErrorCategory::UnsupportedFeature,
            LoweringError::InvariantViolation { .. } => ErrorCategory::InternalInvariant,
        }
    }

    pub fn pass(&self) -> Pass {
        match self {
            LoweringError::UndefinedVariable { pass, .. }
            | LoweringError::VariableKindConflict { pass, .. }
            | LoweringError::InvalidQuery { pass, .. }
            | LoweringError::Lookup { pass, .. }
            | LoweringError::Unsupported { pass, .. }
            | LoweringError::InvariantViolation { pass, .. } => *pass,
        }
    }

    pub fn invalid(pass: Pass, message: impl Into<String>) -> Self {
        LoweringError::InvalidQuery {
            pass,
            message: message.into(),
        }
    }

    pub fn unsupported(pass: Pass, feature: impl Into<String>) -> Self {
        LoweringError::Unsupported {
            pass,
            feature: feature.into(),
        }
    }

    pub fn bug(pass: Pass, node_kind: &'static str, message: impl Into<String>) -> Self {
        LoweringError::InvariantViolation {
            pass,
            node_kind,
            message: message.into(),
        }
    }
}

pub type LoweringResult<T> = Result<T, LoweringError>;
