use thiserror::Error;

use crate::query_planner::errors::ErrorCategory;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("Unsupported in SQL output: {0}")]
    Unsupported(String),

    #[error("bug found while rendering {node_kind}: no FROM item supplies `{var}` in scope {scope}")]
    MissingSupplier {
        node_kind: &'static str,
        var: String,
        scope: usize,
    },

    #[error("bug found while rendering {node_kind}: {message}")]
    InvalidTree {
        node_kind: &'static str,
        message: String,
    },
}

impl RenderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RenderError::Unsupported(_) => ErrorCategory::UnsupportedFeature,
            RenderError::MissingSupplier { .. } | RenderError::InvalidTree { .. } => {
                ErrorCategory::InternalInvariant
            }
        }
    }

    pub(crate) fn invalid(node_kind: &'static str, message: impl Into<String>) -> Self {
        RenderError::InvalidTree {
            node_kind,
            message: message.into(),
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
