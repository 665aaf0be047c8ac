use thiserror::Error;

use crate::{
    path_expansion::ExpansionError,
    query_planner::errors::{ErrorCategory, LoweringError},
    sql_generator::RenderError,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslateError {
    #[error("Failed to parse query: {message}")]
    Parse { message: String },

    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    #[error(transparent)]
    Lowering(#[from] LoweringError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl TranslateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslateError::Parse { .. } => ErrorCategory::UserQuery,
            TranslateError::Expansion(e) => e.category(),
            TranslateError::Lowering(e) => e.category(),
            TranslateError::Render(e) => e.category(),
        }
    }
}
