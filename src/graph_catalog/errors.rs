//! Errors raised while loading a graph topology document or looking up the
//! tables behind labels and relationship types.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphTopologyError {
    #[error("No node table found for labels `{labels}`")]
    NodeLabels { labels: String },
    #[error("Labels `{labels}` match several node tables: {candidates}")]
    AmbiguousNodeLabels { labels: String, candidates: String },
    #[error("No relationship table found for `{types}` between `{left}` and `{right}`")]
    Relationship {
        types: String,
        left: String,
        right: String,
    },
    #[error("Relationship `{types}` between `{left}` and `{right}` matches several tables: {candidates}")]
    AmbiguousRelationship {
        types: String,
        left: String,
        right: String,
        candidates: String,
    },
    #[error("Failed to read graph topology file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse graph topology: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid graph topology: {message}")]
    InvalidConfig { message: String },
}

impl GraphTopologyError {
    /// Lookup failures are caused by the query, everything else by the document.
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            GraphTopologyError::NodeLabels { .. }
                | GraphTopologyError::AmbiguousNodeLabels { .. }
                | GraphTopologyError::Relationship { .. }
                | GraphTopologyError::AmbiguousRelationship { .. }
        )
    }
}

/// `A:B`, or `*` for an unrestricted label set.
pub(crate) fn display_labels<'a, I>(labels: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let joined = labels
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(":");
    if joined.is_empty() {
        "*".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_errors_name_the_labels() {
        let err = GraphTopologyError::NodeLabels {
            labels: "Person".to_string(),
        };
        assert!(err.to_string().contains("Person"));
        assert!(err.is_lookup_error());
        assert!(!GraphTopologyError::InvalidConfig {
            message: "x".to_string()
        }
        .is_lookup_error());
    }

    #[test]
    fn test_display_labels() {
        let labels = vec!["Admin".to_string(), "Person".to_string()];
        assert_eq!(display_labels(&labels), "Admin:Person");
        assert_eq!(display_labels(&Vec::<String>::new()), "*");
    }
}
