//! Variable-length path expansion.
//!
//! Lowering only handles fixed-length patterns. Before a query is parsed,
//! every anonymous variable-length relationship is rewritten into chains of
//! plain relationships, one query text per combination of hop counts:
//!
//! ```text
//! MATCH (a)-[:KNOWS*1..2]->(b) RETURN b
//!   => MATCH (a)-[:KNOWS]->(b) RETURN b
//!   => MATCH (a)-[:KNOWS]->()-[:KNOWS]->(b) RETURN b
//! ```
//!
//! Variants come out in ascending hop order, the leftmost pattern varying
//! slowest.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::{
    config::TranslatorConfig, graph_catalog::graph_topology::GraphTopologyLookup,
    query_planner::errors::ErrorCategory,
};

/// Captures: (1) left arrow, (2) variable, (3) `:TYPES`, (4) min hops,
/// (5) `..`, (6) max hops, (7) property map, (8) right arrow
static VAR_LENGTH_RELATIONSHIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(<?-)\[\s*([A-Za-z_][A-Za-z0-9_]*)?\s*(:[^*\]{]*?)?\s*\*\s*(\d+)?\s*(\.\.\s*(\d+)?)?\s*(\{[^}]*\})?\s*\](->|-)",
    )
    .unwrap()
});

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpansionError {
    #[error("Unsupported variable-length relationship `{pattern}`: {reason}")]
    Unsupported { pattern: String, reason: String },

    #[error("Invalid hop range in `{pattern}`: minimum exceeds maximum")]
    InvalidRange { pattern: String },

    #[error("Query expands into {variants} fixed-length variants, more than the limit of {limit}")]
    TooManyVariants { variants: usize, limit: usize },
}

impl ExpansionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExpansionError::Unsupported { .. } => ErrorCategory::UnsupportedFeature,
            ExpansionError::InvalidRange { .. } | ExpansionError::TooManyVariants { .. } => {
                ErrorCategory::UserQuery
            }
        }
    }
}

/// Turns one source query into the fixed-length query texts to lower.
pub trait PathExpander {
    fn expand(
        &self,
        gtop: &dyn GraphTopologyLookup,
        source: &str,
    ) -> Result<Vec<String>, ExpansionError>;
}

/// Leaves the query as it is; variable-length patterns then fail in lowering.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityExpander;

impl PathExpander for IdentityExpander {
    fn expand(
        &self,
        _gtop: &dyn GraphTopologyLookup,
        source: &str,
    ) -> Result<Vec<String>, ExpansionError> {
        Ok(vec![source.to_string()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLengthExpander {
    /// Upper bound for `*`, `*n..`
    pub max_hops: u32,
    pub max_variants: usize,
}

impl Default for VariableLengthExpander {
    fn default() -> Self {
        Self::from_config(&TranslatorConfig::default())
    }
}

/// One variable-length relationship found in the source text.
struct Segment {
    start: usize,
    end: usize,
    left: String,
    body: String,
    right: String,
    hops: std::ops::RangeInclusive<u32>,
}

impl Segment {
    fn render(&self, hops: u32) -> String {
        let hop = format!("{}[{}]{}", self.left, self.body, self.right);
        vec![hop; hops as usize].join("()")
    }
}

impl VariableLengthExpander {
    pub fn from_config(config: &TranslatorConfig) -> Self {
        VariableLengthExpander {
            max_hops: config.max_expansion_hops,
            max_variants: config.max_expansion_variants,
        }
    }

    fn segment(&self, captures: &Captures<'_>) -> Result<Segment, ExpansionError> {
        let whole = captures.get(0).map_or("", |m| m.as_str());
        let unsupported = |reason: &str| ExpansionError::Unsupported {
            pattern: whole.to_string(),
            reason: reason.to_string(),
        };
        if let Some(name) = captures.get(2) {
            return Err(unsupported(&format!(
                "the relationship variable `{}` would name a list of relationships",
                name.as_str()
            )));
        }

        let number = |group: usize| -> Result<Option<u32>, ExpansionError> {
            captures
                .get(group)
                .map(|m| {
                    m.as_str()
                        .parse::<u32>()
                        .map_err(|_| unsupported("hop count out of range"))
                })
                .transpose()
        };
        let min = number(4)?;
        let max = number(6)?;
        let (min, max) = match (min, captures.get(5).is_some(), max) {
            (Some(n), false, _) => (n, n),
            (None, false, _) => (1, self.max_hops),
            (min, true, max) => (min.unwrap_or(1), max.unwrap_or(self.max_hops)),
        };
        if min == 0 {
            return Err(unsupported("zero-length paths"));
        }
        if min > max {
            return Err(ExpansionError::InvalidRange {
                pattern: whole.to_string(),
            });
        }

        let types = captures.get(3).map_or("", |m| m.as_str().trim_end());
        let properties = captures.get(7).map_or(String::new(), |m| format!(" {}", m.as_str()));
        let span = captures.get(0).map_or(0..0, |m| m.range());
        Ok(Segment {
            start: span.start,
            end: span.end,
            left: captures.get(1).map_or("-", |m| m.as_str()).to_string(),
            body: format!("{}{}", types, properties),
            right: captures.get(8).map_or("-", |m| m.as_str()).to_string(),
            hops: min..=max,
        })
    }
}

impl PathExpander for VariableLengthExpander {
    fn expand(
        &self,
        _gtop: &dyn GraphTopologyLookup,
        source: &str,
    ) -> Result<Vec<String>, ExpansionError> {
        let segments = VAR_LENGTH_RELATIONSHIP
            .captures_iter(source)
            .map(|captures| self.segment(&captures))
            .collect::<Result<Vec<_>, _>>()?;
        if segments.is_empty() {
            return Ok(vec![source.to_string()]);
        }

        let variants = segments.iter().try_fold(1usize, |acc, segment| {
            acc.checked_mul(segment.hops.clone().count())
        });
        match variants {
            Some(count) if count <= self.max_variants => {
                log::debug!(
                    "expanding {} variable-length relationships into {} variants",
                    segments.len(),
                    count
                );
            }
            count => {
                return Err(ExpansionError::TooManyVariants {
                    variants: count.unwrap_or(usize::MAX),
                    limit: self.max_variants,
                })
            }
        }

        // cartesian product, first segment outermost
        let mut choices: Vec<Vec<u32>> = vec![Vec::new()];
        for segment in &segments {
            choices = choices
                .into_iter()
                .flat_map(|prefix| {
                    segment.hops.clone().map(move |hops| {
                        let mut next = prefix.clone();
                        next.push(hops);
                        next
                    })
                })
                .collect();
        }

        Ok(choices
            .into_iter()
            .map(|hops| {
                let mut query = String::with_capacity(source.len());
                let mut cursor = 0;
                for (segment, count) in segments.iter().zip(hops) {
                    query.push_str(&source[cursor..segment.start]);
                    query.push_str(&segment.render(count));
                    cursor = segment.end;
                }
                query.push_str(&source[cursor..]);
                log::trace!("expanded variant: {}", query);
                query
            })
            .collect())
    }
}
