//! End-to-end translation of one Cypher query into SQL.
//!
//! ```text
//! source ──expand──> variants ──parse, lower (rayon)──> lowered trees
//!        ──merge──> single tree or UNION ──render──> SQL
//! ```

use rayon::prelude::*;

use crate::{
    config::TranslatorConfig,
    graph_catalog::graph_topology::GraphTopologyLookup,
    open_cypher_parser::parse_query,
    path_expansion::{PathExpander, VariableLengthExpander},
    query_planner::{expansion_merger, logical_plan::LoweredQuery, lower_query},
    sql_generator::render_merged,
};

pub mod errors;

pub use errors::TranslateError;

pub struct Translator {
    config: TranslatorConfig,
    expander: Box<dyn PathExpander + Send + Sync>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(TranslatorConfig::default())
    }
}

impl Translator {
    pub fn new(config: TranslatorConfig) -> Self {
        let expander = Box::new(VariableLengthExpander::from_config(&config));
        Translator { config, expander }
    }

    /// Replaces the variable-length expander, e.g. with
    /// [`IdentityExpander`](crate::path_expansion::IdentityExpander).
    pub fn with_expander(mut self, expander: Box<dyn PathExpander + Send + Sync>) -> Self {
        self.expander = expander;
        self
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn translate(
        &self,
        gtop: &(dyn GraphTopologyLookup + Sync),
        source: &str,
    ) -> Result<String, TranslateError> {
        let variants = self.expander.expand(gtop, source)?;
        log::debug!("translating {} query variants", variants.len());

        let lowered = if self.config.parallel_lowering && variants.len() > 1 {
            variants
                .par_iter()
                .map(|variant| lower_variant(gtop, variant))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            variants
                .iter()
                .map(|variant| lower_variant(gtop, variant))
                .collect::<Result<Vec<_>, _>>()?
        };

        let merged = expansion_merger::merge(lowered, self.config.union_distinct)?;
        let sql = render_merged(&merged)?;
        log::debug!("generated SQL: {}", sql);
        Ok(sql)
    }
}

fn lower_variant(
    gtop: &(dyn GraphTopologyLookup + Sync),
    source: &str,
) -> Result<LoweredQuery, TranslateError> {
    let query = parse_query(source).map_err(|e| TranslateError::Parse {
        message: e.hint(),
    })?;
    Ok(lower_query(&query, gtop)?)
}

/// Translates with the default configuration.
pub fn translate(
    gtop: &(dyn GraphTopologyLookup + Sync),
    source: &str,
) -> Result<String, TranslateError> {
    Translator::default().translate(gtop, source)
}
