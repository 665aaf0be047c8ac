//! gtopsql - Cypher to SQL over a graph topology mapping
//!
//! This crate lowers read-only Cypher queries to SQL through:
//! - A graph topology ("gtop") document mapping labels and types to tables
//! - An openCypher parser for MATCH / WITH / RETURN queries
//! - Expansion of variable-length relationships into fixed-length variants
//! - A pass pipeline that builds and resolves the relational query tree
//! - SQL rendering, with a UNION over expanded variants

pub mod config;
pub mod graph_catalog;
pub mod open_cypher_parser;
pub mod path_expansion;
pub mod query_planner;
pub mod sql_generator;
pub mod translator;

pub use translator::{translate, TranslateError, Translator};
