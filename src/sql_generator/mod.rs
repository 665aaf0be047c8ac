//! SQL output.

pub mod errors;
pub mod function_registry;
pub mod to_sql;

pub use errors::{RenderError, RenderResult};
pub use to_sql::{quote_ident, render_lowered, render_merged, SqlRenderer};
