//! Unit tests - Tests that exercise single components through the public API
//!
//! These tests need no external services or topology files.

mod expansion_tests;
mod parser_robustness_tests;
