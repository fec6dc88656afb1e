//! Output formatting utilities for the sc CLI.
//!
//! This module provides functions for formatting data as tables or JSON.
//! It is organized into submodules by command:
//!
//! - [`operators`] - Operator catalog output
//! - [`filters`] - Saved filter output (list, show, add, edit, rename, delete)
//! - [`eval`] - Evaluation results
//! - [`helpers`] - Common formatting utilities (truncation, freshness)

mod eval;
mod filters;
pub mod helpers;
mod operators;

// Operators
pub use operators::{format_operators_json, format_operators_table};

// Filters
pub use filters::{
    format_deleted_filter, format_filter_details_json, format_filter_details_table,
    format_filter_result, format_filters_json, format_filters_table,
};

// Eval
pub use eval::{format_eval_json, format_eval_table, EvalOutput};
