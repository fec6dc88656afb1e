//! Operators command implementation.
//!
//! Prints the filter operator catalog.

use collection_engine_rs::filter::{describe_operators, OperatorCategory, OperatorDescriptor};

use super::{CommandContext, Result};
use crate::output::{format_operators_json, format_operators_table};

/// Executes the operators command.
pub fn execute(ctx: &CommandContext, category: Option<OperatorCategory>) -> Result<()> {
    let operators = select(describe_operators(), category);

    if ctx.json_output {
        println!("{}", format_operators_json(&operators)?);
    } else if !ctx.quiet {
        print!("{}", format_operators_table(&operators, ctx.use_colors));
    }

    Ok(())
}

fn select(
    operators: Vec<OperatorDescriptor>,
    category: Option<OperatorCategory>,
) -> Vec<OperatorDescriptor> {
    match category {
        Some(category) => operators
            .into_iter()
            .filter(|op| op.category == category)
            .collect(),
        None => operators,
    }
}
