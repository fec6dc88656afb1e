//! Operator catalog output formatting.

use collection_engine_rs::filter::{Arity, OperatorDescriptor, ParameterKind, ParameterSchema};
use owo_colors::OwoColorize;
use serde::Serialize;

use super::helpers::{category_name, header_line};

/// JSON output structure for the operators command.
#[derive(Serialize)]
pub struct OperatorsOutput<'a> {
    pub operators: &'a [OperatorDescriptor],
}

/// Formats the catalog as JSON.
pub fn format_operators_json(operators: &[OperatorDescriptor]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&OperatorsOutput { operators })
}

/// Formats the catalog as a table, one operator per line with its parameters below.
pub fn format_operators_table(operators: &[OperatorDescriptor], use_colors: bool) -> String {
    if operators.is_empty() {
        return "No operators found.\n".to_string();
    }

    let mut output = header_line(
        &format!("{:<22} {:<7} {:<5} {}", "Operator", "Group", "Deps", "Description"),
        use_colors,
    );

    for op in operators {
        let kind = format!("{:<22}", op.kind);
        let kind = if use_colors {
            kind.bold().to_string()
        } else {
            kind
        };
        output.push_str(&format!(
            "{} {:<7} {:<5} {}\n",
            kind,
            category_name(op.category),
            dependency_marks(op),
            op.description
        ));

        if op.children != Arity::None {
            output.push_str(&format!("{:<36}takes {}\n", "", op.children));
        }
        for param in op.parameters {
            output.push_str(&format!("{:<36}{}\n", "", describe_parameter(param)));
        }
    }

    output
}

/// `T` for time-dependent, `U` for user-dependent.
fn dependency_marks(op: &OperatorDescriptor) -> String {
    let mut marks = String::new();
    if op.time_dependent {
        marks.push('T');
    }
    if op.user_dependent {
        marks.push('U');
    }
    if marks.is_empty() {
        marks.push('-');
    }
    marks
}

fn describe_parameter(param: &ParameterSchema) -> String {
    let mut line = format!("{}: {}", param.name, param.kind);
    match param.kind {
        ParameterKind::Enumerated if !param.possible_values.is_empty() => {
            line.push_str(&format!(" [{}]", param.possible_values.join(", ")));
        }
        ParameterKind::Number => match (param.min, param.max) {
            (Some(min), Some(max)) => line.push_str(&format!(" ({min}..={max})")),
            (Some(min), None) => line.push_str(&format!(" (>= {min})")),
            (None, Some(max)) => line.push_str(&format!(" (<= {max})")),
            (None, None) => {}
        },
        _ => {}
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_engine_rs::filter::describe_operators;

    #[test]
    fn test_table_lists_every_operator() {
        let operators = describe_operators();
        let table = format_operators_table(&operators, false);
        for op in &operators {
            assert!(table.contains(op.kind), "missing {}", op.kind);
        }
    }

    #[test]
    fn test_table_shows_resolution_values() {
        let table = format_operators_table(&describe_operators(), false);
        assert!(table.contains("resolution: enumerated string ["));
        assert!(table.contains("1080p"));
    }

    #[test]
    fn test_table_marks_dependencies() {
        let operators = describe_operators();
        let watched = operators.iter().find(|op| op.kind == "WatchedWithinDays").unwrap();
        assert_eq!(dependency_marks(watched), "TU");
        let tag = operators.iter().find(|op| op.kind == "HasTag").unwrap();
        assert_eq!(dependency_marks(tag), "-");
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(format_operators_table(&[], false), "No operators found.\n");
    }

    #[test]
    fn test_json_shape() {
        let json = format_operators_json(&describe_operators()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let operators = value["operators"].as_array().unwrap();
        assert_eq!(operators.len(), 22);
        assert_eq!(operators[0]["kind"], "HasResolution");
        assert_eq!(operators[0]["category"], "files");
    }
}
