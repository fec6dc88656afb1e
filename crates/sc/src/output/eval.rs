//! Evaluation output formatting.

use chrono::{DateTime, Utc};
use collection_engine_rs::{Freshness, MembershipView};
use collection_library_rs::models::{EntityId, LibraryEntity};
use owo_colors::OwoColorize;
use serde::Serialize;

use super::helpers::{format_freshness, format_timestamp, header_line, truncate_str};

/// JSON output structure for the eval command.
#[derive(Serialize)]
pub struct EvalOutput<'a> {
    pub filter: String,
    pub name: &'a str,
    pub scope: String,
    pub freshness: Freshness,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<&'a str>,
    pub count: usize,
    pub entities: Vec<EntityOutput<'a>>,
}

/// JSON output structure for one matching entity.
#[derive(Serialize)]
pub struct EntityOutput<'a> {
    pub id: EntityId,
    pub name: &'a str,
}

impl<'a> EvalOutput<'a> {
    /// Builds the output for a settled membership.
    pub fn new(name: &'a str, view: &'a MembershipView, entities: &'a [LibraryEntity]) -> Self {
        Self {
            filter: view.key.filter.to_string(),
            name,
            scope: view.key.user.to_string(),
            freshness: view.freshness,
            generation: view.generation(),
            computed_at: view.snapshot.computed_at,
            failure: view.failure.as_deref(),
            count: view.matching().len(),
            entities: entities
                .iter()
                .map(|e| EntityOutput {
                    id: e.id,
                    name: &e.name,
                })
                .collect(),
        }
    }
}

/// Formats an evaluation result as JSON.
pub fn format_eval_json(output: &EvalOutput<'_>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(output)
}

/// Formats an evaluation result as a summary line followed by the matching entities.
pub fn format_eval_table(output: &EvalOutput<'_>, use_colors: bool) -> String {
    let mut text = String::new();

    let title = if output.name.is_empty() {
        output.filter.clone()
    } else {
        output.name.to_string()
    };
    if use_colors {
        text.push_str(&format!("{}", title.bold()));
    } else {
        text.push_str(&title);
    }
    text.push_str(&format!(
        " [{}] {} match(es), generation {}, {}\n",
        output.scope,
        output.count,
        output.generation,
        format_freshness(output.freshness, use_colors)
    ));
    if let Some(at) = output.computed_at {
        text.push_str(&format!("Computed: {}\n", format_timestamp(at)));
    }
    if let Some(failure) = output.failure {
        let line = format!("Last recompute failed: {failure}");
        if use_colors {
            text.push_str(&format!("{}\n", line.red()));
        } else {
            text.push_str(&line);
            text.push('\n');
        }
    }

    if output.entities.is_empty() {
        text.push_str("No matching entities.\n");
        return text;
    }

    text.push('\n');
    text.push_str(&header_line(&format!("{:<8} {}", "ID", "Name"), use_colors));
    for entity in &output.entities {
        text.push_str(&format!(
            "{:<8} {}\n",
            entity.id.to_string(),
            truncate_str(entity.name, 60)
        ));
    }

    text
}
