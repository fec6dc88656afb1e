//! Common helper functions for output formatting.

use chrono::{DateTime, Local, Utc};
use collection_engine_rs::filter::OperatorCategory;
use collection_engine_rs::Freshness;
use owo_colors::OwoColorize;

/// Truncates an ID to 8 characters for display.
pub fn truncate_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Truncates a string to a maximum number of characters.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        s.to_string()
    }
}

/// Lowercase name of an operator category.
pub fn category_name(category: OperatorCategory) -> &'static str {
    match category {
        OperatorCategory::Files => "files",
        OperatorCategory::Info => "info",
        OperatorCategory::Dates => "dates",
        OperatorCategory::User => "user",
        OperatorCategory::Logic => "logic",
    }
}

/// Formats a freshness state, colored by severity.
pub fn format_freshness(freshness: Freshness, use_colors: bool) -> String {
    let label = freshness.as_str();
    if !use_colors {
        return label.to_string();
    }
    match freshness {
        Freshness::Fresh => label.green().to_string(),
        Freshness::StaleTime | Freshness::StaleMutation => label.yellow().to_string(),
        Freshness::Degraded => label.red().to_string(),
    }
}

/// Formats a timestamp in local time.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Dims a header line when colors are on.
pub fn header_line(header: &str, use_colors: bool) -> String {
    if use_colors {
        format!("{}\n", header.dimmed())
    } else {
        format!("{header}\n")
    }
}
