//! Saved filter output formatting.

use std::sync::Arc;

use collection_engine_rs::filter::{AttributeDomain, RawFilterNode};
use collection_engine_rs::membership::PersistedMembership;
use collection_engine_rs::{FilterDefinition, FilterId};
use owo_colors::OwoColorize;
use serde::Serialize;

use super::helpers::{format_timestamp, header_line, truncate_id, truncate_str};

/// JSON output structure for the filters list command.
#[derive(Serialize)]
pub struct FiltersListOutput<'a> {
    pub filters: Vec<FilterOutput<'a>>,
}

/// JSON output structure for a single filter.
#[derive(Serialize)]
pub struct FilterOutput<'a> {
    pub id: FilterId,
    pub name: &'a str,
    pub owner: String,
    pub target: &'static str,
    pub time_dependent: bool,
    pub user_dependent: bool,
    pub tree: RawFilterNode,
}

impl<'a> From<&'a FilterDefinition> for FilterOutput<'a> {
    fn from(definition: &'a FilterDefinition) -> Self {
        Self {
            id: definition.id,
            name: &definition.name,
            owner: definition.owner.to_string(),
            target: definition.target.as_str(),
            time_dependent: definition.is_time_dependent(),
            user_dependent: definition.is_user_dependent(),
            tree: RawFilterNode::from(definition.root.clone()),
        }
    }
}

/// Formats filters as JSON.
pub fn format_filters_json(filters: &[Arc<FilterDefinition>]) -> Result<String, serde_json::Error> {
    let output = FiltersListOutput {
        filters: filters.iter().map(|f| FilterOutput::from(f.as_ref())).collect(),
    };
    serde_json::to_string_pretty(&output)
}

/// Formats filters as a table.
pub fn format_filters_table(filters: &[Arc<FilterDefinition>], use_colors: bool) -> String {
    if filters.is_empty() {
        return "No filters found.\n".to_string();
    }

    let mut output = header_line(
        &format!(
            "{:<8} {:<24} {:<6} {:<10} {:<4} {}",
            "ID", "Name", "Target", "Owner", "Deps", "Tree"
        ),
        use_colors,
    );

    for filter in filters {
        let id_prefix = truncate_id(&filter.id.to_string());
        let name = truncate_str(&filter.name, 24);
        let owner = filter.owner.to_string();
        let deps = dependency_marks(filter);
        let tree = truncate_str(&filter.root.to_string(), 50);

        let line = format!(
            "{:<8} {:<24} {:<6} {:<10} {:<4} {}",
            id_prefix,
            name,
            filter.target.as_str(),
            owner,
            deps,
            tree
        );
        output.push_str(&line);
        output.push('\n');
    }

    output
}

fn dependency_marks(filter: &FilterDefinition) -> &'static str {
    match (filter.is_time_dependent(), filter.is_user_dependent()) {
        (true, true) => "TU",
        (true, false) => "T",
        (false, true) => "U",
        (false, false) => "-",
    }
}

/// JSON output structure for one cached membership.
#[derive(Serialize)]
pub struct MembershipSummary {
    pub user: String,
    pub generation: u64,
    pub matching: usize,
}

/// JSON output structure for filter details (filters show command).
#[derive(Serialize)]
pub struct FilterDetailsOutput<'a> {
    #[serde(flatten)]
    pub filter: FilterOutput<'a>,
    pub attributes: Vec<AttributeDomain>,
    pub created_at: String,
    pub last_modified: String,
    pub memberships: Vec<MembershipSummary>,
}

fn summarize(memberships: &[&PersistedMembership]) -> Vec<MembershipSummary> {
    memberships
        .iter()
        .map(|m| MembershipSummary {
            user: m.key.user.to_string(),
            generation: m.generation,
            matching: m.matching.len(),
        })
        .collect()
}

/// Formats filter details as JSON.
pub fn format_filter_details_json(
    definition: &FilterDefinition,
    memberships: &[&PersistedMembership],
) -> Result<String, serde_json::Error> {
    let output = FilterDetailsOutput {
        filter: FilterOutput::from(definition),
        attributes: definition.classification.attributes.iter().collect(),
        created_at: definition.created_at.to_rfc3339(),
        last_modified: definition.last_modified.to_rfc3339(),
        memberships: summarize(memberships),
    };
    serde_json::to_string_pretty(&output)
}

/// Formats filter details as a table.
pub fn format_filter_details_table(
    definition: &FilterDefinition,
    memberships: &[&PersistedMembership],
    use_colors: bool,
) -> String {
    let mut output = String::new();

    if use_colors {
        output.push_str(&format!("{}\n", definition.name.bold()));
    } else {
        output.push_str(&format!("{}\n", definition.name));
    }
    output.push_str(&format!("ID:        {}\n", definition.id));
    output.push_str(&format!("Target:    {}\n", definition.target));
    output.push_str(&format!("Owner:     {}\n", definition.owner));
    output.push_str(&format!(
        "Depends:   time={} user={}\n",
        definition.is_time_dependent(),
        definition.is_user_dependent()
    ));
    let attributes: Vec<String> = definition
        .classification
        .attributes
        .iter()
        .map(|a| domain_name(a).to_string())
        .collect();
    output.push_str(&format!("Reads:     {}\n", attributes.join(", ")));
    output.push_str(&format!("Created:   {}\n", format_timestamp(definition.created_at)));
    output.push_str(&format!(
        "Modified:  {}\n",
        format_timestamp(definition.last_modified)
    ));
    output.push_str(&format!("Tree:      {}\n", definition.root));

    if !memberships.is_empty() {
        output.push('\n');
        output.push_str(&header_line(
            &format!("{:<10} {:<10} {}", "Scope", "Generation", "Matching"),
            use_colors,
        ));
        for summary in summarize(memberships) {
            output.push_str(&format!(
                "{:<10} {:<10} {}\n",
                summary.user, summary.generation, summary.matching
            ));
        }
    }

    output
}

fn domain_name(domain: AttributeDomain) -> &'static str {
    match domain {
        AttributeDomain::Files => "files",
        AttributeDomain::Tags => "tags",
        AttributeDomain::Metadata => "metadata",
        AttributeDomain::Episodes => "episodes",
        AttributeDomain::Dates => "dates",
        AttributeDomain::UserState => "user_state",
    }
}

/// JSON output structure for add/edit/rename results.
#[derive(Serialize)]
pub struct FilterResultOutput<'a> {
    pub status: &'a str,
    #[serde(flatten)]
    pub filter: FilterOutput<'a>,
    #[serde(skip_serializing_if = "no_ids")]
    pub equivalent_to: &'a [FilterId],
}

fn no_ids(ids: &&[FilterId]) -> bool {
    ids.is_empty()
}

/// Formats the result of a filter mutation as JSON.
pub fn format_filter_result(
    status: &str,
    definition: &FilterDefinition,
    equivalents: &[FilterId],
) -> Result<String, serde_json::Error> {
    let output = FilterResultOutput {
        status,
        filter: FilterOutput::from(definition),
        equivalent_to: equivalents,
    };
    serde_json::to_string_pretty(&output)
}

/// Formats a deleted filter as JSON.
pub fn format_deleted_filter(definition: &FilterDefinition) -> Result<String, serde_json::Error> {
    let output = serde_json::json!({
        "status": "deleted",
        "id": definition.id,
        "name": definition.name,
    });
    serde_json::to_string_pretty(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_engine_rs::filter::FilterNode;
    use collection_engine_rs::{DefinitionStore, FilterDraft};

    fn definition(name: &str, root: FilterNode) -> Arc<FilterDefinition> {
        DefinitionStore::new()
            .create(FilterDraft::new(name, root))
            .unwrap()
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(format_filters_table(&[], false), "No filters found.\n");
    }

    #[test]
    fn test_table_row() {
        let def = definition(
            "Finished favorites",
            FilterNode::and(vec![FilterNode::IsFinished, FilterNode::IsFavorite]),
        );
        let table = format_filters_table(&[def.clone()], false);
        assert!(table.contains("Finished favorites"));
        assert!(table.contains("series"));
        assert!(table.contains("global"));
        assert!(table.contains("TU"));
        assert!(table.contains(&def.id.to_string()[..8]));
    }

    #[test]
    fn test_json_list_carries_wire_tree() {
        let def = definition("Done", FilterNode::IsFinished);
        let json = format_filters_json(&[def]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let filter = &value["filters"][0];
        assert_eq!(filter["name"], "Done");
        assert_eq!(filter["tree"]["type"], "IsFinished");
        assert_eq!(filter["time_dependent"], true);
        assert_eq!(filter["user_dependent"], false);
    }

    #[test]
    fn test_details_json() {
        let def = definition("Done", FilterNode::IsFinished);
        let json = format_filter_details_json(&def, &[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["id"], def.id.to_string());
        assert_eq!(value["attributes"], serde_json::json!(["dates"]));
        assert_eq!(value["memberships"], serde_json::json!([]));
    }

    #[test]
    fn test_result_json_omits_empty_equivalents() {
        let def = definition("Done", FilterNode::IsFinished);
        let json = format_filter_result("created", &def, &[]).unwrap();
        assert!(json.contains("\"status\": \"created\""));
        assert!(!json.contains("equivalent_to"));

        let other = FilterId::new();
        let json = format_filter_result("created", &def, &[other]).unwrap();
        assert!(json.contains(&other.to_string()));
    }
}
