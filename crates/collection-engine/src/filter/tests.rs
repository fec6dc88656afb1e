//! Tests for the catalog, the wire format and structural equality.

use super::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use collection_library_rs::models::AnimeType;
use serde_json::json;

// ==================== Test Helpers ====================

fn parse(value: serde_json::Value) -> FilterResult<FilterNode> {
    let raw: RawFilterNode = serde_json::from_value(value).unwrap();
    FilterNode::try_from(raw)
}

fn hash_of(node: &FilterNode) -> u64 {
    let mut hasher = DefaultHasher::new();
    node.hash(&mut hasher);
    hasher.finish()
}

fn scenario_tree() -> FilterNode {
    FilterNode::and(vec![
        FilterNode::has_resolution("1080p").unwrap(),
        FilterNode::negate(FilterNode::IsWatched),
    ])
}

// ==================== Wire Format Tests ====================

#[test]
fn test_parse_leaf() {
    let node = parse(json!({"type": "HasTag", "parameters": {"tag": "Comedy"}})).unwrap();
    assert_eq!(
        node,
        FilterNode::HasTag {
            tag: "comedy".to_string()
        }
    );
}

#[test]
fn test_parse_kind_case_insensitive() {
    let node = parse(json!({"type": "isfavorite"})).unwrap();
    assert_eq!(node, FilterNode::IsFavorite);
}

#[test]
fn test_parse_composite() {
    let node = parse(json!({
        "type": "And",
        "children": [
            {"type": "HasResolution", "parameters": {"resolution": "1080P"}},
            {"type": "Not", "children": [{"type": "IsWatched"}]}
        ]
    }))
    .unwrap();
    assert_eq!(node, scenario_tree());
}

#[test]
fn test_serialize_shape() {
    let value = serde_json::to_value(scenario_tree()).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "And",
            "children": [
                {"type": "HasResolution", "parameters": {"resolution": "1080p"}},
                {"type": "Not", "children": [{"type": "IsWatched"}]}
            ]
        })
    );
}

#[test]
fn test_reload_is_structurally_equal() {
    let tree = FilterNode::or(vec![
        FilterNode::HasAnyTag {
            tags: ["drama".to_string(), "comedy".to_string()].into(),
        },
        FilterNode::AiredAfter {
            date: chrono::NaiveDate::from_ymd_opt(2020, 4, 1).unwrap(),
        },
        FilterNode::HasAnimeType {
            anime_type: AnimeType::OVA,
        },
        FilterNode::WatchedWithinDays { days: 14 },
    ]);

    let json = serde_json::to_string(&tree).unwrap();
    let reloaded: FilterNode = serde_json::from_str(&json).unwrap();

    assert_eq!(reloaded, tree);
    assert_eq!(hash_of(&reloaded), hash_of(&tree));
}

// ==================== Validation Tests ====================

#[test]
fn test_unknown_operator_with_suggestion() {
    let err = parse(json!({"type": "HasResoluton"})).unwrap_err();
    assert_eq!(err.len(), 1);
    assert!(matches!(
        &err.errors()[0],
        FilterError::UnknownOperator {
            suggestion: Some("HasResolution"),
            ..
        }
    ));
}

#[test]
fn test_unknown_operator_without_suggestion() {
    let err = parse(json!({"type": "Frobnicate"})).unwrap_err();
    assert!(matches!(
        &err.errors()[0],
        FilterError::UnknownOperator {
            suggestion: None,
            ..
        }
    ));
}

#[test]
fn test_out_of_domain_resolution() {
    let err = parse(json!({"type": "HasResolution", "parameters": {"resolution": "1081p"}}))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("1081p"));
    assert!(message.contains("1080p"));
}

#[test]
fn test_missing_and_unknown_parameters() {
    let err = parse(json!({"type": "HasTag", "parameters": {"label": "x"}})).unwrap_err();
    assert_eq!(err.len(), 2);
    assert!(err
        .errors()
        .iter()
        .any(|e| matches!(e, FilterError::UnknownParameter { parameter, .. } if parameter == "label")));
    assert!(err
        .errors()
        .iter()
        .any(|e| matches!(e, FilterError::MissingParameter { parameter: "tag", .. })));
}

#[test]
fn test_wrong_parameter_type() {
    let err = parse(json!({"type": "AiredWithinDays", "parameters": {"days": "seven"}}))
        .unwrap_err();
    assert!(matches!(
        &err.errors()[0],
        FilterError::InvalidParameterType {
            expected: ParameterKind::Number,
            ..
        }
    ));
}

#[test]
fn test_number_bounds() {
    assert!(parse(json!({"type": "AiredWithinDays", "parameters": {"days": 0}})).is_err());
    assert!(parse(json!({"type": "UserRatingAtLeast", "parameters": {"rating": 11}})).is_err());
    assert!(parse(json!({"type": "UserRatingAtLeast", "parameters": {"rating": 10}})).is_ok());
}

#[test]
fn test_invalid_date() {
    let err = parse(json!({"type": "AiredAfter", "parameters": {"date": "2020-13-01"}}))
        .unwrap_err();
    assert!(matches!(&err.errors()[0], FilterError::OutOfDomain { .. }));
}

#[test]
fn test_arity_errors() {
    assert!(parse(json!({"type": "And", "children": []})).is_err());
    assert!(parse(json!({
        "type": "Not",
        "children": [{"type": "IsWatched"}, {"type": "IsFavorite"}]
    }))
    .is_err());
    assert!(parse(json!({"type": "IsWatched", "children": [{"type": "IsFavorite"}]})).is_err());
}

#[test]
fn test_all_errors_reported_with_paths() {
    let err = parse(json!({
        "type": "Or",
        "children": [
            {"type": "HasResolution", "parameters": {"resolution": "999p"}},
            {"type": "IsFavorite"},
            {"type": "Not", "children": [{"type": "Bogus"}]}
        ]
    }))
    .unwrap_err();

    let paths: Vec<&str> = err.errors().iter().map(FilterError::path).collect();
    assert_eq!(paths, vec!["$.children[0]", "$.children[2].children[0]"]);
    assert!(err.to_string().starts_with("2 validation errors"));
}

#[test]
fn test_deserialize_rejects_invalid_tree() {
    let result: Result<FilterNode, _> =
        serde_json::from_value(json!({"type": "HasTag", "parameters": {"tag": ""}}));
    assert!(result.is_err());
}

#[test]
fn test_validate_hand_built_tree() {
    assert!(scenario_tree().validate().is_ok());

    let empty_and = FilterNode::And(vec![]);
    assert!(empty_and.validate().is_err());

    let bad_resolution = FilterNode::HasResolution {
        resolution: "1080P".to_string(),
    };
    assert!(matches!(
        bad_resolution.validate().unwrap_err().errors()[0],
        FilterError::NonCanonical { .. }
    ));
}

// ==================== Equality and Hash Tests ====================

#[test]
fn test_equal_trees_hash_and_classify_equal() {
    let a = scenario_tree();
    let b = scenario_tree();

    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
    assert_eq!(a.dependencies(), b.dependencies());
}

#[test]
fn test_child_order_matters() {
    let a = FilterNode::and(vec![FilterNode::IsFavorite, FilterNode::IsFinished]);
    let b = FilterNode::and(vec![FilterNode::IsFinished, FilterNode::IsFavorite]);
    assert_ne!(a, b);
}

#[test]
fn test_parameters_compared_by_value() {
    let a = FilterNode::AiredWithinDays { days: 7 };
    let b = FilterNode::AiredWithinDays { days: 7 };
    let c = FilterNode::AddedWithinDays { days: 7 };

    assert_eq!(a, b);
    assert_ne!(a, c);
}

// ==================== Catalog Tests ====================

#[test]
fn test_describe_operators_covers_catalog() {
    let descriptors = describe_operators();
    assert_eq!(descriptors.len(), OperatorKind::ALL.len());

    let resolution = descriptors
        .iter()
        .find(|d| d.kind == "HasResolution")
        .unwrap();
    assert_eq!(resolution.parameters[0].possible_values, RESOLUTIONS);
    assert!(!resolution.time_dependent);

    let watched = descriptors.iter().find(|d| d.kind == "IsWatched").unwrap();
    assert!(watched.user_dependent);

    let not = descriptors.iter().find(|d| d.kind == "Not").unwrap();
    assert_eq!(not.children, Arity::Exactly(1));
}

#[test]
fn test_descriptor_json() {
    let value = serde_json::to_value(OperatorDescriptor::from(OperatorKind::AiredWithinDays))
        .unwrap();
    assert_eq!(value["kind"], "AiredWithinDays");
    assert_eq!(value["category"], "dates");
    assert_eq!(value["time_dependent"], true);
    assert_eq!(value["parameters"][0]["kind"], "number");
    assert_eq!(value["parameters"][0]["max"], MAX_DAYS);
    assert!(value["parameters"][0].get("possible_values").is_none());
}

#[test]
fn test_tags_round_trip() {
    for kind in OperatorKind::ALL {
        assert_eq!(OperatorKind::from_tag(kind.tag()), Some(kind));
    }
}

#[test]
fn test_parameter_kinds() {
    assert!(OperatorKind::IsWatched.parameter_kinds().is_empty());
    assert!(FilterNode::has_tag("x")
        .unwrap()
        .parameter_kinds()
        .contains(&ParameterKind::String));
}

#[test]
fn test_display() {
    assert_eq!(
        scenario_tree().to_string(),
        "HasResolution(1080p) AND NOT IsWatched"
    );
    let nested = FilterNode::negate(FilterNode::or(vec![
        FilterNode::IsFavorite,
        FilterNode::IsFinished,
    ]));
    assert_eq!(nested.to_string(), "NOT (IsFavorite OR IsFinished)");
}
