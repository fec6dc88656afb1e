//! Wire format for filter trees and its validator.
//!
//! Trees are stored and exchanged as untyped JSON nodes:
//!
//! ```json
//! { "type": "And", "children": [
//!     { "type": "HasResolution", "parameters": { "resolution": "1080p" } },
//!     { "type": "Not", "children": [ { "type": "IsWatched" } ] }
//! ] }
//! ```
//!
//! Converting a [`RawFilterNode`] into a [`FilterNode`] validates the whole
//! tree against the catalog and reports every violation at once.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDate;
use collection_library_rs::models::AnimeType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ast::FilterNode;
use super::catalog::{OperatorKind, ParameterKind, ParameterSchema, Parameterized};
use super::error::{FilterError, ValidationErrors};

/// Untyped form of a filter node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFilterNode {
    /// Operator kind tag.
    #[serde(rename = "type")]
    pub kind: String,

    /// Operator parameters by name.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,

    /// Child nodes, for composite operators.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawFilterNode>,
}

impl RawFilterNode {
    fn leaf(kind: OperatorKind) -> Self {
        Self {
            kind: kind.tag().to_string(),
            parameters: Map::new(),
            children: Vec::new(),
        }
    }

    fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    fn composite(kind: OperatorKind, children: Vec<FilterNode>) -> Self {
        Self {
            kind: kind.tag().to_string(),
            parameters: Map::new(),
            children: children.into_iter().map(RawFilterNode::from).collect(),
        }
    }
}

impl From<FilterNode> for RawFilterNode {
    fn from(node: FilterNode) -> Self {
        let kind = node.kind();
        match node {
            FilterNode::HasResolution { resolution } => {
                Self::leaf(kind).with_param("resolution", resolution)
            }
            FilterNode::HasAudioLanguage { language }
            | FilterNode::HasSubtitleLanguage { language } => {
                Self::leaf(kind).with_param("language", language)
            }
            FilterNode::HasTag { tag } => Self::leaf(kind).with_param("tag", tag),
            FilterNode::HasAnyTag { tags } => {
                Self::leaf(kind).with_param("tags", tags.into_iter().collect::<Vec<_>>())
            }
            FilterNode::HasAnimeType { anime_type } => {
                Self::leaf(kind).with_param("anime_type", anime_type.as_str())
            }
            FilterNode::NameContains { text } => Self::leaf(kind).with_param("text", text),
            FilterNode::EpisodeCountAtLeast { count } => {
                Self::leaf(kind).with_param("count", count)
            }
            FilterNode::RatingAtLeast { rating } => Self::leaf(kind).with_param("rating", rating),
            FilterNode::UserRatingAtLeast { rating } => {
                Self::leaf(kind).with_param("rating", rating)
            }
            FilterNode::AiredAfter { date } => {
                Self::leaf(kind).with_param("date", date.format("%Y-%m-%d").to_string())
            }
            FilterNode::AiredWithinDays { days }
            | FilterNode::AddedWithinDays { days }
            | FilterNode::WatchedWithinDays { days } => Self::leaf(kind).with_param("days", days),
            FilterNode::HasMissingEpisodes
            | FilterNode::IsFinished
            | FilterNode::IsWatched
            | FilterNode::IsFavorite
            | FilterNode::HasUnwatchedEpisodes => Self::leaf(kind),
            FilterNode::And(children) | FilterNode::Or(children) => {
                Self::composite(kind, children)
            }
            FilterNode::Not(child) => Self::composite(kind, vec![*child]),
        }
    }
}

impl TryFrom<RawFilterNode> for FilterNode {
    type Error = ValidationErrors;

    fn try_from(raw: RawFilterNode) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();
        let node = build(&raw, "$", &mut errors);
        match (node, ValidationErrors::from_vec(errors)) {
            (Some(node), None) => Ok(node),
            (_, Some(errors)) => Err(errors),
            // build() only returns None after recording an error
            (None, None) => Err(ValidationErrors::single(FilterError::NonCanonical {
                path: "$".to_string(),
            })),
        }
    }
}

/// Builds one node, recording violations. Returns `None` if this subtree had any.
fn build(raw: &RawFilterNode, path: &str, errors: &mut Vec<FilterError>) -> Option<FilterNode> {
    let Some(kind) = OperatorKind::from_tag(&raw.kind) else {
        errors.push(FilterError::UnknownOperator {
            path: path.to_string(),
            kind: raw.kind.clone(),
            suggestion: OperatorKind::suggest(&raw.kind),
        });
        return None;
    };

    let before = errors.len();
    let schema = kind.parameter_schema();

    for name in raw.parameters.keys() {
        if !schema.iter().any(|p| p.name == name) {
            errors.push(FilterError::UnknownParameter {
                path: path.to_string(),
                kind: kind.tag(),
                parameter: name.clone(),
            });
        }
    }

    let arity = kind.arity();
    if !arity.accepts(raw.children.len()) {
        errors.push(FilterError::InvalidArity {
            path: path.to_string(),
            kind: kind.tag(),
            expected: arity.to_string(),
            found: raw.children.len(),
        });
    }

    let children: Vec<Option<FilterNode>> = raw
        .children
        .iter()
        .enumerate()
        .map(|(i, child)| build(child, &format!("{path}.children[{i}]"), errors))
        .collect();

    let mut params = ParamReader {
        parameters: &raw.parameters,
        kind,
        path,
        errors: &mut *errors,
    };

    let node = match kind {
        OperatorKind::HasResolution => params
            .enumerated(&schema[0])
            .map(|resolution| FilterNode::HasResolution { resolution }),
        OperatorKind::HasAudioLanguage => params
            .lowercase_string(&schema[0])
            .map(|language| FilterNode::HasAudioLanguage { language }),
        OperatorKind::HasSubtitleLanguage => params
            .lowercase_string(&schema[0])
            .map(|language| FilterNode::HasSubtitleLanguage { language }),
        OperatorKind::HasTag => params
            .lowercase_string(&schema[0])
            .map(|tag| FilterNode::HasTag { tag }),
        OperatorKind::HasAnyTag => params
            .string_set(&schema[0])
            .map(|tags| FilterNode::HasAnyTag { tags }),
        OperatorKind::HasAnimeType => params
            .enumerated(&schema[0])
            .and_then(|name| AnimeType::from_str(&name).ok())
            .map(|anime_type| FilterNode::HasAnimeType { anime_type }),
        OperatorKind::NameContains => params
            .string(&schema[0])
            .map(|text| FilterNode::NameContains { text }),
        OperatorKind::EpisodeCountAtLeast => params
            .number(&schema[0])
            .and_then(|n| u32::try_from(n).ok())
            .map(|count| FilterNode::EpisodeCountAtLeast { count }),
        OperatorKind::HasMissingEpisodes => Some(FilterNode::HasMissingEpisodes),
        OperatorKind::RatingAtLeast => params
            .number(&schema[0])
            .and_then(|n| u32::try_from(n).ok())
            .map(|rating| FilterNode::RatingAtLeast { rating }),
        OperatorKind::AiredAfter => params
            .date(&schema[0])
            .map(|date| FilterNode::AiredAfter { date }),
        OperatorKind::AiredWithinDays => params
            .number(&schema[0])
            .and_then(|n| u32::try_from(n).ok())
            .map(|days| FilterNode::AiredWithinDays { days }),
        OperatorKind::AddedWithinDays => params
            .number(&schema[0])
            .and_then(|n| u32::try_from(n).ok())
            .map(|days| FilterNode::AddedWithinDays { days }),
        OperatorKind::IsFinished => Some(FilterNode::IsFinished),
        OperatorKind::IsWatched => Some(FilterNode::IsWatched),
        OperatorKind::IsFavorite => Some(FilterNode::IsFavorite),
        OperatorKind::HasUnwatchedEpisodes => Some(FilterNode::HasUnwatchedEpisodes),
        OperatorKind::WatchedWithinDays => params
            .number(&schema[0])
            .and_then(|n| u32::try_from(n).ok())
            .map(|days| FilterNode::WatchedWithinDays { days }),
        OperatorKind::UserRatingAtLeast => params
            .number(&schema[0])
            .and_then(|n| u8::try_from(n).ok())
            .map(|rating| FilterNode::UserRatingAtLeast { rating }),
        OperatorKind::And => collect_children(children).map(FilterNode::And),
        OperatorKind::Or => collect_children(children).map(FilterNode::Or),
        OperatorKind::Not => collect_children(children)
            .and_then(|mut c| c.pop())
            .map(FilterNode::negate),
    };

    if errors.len() > before {
        None
    } else {
        node
    }
}

fn collect_children(children: Vec<Option<FilterNode>>) -> Option<Vec<FilterNode>> {
    children.into_iter().collect()
}

/// Reads typed parameter values, recording violations as it goes.
struct ParamReader<'a> {
    parameters: &'a Map<String, Value>,
    kind: OperatorKind,
    path: &'a str,
    errors: &'a mut Vec<FilterError>,
}

impl<'a> ParamReader<'a> {
    fn value(&mut self, schema: &ParameterSchema) -> Option<&'a Value> {
        let value = self.parameters.get(schema.name);
        if value.is_none() {
            self.errors.push(FilterError::MissingParameter {
                path: self.path.to_string(),
                kind: self.kind.tag(),
                parameter: schema.name,
            });
        }
        value
    }

    fn wrong_type(&mut self, schema: &ParameterSchema) {
        self.errors.push(FilterError::InvalidParameterType {
            path: self.path.to_string(),
            parameter: schema.name,
            expected: schema.kind,
        });
    }

    fn out_of_domain(&mut self, schema: &ParameterSchema, value: impl ToString, allowed: String) {
        self.errors.push(FilterError::out_of_domain(
            self.path,
            schema.name,
            value.to_string(),
            allowed,
        ));
    }

    fn string(&mut self, schema: &ParameterSchema) -> Option<String> {
        let raw = match self.value(schema)? {
            Value::String(s) => s.trim().to_string(),
            _ => {
                self.wrong_type(schema);
                return None;
            }
        };
        if raw.is_empty() {
            self.out_of_domain(schema, "", "a non-empty string".to_string());
            return None;
        }
        Some(raw)
    }

    fn lowercase_string(&mut self, schema: &ParameterSchema) -> Option<String> {
        self.string(schema).map(|s| s.to_lowercase())
    }

    fn enumerated(&mut self, schema: &ParameterSchema) -> Option<String> {
        let raw = self.string(schema)?;
        match schema
            .possible_values
            .iter()
            .find(|v| v.eq_ignore_ascii_case(&raw))
        {
            Some(canonical) => Some((*canonical).to_string()),
            None => {
                let allowed = format!("one of {}", schema.possible_values.join(", "));
                self.out_of_domain(schema, raw, allowed);
                None
            }
        }
    }

    fn string_set(&mut self, schema: &ParameterSchema) -> Option<BTreeSet<String>> {
        let items = match self.value(schema)? {
            Value::Array(items) => items.clone(),
            _ => {
                self.wrong_type(schema);
                return None;
            }
        };

        let mut set = BTreeSet::new();
        for item in items {
            match item {
                Value::String(s) if !s.trim().is_empty() => {
                    set.insert(s.trim().to_lowercase());
                }
                Value::String(_) => {
                    self.out_of_domain(schema, "", "non-empty strings".to_string());
                    return None;
                }
                _ => {
                    self.wrong_type(schema);
                    return None;
                }
            }
        }

        if set.is_empty() {
            self.out_of_domain(schema, "[]", "at least one string".to_string());
            return None;
        }
        Some(set)
    }

    fn number(&mut self, schema: &ParameterSchema) -> Option<u64> {
        let Some(n) = self.value(schema)?.as_u64() else {
            self.wrong_type(schema);
            return None;
        };
        let min = schema.min.unwrap_or(0);
        let max = schema.max.unwrap_or(u64::MAX);
        if n < min || n > max {
            self.out_of_domain(schema, n, format!("a number between {min} and {max}"));
            return None;
        }
        Some(n)
    }

    fn date(&mut self, schema: &ParameterSchema) -> Option<NaiveDate> {
        let raw = match self.value(schema)? {
            Value::String(s) => s.clone(),
            _ => {
                self.wrong_type(schema);
                return None;
            }
        };
        match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.out_of_domain(schema, raw, ParameterKind::Date.to_string());
                None
            }
        }
    }
}
