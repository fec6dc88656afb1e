//! The operator catalog: kind tags, parameter schemas and self-description.
//!
//! Everything UI or admin tooling needs to know about the available operators
//! is generated from [`OperatorKind`] here, never maintained separately.

use std::collections::BTreeSet;
use std::fmt;

use collection_library_rs::models::AnimeType;
use serde::Serialize;

use super::ast::FilterNode;
use super::classify::{AttributeDomain, AttributeSet, DependencyFlags};

/// Video resolutions accepted by `HasResolution`.
pub const RESOLUTIONS: &[&str] = &[
    "2160p", "1080p", "720p", "480p", "UWHD", "UWQHD", "1440p", "576p", "360p", "240p",
];

/// Largest day window accepted by the `*WithinDays` operators.
pub const MAX_DAYS: u64 = 36_500;

/// The type of a single operator parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Free-form non-empty string.
    String,
    /// Non-negative integer, optionally bounded.
    Number,
    /// One of a fixed list of strings.
    Enumerated,
    /// Non-empty set of non-empty strings.
    StringSet,
    /// Calendar date in `YYYY-MM-DD` form.
    Date,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKind::String => "string",
            ParameterKind::Number => "number",
            ParameterKind::Enumerated => "enumerated string",
            ParameterKind::StringSet => "array of strings",
            ParameterKind::Date => "date (YYYY-MM-DD)",
        };
        f.write_str(name)
    }
}

/// Schema of one operator parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParameterSchema {
    /// Parameter name as used in the wire format.
    pub name: &'static str,
    /// Value type.
    pub kind: ParameterKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Accepted values for enumerated parameters (empty otherwise).
    #[serde(skip_serializing_if = "no_values")]
    pub possible_values: &'static [&'static str],
    /// Inclusive lower bound for numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    /// Inclusive upper bound for numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

fn no_values(values: &&'static [&'static str]) -> bool {
    values.is_empty()
}

impl ParameterSchema {
    const fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParameterKind::String,
            description,
            possible_values: &[],
            min: None,
            max: None,
        }
    }

    const fn number(name: &'static str, description: &'static str, min: u64, max: u64) -> Self {
        Self {
            name,
            kind: ParameterKind::Number,
            description,
            possible_values: &[],
            min: Some(min),
            max: Some(max),
        }
    }

    const fn enumerated(
        name: &'static str,
        description: &'static str,
        values: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: ParameterKind::Enumerated,
            description,
            possible_values: values,
            min: None,
            max: None,
        }
    }

    const fn string_set(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParameterKind::StringSet,
            description,
            possible_values: &[],
            min: None,
            max: None,
        }
    }

    const fn date(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParameterKind::Date,
            description,
            possible_values: &[],
            min: None,
            max: None,
        }
    }
}

const RESOLUTION_PARAMS: &[ParameterSchema] = &[ParameterSchema::enumerated(
    "resolution",
    "Video resolution",
    RESOLUTIONS,
)];
const LANGUAGE_PARAMS: &[ParameterSchema] =
    &[ParameterSchema::string("language", "Language name or code")];
const TAG_PARAMS: &[ParameterSchema] = &[ParameterSchema::string("tag", "Tag name")];
const TAGS_PARAMS: &[ParameterSchema] = &[ParameterSchema::string_set("tags", "Tag names")];
const ANIME_TYPE_PARAMS: &[ParameterSchema] = &[ParameterSchema::enumerated(
    "anime_type",
    "Release format",
    &AnimeType::NAMES,
)];
const TEXT_PARAMS: &[ParameterSchema] = &[ParameterSchema::string("text", "Text to search for")];
const COUNT_PARAMS: &[ParameterSchema] = &[ParameterSchema::number(
    "count",
    "Minimum number of episodes",
    0,
    u32::MAX as u64,
)];
const RATING_PARAMS: &[ParameterSchema] = &[ParameterSchema::number(
    "rating",
    "Minimum rating in tenths of a point",
    0,
    1000,
)];
const USER_RATING_PARAMS: &[ParameterSchema] = &[ParameterSchema::number(
    "rating",
    "Minimum personal vote",
    1,
    10,
)];
const DATE_PARAMS: &[ParameterSchema] =
    &[ParameterSchema::date("date", "Inclusive lower bound")];
const DAYS_PARAMS: &[ParameterSchema] =
    &[ParameterSchema::number("days", "Window length in days", 1, MAX_DAYS)];

/// Capability shared by everything that has a parameter schema.
///
/// Validation and catalog description consume this generically instead of
/// special-casing individual operators.
pub trait Parameterized {
    /// Returns the parameter schema.
    fn parameter_schema(&self) -> &'static [ParameterSchema];

    /// Returns the distinct parameter kinds this operator takes.
    fn parameter_kinds(&self) -> BTreeSet<ParameterKind> {
        self.parameter_schema().iter().map(|p| p.kind).collect()
    }
}

/// Grouping used when presenting operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCategory {
    /// File properties.
    Files,
    /// Descriptive metadata.
    Info,
    /// Calendar-based conditions.
    Dates,
    /// Per-user watch state.
    User,
    /// Boolean combinators.
    Logic,
}

/// How many children an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum Arity {
    /// Leaf operator.
    None,
    /// Exactly N children.
    Exactly(usize),
    /// At least N children.
    AtLeast(usize),
}

impl Arity {
    /// Returns true if `count` children satisfy this arity.
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::None => count == 0,
            Arity::Exactly(n) => count == *n,
            Arity::AtLeast(n) => count >= *n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::None => f.write_str("no children"),
            Arity::Exactly(n) => write!(f, "exactly {n} child(ren)"),
            Arity::AtLeast(n) => write!(f, "at least {n} child(ren)"),
        }
    }
}

/// Kind tag of every operator in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum OperatorKind {
    HasResolution,
    HasAudioLanguage,
    HasSubtitleLanguage,
    HasTag,
    HasAnyTag,
    HasAnimeType,
    NameContains,
    EpisodeCountAtLeast,
    HasMissingEpisodes,
    RatingAtLeast,
    AiredAfter,
    AiredWithinDays,
    AddedWithinDays,
    IsFinished,
    IsWatched,
    IsFavorite,
    HasUnwatchedEpisodes,
    WatchedWithinDays,
    UserRatingAtLeast,
    And,
    Or,
    Not,
}

impl OperatorKind {
    /// Every operator, in catalog order.
    pub const ALL: [OperatorKind; 22] = [
        OperatorKind::HasResolution,
        OperatorKind::HasAudioLanguage,
        OperatorKind::HasSubtitleLanguage,
        OperatorKind::HasTag,
        OperatorKind::HasAnyTag,
        OperatorKind::HasAnimeType,
        OperatorKind::NameContains,
        OperatorKind::EpisodeCountAtLeast,
        OperatorKind::HasMissingEpisodes,
        OperatorKind::RatingAtLeast,
        OperatorKind::AiredAfter,
        OperatorKind::AiredWithinDays,
        OperatorKind::AddedWithinDays,
        OperatorKind::IsFinished,
        OperatorKind::IsWatched,
        OperatorKind::IsFavorite,
        OperatorKind::HasUnwatchedEpisodes,
        OperatorKind::WatchedWithinDays,
        OperatorKind::UserRatingAtLeast,
        OperatorKind::And,
        OperatorKind::Or,
        OperatorKind::Not,
    ];

    /// Returns the kind tag used in the wire format.
    pub fn tag(&self) -> &'static str {
        match self {
            OperatorKind::HasResolution => "HasResolution",
            OperatorKind::HasAudioLanguage => "HasAudioLanguage",
            OperatorKind::HasSubtitleLanguage => "HasSubtitleLanguage",
            OperatorKind::HasTag => "HasTag",
            OperatorKind::HasAnyTag => "HasAnyTag",
            OperatorKind::HasAnimeType => "HasAnimeType",
            OperatorKind::NameContains => "NameContains",
            OperatorKind::EpisodeCountAtLeast => "EpisodeCountAtLeast",
            OperatorKind::HasMissingEpisodes => "HasMissingEpisodes",
            OperatorKind::RatingAtLeast => "RatingAtLeast",
            OperatorKind::AiredAfter => "AiredAfter",
            OperatorKind::AiredWithinDays => "AiredWithinDays",
            OperatorKind::AddedWithinDays => "AddedWithinDays",
            OperatorKind::IsFinished => "IsFinished",
            OperatorKind::IsWatched => "IsWatched",
            OperatorKind::IsFavorite => "IsFavorite",
            OperatorKind::HasUnwatchedEpisodes => "HasUnwatchedEpisodes",
            OperatorKind::WatchedWithinDays => "WatchedWithinDays",
            OperatorKind::UserRatingAtLeast => "UserRatingAtLeast",
            OperatorKind::And => "And",
            OperatorKind::Or => "Or",
            OperatorKind::Not => "Not",
        }
    }

    /// Looks up an operator by kind tag (case-insensitive).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.tag().eq_ignore_ascii_case(tag))
    }

    /// Returns the closest known tag to an unknown one, if any is close enough.
    pub fn suggest(tag: &str) -> Option<&'static str> {
        let lower = tag.to_lowercase();
        Self::ALL
            .iter()
            .map(|k| (k.tag(), strsim::levenshtein(&lower, &k.tag().to_lowercase())))
            .filter(|(_, distance)| *distance <= 3)
            .min_by_key(|(_, distance)| *distance)
            .map(|(tag, _)| tag)
    }

    /// Returns the presentation category.
    pub fn category(&self) -> OperatorCategory {
        match self {
            OperatorKind::HasResolution
            | OperatorKind::HasAudioLanguage
            | OperatorKind::HasSubtitleLanguage => OperatorCategory::Files,
            OperatorKind::HasTag
            | OperatorKind::HasAnyTag
            | OperatorKind::HasAnimeType
            | OperatorKind::NameContains
            | OperatorKind::EpisodeCountAtLeast
            | OperatorKind::HasMissingEpisodes
            | OperatorKind::RatingAtLeast => OperatorCategory::Info,
            OperatorKind::AiredAfter
            | OperatorKind::AiredWithinDays
            | OperatorKind::AddedWithinDays
            | OperatorKind::IsFinished => OperatorCategory::Dates,
            OperatorKind::IsWatched
            | OperatorKind::IsFavorite
            | OperatorKind::HasUnwatchedEpisodes
            | OperatorKind::WatchedWithinDays
            | OperatorKind::UserRatingAtLeast => OperatorCategory::User,
            OperatorKind::And | OperatorKind::Or | OperatorKind::Not => OperatorCategory::Logic,
        }
    }

    /// Returns the help text.
    pub fn description(&self) -> &'static str {
        match self {
            OperatorKind::HasResolution => {
                "This condition passes if any of the files have the specified video resolution"
            }
            OperatorKind::HasAudioLanguage => {
                "This condition passes if any of the files have audio in the specified language"
            }
            OperatorKind::HasSubtitleLanguage => {
                "This condition passes if any of the files have subtitles in the specified language"
            }
            OperatorKind::HasTag => "This condition passes if the entity has the specified tag",
            OperatorKind::HasAnyTag => {
                "This condition passes if the entity has any of the specified tags"
            }
            OperatorKind::HasAnimeType => {
                "This condition passes if the entity has the specified release format"
            }
            OperatorKind::NameContains => {
                "This condition passes if the name contains the specified text"
            }
            OperatorKind::EpisodeCountAtLeast => {
                "This condition passes if at least this many episodes have files"
            }
            OperatorKind::HasMissingEpisodes => {
                "This condition passes if any aired episodes have no files"
            }
            OperatorKind::RatingAtLeast => {
                "This condition passes if the community rating is at least the specified value"
            }
            OperatorKind::AiredAfter => {
                "This condition passes if the entity first aired on or after the specified date"
            }
            OperatorKind::AiredWithinDays => {
                "This condition passes if the entity first aired within the last N days"
            }
            OperatorKind::AddedWithinDays => {
                "This condition passes if the entity was added within the last N days"
            }
            OperatorKind::IsFinished => "This condition passes if the entity has finished airing",
            OperatorKind::IsWatched => {
                "This condition passes if the user has watched every episode"
            }
            OperatorKind::IsFavorite => {
                "This condition passes if the user has marked the entity as a favorite"
            }
            OperatorKind::HasUnwatchedEpisodes => {
                "This condition passes if the user has episodes left to watch"
            }
            OperatorKind::WatchedWithinDays => {
                "This condition passes if the user watched an episode within the last N days"
            }
            OperatorKind::UserRatingAtLeast => {
                "This condition passes if the user's vote is at least the specified value"
            }
            OperatorKind::And => "This condition passes if all of its conditions pass",
            OperatorKind::Or => "This condition passes if any of its conditions pass",
            OperatorKind::Not => "This condition passes if its condition does not pass",
        }
    }

    /// Returns the child arity.
    pub fn arity(&self) -> Arity {
        match self {
            OperatorKind::And | OperatorKind::Or => Arity::AtLeast(1),
            OperatorKind::Not => Arity::Exactly(1),
            _ => Arity::None,
        }
    }

    /// Returns true for AND, OR and NOT.
    pub fn is_composite(&self) -> bool {
        self.arity() != Arity::None
    }

    /// Returns the fixed dependency flags of a leaf operator.
    ///
    /// Composite operators have no flags of their own; theirs are derived
    /// from their children.
    pub fn leaf_flags(&self) -> DependencyFlags {
        match self {
            OperatorKind::AiredWithinDays
            | OperatorKind::AddedWithinDays
            | OperatorKind::IsFinished => DependencyFlags::TIME,
            OperatorKind::IsWatched
            | OperatorKind::IsFavorite
            | OperatorKind::HasUnwatchedEpisodes
            | OperatorKind::UserRatingAtLeast => DependencyFlags::USER,
            OperatorKind::WatchedWithinDays => DependencyFlags::TIME | DependencyFlags::USER,
            _ => DependencyFlags::NONE,
        }
    }

    /// Returns the attribute domains a leaf operator reads.
    pub fn attributes(&self) -> AttributeSet {
        use AttributeDomain::*;
        match self {
            OperatorKind::HasResolution
            | OperatorKind::HasAudioLanguage
            | OperatorKind::HasSubtitleLanguage => AttributeSet::of(&[Files]),
            OperatorKind::HasTag | OperatorKind::HasAnyTag => AttributeSet::of(&[Tags]),
            OperatorKind::HasAnimeType
            | OperatorKind::NameContains
            | OperatorKind::RatingAtLeast => AttributeSet::of(&[Metadata]),
            OperatorKind::EpisodeCountAtLeast | OperatorKind::HasMissingEpisodes => {
                AttributeSet::of(&[Episodes])
            }
            OperatorKind::AiredAfter
            | OperatorKind::AiredWithinDays
            | OperatorKind::AddedWithinDays
            | OperatorKind::IsFinished => AttributeSet::of(&[Dates]),
            OperatorKind::IsWatched | OperatorKind::HasUnwatchedEpisodes => {
                AttributeSet::of(&[UserState, Episodes])
            }
            OperatorKind::IsFavorite
            | OperatorKind::WatchedWithinDays
            | OperatorKind::UserRatingAtLeast => AttributeSet::of(&[UserState]),
            OperatorKind::And | OperatorKind::Or | OperatorKind::Not => AttributeSet::EMPTY,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Parameterized for OperatorKind {
    fn parameter_schema(&self) -> &'static [ParameterSchema] {
        match self {
            OperatorKind::HasResolution => RESOLUTION_PARAMS,
            OperatorKind::HasAudioLanguage | OperatorKind::HasSubtitleLanguage => LANGUAGE_PARAMS,
            OperatorKind::HasTag => TAG_PARAMS,
            OperatorKind::HasAnyTag => TAGS_PARAMS,
            OperatorKind::HasAnimeType => ANIME_TYPE_PARAMS,
            OperatorKind::NameContains => TEXT_PARAMS,
            OperatorKind::EpisodeCountAtLeast => COUNT_PARAMS,
            OperatorKind::RatingAtLeast => RATING_PARAMS,
            OperatorKind::UserRatingAtLeast => USER_RATING_PARAMS,
            OperatorKind::AiredAfter => DATE_PARAMS,
            OperatorKind::AiredWithinDays
            | OperatorKind::AddedWithinDays
            | OperatorKind::WatchedWithinDays => DAYS_PARAMS,
            OperatorKind::HasMissingEpisodes
            | OperatorKind::IsFinished
            | OperatorKind::IsWatched
            | OperatorKind::IsFavorite
            | OperatorKind::HasUnwatchedEpisodes
            | OperatorKind::And
            | OperatorKind::Or
            | OperatorKind::Not => &[],
        }
    }
}

impl Parameterized for FilterNode {
    fn parameter_schema(&self) -> &'static [ParameterSchema] {
        self.kind().parameter_schema()
    }
}

/// Self-description of one operator, for UI and admin tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorDescriptor {
    /// Kind tag.
    pub kind: &'static str,
    /// Presentation category.
    pub category: OperatorCategory,
    /// Help text.
    pub description: &'static str,
    /// Parameter schemas, with possible values for enumerated parameters.
    pub parameters: &'static [ParameterSchema],
    /// Child arity.
    pub children: Arity,
    /// Whether the verdict can change with time alone (leaves only).
    pub time_dependent: bool,
    /// Whether the verdict can differ between users (leaves only).
    pub user_dependent: bool,
}

impl From<OperatorKind> for OperatorDescriptor {
    fn from(kind: OperatorKind) -> Self {
        let flags = kind.leaf_flags();
        Self {
            kind: kind.tag(),
            category: kind.category(),
            description: kind.description(),
            parameters: kind.parameter_schema(),
            children: kind.arity(),
            time_dependent: flags.time_dependent,
            user_dependent: flags.user_dependent,
        }
    }
}

/// Describes every operator in the catalog.
pub fn describe_operators() -> Vec<OperatorDescriptor> {
    OperatorKind::ALL
        .iter()
        .copied()
        .map(OperatorDescriptor::from)
        .collect()
}
