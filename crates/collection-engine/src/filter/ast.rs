//! Abstract Syntax Tree (AST) for smart collection filters.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use collection_library_rs::models::AnimeType;
use serde::{Deserialize, Serialize};

use super::catalog::{OperatorKind, RESOLUTIONS};
use super::error::{FilterError, FilterResult, ValidationErrors};
use super::wire::RawFilterNode;

/// A node of a saved filter tree.
///
/// Each variant is one operator from the fixed catalog (see [`OperatorKind`])
/// and carries its own typed parameters. Equality and hashing are derived from
/// the variant and its payload, so two trees compare equal exactly when they
/// have the same shape and the same parameter values.
///
/// Trees are serialized through [`RawFilterNode`]; deserializing validates the
/// whole tree, so an invalid node can never be read back from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFilterNode", into = "RawFilterNode")]
pub enum FilterNode {
    // ==================== File Filters ====================
    /// Any file has the given video resolution.
    HasResolution {
        /// One of [`RESOLUTIONS`].
        resolution: String,
    },

    /// Any file has an audio track in the given language.
    HasAudioLanguage {
        /// Lowercase language name or code.
        language: String,
    },

    /// Any file has a subtitle track in the given language.
    HasSubtitleLanguage {
        /// Lowercase language name or code.
        language: String,
    },

    // ==================== Info Filters ====================
    /// The entity has the given tag.
    HasTag {
        /// Lowercase tag name.
        tag: String,
    },

    /// The entity has at least one of the given tags.
    HasAnyTag {
        /// Lowercase tag names.
        tags: BTreeSet<String>,
    },

    /// The entity has the given release format.
    HasAnimeType {
        /// The release format.
        anime_type: AnimeType,
    },

    /// The entity name contains the text (case-insensitive).
    NameContains {
        /// The text to look for.
        text: String,
    },

    /// The entity has at least this many episodes with files.
    EpisodeCountAtLeast {
        /// Minimum episode count.
        count: u32,
    },

    /// The entity has aired episodes without files.
    HasMissingEpisodes,

    /// The community rating is at least this value (tenths of a point).
    RatingAtLeast {
        /// Minimum rating, 0-1000.
        rating: u32,
    },

    // ==================== Date Filters ====================
    /// The first air date is on or after the given date.
    AiredAfter {
        /// Inclusive lower bound.
        date: NaiveDate,
    },

    /// The first air date falls within the last N days.
    AiredWithinDays {
        /// Window length in days.
        days: u32,
    },

    /// The entity was added to the library within the last N days.
    AddedWithinDays {
        /// Window length in days.
        days: u32,
    },

    /// The entity has finished airing.
    IsFinished,

    // ==================== User Filters ====================
    /// The viewing user has watched every episode.
    IsWatched,

    /// The viewing user marked the entity as a favorite.
    IsFavorite,

    /// The viewing user has episodes left to watch.
    HasUnwatchedEpisodes,

    /// The viewing user watched an episode within the last N days.
    WatchedWithinDays {
        /// Window length in days.
        days: u32,
    },

    /// The viewing user's own vote is at least this value.
    UserRatingAtLeast {
        /// Minimum vote, 1-10.
        rating: u8,
    },

    // ==================== Boolean Operators ====================
    /// All children match.
    And(Vec<FilterNode>),

    /// Any child matches.
    Or(Vec<FilterNode>),

    /// The child does not match.
    Not(Box<FilterNode>),
}

impl FilterNode {
    /// Creates a resolution filter, rejecting unknown resolutions.
    ///
    /// The value is matched case-insensitively against [`RESOLUTIONS`] and
    /// stored in its canonical spelling.
    ///
    /// # Example
    ///
    /// ```
    /// use collection_engine_rs::filter::FilterNode;
    ///
    /// let node = FilterNode::has_resolution("1080P").unwrap();
    /// assert_eq!(node, FilterNode::HasResolution { resolution: "1080p".to_string() });
    /// assert!(FilterNode::has_resolution("1081p").is_err());
    /// ```
    pub fn has_resolution(resolution: &str) -> FilterResult<Self> {
        let canonical = RESOLUTIONS
            .iter()
            .find(|r| r.eq_ignore_ascii_case(resolution.trim()))
            .ok_or_else(|| {
                ValidationErrors::single(FilterError::out_of_domain(
                    "$",
                    "resolution",
                    resolution,
                    RESOLUTIONS.join(", "),
                ))
            })?;
        Ok(FilterNode::HasResolution {
            resolution: (*canonical).to_string(),
        })
    }

    /// Creates a tag filter, rejecting empty tags.
    pub fn has_tag(tag: &str) -> FilterResult<Self> {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return Err(ValidationErrors::single(FilterError::out_of_domain(
                "$",
                "tag",
                "",
                "a non-empty string",
            )));
        }
        Ok(FilterNode::HasTag { tag })
    }

    /// Creates an AND node.
    ///
    /// # Example
    ///
    /// ```
    /// use collection_engine_rs::filter::FilterNode;
    ///
    /// let filter = FilterNode::and(vec![FilterNode::IsFavorite, FilterNode::IsFinished]);
    /// assert!(matches!(filter, FilterNode::And(_)));
    /// ```
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::And(children)
    }

    /// Creates an OR node.
    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Or(children)
    }

    /// Creates a NOT node.
    pub fn negate(inner: FilterNode) -> Self {
        FilterNode::Not(Box::new(inner))
    }

    /// Returns the operator kind of this node.
    pub fn kind(&self) -> OperatorKind {
        match self {
            FilterNode::HasResolution { .. } => OperatorKind::HasResolution,
            FilterNode::HasAudioLanguage { .. } => OperatorKind::HasAudioLanguage,
            FilterNode::HasSubtitleLanguage { .. } => OperatorKind::HasSubtitleLanguage,
            FilterNode::HasTag { .. } => OperatorKind::HasTag,
            FilterNode::HasAnyTag { .. } => OperatorKind::HasAnyTag,
            FilterNode::HasAnimeType { .. } => OperatorKind::HasAnimeType,
            FilterNode::NameContains { .. } => OperatorKind::NameContains,
            FilterNode::EpisodeCountAtLeast { .. } => OperatorKind::EpisodeCountAtLeast,
            FilterNode::HasMissingEpisodes => OperatorKind::HasMissingEpisodes,
            FilterNode::RatingAtLeast { .. } => OperatorKind::RatingAtLeast,
            FilterNode::AiredAfter { .. } => OperatorKind::AiredAfter,
            FilterNode::AiredWithinDays { .. } => OperatorKind::AiredWithinDays,
            FilterNode::AddedWithinDays { .. } => OperatorKind::AddedWithinDays,
            FilterNode::IsFinished => OperatorKind::IsFinished,
            FilterNode::IsWatched => OperatorKind::IsWatched,
            FilterNode::IsFavorite => OperatorKind::IsFavorite,
            FilterNode::HasUnwatchedEpisodes => OperatorKind::HasUnwatchedEpisodes,
            FilterNode::WatchedWithinDays { .. } => OperatorKind::WatchedWithinDays,
            FilterNode::UserRatingAtLeast { .. } => OperatorKind::UserRatingAtLeast,
            FilterNode::And(_) => OperatorKind::And,
            FilterNode::Or(_) => OperatorKind::Or,
            FilterNode::Not(_) => OperatorKind::Not,
        }
    }

    /// Returns the child nodes (empty for leaves).
    pub fn children(&self) -> &[FilterNode] {
        match self {
            FilterNode::And(children) | FilterNode::Or(children) => children,
            FilterNode::Not(child) => std::slice::from_ref(child.as_ref()),
            _ => &[],
        }
    }

    /// Checks the whole tree against the catalog.
    ///
    /// Every violation is reported, not just the first. A tree built through
    /// the typed constructors or read from JSON always passes; trees assembled
    /// by hand from raw variants may not (e.g. an unknown resolution or an
    /// empty AND).
    pub fn validate(&self) -> FilterResult<()> {
        let rebuilt = FilterNode::try_from(RawFilterNode::from(self.clone()))?;
        if rebuilt != *self {
            return Err(ValidationErrors::single(FilterError::NonCanonical {
                path: "$".to_string(),
            }));
        }
        Ok(())
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::HasResolution { resolution } => write!(f, "HasResolution({resolution})"),
            FilterNode::HasAudioLanguage { language } => write!(f, "HasAudioLanguage({language})"),
            FilterNode::HasSubtitleLanguage { language } => {
                write!(f, "HasSubtitleLanguage({language})")
            }
            FilterNode::HasTag { tag } => write!(f, "HasTag({tag})"),
            FilterNode::HasAnyTag { tags } => {
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                write!(f, "HasAnyTag({})", tags.join(", "))
            }
            FilterNode::HasAnimeType { anime_type } => write!(f, "HasAnimeType({anime_type})"),
            FilterNode::NameContains { text } => write!(f, "NameContains({text:?})"),
            FilterNode::EpisodeCountAtLeast { count } => write!(f, "EpisodeCountAtLeast({count})"),
            FilterNode::RatingAtLeast { rating } => write!(f, "RatingAtLeast({rating})"),
            FilterNode::AiredAfter { date } => write!(f, "AiredAfter({date})"),
            FilterNode::AiredWithinDays { days } => write!(f, "AiredWithinDays({days})"),
            FilterNode::AddedWithinDays { days } => write!(f, "AddedWithinDays({days})"),
            FilterNode::WatchedWithinDays { days } => write!(f, "WatchedWithinDays({days})"),
            FilterNode::UserRatingAtLeast { rating } => write!(f, "UserRatingAtLeast({rating})"),
            FilterNode::And(children) => write_joined(f, children, " AND "),
            FilterNode::Or(children) => write_joined(f, children, " OR "),
            FilterNode::Not(child) => match child.as_ref() {
                FilterNode::And(_) | FilterNode::Or(_) => write!(f, "NOT ({child})"),
                _ => write!(f, "NOT {child}"),
            },
            leaf => f.write_str(leaf.kind().tag()),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[FilterNode], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        match child {
            FilterNode::And(_) | FilterNode::Or(_) => write!(f, "({child})")?,
            _ => write!(f, "{child}")?,
        }
    }
    Ok(())
}
