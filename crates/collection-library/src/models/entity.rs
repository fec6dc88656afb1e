//! Library entities (series and groups).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a library entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a library entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A single anime series.
    Series,
    /// A group of related series.
    Group,
}

impl EntityKind {
    /// Returns the lowercase name used in serialized forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Series => "series",
            EntityKind::Group => "group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "series" => Ok(EntityKind::Series),
            "group" => Ok(EntityKind::Group),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// Release format of an anime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnimeType {
    /// Broadcast television series.
    TV,
    /// Theatrical release.
    Movie,
    /// Original video animation.
    OVA,
    /// Television special.
    TVSpecial,
    /// Web release.
    Web,
    /// Anything else.
    Other,
}

impl AnimeType {
    /// Every anime type name, in declaration order.
    pub const NAMES: [&'static str; 6] = ["TV", "Movie", "OVA", "TVSpecial", "Web", "Other"];

    /// Returns the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimeType::TV => "TV",
            AnimeType::Movie => "Movie",
            AnimeType::OVA => "OVA",
            AnimeType::TVSpecial => "TVSpecial",
            AnimeType::Web => "Web",
            AnimeType::Other => "Other",
        }
    }
}

impl FromStr for AnimeType {
    type Err = String;

    /// Parses a type name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tv" => Ok(AnimeType::TV),
            "movie" => Ok(AnimeType::Movie),
            "ova" => Ok(AnimeType::OVA),
            "tvspecial" => Ok(AnimeType::TVSpecial),
            "web" => Ok(AnimeType::Web),
            "other" => Ok(AnimeType::Other),
            other => Err(format!("unknown anime type: {other}")),
        }
    }
}

impl fmt::Display for AnimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of one series or group as the library currently knows it.
///
/// For groups, the collection fields (tags, resolutions, languages, episode
/// counts) are the union or sum over the group's series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntity {
    /// Unique entity ID.
    pub id: EntityId,

    /// Series or group.
    pub kind: EntityKind,

    /// Display name.
    pub name: String,

    /// Release format, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anime_type: Option<AnimeType>,

    /// Tag names attached to the entity.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Video resolutions present across the entity's files (e.g. "1080p").
    #[serde(default)]
    pub resolutions: BTreeSet<String>,

    /// Audio languages present across the entity's files.
    #[serde(default)]
    pub audio_languages: BTreeSet<String>,

    /// Subtitle languages present across the entity's files.
    #[serde(default)]
    pub subtitle_languages: BTreeSet<String>,

    /// Number of episodes with at least one file.
    #[serde(default)]
    pub episode_count: u32,

    /// Number of aired episodes with no file.
    #[serde(default)]
    pub missing_episode_count: u32,

    /// First air date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<NaiveDate>,

    /// Last air date, if the show has finished or has a scheduled end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    /// When the entity was added to the library.
    pub added_at: DateTime<Utc>,

    /// Community rating in tenths of a point (0-1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u32>,
}

impl LibraryEntity {
    /// Creates an entity with empty attributes, added now.
    pub fn new(id: EntityId, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            anime_type: None,
            tags: BTreeSet::new(),
            resolutions: BTreeSet::new(),
            audio_languages: BTreeSet::new(),
            subtitle_languages: BTreeSet::new(),
            episode_count: 0,
            missing_episode_count: 0,
            air_date: None,
            end_date: None,
            added_at: Utc::now(),
            rating: None,
        }
    }

    /// Adds a video resolution.
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolutions.insert(resolution.into());
        self
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Sets the first air date.
    pub fn with_air_date(mut self, date: NaiveDate) -> Self {
        self.air_date = Some(date);
        self
    }

    /// Sets the episode count.
    pub fn with_episodes(mut self, count: u32) -> Self {
        self.episode_count = count;
        self
    }
}
