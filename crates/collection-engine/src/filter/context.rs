//! Read-only views the evaluator queries.
//!
//! Operators never look at library models directly. They go through the
//! [`Filterable`] and [`FilterableUserInfo`] capabilities, which the adapter
//! types in this module implement over [`LibraryEntity`] and [`UserState`].
//! A new operator that needs a new attribute extends these traits.

use chrono::{DateTime, NaiveDate, Utc};
use collection_library_rs::models::{AnimeType, EntityId, LibraryEntity, UserState};

/// Queryable attributes of one library entity.
pub trait Filterable {
    /// The entity ID.
    fn id(&self) -> EntityId;

    /// Display name.
    fn name(&self) -> &str;

    /// Release format, if known.
    fn anime_type(&self) -> Option<AnimeType>;

    /// Whether the entity has the tag (case-insensitive).
    fn has_tag(&self, tag: &str) -> bool;

    /// Whether any file has the resolution (case-insensitive).
    fn has_resolution(&self, resolution: &str) -> bool;

    /// Whether any file has audio in the language (case-insensitive).
    fn has_audio_language(&self, language: &str) -> bool;

    /// Whether any file has subtitles in the language (case-insensitive).
    fn has_subtitle_language(&self, language: &str) -> bool;

    /// Episodes with files.
    fn episode_count(&self) -> u32;

    /// Aired episodes without files.
    fn missing_episode_count(&self) -> u32;

    /// Community rating in tenths of a point.
    fn rating(&self) -> Option<u32>;

    /// First air date.
    fn air_date(&self) -> Option<NaiveDate>;

    /// Last air date.
    fn end_date(&self) -> Option<NaiveDate>;

    /// When the entity joined the library.
    fn added_at(&self) -> Option<DateTime<Utc>>;
}

/// One user's state for one entity.
pub trait FilterableUserInfo {
    /// Whether the user marked the entity as a favorite.
    fn is_favorite(&self) -> bool;

    /// Episodes the user has watched.
    fn watched_episodes(&self) -> u32;

    /// Episodes with files the user has not watched.
    fn unwatched_episodes(&self) -> u32;

    /// When the user last watched an episode.
    fn last_watched_at(&self) -> Option<DateTime<Utc>>;

    /// The user's vote.
    fn user_rating(&self) -> Option<u8>;
}

fn contains_ignore_case<'a>(mut values: impl Iterator<Item = &'a String>, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    values.any(|v| v.to_lowercase() == needle)
}

/// Adapter exposing a [`LibraryEntity`] as a [`Filterable`].
#[derive(Debug, Clone, Copy)]
pub struct EntityView<'a>(pub &'a LibraryEntity);

impl Filterable for EntityView<'_> {
    fn id(&self) -> EntityId {
        self.0.id
    }

    fn name(&self) -> &str {
        &self.0.name
    }

    fn anime_type(&self) -> Option<AnimeType> {
        self.0.anime_type
    }

    fn has_tag(&self, tag: &str) -> bool {
        contains_ignore_case(self.0.tags.iter(), tag)
    }

    fn has_resolution(&self, resolution: &str) -> bool {
        contains_ignore_case(self.0.resolutions.iter(), resolution)
    }

    fn has_audio_language(&self, language: &str) -> bool {
        contains_ignore_case(self.0.audio_languages.iter(), language)
    }

    fn has_subtitle_language(&self, language: &str) -> bool {
        contains_ignore_case(self.0.subtitle_languages.iter(), language)
    }

    fn episode_count(&self) -> u32 {
        self.0.episode_count
    }

    fn missing_episode_count(&self) -> u32 {
        self.0.missing_episode_count
    }

    fn rating(&self) -> Option<u32> {
        self.0.rating
    }

    fn air_date(&self) -> Option<NaiveDate> {
        self.0.air_date
    }

    fn end_date(&self) -> Option<NaiveDate> {
        self.0.end_date
    }

    fn added_at(&self) -> Option<DateTime<Utc>> {
        Some(self.0.added_at)
    }
}

/// Adapter exposing one user's record for one entity as [`FilterableUserInfo`].
///
/// A user with no record for the entity has watched nothing and voted nothing.
#[derive(Debug, Clone, Copy)]
pub struct UserEntityView<'a> {
    user: &'a UserState,
    entity: &'a LibraryEntity,
}

impl<'a> UserEntityView<'a> {
    /// Pairs a user with an entity.
    pub fn new(user: &'a UserState, entity: &'a LibraryEntity) -> Self {
        Self { user, entity }
    }
}

impl FilterableUserInfo for UserEntityView<'_> {
    fn is_favorite(&self) -> bool {
        self.user
            .record(self.entity.id)
            .is_some_and(|r| r.is_favorite)
    }

    fn watched_episodes(&self) -> u32 {
        self.user
            .record(self.entity.id)
            .map_or(0, |r| r.watched_episodes)
    }

    fn unwatched_episodes(&self) -> u32 {
        self.entity
            .episode_count
            .saturating_sub(self.watched_episodes())
    }

    fn last_watched_at(&self) -> Option<DateTime<Utc>> {
        self.user
            .record(self.entity.id)
            .and_then(|r| r.last_watched_at)
    }

    fn user_rating(&self) -> Option<u8> {
        self.user.record(self.entity.id).and_then(|r| r.user_rating)
    }
}

/// Evaluation-time inputs that are not attributes of the entity or user.
///
/// Time-dependent operators read "now" from here instead of the system clock,
/// so a verdict is a pure function of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    now: DateTime<Utc>,
}

impl FilterContext {
    /// Creates a context evaluating at the given instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// The evaluation instant.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// The evaluation date (UTC).
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}
