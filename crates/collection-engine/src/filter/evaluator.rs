//! Filter evaluation against entity and user views.
//!
//! This module provides the [`FilterEvaluator`] for checking whether one
//! entity (and, for user filters, one viewing user's state) satisfies a
//! [`FilterNode`] tree.
//!
//! # Unresolvable attributes
//!
//! A leaf that needs an attribute the views cannot supply (no air date, no
//! rating, no user state for a user operator) fails closed: it evaluates to
//! `false`. AND, OR and NOT then apply ordinary two-valued logic to that
//! verdict, so `NOT RatingAtLeast(800)` matches an unrated entity.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use collection_engine_rs::filter::{EntityView, FilterContext, FilterEvaluator, FilterNode};
//! use collection_library_rs::models::{EntityId, EntityKind, LibraryEntity};
//!
//! let filter = FilterNode::has_resolution("1080p").unwrap();
//! let context = FilterContext::at(Utc::now());
//! let evaluator = FilterEvaluator::new(&filter, &context);
//!
//! let entity = LibraryEntity::new(EntityId(1), EntityKind::Series, "Haikyu!!")
//!     .with_resolution("1080p");
//! assert!(evaluator.matches(&EntityView(&entity), None));
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::ast::FilterNode;
use super::context::{FilterContext, Filterable, FilterableUserInfo};

/// Evaluates a filter tree against entities.
///
/// Evaluation reads only the tree, the views and the context. It has no side
/// effects, so the same inputs always give the same verdict.
#[derive(Debug)]
pub struct FilterEvaluator<'a> {
    filter: &'a FilterNode,
    context: &'a FilterContext,
}

impl<'a> FilterEvaluator<'a> {
    /// Creates a new filter evaluator.
    pub fn new(filter: &'a FilterNode, context: &'a FilterContext) -> Self {
        Self { filter, context }
    }

    /// Returns true if the entity matches the filter.
    ///
    /// `user` is the viewing user's state for this entity. Pass `None` for a
    /// user-independent filter; user operators then evaluate to `false`.
    pub fn matches(&self, entity: &dyn Filterable, user: Option<&dyn FilterableUserInfo>) -> bool {
        self.evaluate_node(self.filter, entity, user)
    }

    fn evaluate_node(
        &self,
        node: &FilterNode,
        entity: &dyn Filterable,
        user: Option<&dyn FilterableUserInfo>,
    ) -> bool {
        match node {
            FilterNode::And(children) => children
                .iter()
                .all(|child| self.evaluate_node(child, entity, user)),
            FilterNode::Or(children) => children
                .iter()
                .any(|child| self.evaluate_node(child, entity, user)),
            FilterNode::Not(inner) => !self.evaluate_node(inner, entity, user),
            leaf => self.evaluate_leaf(leaf, entity, user).unwrap_or(false),
        }
    }

    /// Evaluates a leaf, returning `None` if a needed attribute is missing.
    fn evaluate_leaf(
        &self,
        leaf: &FilterNode,
        entity: &dyn Filterable,
        user: Option<&dyn FilterableUserInfo>,
    ) -> Option<bool> {
        let today = self.context.today();
        match leaf {
            // File filters
            FilterNode::HasResolution { resolution } => Some(entity.has_resolution(resolution)),
            FilterNode::HasAudioLanguage { language } => Some(entity.has_audio_language(language)),
            FilterNode::HasSubtitleLanguage { language } => {
                Some(entity.has_subtitle_language(language))
            }

            // Info filters
            FilterNode::HasTag { tag } => Some(entity.has_tag(tag)),
            FilterNode::HasAnyTag { tags } => Some(tags.iter().any(|tag| entity.has_tag(tag))),
            FilterNode::HasAnimeType { anime_type } => {
                entity.anime_type().map(|t| t == *anime_type)
            }
            FilterNode::NameContains { text } => Some(
                entity
                    .name()
                    .to_lowercase()
                    .contains(&text.to_lowercase()),
            ),
            FilterNode::EpisodeCountAtLeast { count } => Some(entity.episode_count() >= *count),
            FilterNode::HasMissingEpisodes => Some(entity.missing_episode_count() > 0),
            FilterNode::RatingAtLeast { rating } => entity.rating().map(|r| r >= *rating),

            // Date filters
            FilterNode::AiredAfter { date } => entity.air_date().map(|d| d >= *date),
            FilterNode::AiredWithinDays { days } => entity
                .air_date()
                .and_then(|d| within_days(d, today, *days)),
            FilterNode::AddedWithinDays { days } => entity
                .added_at()
                .and_then(|at| within_days(at.date_naive(), today, *days)),
            FilterNode::IsFinished => entity.end_date().map(|d| d <= today),

            // User filters
            FilterNode::IsWatched => {
                let user = user?;
                Some(entity.episode_count() > 0 && user.unwatched_episodes() == 0)
            }
            FilterNode::IsFavorite => user.map(|u| u.is_favorite()),
            FilterNode::HasUnwatchedEpisodes => user.map(|u| u.unwatched_episodes() > 0),
            FilterNode::WatchedWithinDays { days } => user?
                .last_watched_at()
                .and_then(|at| self.watched_within(at, *days)),
            FilterNode::UserRatingAtLeast { rating } => {
                user?.user_rating().map(|r| r >= *rating)
            }

            FilterNode::And(_) | FilterNode::Or(_) | FilterNode::Not(_) => {
                Some(self.evaluate_node(leaf, entity, user))
            }
        }
    }

    fn watched_within(&self, at: DateTime<Utc>, days: u32) -> Option<bool> {
        let now = self.context.now();
        let start = now.checked_sub_signed(Duration::try_days(i64::from(days))?)?;
        Some(at <= now && at >= start)
    }
}

/// Whether `date` falls in the inclusive window `[today - days, today]`.
///
/// `None` if the window start is out of the calendar's range.
fn within_days(date: NaiveDate, today: NaiveDate, days: u32) -> Option<bool> {
    let start = today.checked_sub_signed(Duration::try_days(i64::from(days))?)?;
    Some(date <= today && date >= start)
}

/// Evaluates a tree once without keeping an evaluator around.
pub fn evaluate(
    filter: &FilterNode,
    context: &FilterContext,
    entity: &dyn Filterable,
    user: Option<&dyn FilterableUserInfo>,
) -> bool {
    FilterEvaluator::new(filter, context).matches(entity, user)
}
