//! Typed filter trees, their catalog and their evaluator.
//!
//! A saved filter is a tree of [`FilterNode`]s. Leaves are operators from a
//! fixed catalog ([`OperatorKind`]), each with a typed parameter payload;
//! AND, OR and NOT compose them.
//!
//! # Operators
//!
//! ## File
//! - `HasResolution`, `HasAudioLanguage`, `HasSubtitleLanguage`
//!
//! ## Info
//! - `HasTag`, `HasAnyTag`, `HasAnimeType`, `NameContains`,
//!   `EpisodeCountAtLeast`, `HasMissingEpisodes`, `RatingAtLeast`
//!
//! ## Date (time-dependent except `AiredAfter`)
//! - `AiredAfter`, `AiredWithinDays`, `AddedWithinDays`, `IsFinished`
//!
//! ## User (user-dependent)
//! - `IsWatched`, `IsFavorite`, `HasUnwatchedEpisodes`,
//!   `WatchedWithinDays`, `UserRatingAtLeast`
//!
//! ## Boolean
//! - `And`, `Or` (one or more children), `Not` (exactly one)
//!
//! # Example
//!
//! ```
//! use collection_engine_rs::filter::{FilterNode, RawFilterNode};
//!
//! let json = r#"{"type": "And", "children": [
//!     {"type": "HasResolution", "parameters": {"resolution": "1080p"}},
//!     {"type": "Not", "children": [{"type": "IsWatched"}]}
//! ]}"#;
//!
//! let filter: FilterNode = serde_json::from_str(json).unwrap();
//! assert_eq!(filter.to_string(), "HasResolution(1080p) AND NOT IsWatched");
//! assert!(filter.dependencies().user_dependent);
//!
//! let raw: RawFilterNode = serde_json::from_str(r#"{"type": "HasResoluton"}"#).unwrap();
//! let err = FilterNode::try_from(raw).unwrap_err();
//! assert!(err.to_string().contains("did you mean 'HasResolution'"));
//! ```

mod ast;
mod catalog;
mod classify;
mod context;
mod error;
mod evaluator;
mod wire;

pub use ast::FilterNode;
pub use catalog::{
    describe_operators, Arity, OperatorCategory, OperatorDescriptor, OperatorKind, ParameterKind,
    ParameterSchema, Parameterized, MAX_DAYS, RESOLUTIONS,
};
pub use classify::{classify, AttributeDomain, AttributeSet, Classification, DependencyFlags};
pub use context::{EntityView, FilterContext, Filterable, FilterableUserInfo, UserEntityView};
pub use error::{FilterError, FilterResult, ValidationErrors};
pub use evaluator::{evaluate, FilterEvaluator};
pub use wire::RawFilterNode;

#[cfg(test)]
mod tests;
