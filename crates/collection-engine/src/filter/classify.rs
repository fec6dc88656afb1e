//! Dependency classification of filter trees.
//!
//! A tree's flags decide how the engine maintains its membership: a
//! time-dependent tree is recomputed on every tick, a user-dependent tree gets
//! one entry per viewing user. The attribute set narrows which entity changes
//! can affect the tree at all.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use collection_library_rs::events::ChangeKind;
use serde::{Deserialize, Serialize};

use super::ast::FilterNode;

/// Whether a verdict can change with time alone and/or differ between users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyFlags {
    /// The verdict can change solely because time passed.
    pub time_dependent: bool,
    /// The verdict can differ between viewing users.
    pub user_dependent: bool,
}

impl DependencyFlags {
    /// Neither time- nor user-dependent.
    pub const NONE: Self = Self {
        time_dependent: false,
        user_dependent: false,
    };

    /// Time-dependent only.
    pub const TIME: Self = Self {
        time_dependent: true,
        user_dependent: false,
    };

    /// User-dependent only.
    pub const USER: Self = Self {
        time_dependent: false,
        user_dependent: true,
    };
}

impl BitOr for DependencyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            time_dependent: self.time_dependent || rhs.time_dependent,
            user_dependent: self.user_dependent || rhs.user_dependent,
        }
    }
}

impl BitOrAssign for DependencyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// A group of entity attributes that change together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeDomain {
    /// Resolutions and languages of files.
    Files,
    /// Tag set.
    Tags,
    /// Name, type and rating.
    Metadata,
    /// Episode and missing-episode counts.
    Episodes,
    /// Air, end and added dates.
    Dates,
    /// Per-user watch state.
    UserState,
}

impl AttributeDomain {
    const ALL: [AttributeDomain; 6] = [
        AttributeDomain::Files,
        AttributeDomain::Tags,
        AttributeDomain::Metadata,
        AttributeDomain::Episodes,
        AttributeDomain::Dates,
        AttributeDomain::UserState,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A small set of [`AttributeDomain`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(u8);

impl AttributeSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Every domain.
    pub const ALL: Self = Self(0b0011_1111);

    /// Builds a set from a list of domains.
    pub fn of(domains: &[AttributeDomain]) -> Self {
        Self(domains.iter().fold(0, |bits, d| bits | d.bit()))
    }

    /// Returns the domains an entity change can touch.
    ///
    /// Additions and removals touch everything, since the entity itself
    /// enters or leaves every candidate set.
    pub fn touched_by(change: ChangeKind) -> Self {
        match change {
            ChangeKind::Added | ChangeKind::Removed => Self::ALL,
            ChangeKind::FilesChanged => Self::of(&[AttributeDomain::Files]),
            ChangeKind::TagsChanged => Self::of(&[AttributeDomain::Tags]),
            ChangeKind::EpisodesChanged => Self::of(&[AttributeDomain::Episodes]),
            ChangeKind::MetadataChanged => {
                Self::of(&[AttributeDomain::Metadata, AttributeDomain::Dates])
            }
        }
    }

    /// Returns true if the set contains the domain.
    pub fn contains(&self, domain: AttributeDomain) -> bool {
        self.0 & domain.bit() != 0
    }

    /// Returns true if the sets share a domain.
    pub fn intersects(&self, other: AttributeSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the contained domains.
    pub fn iter(&self) -> impl Iterator<Item = AttributeDomain> + '_ {
        AttributeDomain::ALL
            .into_iter()
            .filter(move |d| self.contains(*d))
    }
}

impl BitOr for AttributeSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Result of classifying a whole tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    /// Time/user dependency of the tree.
    pub flags: DependencyFlags,
    /// Attribute domains read anywhere in the tree.
    pub attributes: AttributeSet,
}

impl Classification {
    /// Returns true if an entity change of this kind can affect the verdict.
    pub fn affected_by(&self, change: ChangeKind) -> bool {
        self.attributes.intersects(AttributeSet::touched_by(change))
    }
}

/// Classifies a tree in a single bottom-up pass.
///
/// A composite node's flags and attributes are the union of its children's;
/// a leaf's are fixed by its operator kind.
pub fn classify(node: &FilterNode) -> Classification {
    let kind = node.kind();
    node.children().iter().map(classify).fold(
        Classification {
            flags: kind.leaf_flags(),
            attributes: kind.attributes(),
        },
        |acc, child| Classification {
            flags: acc.flags | child.flags,
            attributes: acc.attributes | child.attributes,
        },
    )
}

impl FilterNode {
    /// Returns the dependency flags of this tree.
    pub fn dependencies(&self) -> DependencyFlags {
        classify(self).flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_bitor() {
        assert_eq!(
            DependencyFlags::TIME | DependencyFlags::USER,
            DependencyFlags {
                time_dependent: true,
                user_dependent: true
            }
        );
        assert_eq!(
            DependencyFlags::NONE | DependencyFlags::NONE,
            DependencyFlags::NONE
        );
    }

    #[test]
    fn test_leaf_flags() {
        assert_eq!(
            FilterNode::has_resolution("1080p").unwrap().dependencies(),
            DependencyFlags::NONE
        );
        assert_eq!(FilterNode::IsWatched.dependencies(), DependencyFlags::USER);
        assert_eq!(
            FilterNode::AiredWithinDays { days: 7 }.dependencies(),
            DependencyFlags::TIME
        );
    }

    #[test]
    fn test_composite_flags_are_union_of_children() {
        let tree = FilterNode::and(vec![
            FilterNode::has_resolution("1080p").unwrap(),
            FilterNode::negate(FilterNode::IsWatched),
            FilterNode::or(vec![FilterNode::AiredWithinDays { days: 7 }]),
        ]);

        let flags = tree.dependencies();
        assert!(flags.time_dependent);
        assert!(flags.user_dependent);
    }

    #[test]
    fn test_not_passes_child_flags_through() {
        let child = FilterNode::WatchedWithinDays { days: 3 };
        let flags = child.dependencies();
        assert_eq!(FilterNode::negate(child).dependencies(), flags);
    }

    #[test]
    fn test_attributes_union() {
        let tree = FilterNode::and(vec![
            FilterNode::has_tag("mecha").unwrap(),
            FilterNode::has_resolution("720p").unwrap(),
        ]);
        let classification = classify(&tree);

        assert!(classification.attributes.contains(AttributeDomain::Tags));
        assert!(classification.attributes.contains(AttributeDomain::Files));
        assert!(!classification.attributes.contains(AttributeDomain::Dates));
    }

    #[test]
    fn test_affected_by_change_kind() {
        let classification = classify(&FilterNode::has_tag("mecha").unwrap());

        assert!(classification.affected_by(ChangeKind::TagsChanged));
        assert!(classification.affected_by(ChangeKind::Added));
        assert!(classification.affected_by(ChangeKind::Removed));
        assert!(!classification.affected_by(ChangeKind::FilesChanged));
        assert!(!classification.affected_by(ChangeKind::MetadataChanged));
    }

    #[test]
    fn test_attribute_set_iter() {
        let set = AttributeSet::of(&[AttributeDomain::Dates, AttributeDomain::Files]);
        let domains: Vec<AttributeDomain> = set.iter().collect();
        assert_eq!(domains, vec![AttributeDomain::Files, AttributeDomain::Dates]);
        assert!(AttributeSet::EMPTY.is_empty());
    }
}
