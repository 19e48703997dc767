//! Contracts between the reconciler and the view objects it manages.

use std::fmt;
use std::hash::Hash;

use super::reconciler::UpdateContext;

/// A live representation built for one data object (or for itself, for
/// object-less nodes).
///
/// The reconciler creates view objects lazily through a caller-supplied
/// factory and calls [`update`](Self::update) once per rebuild pass in which
/// the object is referenced. A view object may cache derived state (resolved
/// resources, computed bounds); it is dropped when a pass completes without
/// referencing it.
pub trait ViewObject: Sized {
    /// Identity of the data objects this kind of view is built for.
    type Key: Copy + Eq + Hash + fmt::Debug;

    /// The data model handed to every update.
    type Model: ?Sized;

    /// Refreshes the object from `model` and registers its children.
    ///
    /// Implementations call [`UpdateContext::get_or_create`] and
    /// [`UpdateContext::add_or_update`] for every child they still
    /// reference. Return [`UpdateOutcome::INVALID`] exactly when the
    /// object's own cached construction no longer matches the source data;
    /// the reconciler then discards it and builds a fresh one.
    fn update(&mut self, ctx: &mut UpdateContext<'_, Self>, model: &Self::Model) -> UpdateOutcome;
}

/// Result of a [`ViewObject::update`] call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// `false` when the object must be recreated.
    pub valid: bool,
}

impl UpdateOutcome {
    /// The object is up to date.
    pub const VALID: Self = Self { valid: true };
    /// The object's cached construction is stale.
    pub const INVALID: Self = Self { valid: false };

    /// Valid when `condition` holds.
    pub fn valid_if(condition: bool) -> Self {
        Self { valid: condition }
    }

    pub fn is_valid(self) -> bool {
        self.valid
    }
}

/// Filter selecting the view objects that provide some capability.
///
/// Implemented on marker types so that iteration reads as
/// `reconciler.for_each::<Transformable>(..)`.
pub trait Capability<V> {
    /// Returns `true` if `view` provides this capability.
    fn applies_to(view: &V) -> bool;
}

/// Matches every view object.
pub struct AllViews;

impl<V> Capability<V> for AllViews {
    fn applies_to(_view: &V) -> bool {
        true
    }
}

/// Stable handle to a view object owned by a [`Reconciler`](super::Reconciler).
///
/// Handles are generational: once the object is swept or recreated, its old
/// handle no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Identity of a node that has no discrete data object.
///
/// Allocated once by the owner of the node and kept for as long as the node
/// should live; see [`UpdateContext::add_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

/// Key of a mapping entry: either a data object or an object-less node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapKey<K> {
    Data(K),
    Node(NodeId),
}
