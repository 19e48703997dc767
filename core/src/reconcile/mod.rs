//! Incremental reconciliation of a live view-object tree.
//!
//! The data model of an editable document is owned elsewhere; this module
//! maintains the *view objects* built for it (render proxies, pick targets,
//! cached resource handles) and rebuilds them incrementally:
//!
//! - [`IdentityMap`]: key → value cache with per-pass dirty tracking
//! - [`Reconciler`]: drives rebuild passes from a root traversal and owns
//!   the view objects and their visiting order
//! - [`UpdateContext`]: handed to [`ViewObject::update`] for registering
//!   children during a pass
//! - [`Capability`]: marker-type filters for iterating subsets of views
//!
//! # Pass protocol
//!
//! Every pass marks all mapping entries dirty, walks the model depth-first
//! from the root and sweeps whatever was not visited. A visited object keeps
//! its [`ViewId`] unless its update reports [`UpdateOutcome::INVALID`], in
//! which case it is rebuilt from its factory exactly once.

mod arena;
mod identity_map;
mod reconciler;
mod view;

pub use identity_map::IdentityMap;
pub use reconciler::{RebuildStats, RebuildStatus, Reconciler, RootFn, UpdateContext};
pub use view::{AllViews, Capability, MapKey, NodeId, UpdateOutcome, ViewId, ViewObject};
