//! The reconciliation engine.
//!
//! A [`Reconciler`] rebuilds the live view-object tree from a data model,
//! top-down from a root traversal, while preserving the identity of every
//! view object whose data object is still referenced.

use std::collections::HashSet;
use std::fmt;

use crate::observer::{Observers, SubscriptionId};

use super::arena::Arena;
use super::identity_map::IdentityMap;
use super::view::{Capability, MapKey, NodeId, UpdateOutcome, ViewId, ViewObject};

/// Root traversal: registers the top-level data objects of the model.
pub type RootFn<V> = dyn FnMut(&mut UpdateContext<'_, V>, &<V as ViewObject>::Model);

/// Counters collected during one completed rebuild pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// View objects built for data objects seen for the first time.
    pub created: usize,
    /// Existing view objects updated in place.
    pub reused: usize,
    /// View objects that reported themselves invalid and were rebuilt.
    pub recreated: usize,
    /// Mapping entries dropped because nothing referenced them.
    pub swept: usize,
    /// Length of the ordered live-object list after the pass.
    pub live: usize,
}

/// Outcome of [`Reconciler::invalidate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStatus {
    /// A full pass ran.
    Completed(RebuildStats),
    /// Rebuilds are suspended; the request was coalesced into the pending flag.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Updating,
}

struct OrderEntry<K> {
    key: MapKey<K>,
    id: ViewId,
}

/// State a pass mutates, split from [`Reconciler`] so the root closure can be
/// called while the context borrows it.
struct PassState<V: ViewObject> {
    mapping: IdentityMap<MapKey<V::Key>, ViewId>,
    views: Arena<V>,
    order: Vec<OrderEntry<V::Key>>,
    /// Keys whose update is currently on the stack.
    visiting: HashSet<MapKey<V::Key>>,
    stats: RebuildStats,
    next_node: u64,
}

impl<V: ViewObject> PassState<V> {
    fn new_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }
}

/// Handle given to the root traversal and to [`ViewObject::update`] for
/// registering children during a pass.
///
/// Only exists while a pass is running, so registering children outside a
/// pass cannot be expressed.
pub struct UpdateContext<'a, V: ViewObject> {
    state: &'a mut PassState<V>,
    model: &'a V::Model,
}

impl<'a, V: ViewObject> UpdateContext<'a, V> {
    /// Returns the view object for `key`, creating it with `factory` if the
    /// key is new, and brings it up to date for this pass.
    ///
    /// An entry already visited this pass is returned unchanged without
    /// calling `factory` or `update` again.
    ///
    /// # Panics
    ///
    /// Panics if a recreated object still reports itself invalid, or if
    /// `key` is reached again while its own update is running (a cycle in
    /// the data graph). A freshly created object that reports itself invalid
    /// is kept as is; only cached objects are recreated.
    pub fn get_or_create(&mut self, key: V::Key, factory: impl FnMut() -> V) -> ViewId {
        self.visit(MapKey::Data(key), factory)
    }

    /// Same protocol as [`get_or_create`](Self::get_or_create) for a node
    /// without a data object, keyed by its own [`NodeId`].
    pub fn add_or_update(&mut self, node: NodeId, factory: impl FnMut() -> V) -> ViewId {
        self.visit(MapKey::Node(node), factory)
    }

    /// Allocates an identity for a new object-less node.
    pub fn new_node_id(&mut self) -> NodeId {
        self.state.new_node_id()
    }

    /// The model this pass is rebuilding from.
    pub fn model(&self) -> &'a V::Model {
        self.model
    }

    /// Reads a view object registered earlier in this pass (or kept from the
    /// previous one). Returns `None` for an object whose update is running.
    pub fn view(&self, id: ViewId) -> Option<&V> {
        self.state.views.get(id)
    }

    fn visit(&mut self, key: MapKey<V::Key>, mut factory: impl FnMut() -> V) -> ViewId {
        let (id, just_created) = match self.state.mapping.try_get(&key) {
            Some((&id, false)) => return id,
            Some((&id, true)) => (id, false),
            None => {
                self.state.stats.created += 1;
                (self.state.views.insert(factory()), true)
            }
        };

        let mark = self.state.order.len();
        let outcome = self.run_update(key, id);
        if just_created || outcome.is_valid() {
            if !just_created {
                self.state.stats.reused += 1;
            }
            self.state.mapping.set(key, id);
            return id;
        }

        // Roll back everything the stale object registered. Entries it
        // visited go back to dirty so the replacement re-registers them.
        for entry in self.state.order.drain(mark..).skip(1) {
            self.state.mapping.mark_dirty(&entry.key);
        }
        self.state.views.remove(id);

        log::trace!("Recreating stale view object for {key:?}");
        let id = self.state.views.insert(factory());
        let outcome = self.run_update(key, id);
        assert!(
            outcome.is_valid(),
            "recreated view object for {key:?} still reports itself invalid"
        );
        self.state.stats.recreated += 1;
        self.state.mapping.set(key, id);
        id
    }

    fn run_update(&mut self, key: MapKey<V::Key>, id: ViewId) -> UpdateOutcome {
        if !self.state.visiting.insert(key) {
            panic!("cycle in data graph: {key:?} was reached again while updating");
        }
        self.state.order.push(OrderEntry { key, id });
        let mut view = self
            .state
            .views
            .take(id)
            .expect("view object checked out twice");
        let model = self.model;
        let outcome = view.update(self, model);
        self.state.views.restore(id, view);
        self.state.visiting.remove(&key);
        outcome
    }
}

/// Incremental object-graph reconciliation engine.
///
/// Owns an [`IdentityMap`] from data-object keys to view objects and the
/// ordered list of objects visited by the last pass. Passes are started with
/// [`invalidate`](Self::invalidate); while rebuilds are suspended, requests
/// are coalesced into one pending pass that runs on the outermost
/// [`resume`](Self::resume).
///
/// # Example
///
/// ```
/// use levelforge_core::reconcile::{Reconciler, UpdateContext, UpdateOutcome, ViewObject};
///
/// struct Label(u32);
///
/// impl ViewObject for Label {
///     type Key = u32;
///     type Model = Vec<u32>;
///
///     fn update(&mut self, _ctx: &mut UpdateContext<'_, Self>, _model: &Vec<u32>) -> UpdateOutcome {
///         UpdateOutcome::VALID
///     }
/// }
///
/// let mut reconciler = Reconciler::<Label>::new(|ctx, model: &Vec<u32>| {
///     for &item in model {
///         ctx.get_or_create(item, || Label(item));
///     }
/// });
///
/// reconciler.invalidate(&vec![1, 2]);
/// let first = reconciler.lookup(&1).unwrap();
///
/// reconciler.invalidate(&vec![1]);
/// assert_eq!(reconciler.lookup(&1), Some(first));
/// assert_eq!(reconciler.lookup(&2), None);
/// ```
pub struct Reconciler<V: ViewObject> {
    state: PassState<V>,
    root: Box<RootFn<V>>,
    phase: Phase,
    suspend_depth: u32,
    pending: bool,
    after_rebuild: Observers<RebuildStats>,
}

impl<V: ViewObject> Reconciler<V> {
    /// Creates an empty reconciler driven by the given root traversal.
    pub fn new(root: impl FnMut(&mut UpdateContext<'_, V>, &V::Model) + 'static) -> Self {
        Self {
            state: PassState {
                mapping: IdentityMap::new(),
                views: Arena::new(),
                order: Vec::new(),
                visiting: HashSet::new(),
                stats: RebuildStats::default(),
                next_node: 0,
            },
            root: Box::new(root),
            phase: Phase::Idle,
            suspend_depth: 0,
            pending: false,
            after_rebuild: Observers::new(),
        }
    }

    /// Requests a full rebuild pass.
    ///
    /// Runs the pass immediately unless rebuilds are suspended, in which case
    /// the request is recorded and [`RebuildStatus::Deferred`] is returned.
    ///
    /// # Panics
    ///
    /// Panics if called while a pass is in progress (for example after a
    /// previous pass unwound from a panic).
    pub fn invalidate(&mut self, model: &V::Model) -> RebuildStatus {
        assert!(
            self.phase == Phase::Idle,
            "Reconciler::invalidate is not reentrant: a rebuild pass is already in progress"
        );
        if self.suspend_depth > 0 {
            if !self.pending {
                log::trace!("Rebuild deferred while suspended");
            }
            self.pending = true;
            return RebuildStatus::Deferred;
        }
        RebuildStatus::Completed(self.rebuild(model))
    }

    fn rebuild(&mut self, model: &V::Model) -> RebuildStats {
        self.phase = Phase::Updating;
        self.pending = false;

        self.state.mapping.begin_update();
        self.state.order.clear();
        self.state.visiting.clear();
        self.state.stats = RebuildStats::default();

        {
            let mut ctx = UpdateContext {
                state: &mut self.state,
                model,
            };
            (self.root)(&mut ctx, model);
        }

        for (_, id) in self.state.mapping.end_update() {
            // Dropping the view object releases whatever it holds.
            drop(self.state.views.remove(id));
            self.state.stats.swept += 1;
        }

        self.state.stats.live = self.state.order.len();
        self.phase = Phase::Idle;

        let stats = self.state.stats;
        log::debug!(
            "Rebuild pass: {} live, {} created, {} reused, {} recreated, {} swept",
            stats.live,
            stats.created,
            stats.reused,
            stats.recreated,
            stats.swept
        );
        self.after_rebuild.emit(&stats);
        stats
    }

    /// Suspends rebuilds. Calls nest; each must be paired with [`resume`](Self::resume).
    pub fn suspend(&mut self) {
        self.suspend_depth += 1;
    }

    /// Ends one level of suspension. The outermost resume runs the pending
    /// pass, if any request was coalesced.
    ///
    /// # Panics
    ///
    /// Panics if rebuilds are not suspended.
    pub fn resume(&mut self, model: &V::Model) -> Option<RebuildStats> {
        assert!(self.suspend_depth > 0, "Reconciler::resume without matching suspend");
        self.suspend_depth -= 1;
        if self.suspend_depth == 0 && self.pending {
            Some(self.rebuild(model))
        } else {
            None
        }
    }

    /// Runs `f` with rebuilds suspended, then resumes.
    pub fn with_suspended<R>(&mut self, model: &V::Model, f: impl FnOnce(&mut Self) -> R) -> R {
        self.suspend();
        let result = f(self);
        self.resume(model);
        result
    }

    /// Returns `true` while rebuilds are suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspend_depth > 0
    }

    /// Returns `true` if a rebuild request is waiting for the outermost resume.
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Allocates an identity for an object-less node outside of a pass.
    pub fn new_node_id(&mut self) -> NodeId {
        self.state.new_node_id()
    }

    /// Returns the view object for a data object, if it is live.
    pub fn lookup(&self, key: &V::Key) -> Option<ViewId> {
        self.state.mapping.get(&MapKey::Data(*key)).copied()
    }

    /// Returns the view object for an object-less node, if it is live.
    pub fn lookup_node(&self, node: NodeId) -> Option<ViewId> {
        self.state.mapping.get(&MapKey::Node(node)).copied()
    }

    pub fn get(&self, id: ViewId) -> Option<&V> {
        self.state.views.get(id)
    }

    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut V> {
        self.state.views.get_mut(id)
    }

    /// Handles of the live objects in the order the last pass visited them.
    pub fn ordered_ids(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.state.order.iter().map(|e| e.id)
    }

    /// Live objects in visiting order.
    pub fn views(&self) -> impl Iterator<Item = (ViewId, &V)> + '_ {
        self.state
            .order
            .iter()
            .filter_map(|e| self.state.views.get(e.id).map(|v| (e.id, v)))
    }

    /// Handles of the live objects providing capability `C`, in visiting order.
    pub fn snapshot<C: Capability<V>>(&self) -> Vec<ViewId> {
        self.views()
            .filter(|(_, view)| C::applies_to(view))
            .map(|(id, _)| id)
            .collect()
    }

    /// Calls `action` for every live object providing capability `C`.
    ///
    /// Iterates a snapshot taken before the first call.
    pub fn for_each<C: Capability<V>>(&mut self, mut action: impl FnMut(ViewId, &mut V)) {
        for id in self.snapshot::<C>() {
            if let Some(view) = self.state.views.get_mut(id) {
                action(id, view);
            }
        }
    }

    /// Number of live objects in the ordered list.
    pub fn len(&self) -> usize {
        self.state.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.order.is_empty()
    }

    /// Number of mapping entries (data objects and object-less nodes).
    pub fn mapped_count(&self) -> usize {
        self.state.mapping.len()
    }

    /// Statistics of the last completed pass.
    pub fn last_stats(&self) -> RebuildStats {
        self.state.stats
    }

    /// Registers an observer notified once per completed pass.
    pub fn on_after_rebuild(&mut self, handler: impl FnMut(&RebuildStats) + 'static) -> SubscriptionId {
        self.after_rebuild.subscribe(handler)
    }

    pub fn remove_observer(&mut self, id: SubscriptionId) -> bool {
        self.after_rebuild.unsubscribe(id)
    }
}

impl<V: ViewObject> fmt::Debug for Reconciler<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("live", &self.state.order.len())
            .field("mapped", &self.state.mapping.len())
            .field("arena", &self.state.views.len())
            .field("phase", &self.phase)
            .field("suspend_depth", &self.suspend_depth)
            .field("pending", &self.pending)
            .finish()
    }
}
