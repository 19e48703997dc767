//! End-to-end properties of the reconciliation engine.
//!
//! Each test drives a [`Reconciler`] over a small char graph from the shared
//! fixture and checks identity, ordering and sweep behavior across passes.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use rstest::rstest;

use common::{Graph, Tally, Uppercase, order, reconciler};
use levelforge_core::reconcile::{
    NodeId, RebuildStatus, Reconciler, UpdateContext, UpdateOutcome, ViewId, ViewObject,
};

// ============================================================================
// Identity
// ============================================================================

#[test]
fn noop_rebuild_is_idempotent() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['a', 'b']);
    graph.children.insert('a', vec!['x', 'y']);

    r.invalidate(&graph);
    let first: Vec<ViewId> = r.ordered_ids().collect();
    let created = tally.factory_calls.get();

    r.invalidate(&graph);
    let second: Vec<ViewId> = r.ordered_ids().collect();

    assert_eq!(first, second);
    assert_eq!(tally.factory_calls.get(), created);
    assert_eq!(r.last_stats().created, 0);
}

#[test]
fn identity_survives_unrelated_changes() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['a', 'b']);

    r.invalidate(&graph);
    let a = r.lookup(&'a');

    graph.roots.push('c');
    graph.touch('b');
    r.invalidate(&graph);

    assert_eq!(r.lookup(&'a'), a);
    assert_eq!(order(&r), vec!['a', 'b', 'c']);
}

#[test]
fn stale_view_is_recreated_exactly_once() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['a']);

    r.invalidate(&graph);
    let before = r.lookup(&'a');
    let updates_before = tally.updates_of('a');
    let created_before = tally.factory_calls.get();

    graph.touch('a');
    r.invalidate(&graph);

    assert_eq!(tally.updates_of('a') - updates_before, 2);
    assert_eq!(tally.factory_calls.get() - created_before, 1);
    assert_ne!(r.lookup(&'a'), before);
    assert_eq!(r.last_stats().recreated, 1);
}

#[test]
fn recreated_parent_keeps_its_children() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['a', 'z']);
    graph.children.insert('a', vec!['b', 'c']);

    r.invalidate(&graph);
    let b = r.lookup(&'b');
    let c = r.lookup(&'c');

    graph.touch('a');
    r.invalidate(&graph);

    assert_eq!(order(&r), vec!['a', 'b', 'c', 'z']);
    assert_eq!(r.lookup(&'b'), b);
    assert_eq!(r.lookup(&'c'), c);
    assert_eq!(r.len(), 4);
}

#[test]
fn shared_child_is_updated_once_per_pass() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['a', 'b']);
    graph.children.insert('a', vec!['s']);
    graph.children.insert('b', vec!['s']);

    r.invalidate(&graph);

    assert_eq!(tally.updates_of('s'), 1);
    assert_eq!(order(&r), vec!['a', 's', 'b']);
}

// ============================================================================
// Sweep
// ============================================================================

#[test]
fn scenario_a_unreferenced_object_is_swept() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['A', 'B']);

    r.invalidate(&graph);
    let a = r.lookup(&'A').unwrap();
    let b = r.lookup(&'B').unwrap();
    assert_eq!(r.ordered_ids().collect::<Vec<_>>(), vec![a, b]);

    graph.roots.retain(|&k| k != 'B');
    r.invalidate(&graph);

    assert_eq!(r.lookup(&'B'), None);
    assert!(r.get(b).is_none());
    assert_eq!(r.ordered_ids().collect::<Vec<_>>(), vec![a]);
    assert_eq!(r.last_stats().swept, 1);
}

#[rstest]
#[case(&['a', 'b', 'c'], &['a', 'b', 'c'], 0)]
#[case(&['a', 'b', 'c'], &['b'], 2)]
#[case(&['a', 'b', 'c'], &[], 3)]
#[case(&['a'], &['b', 'c'], 1)]
fn sweep_counts_dropped_roots(
    #[case] before: &[char],
    #[case] after: &[char],
    #[case] swept: usize,
) {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);

    r.invalidate(&Graph::with_roots(before));
    r.invalidate(&Graph::with_roots(after));

    assert_eq!(r.last_stats().swept, swept);
    assert_eq!(r.mapped_count(), after.len());
    assert_eq!(order(&r), after.to_vec());
}

#[test]
fn subtree_disappears_with_its_parent() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['a', 'b']);
    graph.children.insert('a', vec!['x']);
    graph.children.insert('x', vec!['y']);

    r.invalidate(&graph);
    assert_eq!(r.len(), 4);

    graph.roots = vec!['b'];
    r.invalidate(&graph);

    assert_eq!(order(&r), vec!['b']);
    assert_eq!(r.lookup(&'y'), None);
}

// ============================================================================
// Object-less nodes
// ============================================================================

struct Panels {
    frames: Vec<char>,
    outlined: bool,
}

enum PanelView {
    Frame {
        outline: Option<NodeId>,
        outlines_built: Rc<Cell<usize>>,
    },
    Outline,
}

impl ViewObject for PanelView {
    type Key = char;
    type Model = Panels;

    fn update(&mut self, ctx: &mut UpdateContext<'_, Self>, panels: &Panels) -> UpdateOutcome {
        if let PanelView::Frame {
            outline,
            outlines_built,
        } = self
        {
            if panels.outlined {
                let node = *outline.get_or_insert_with(|| ctx.new_node_id());
                let built = outlines_built.clone();
                ctx.add_or_update(node, move || {
                    built.set(built.get() + 1);
                    PanelView::Outline
                });
            }
        }
        UpdateOutcome::VALID
    }
}

fn panels(outlines_built: &Rc<Cell<usize>>) -> Reconciler<PanelView> {
    let outlines_built = outlines_built.clone();
    Reconciler::<PanelView>::new(move |ctx, panels: &Panels| {
        for &key in &panels.frames {
            let outlines_built = outlines_built.clone();
            ctx.get_or_create(key, move || PanelView::Frame {
                outline: None,
                outlines_built: outlines_built.clone(),
            });
        }
    })
}

fn outline_of(r: &Reconciler<PanelView>, frame: char) -> NodeId {
    let id = r.lookup(&frame).expect("frame is registered");
    match r.get(id) {
        Some(PanelView::Frame {
            outline: Some(node),
            ..
        }) => *node,
        _ => panic!("frame {frame} has no outline"),
    }
}

#[test]
fn object_less_node_keeps_identity_and_is_swept() {
    let built = Rc::new(Cell::new(0));
    let mut r = panels(&built);
    let mut model = Panels {
        frames: vec!['a'],
        outlined: true,
    };

    r.invalidate(&model);
    let node = outline_of(&r, 'a');
    let outline = r.lookup_node(node).expect("outline is registered");
    assert_eq!(built.get(), 1);
    assert_eq!(r.len(), 2);

    r.invalidate(&model);
    assert_eq!(r.lookup_node(node), Some(outline));
    assert!(matches!(r.get(outline), Some(PanelView::Outline)));
    assert_eq!(built.get(), 1);
    assert_eq!(r.last_stats().created, 0);

    model.outlined = false;
    r.invalidate(&model);
    assert_eq!(r.lookup_node(node), None);
    assert_eq!(r.last_stats().swept, 1);
    assert_eq!(r.len(), 1);
}

// ============================================================================
// Suspension and notifications
// ============================================================================

#[test]
fn suspended_requests_coalesce() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let graph = Graph::with_roots(&['a']);
    let passes = Rc::new(Cell::new(0));
    let handle = passes.clone();
    r.on_after_rebuild(move |_| handle.set(handle.get() + 1));

    r.suspend();
    assert_eq!(r.invalidate(&graph), RebuildStatus::Deferred);
    assert_eq!(r.invalidate(&graph), RebuildStatus::Deferred);
    assert!(r.has_pending());
    assert_eq!(passes.get(), 0);

    assert!(r.resume(&graph).is_some());
    assert_eq!(passes.get(), 1);
    assert_eq!(order(&r), vec!['a']);
}

#[test]
fn capability_snapshot_filters_views() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['A', 'b', 'C']);
    graph.children.insert('b', vec!['D']);

    r.invalidate(&graph);

    let keys: Vec<char> = r
        .snapshot::<Uppercase>()
        .into_iter()
        .filter_map(|id| r.get(id).map(|v| v.key))
        .collect();
    assert_eq!(keys, vec!['A', 'D', 'C']);
}

#[test]
#[should_panic(expected = "cycle")]
fn cycle_in_graph_is_fatal() {
    let tally = Rc::new(Tally::default());
    let mut r = reconciler(&tally);
    let mut graph = Graph::with_roots(&['a']);
    graph.children.insert('a', vec!['b']);
    graph.children.insert('b', vec!['a']);

    r.invalidate(&graph);
}
