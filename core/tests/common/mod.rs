//! Shared fixture: a small graph model, an instrumented view object and an
//! integer-swapping command.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use levelforge_core::abstract_editor::{Command, EditContext};
use levelforge_core::reconcile::{Capability, Reconciler, UpdateContext, UpdateOutcome, ViewObject};

/// Nodes named by a char, children by adjacency, staleness by revision.
#[derive(Debug, Default)]
pub struct Graph {
    pub roots: Vec<char>,
    pub children: HashMap<char, Vec<char>>,
    pub revision: HashMap<char, u32>,
    pub counter: i32,
}

impl Graph {
    pub fn with_roots(roots: &[char]) -> Self {
        Self {
            roots: roots.to_vec(),
            ..Default::default()
        }
    }

    pub fn touch(&mut self, key: char) {
        *self.revision.entry(key).or_default() += 1;
    }
}

#[derive(Debug, Default)]
pub struct Tally {
    pub factory_calls: Cell<usize>,
    pub updates: RefCell<HashMap<char, usize>>,
}

impl Tally {
    pub fn updates_of(&self, key: char) -> usize {
        self.updates.borrow().get(&key).copied().unwrap_or(0)
    }
}

pub struct NodeView {
    pub key: char,
    built_from: Option<u32>,
    tally: Rc<Tally>,
}

impl ViewObject for NodeView {
    type Key = char;
    type Model = Graph;

    fn update(&mut self, ctx: &mut UpdateContext<'_, Self>, graph: &Graph) -> UpdateOutcome {
        *self.tally.updates.borrow_mut().entry(self.key).or_default() += 1;

        let revision = graph.revision.get(&self.key).copied().unwrap_or(0);
        if let Some(built) = self.built_from {
            if built != revision {
                return UpdateOutcome::INVALID;
            }
        }
        self.built_from = Some(revision);

        for &child in graph.children.get(&self.key).into_iter().flatten() {
            let tally = self.tally.clone();
            ctx.get_or_create(child, move || node(child, &tally));
        }
        UpdateOutcome::VALID
    }
}

/// Views whose key is an uppercase letter.
pub struct Uppercase;

impl Capability<NodeView> for Uppercase {
    fn applies_to(view: &NodeView) -> bool {
        view.key.is_ascii_uppercase()
    }
}

pub fn node(key: char, tally: &Rc<Tally>) -> NodeView {
    tally.factory_calls.set(tally.factory_calls.get() + 1);
    NodeView {
        key,
        built_from: None,
        tally: tally.clone(),
    }
}

pub fn reconciler(tally: &Rc<Tally>) -> Reconciler<NodeView> {
    let tally = tally.clone();
    Reconciler::<NodeView>::new(move |ctx, graph: &Graph| {
        for &key in &graph.roots {
            let tally = tally.clone();
            ctx.get_or_create(key, move || node(key, &tally));
        }
    })
}

pub fn order(reconciler: &Reconciler<NodeView>) -> Vec<char> {
    reconciler.views().map(|(_, view)| view.key).collect()
}

/// Records the counter value before the change; reverting swaps it back.
#[derive(Debug)]
pub struct SetCounter {
    pub previous: i32,
}

impl SetCounter {
    pub fn apply(value: i32) -> impl FnOnce(&mut Graph) -> SetCounter {
        move |graph| SetCounter {
            previous: std::mem::replace(&mut graph.counter, value),
        }
    }
}

impl Command for SetCounter {
    type Model = Graph;

    fn name(&self) -> &str {
        "Set counter"
    }

    fn revert(self, graph: &mut Graph) -> Self {
        SetCounter {
            previous: std::mem::replace(&mut graph.counter, self.previous),
        }
    }
}

pub type GraphContext = EditContext<NodeView, SetCounter>;

pub fn context(roots: &[char]) -> (GraphContext, Rc<Tally>) {
    let tally = Rc::new(Tally::default());
    let ctx = EditContext::new(Graph::with_roots(roots), reconciler(&tally), 100);
    (ctx, tally)
}

/// Counts update notifications fired by `ctx`.
pub fn count_updates(ctx: &mut GraphContext) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let handle = count.clone();
    ctx.on_update(move |_| handle.set(handle.get() + 1));
    count
}
