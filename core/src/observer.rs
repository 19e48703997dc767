//! Explicit observer lists.
//!
//! [`Observers`] stores boxed handlers for a single event type and calls them
//! synchronously, in registration order, on [`emit`](Observers::emit).
//! Handlers are identified by the [`SubscriptionId`] returned when they are
//! registered so they can be removed again.

use std::fmt;

/// Handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Box<dyn FnMut(&E)>;

/// An ordered list of handlers for events of type `E`.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use levelforge_core::observer::Observers;
///
/// let seen = Rc::new(Cell::new(0));
/// let mut observers = Observers::<u32>::new();
///
/// let counter = seen.clone();
/// let id = observers.subscribe(move |value| counter.set(counter.get() + value));
///
/// observers.emit(&5);
/// assert_eq!(seen.get(), 5);
///
/// observers.unsubscribe(id);
/// observers.emit(&5);
/// assert_eq!(seen.get(), 5);
/// ```
pub struct Observers<E> {
    handlers: Vec<(SubscriptionId, Handler<E>)>,
    next_id: u64,
}

impl<E> Observers<E> {
    /// Creates an empty observer list.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a handler and returns its subscription handle.
    pub fn subscribe(&mut self, handler: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Calls every handler with `event`.
    pub fn emit(&mut self, event: &E) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
