//! Click stream subscription
//!
//! `ClickStream` is the document-level click dispatcher. Listeners are plain
//! synchronous closures invoked in registration order within `dispatch`.
//! `subscribe` returns a `Subscription`; dropping it (or calling `cancel`)
//! removes the listener, so a scope that owns the subscription can never
//! leak a listener past its own lifetime.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, trace};

use super::dom::{Document, NodeId};

/// A pointer click delivered to listeners
pub struct ClickEvent<'a> {
    pub document: &'a Document,
    pub target: NodeId,
    /// Viewport pixels
    pub x: f64,
    pub y: f64,
    default_prevented: Cell<bool>,
    passive: Cell<bool>,
}

impl<'a> ClickEvent<'a> {
    pub fn new(document: &'a Document, target: NodeId, x: f64, y: f64) -> Self {
        Self {
            document,
            target,
            x,
            y,
            default_prevented: Cell::new(false),
            passive: Cell::new(false),
        }
    }

    /// Ask to cancel the element's default action
    ///
    /// Ignored while a passive listener is running.
    pub fn prevent_default(&self) {
        if self.passive.get() {
            debug!("Ignoring prevent_default from passive click listener");
            return;
        }
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

/// Registration options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Passive listeners can never block the default action
    pub passive: bool,
}

impl ListenerOptions {
    pub fn passive() -> Self {
        Self { passive: true }
    }
}

/// What happened to one dispatched click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Number of listeners invoked
    pub listeners: usize,
    /// Whether a non-passive listener cancelled the default action
    pub default_prevented: bool,
}

type Handler = Arc<dyn Fn(&ClickEvent<'_>) + Send + Sync>;

struct Listener {
    id: u64,
    options: ListenerOptions,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    listeners: RwLock<Vec<Listener>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }
}

/// Document-wide click dispatcher
#[derive(Clone, Default)]
pub struct ClickStream {
    registry: Arc<Registry>,
}

impl ClickStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every future click
    pub fn subscribe<F>(&self, options: ListenerOptions, handler: F) -> Subscription
    where
        F: Fn(&ClickEvent<'_>) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Listener {
                id,
                options,
                handler: Arc::new(handler),
            });

        trace!("Click listener {} registered (passive={})", id, options.passive);
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver a click to every listener registered right now
    ///
    /// The listener list is snapshotted first, so handlers may subscribe or
    /// cancel without deadlocking; such changes apply from the next click.
    pub fn dispatch(&self, event: &ClickEvent<'_>) -> DispatchOutcome {
        let snapshot: Vec<(ListenerOptions, Handler)> = self
            .registry
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|l| (l.options, Arc::clone(&l.handler)))
            .collect();

        for (options, handler) in &snapshot {
            event.passive.set(options.passive);
            handler(event);
        }
        event.passive.set(false);

        DispatchOutcome {
            listeners: snapshot.len(),
            default_prevented: event.default_prevented(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Cancellation token for one registered listener
///
/// Dropping the token deregisters the listener.
#[must_use = "dropping a Subscription immediately removes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Deregister now
    pub fn cancel(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                trace!("Click listener {} removed", self.id);
            }
        }
    }
}
