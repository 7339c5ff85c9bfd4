//! In-process event router.
//!
//! [`EventRouter`] maps each [`EventName`] to an ordered list of listener
//! callbacks. Dispatch is synchronous: every listener registered for the
//! event at the moment dispatch starts is called once, in registration
//! order, before [`EventRouter::dispatch`] returns. It is designed to be
//! shared via `Arc<EventRouter>` between the channel client (which
//! dispatches) and the orchestrators (which listen).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::messages::{EventName, ServerEvent};

/// A registered listener callback.
pub type Handler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Handle identifying one registration, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    /// Bumped by every [`EventRouter::remove_all`].
    generation: u64,
    listeners: HashMap<EventName, Vec<(ListenerId, Handler)>>,
}

/// Name-keyed fan-out of [`ServerEvent`]s to listener callbacks.
///
/// # Usage
///
/// ```rust
/// use resumatch_events::{EventName, EventRouter, ServerEvent};
///
/// let router = EventRouter::new();
/// router.on(EventName::ParseStarted, |event: &ServerEvent| {
///     println!("{}", event.name());
/// });
/// ```
#[derive(Default)]
pub struct EventRouter {
    registry: Mutex<Registry>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`.
    ///
    /// Registrations are additive: a second handler for the same name is
    /// called after the first, never instead of it.
    pub fn on<F>(&self, name: EventName, handler: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.subscribe(name, handler);
    }

    /// Like [`on`](Self::on), but returns a [`ListenerId`] so the
    /// registration can later be removed with [`off`](Self::off).
    pub fn subscribe<F>(&self, name: EventName, handler: F) -> ListenerId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .listeners
            .entry(name)
            .or_default()
            .push((id, Arc::new(handler)));
        tracing::trace!(event = %name, listener = id.0, "Listener registered");
        id
    }

    /// Remove a single registration. Returns `false` if it was already gone
    /// (for instance after [`remove_all`](Self::remove_all)).
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.lock();
        for handlers in registry.listeners.values_mut() {
            if let Some(pos) = handlers.iter().position(|(lid, _)| *lid == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    /// Drop every registration. Used at channel teardown.
    pub fn remove_all(&self) {
        let mut registry = self.lock();
        let dropped: usize = registry.listeners.values().map(Vec::len).sum();
        registry.listeners.clear();
        registry.generation += 1;
        tracing::debug!(dropped, generation = registry.generation, "All listeners removed");
    }

    /// Number of [`remove_all`](Self::remove_all) calls so far. A
    /// registration made under an older generation is gone.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Deliver `event` to every listener registered for its name.
    ///
    /// The listener list is snapshotted before any callback runs, so
    /// listeners added or removed by a callback do not affect this
    /// dispatch. Returns the number of listeners invoked.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let name = event.name();
        let snapshot: Vec<Handler> = self
            .lock()
            .listeners
            .get(&name)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if snapshot.is_empty() {
            tracing::debug!(event = %name, "No listeners for event");
        }
        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    /// Number of listeners currently registered for `name`.
    pub fn listener_count(&self, name: EventName) -> usize {
        self.lock().listeners.get(&name).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Callbacks never run under the lock, so a poisoned registry is
        // still structurally sound.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns a set of registrations and removes them when dropped.
///
/// This is how a consumer scopes its listeners to its own lifetime:
/// acquire on construction, release on drop.
pub struct ListenerGuard {
    router: Arc<EventRouter>,
    ids: Vec<ListenerId>,
    generation: u64,
}

impl ListenerGuard {
    pub fn new(router: Arc<EventRouter>) -> Self {
        let generation = router.generation();
        Self {
            router,
            ids: Vec::new(),
            generation,
        }
    }

    /// Register `handler` and keep its id for release on drop.
    pub fn on<F>(&mut self, name: EventName, handler: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let id = self.router.subscribe(name, handler);
        self.ids.push(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `false` once the router has dropped every registration since this
    /// guard was created.
    pub fn is_attached(&self) -> bool {
        self.router.generation() == self.generation
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.router.off(id);
        }
    }
}
