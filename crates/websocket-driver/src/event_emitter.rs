//! Named-event listener registry.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{DriverError, ListenerError};

/// An event that knows which listener list it is dispatched to.
pub trait EventType {
    type Kind: Ord + Copy + fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

/// Callback registered with [`EventEmitter::on`].
pub type Listener<E> = Box<dyn FnMut(&E) -> Result<(), ListenerError> + Send + Sync>;

/// Synchronous event dispatcher.
///
/// Listeners for one kind run in registration order. Dispatch holds the
/// emitter mutably, so a listener can never add or remove listeners on the
/// list being walked; the set of listeners notified is fixed when `emit`
/// starts.
pub struct EventEmitter<E: EventType> {
    next_listener_id: u64,
    listeners: BTreeMap<E::Kind, BTreeMap<u64, Listener<E>>>,
}

impl<E: EventType> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventType> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<E::Kind, usize> = self
            .listeners
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .finish()
    }
}

impl<E: EventType> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            next_listener_id: 1,
            listeners: BTreeMap::new(),
        }
    }

    /// Registers `listener` for `kind` and returns its id.
    pub fn on<F>(&mut self, kind: E::Kind, listener: F) -> u64
    where
        F: FnMut(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id = self.next_listener_id.saturating_add(1);
        self.listeners
            .entry(kind)
            .or_default()
            .insert(id, Box::new(listener));
        id
    }

    /// Removes one listener; returns false if it was not registered for `kind`.
    pub fn remove_listener(&mut self, kind: E::Kind, listener_id: u64) -> bool {
        let Some(list) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let removed = list.remove(&listener_id).is_some();
        if list.is_empty() {
            self.listeners.remove(&kind);
        }
        removed
    }

    /// Removes every listener for `kind`, or every listener at all.
    pub fn remove_all_listeners(&mut self, kind: Option<E::Kind>) {
        match kind {
            Some(kind) => {
                self.listeners.remove(&kind);
            }
            None => self.listeners.clear(),
        }
    }

    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.listeners.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Calls every listener registered for the event's kind.
    ///
    /// A failing listener does not stop the others: all of them run, then
    /// the first failure is returned.
    pub fn emit(&mut self, event: &E) -> Result<(), DriverError> {
        let Some(list) = self.listeners.get_mut(&event.kind()) else {
            return Ok(());
        };
        let mut first_error = None;
        for listener in list.values_mut() {
            if let Err(err) = listener(event) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(DriverError::Listener(err)),
            None => Ok(()),
        }
    }
}
