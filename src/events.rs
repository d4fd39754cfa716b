//! Observer lists used for change notification between components.
//!
//! An [`Emitter`] is a cheap, cloneable handle to a shared list of listeners.
//! Emission works on a snapshot of the list: listeners registered while an
//! event is being delivered only see later events, and listeners removed
//! mid-delivery are skipped.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Identifies a registered listener so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Rc<dyn Fn(&E)>;

struct Listeners<E> {
    next_id: u64,
    entries: Vec<(u64, Listener<E>)>,
}

/// Single-threaded event emitter.
pub struct Emitter<E> {
    listeners: Rc<RefCell<Listeners<E>>>,
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a listener for every subsequent event.
    pub fn add_listener(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        let mut listeners = self.listeners.borrow_mut();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Rc::new(listener)));
        ListenerId(id)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry_id, _)| *entry_id != id.0);
        listeners.entries.len() != before
    }

    pub fn remove_all_listeners(&self) {
        self.listeners.borrow_mut().entries.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }

    /// Deliver `event` to the listeners registered at the time of the call.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<(u64, Listener<E>)> = self.listeners.borrow().entries.clone();
        for (id, listener) in snapshot {
            if self.is_registered(id) {
                listener(event);
            }
        }
    }

    fn is_registered(&self, id: u64) -> bool {
        self.listeners
            .borrow()
            .entries
            .iter()
            .any(|(entry_id, _)| *entry_id == id)
    }
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
