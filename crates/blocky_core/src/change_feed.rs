//! Change notification for live map views.
//!
//! Every successful element or text mutation on a [`Map`](crate::Map) is
//! announced through its change feed, after the statement has committed:
//! - registered listeners are called synchronously with no arguments
//! - channel subscribers receive a [`ChangeEvent`] naming what changed
//!
//! Asset operations are never announced on their own; they only happen as
//! part of an element mutation, which is announced.
//!
//! # Reentrancy
//!
//! Listeners run on the caller's thread before the mutating call returns.
//! Mutations borrow the map mutably, so a listener cannot mutate the same map.
//! A listener must also not register or remove listeners on the feed that is
//! calling it.
//!
//! # Usage
//!
//! ```rust,ignore
//! let rx = map.subscribe();
//! map.on_change(|| println!("map changed, re-render"));
//!
//! map.create_element(&ElementEditable::new("Room", 0, 0, 1, 1))?;
//!
//! while let Ok(event) = rx.try_recv() {
//!     println!("{:?}", event.kind);
//! }
//! ```

use crate::types::{ElementId, TextId};
use parking_lot::{Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};

/// What a committed mutation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An element was created.
    ElementCreated(ElementId),
    /// An element was edited.
    ElementEdited(ElementId),
    /// An element was removed.
    ElementRemoved(ElementId),
    /// A text object was created.
    TextCreated(TextId),
    /// A text object was edited.
    TextEdited(TextId),
    /// A text object was removed.
    TextRemoved(TextId),
}

/// A single change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Per-map sequence number, starting at 1.
    pub sequence: u64,
    /// What changed.
    pub kind: ChangeKind,
}

/// Handle of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn() + Send + 'static>;

#[derive(Default)]
struct Counters {
    /// Last emitted sequence number.
    sequence: u64,
    /// Last issued listener id.
    listener: u64,
}

/// Distributes change notifications to listeners and subscribers.
pub struct ChangeFeed {
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    counters: Mutex<Counters>,
}

impl ChangeFeed {
    /// Creates an empty change feed.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Adds a listener called after every announced change.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + 'static,
    {
        let id = {
            let mut counters = self.counters.lock();
            counters.listener += 1;
            ListenerId(counters.listener)
        };
        self.listeners.write().push((id, Box::new(listener)));
        id
    }

    /// Replaces all listeners with a single one.
    ///
    /// This is the single-slot behavior: the last registration wins.
    pub fn replace_listeners<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + 'static,
    {
        self.listeners.write().clear();
        self.on_change(listener)
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Subscribes to change events.
    ///
    /// Dropping the receiver unsubscribes on the next emitted event.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Announces a committed change.
    pub fn emit(&self, kind: ChangeKind) {
        let sequence = {
            let mut counters = self.counters.lock();
            counters.sequence += 1;
            counters.sequence
        };
        let event = ChangeEvent { sequence, kind };

        for (_, listener) in self.listeners.read().iter() {
            listener();
        }

        // Send to subscribers (remove disconnected ones)
        self.subscribers
            .write()
            .retain(|tx| tx.send(event).is_ok());
    }

    /// Returns the sequence number of the last emitted event (0 if none).
    pub fn latest_sequence(&self) -> u64 {
        self.counters.lock().sequence
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns the number of active channel subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.subscriber_count())
            .field("latest_sequence", &self.latest_sequence())
            .finish()
    }
}
