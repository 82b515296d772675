//! Single-slot handoff between a producing and a consuming thread.
//!
//! The producer moves a value in with [`Rendezvous::hand_over`] and stays blocked until
//! the consumer has finished with it and moved it back with [`Rendezvous::give_back`].
//! There is never more than one value in flight, so the two sides strictly alternate.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// The other side has shut the rendezvous down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rendezvous closed")
    }
}

impl std::error::Error for Closed {}

#[derive(Debug)]
enum Slot<T> {
    /// Waiting for the producer.
    Empty,
    /// Filled, waiting for the consumer to pick it up.
    Full(T),
    /// The consumer holds the value.
    Taken,
    /// Consumed and waiting for the producer to pick it back up.
    Returned(T),
}

#[derive(Debug)]
struct State<T> {
    slot: Slot<T>,
    closed: bool,
}

/// A two-party handshake holding at most one value.
#[derive(Debug)]
pub struct Rendezvous<T> {
    state: Mutex<State<T>>,
    changed: Condvar,
}

impl<T> Rendezvous<T> {
    /// An empty, open rendezvous.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                slot: Slot::Empty,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    // The state stays consistent across a panic in either party, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_while<'a>(
        &'a self,
        guard: MutexGuard<'a, State<T>>,
        condition: impl FnMut(&mut State<T>) -> bool,
    ) -> MutexGuard<'a, State<T>> {
        self.changed
            .wait_while(guard, condition)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Give `item` to the consumer and block until it comes back.
    ///
    /// Returns the value the consumer gave back, or `Err(Closed)` if the rendezvous is
    /// (or gets) closed before that happens.
    pub fn hand_over(&self, item: T) -> Result<T, Closed> {
        let mut state = self.lock();
        if state.closed {
            return Err(Closed);
        }
        state.slot = Slot::Full(item);
        self.changed.notify_all();

        let mut state = self.wait_while(state, |s| {
            !s.closed && !matches!(s.slot, Slot::Returned(_))
        });
        match std::mem::replace(&mut state.slot, Slot::Empty) {
            Slot::Returned(item) => Ok(item),
            _ => Err(Closed),
        }
    }

    /// Block until the producer hands something over.
    ///
    /// Returns `None` once the rendezvous is closed. The caller must answer every
    /// `Some` with [`give_back`](Self::give_back).
    pub fn take(&self) -> Option<T> {
        let state = self.lock();
        let mut state = self.wait_while(state, |s| !s.closed && !matches!(s.slot, Slot::Full(_)));
        if state.closed {
            return None;
        }
        match std::mem::replace(&mut state.slot, Slot::Taken) {
            Slot::Full(item) => Some(item),
            other => {
                state.slot = other;
                None
            }
        }
    }

    /// Return a value obtained from [`take`](Self::take), releasing the producer.
    pub fn give_back(&self, item: T) {
        let mut state = self.lock();
        state.slot = Slot::Returned(item);
        self.changed.notify_all();
    }

    /// Wake every waiter and refuse further handoffs.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.changed.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl<T> Default for Rendezvous<T> {
    fn default() -> Self {
        Self::new()
    }
}
