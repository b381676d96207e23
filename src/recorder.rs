//! The execution recorder: a serialized gate between concurrent producers and listeners.
//!
//! Any number of workers may call [`Recorder::record`] at once. Forwarding happens under a single lock, so exactly
//! one event is in flight at a time: every listener sees event `n` before any listener sees event `n + 1`, and no
//! listener is ever called concurrently with itself. Ordering across producers is arrival order at the lock.
//!
//! A listener may record events itself. Those are queued and forwarded once the current event has reached every
//! listener, by the same thread that holds the gate.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use casework_core::{ExecutionSummary, LifecycleEvent};
use parking_lot::ReentrantMutex;

/// A subscriber to lifecycle events.
pub trait Listener: Send {
    fn handle(&mut self, event: &LifecycleEvent);
}

impl<F> Listener for F
where
    F: FnMut(&LifecycleEvent) + Send,
{
    fn handle(&mut self, event: &LifecycleEvent) {
        self(event)
    }
}

#[derive(Default)]
struct Forwarding {
    listeners: Vec<Box<dyn Listener>>,
    tally: ExecutionSummary,
    forwarded: u64,
}

/// State behind the gate. Only the thread holding the lock touches it, so plain cells suffice.
#[derive(Default)]
struct Gate {
    state: RefCell<Forwarding>,
    pending: RefCell<VecDeque<LifecycleEvent>>,
    draining: Cell<bool>,
}

/// Serializes lifecycle events from concurrent producers to a set of listeners.
pub struct Recorder {
    gate: ReentrantMutex<Gate>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            gate: ReentrantMutex::new(Gate::default()),
        }
    }

    /// Builder-style [`Recorder::subscribe`].
    pub fn with_listener(self, listener: impl Listener + 'static) -> Self {
        self.subscribe(listener);
        self
    }

    /// Add a listener. It sees every event recorded after this call returns.
    pub fn subscribe(&self, listener: impl Listener + 'static) {
        self.gate.lock().state.borrow_mut().listeners.push(Box::new(listener));
    }

    /// Forward `event` to every listener, blocking while another event is being forwarded.
    ///
    /// A listener that panics is logged and skipped for this event; the others still receive it. Called from inside
    /// a listener, the event is queued behind the one being forwarded and this returns immediately.
    pub fn record(&self, event: LifecycleEvent) {
        let gate = self.gate.lock();
        gate.pending.borrow_mut().push_back(event);
        if gate.draining.replace(true) {
            return;
        }
        loop {
            let next = gate.pending.borrow_mut().pop_front();
            let Some(event) = next else { break };
            forward(&gate, &event);
        }
        gate.draining.set(false);
    }

    /// Number of events forwarded so far.
    pub fn forwarded(&self) -> u64 {
        self.gate.lock().state.borrow().forwarded
    }

    /// Counts and summed durations of every case result recorded so far.
    pub fn summary(&self) -> ExecutionSummary {
        self.gate.lock().state.borrow().tally
    }

    /// Return the tally and reset it for the next run.
    pub fn take_summary(&self) -> ExecutionSummary {
        std::mem::take(&mut self.gate.lock().state.borrow_mut().tally)
    }
}

/// Deliver one event. The listener list is moved out while handlers run so they can call back into the recorder.
fn forward(gate: &Gate, event: &LifecycleEvent) {
    let mut listeners = {
        let mut state = gate.state.borrow_mut();
        state.tally.observe(event);
        state.forwarded += 1;
        std::mem::take(&mut state.listeners)
    };
    for (index, listener) in listeners.iter_mut().enumerate() {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.handle(event)));
        if delivered.is_err() {
            tracing::error!(listener = index, test = ?event.test().map(|t| t.name.as_str()), "listener panicked");
        }
    }
    let mut state = gate.state.borrow_mut();
    // Listeners subscribed during delivery go after the existing ones.
    listeners.append(&mut state.listeners);
    state.listeners = listeners;
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gate = self.gate.lock();
        let state = gate.state.borrow();
        f.debug_struct("Recorder")
            .field("listeners", &state.listeners.len())
            .field("forwarded", &state.forwarded)
            .finish()
    }
}
