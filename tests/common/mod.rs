//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use casework::{LifecycleEvent, Recorder};

/// Initialise test logging once, honouring `RUST_LOG` and defaulting to `warn`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A recorder whose only listener appends every event to the returned log.
pub fn collecting_recorder() -> (Arc<Recorder>, Arc<Mutex<Vec<LifecycleEvent>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let recorder = Recorder::new().with_listener(move |event: &LifecycleEvent| sink.lock().unwrap().push(event.clone()));
    (Arc::new(recorder), log)
}
