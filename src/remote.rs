//! Lifecycle events across a process boundary.
//!
//! A child process running tests writes one JSON object per line ([`NdjsonSink`]); the parent reads the stream back
//! and forwards each event into its own [`Recorder`] ([`replay`]). The wire shape is the serde form of
//! [`LifecycleEvent`], tagged by `kind`.

use std::io::{self, BufRead, Write};

use casework_core::LifecycleEvent;
use thiserror::Error;

use crate::recorder::{Listener, Recorder};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("event stream I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: malformed event")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Encode one event as a single JSON line (without the trailing newline).
pub fn encode_event(event: &LifecycleEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn decode_event(line: &str) -> Result<LifecycleEvent, serde_json::Error> {
    serde_json::from_str(line)
}

/// Listener that writes every event it sees as NDJSON.
pub struct NdjsonSink<W: Write + Send> {
    writer: W,
    written: usize,
}

impl<W: Write + Send> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Events successfully written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &LifecycleEvent) -> io::Result<()> {
        let line = encode_event(event).map_err(io::Error::other)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write + Send> Listener for NdjsonSink<W> {
    fn handle(&mut self, event: &LifecycleEvent) {
        match self.write_event(event) {
            Ok(()) => self.written += 1,
            Err(err) => tracing::warn!(%err, "dropping event: could not write to event stream"),
        }
    }
}

/// Forward every event in `reader` into `recorder`, in stream order.
///
/// Blank lines are skipped. Stops at the first malformed line.
///
/// ## Returns
/// - (`usize`): number of events forwarded.
pub fn replay(reader: impl BufRead, recorder: &Recorder) -> Result<usize, RemoteError> {
    let mut forwarded = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event = decode_event(&line).map_err(|source| RemoteError::Decode { line: index + 1, source })?;
        recorder.record(event);
        forwarded += 1;
    }
    tracing::debug!(forwarded, "replayed event stream");
    Ok(forwarded)
}
