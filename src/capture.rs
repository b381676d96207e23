//! Case-scoped output capture.
//!
//! Each thread keeps a stack of capture buffers. [`scope`] pushes a buffer and returns a guard; dropping the guard
//! (on every exit path, unwinding included) pops it again. [`write`] appends to the innermost buffer on the current
//! thread, or passes through to stdout when nothing is capturing. Workers never share a buffer, so concurrent cases
//! never see each other's output.

use std::cell::RefCell;
use std::io::Write as _;

thread_local! {
    static BUFFERS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Write formatted output into the active capture, with a trailing newline.
#[macro_export]
macro_rules! outln {
    () => {
        $crate::capture::write("\n")
    };
    ($($arg:tt)*) => {
        $crate::capture::write(&format!("{}\n", format_args!($($arg)*)))
    };
}

/// Guard for one capture scope. Call [`CaptureGuard::finish`] to take the captured text.
#[must_use = "dropping the guard ends the capture and discards its text"]
pub struct CaptureGuard {
    depth: usize,
    finished: bool,
}

impl CaptureGuard {
    /// End the scope and return what was written inside it.
    pub fn finish(mut self) -> String {
        self.finished = true;
        pop_to(self.depth)
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if !self.finished {
            pop_to(self.depth);
        }
    }
}

/// Start capturing output on the current thread.
pub fn scope() -> CaptureGuard {
    let depth = BUFFERS.with(|b| {
        let mut buffers = b.borrow_mut();
        buffers.push(String::new());
        buffers.len()
    });
    CaptureGuard { depth, finished: false }
}

/// Whether a capture scope is active on this thread.
pub fn is_capturing() -> bool {
    BUFFERS.with(|b| !b.borrow().is_empty())
}

/// Append text to the innermost active capture, or print it when nothing is capturing.
pub fn write(text: &str) {
    let captured = BUFFERS.with(|b| match b.borrow_mut().last_mut() {
        Some(buffer) => {
            buffer.push_str(text);
            true
        }
        None => false,
    });
    if !captured {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Pop every buffer at or above `depth` and return the one opened at `depth`.
///
/// Inner scopes that were leaked (guard forgotten) are folded into the returned text rather than lost.
fn pop_to(depth: usize) -> String {
    BUFFERS.with(|b| {
        let mut buffers = b.borrow_mut();
        if buffers.len() < depth || depth == 0 {
            return String::new();
        }
        let mut text = String::new();
        for buffer in buffers.drain(depth - 1..) {
            text.push_str(&buffer);
        }
        text
    })
}
