//! Output targets and per-cell capture.
//!
//! Evaluation never writes to the process streams directly. It writes to an
//! `OutputTarget`, a shared handle around the current `OutputSink`. Running
//! a cell installs a `CaptureScope` on the target, which swaps in a fresh
//! `CaptureBuffer` and puts the previous sink back when dropped.

use std::cell::RefCell;
use std::io::Write as _;
use std::mem;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn name(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

/// Receives text written by running code.
pub trait OutputSink {
    fn write(&mut self, stream: Stream, text: &str);
}

/// Writes straight to the process's stdout and stderr.
#[derive(Debug, Default)]
pub struct StdioSink;

impl OutputSink for StdioSink {
    fn write(&mut self, stream: Stream, text: &str) {
        // Nowhere left to report a failing process stream.
        let _ = match stream {
            Stream::Stdout => std::io::stdout().write_all(text.as_bytes()),
            Stream::Stderr => std::io::stderr().write_all(text.as_bytes()),
        };
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write(&mut self, _stream: Stream, _text: &str) {}
}

/// Shared handle to the sink that output currently goes to.
#[derive(Clone)]
pub struct OutputTarget {
    sink: Rc<RefCell<Box<dyn OutputSink>>>,
}

impl OutputTarget {
    pub fn new(sink: impl OutputSink + 'static) -> Self {
        Self {
            sink: Rc::new(RefCell::new(Box::new(sink))),
        }
    }

    pub fn stdio() -> Self {
        Self::new(StdioSink)
    }

    pub fn write(&self, stream: Stream, text: &str) {
        if text.is_empty() {
            return;
        }
        self.sink.borrow_mut().write(stream, text);
    }

    /// Route output into a fresh buffer until the returned scope is dropped.
    pub fn capture(&self) -> CaptureScope {
        let buffer = CaptureBuffer::default();
        let previous = self.replace(Box::new(buffer.clone()));
        CaptureScope {
            target: self.clone(),
            previous: Some(previous),
            buffer,
        }
    }

    fn replace(&self, sink: Box<dyn OutputSink>) -> Box<dyn OutputSink> {
        mem::replace(&mut *self.sink.borrow_mut(), sink)
    }
}

impl Default for OutputTarget {
    fn default() -> Self {
        Self::stdio()
    }
}

#[derive(Debug, Default)]
struct Captured {
    stdout: String,
    stderr: String,
}

/// Append-only text captured from one cell run.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Rc<RefCell<Captured>>,
}

impl CaptureBuffer {
    pub fn stdout(&self) -> String {
        self.inner.borrow().stdout.clone()
    }

    pub fn stderr(&self) -> String {
        self.inner.borrow().stderr.clone()
    }

    /// Move the captured text out, leaving the buffer empty.
    pub fn take(&self) -> (String, String) {
        let mut inner = self.inner.borrow_mut();
        (mem::take(&mut inner.stdout), mem::take(&mut inner.stderr))
    }
}

impl OutputSink for CaptureBuffer {
    fn write(&mut self, stream: Stream, text: &str) {
        let mut inner = self.inner.borrow_mut();
        match stream {
            Stream::Stdout => inner.stdout.push_str(text),
            Stream::Stderr => inner.stderr.push_str(text),
        }
    }
}

/// Guard that keeps a `CaptureBuffer` installed on a target.
pub struct CaptureScope {
    target: OutputTarget,
    previous: Option<Box<dyn OutputSink>>,
    buffer: CaptureBuffer,
}

impl CaptureScope {
    /// Restore the previous sink and return what was captured.
    pub fn finish(self) -> (String, String) {
        let buffer = self.buffer.clone();
        drop(self);
        buffer.take()
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.target.replace(previous);
        }
    }
}
